//! Error types and result handling for reading ingestion.
//!
//! Defines the failure taxonomy of a single webhook invocation, from an
//! unreadable outer body down to a rejected store write. Every variant carries
//! a stable code so log lines and response bodies can be correlated.

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Storage-level error type.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// Entity not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Constraint violation.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("requested reading not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::ConstraintViolation(format!("unique constraint violation: {db_err}"))
            },
            sqlx::Error::Database(db_err) if db_err.is_check_violation() => {
                Self::ConstraintViolation(format!("check constraint violation: {db_err}"))
            },
            _ => Self::Database(err.to_string()),
        }
    }
}

/// Failure of one ingest invocation.
///
/// All variants collapse into the same generic failure response at the HTTP
/// boundary; the code and message end up in the response's `error` field.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Outer request body absent, not JSON, or not an object (E1001).
    #[error("[E1001] Malformed outer payload: {reason}")]
    MalformedOuterPayload {
        /// What was wrong with the body
        reason: String,
    },

    /// `data` field missing, not a string, or not a JSON object (E1002).
    #[error("[E1002] Malformed inner payload: {reason}")]
    MalformedInnerPayload {
        /// What was wrong with the `data` field
        reason: String,
    },

    /// A required device field is absent (E1003).
    #[error("[E1003] Missing field: {field}")]
    MissingField {
        /// Name of the absent field
        field: &'static str,
    },

    /// A device field could not be converted to its target type (E1004).
    #[error("[E1004] Type coercion failed for {field}: {reason}")]
    TypeCoercion {
        /// Name of the offending field
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// The table store rejected or failed the write (E3001).
    #[error("[E3001] Store write failed: {0}")]
    StoreWrite(#[from] CoreError),
}

impl IngestError {
    /// Returns the error code (E1001-E3001).
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MalformedOuterPayload { .. } => "E1001",
            Self::MalformedInnerPayload { .. } => "E1002",
            Self::MissingField { .. } => "E1003",
            Self::TypeCoercion { .. } => "E1004",
            Self::StoreWrite(_) => "E3001",
        }
    }

    /// Returns whether the caller's payload, not the service, caused the
    /// failure.
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::StoreWrite(_))
    }

    pub(crate) fn coercion(field: &'static str, reason: impl Into<String>) -> Self {
        Self::TypeCoercion { field, reason: reason.into() }
    }
}
