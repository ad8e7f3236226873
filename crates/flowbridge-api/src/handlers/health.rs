//! Health check handlers for service monitoring.
//!
//! Provides liveness, readiness, and health endpoints. Health and readiness
//! probe the reading store; liveness only proves the process answers.

use std::time::Instant;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use flowbridge_core::ReadingStore;
use serde::Serialize;
use tracing::{debug, error, instrument};

use crate::AppState;

/// Health check response structure.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service health status
    pub status: HealthStatus,
    /// Timestamp when health check was performed
    pub timestamp: DateTime<Utc>,
    /// Individual component health checks
    pub checks: HealthChecks,
    /// Service version information
    pub version: String,
}

/// Overall health status enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Store reachable
    Healthy,
    /// Store unreachable
    Unhealthy,
}

/// Individual component health check results.
#[derive(Debug, Serialize)]
pub struct HealthChecks {
    /// Reading store connectivity
    pub database: ComponentHealth,
}

/// Health status for individual components.
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    /// Component status
    pub status: ComponentStatus,
    /// Error message if unhealthy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Response time in milliseconds
    pub response_time_ms: u64,
}

/// Component-level health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is healthy
    Up,
    /// Component is failing
    Down,
}

/// Probes `store` and builds the health report.
pub async fn check_health(store: &dyn ReadingStore) -> HealthResponse {
    debug!("Performing health check");

    let start = Instant::now();
    let result = store.health_check().await;
    let response_time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    let database = match result {
        Ok(()) => {
            debug!("Store health check passed");
            ComponentHealth { status: ComponentStatus::Up, message: None, response_time_ms }
        },
        Err(e) => {
            error!("Store health check failed: {}", e);
            ComponentHealth {
                status: ComponentStatus::Down,
                message: Some(format!("Database connection failed: {e}")),
                response_time_ms,
            }
        },
    };

    let status = match database.status {
        ComponentStatus::Up => HealthStatus::Healthy,
        ComponentStatus::Down => HealthStatus::Unhealthy,
    };

    HealthResponse {
        status,
        timestamp: Utc::now(),
        checks: HealthChecks { database },
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Health check endpoint handler.
///
/// Answers 200 while the store is reachable and 503 otherwise.
#[instrument(name = "health_check", skip(app_state))]
pub async fn health_check(State(app_state): State<AppState>) -> Response {
    let response = check_health(app_state.store.as_ref()).await;

    let status_code = match response.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    debug!(
        status = ?response.status,
        db_status = ?response.checks.database.status,
        "Health check completed"
    );

    (status_code, Json(response)).into_response()
}

/// Readiness check endpoint.
///
/// The only dependency is the store, so readiness equals health.
#[instrument(name = "readiness_check", skip(app_state))]
pub async fn readiness_check(State(app_state): State<AppState>) -> Response {
    health_check(State(app_state)).await
}

/// Liveness check endpoint.
#[instrument(name = "liveness_check", skip_all)]
pub async fn liveness_check() -> Response {
    debug!("Performing liveness check");

    let response = serde_json::json!({
        "status": "alive",
        "timestamp": Utc::now(),
        "service": "flowbridge"
    });

    (StatusCode::OK, Json(response)).into_response()
}

#[cfg(test)]
mod tests {
    use flowbridge_core::storage::mock::MockReadingStore;

    use super::*;

    #[tokio::test]
    async fn reachable_store_is_healthy() {
        let store = MockReadingStore::new();

        let report = check_health(&store).await;

        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.checks.database.status, ComponentStatus::Up);
        assert!(report.checks.database.message.is_none());
    }

    #[tokio::test]
    async fn unreachable_store_reports_reason() {
        let store = MockReadingStore::new();
        store.set_unhealthy("pool timed out").await;

        let report = check_health(&store).await;

        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert!(report.checks.database.message.unwrap().contains("pool timed out"));
    }
}
