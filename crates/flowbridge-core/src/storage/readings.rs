//! Repository for flow reading rows.
//!
//! Expects an externally provisioned table with columns `device_id TEXT`,
//! `"timestamp" BIGINT`, `gallons_used NUMERIC` and `signal_strength INTEGER`
//! and a unique key on `(device_id, "timestamp")`. Writes are upserts, so a
//! redelivered webhook replaces the earlier row instead of adding one.

use std::{fmt, sync::Arc};

use sqlx::PgPool;
use tracing::debug;

use crate::{
    error::{CoreError, Result},
    models::{Reading, ReadingKey},
};

const MAX_IDENTIFIER_LEN: usize = 63;

/// Validated, optionally schema-qualified table name.
///
/// Table names are interpolated into SQL, so only plain identifiers
/// (`[A-Za-z_][A-Za-z0-9_]*`, at most 63 bytes) are accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    name: String,
    quoted: String,
}

impl TableName {
    /// Parses `name` as `table` or `schema.table`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidInput` if any part is not a plain
    /// identifier.
    pub fn parse(name: &str) -> Result<Self> {
        let parts: Vec<&str> = name.split('.').collect();
        if parts.len() > 2 {
            return Err(CoreError::InvalidInput(format!(
                "table name {name:?} has more than one schema qualifier"
            )));
        }

        for part in &parts {
            if !is_identifier(part) {
                return Err(CoreError::InvalidInput(format!(
                    "table name {name:?} is not a plain SQL identifier"
                )));
            }
        }

        let quoted = parts.iter().map(|part| format!("\"{part}\"")).collect::<Vec<_>>().join(".");

        Ok(Self { name: name.to_string(), quoted })
    }

    /// Returns the name as configured.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Returns the name quoted for use in SQL.
    pub fn quoted(&self) -> &str {
        &self.quoted
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn is_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    let starts_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');

    starts_ok
        && part.len() <= MAX_IDENTIFIER_LEN
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Repository for reading rows.
pub struct Repository {
    pool: Arc<PgPool>,
    table: TableName,
    upsert_sql: String,
    select_sql: String,
}

impl Repository {
    /// Creates a new repository instance.
    pub fn new(pool: Arc<PgPool>, table: TableName) -> Self {
        let upsert_sql = format!(
            r#"
            INSERT INTO {table} (device_id, "timestamp", gallons_used, signal_strength)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (device_id, "timestamp") DO UPDATE
            SET gallons_used = EXCLUDED.gallons_used,
                signal_strength = EXCLUDED.signal_strength
            "#,
            table = table.quoted()
        );
        let select_sql = format!(
            r#"
            SELECT device_id, "timestamp", gallons_used, signal_strength
            FROM {table}
            WHERE device_id = $1 AND "timestamp" = $2
            "#,
            table = table.quoted()
        );

        Self { pool, table, upsert_sql, select_sql }
    }

    /// Returns a reference to the database pool.
    pub fn pool(&self) -> Arc<PgPool> {
        self.pool.clone()
    }

    /// Returns the table this repository writes to.
    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// Writes a reading, replacing any row with the same key.
    ///
    /// # Errors
    ///
    /// Returns error if the statement fails, including when the table or its
    /// unique key is missing.
    pub async fn upsert(&self, reading: &Reading) -> Result<()> {
        let result = sqlx::query(&self.upsert_sql)
            .bind(reading.device_id())
            .bind(reading.timestamp())
            .bind(reading.gallons_used())
            .bind(reading.signal_strength())
            .execute(&*self.pool)
            .await?;

        debug!(
            table = %self.table,
            key = %reading.key(),
            rows_affected = result.rows_affected(),
            "Reading upserted"
        );

        Ok(())
    }

    /// Finds the reading stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    pub async fn find(&self, key: &ReadingKey) -> Result<Option<Reading>> {
        let reading = sqlx::query_as::<_, Reading>(&self.select_sql)
            .bind(&key.device_id)
            .bind(key.timestamp)
            .fetch_optional(&*self.pool)
            .await?;

        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_are_quoted() {
        let table = TableName::parse("pool_flow_data").unwrap();
        assert_eq!(table.quoted(), "\"pool_flow_data\"");
    }

    #[test]
    fn schema_qualified_names_quote_each_part() {
        let table = TableName::parse("telemetry.PoolFlowData").unwrap();
        assert_eq!(table.quoted(), "\"telemetry\".\"PoolFlowData\"");
        assert_eq!(table.to_string(), "telemetry.PoolFlowData");
    }

    #[test]
    fn injection_attempts_are_rejected() {
        for name in ["", "readings; DROP TABLE x", "a.b.c", "1readings", "read\"ings", "a."] {
            assert!(TableName::parse(name).is_err(), "{name:?} should be rejected");
        }
    }

    #[test]
    fn overlong_identifiers_are_rejected() {
        let name = "r".repeat(MAX_IDENTIFIER_LEN + 1);
        assert!(TableName::parse(&name).is_err());
    }

    #[tokio::test]
    async fn statements_target_the_configured_table() {
        let pool = Arc::new(PgPool::connect_lazy("postgresql://test").unwrap());
        let repo = Repository::new(pool, TableName::parse("flow.readings").unwrap());

        assert!(repo.upsert_sql.contains("INSERT INTO \"flow\".\"readings\""));
        assert!(repo.upsert_sql.contains("ON CONFLICT (device_id, \"timestamp\")"));
        assert!(repo.select_sql.contains("FROM \"flow\".\"readings\""));
    }
}
