//! Connection pool setup for the reading store.

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::Config;

const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Pool options derived from configuration.
pub fn pool_options(config: &Config) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_connection_timeout))
        .idle_timeout(Duration::from_secs(config.database_idle_timeout))
        .max_lifetime(Duration::from_secs(config.database_max_lifetime))
}

/// Creates the database connection pool with retry logic.
///
/// The pool is created once per process and shared by every invocation.
///
/// # Errors
///
/// Returns error once `database_connect_attempts` attempts have failed, or
/// if the verification query fails on a fresh pool.
pub async fn connect(config: &Config) -> Result<PgPool> {
    let mut attempt = 1;

    loop {
        match pool_options(config).connect(&config.database_url).await {
            Ok(pool) => {
                sqlx::query("SELECT 1")
                    .fetch_one(&pool)
                    .await
                    .context("Failed to verify database connection")?;

                return Ok(pool);
            },
            Err(_e) if attempt < config.database_connect_attempts => {
                info!(
                    attempt,
                    max_attempts = config.database_connect_attempts,
                    "Database connection failed, retrying..."
                );
                attempt += 1;
                tokio::time::sleep(RETRY_DELAY).await;
            },
            Err(e) => {
                return Err(e).context("Failed to create database connection pool after retries");
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_options_follow_config() {
        let config = Config {
            database_max_connections: 4,
            database_min_connections: 2,
            database_connection_timeout: 3,
            ..Config::default()
        };

        let options = pool_options(&config);

        assert_eq!(options.get_max_connections(), 4);
        assert_eq!(options.get_min_connections(), 2);
        assert_eq!(options.get_acquire_timeout(), Duration::from_secs(3));
    }
}
