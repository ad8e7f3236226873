//! Flowbridge webhook-to-database bridge.
//!
//! Long-running HTTP entry point. Loads configuration, connects the reading
//! store, and serves `/ingest` plus health probes until SIGTERM.

use std::sync::Arc;

use anyhow::{Context, Result};
use flowbridge_api::{database, AppState, Config};
use flowbridge_core::Storage;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    init_tracing(&config.rust_log)?;

    info!("Starting flowbridge webhook bridge");
    info!(
        database_url = %config.database_url_masked(),
        table = %config.table_name,
        max_connections = config.database_max_connections,
        "Configuration loaded"
    );

    let addr = config.parse_server_addr()?;
    let table = config.table()?;

    let pool = database::connect(&config).await?;
    info!("Database connection pool established");

    let storage = Storage::new(pool.clone(), table);
    let state = AppState::new(Arc::new(storage));

    info!(addr = %addr, "Flowbridge is ready to receive webhooks");

    flowbridge_api::start_server(state, addr, config.request_timeout_duration())
        .await
        .context("HTTP server failed")?;

    pool.close().await;
    info!("Database connections closed");

    info!("Flowbridge shutdown complete");
    Ok(())
}

/// Initializes tracing, preferring `RUST_LOG` from the environment over the
/// configured default.
fn init_tracing(default_filter: &str) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .context("Invalid RUST_LOG filter")?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();

    Ok(())
}
