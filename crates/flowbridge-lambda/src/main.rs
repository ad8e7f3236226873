//! Lambda entry point for flowbridge.
//!
//! Builds the store and handler once at cold start and reuses them for every
//! invocation the runtime delivers to this process.

use std::sync::Arc;

use flowbridge_api::{database, Config, IngestHandler, InvocationResponse};
use flowbridge_core::Storage;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::load()?;
    init_tracing(&config.rust_log)?;

    info!(
        database_url = %config.database_url_masked(),
        table = %config.table_name,
        "Initializing flowbridge Lambda"
    );

    let pool = database::connect(&config).await?;
    let storage = Storage::new(pool, config.table()?);
    let handler = IngestHandler::new(Arc::new(storage));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let handler = handler.clone();
        async move { invoke(&handler, event).await }
    }))
    .await
}

/// Answers one invocation.
///
/// The payload is taken as plain JSON so that malformed events still get a
/// failure response instead of a runtime deserialization error.
async fn invoke(
    handler: &IngestHandler,
    event: LambdaEvent<Value>,
) -> Result<InvocationResponse, Error> {
    info!(request_id = %event.context.request_id, "Invocation received");

    Ok(handler.handle_value(event.payload).await)
}

/// Initializes tracing without ANSI colors or timestamps, which the log
/// collector adds itself.
fn init_tracing(default_filter: &str) -> Result<(), Error> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_filter))?;

    let fmt_layer = fmt::layer().with_target(true).with_ansi(false).without_time();

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();

    Ok(())
}
