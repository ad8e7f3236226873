//! Flowbridge HTTP API and invocation contract.
//!
//! Exposes the ingest handler both as an axum router and as a plain
//! event-to-response function for serverless runtimes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use flowbridge_core::ReadingStore;

pub mod config;
pub mod database;
pub mod handlers;
pub mod server;

pub use config::Config;
pub use handlers::{IngestHandler, InvocationEvent, InvocationResponse};
pub use server::{create_router, start_server};

/// Shared state for all routes.
#[derive(Clone)]
pub struct AppState {
    /// Ingest handler shared by every request
    pub handler: IngestHandler,
    /// Store probed by the health endpoints
    pub store: Arc<dyn ReadingStore>,
}

impl AppState {
    /// Creates state over a single store.
    pub fn new(store: Arc<dyn ReadingStore>) -> Self {
        Self { handler: IngestHandler::new(store.clone()), store }
    }
}
