//! HTTP request handlers for the flowbridge API.
//!
//! - `ingest` - webhook ingestion and the shared invocation contract
//! - `health` - health, readiness and liveness probes
//!
//! Ingestion failures of every kind answer 500 with a JSON body whose `error`
//! field carries the coded message (E1001-E1004, E3001).

pub mod health;
pub mod ingest;

pub use health::{health_check, liveness_check, readiness_check};
pub use ingest::{ingest_webhook, IngestHandler, InvocationEvent, InvocationResponse};
