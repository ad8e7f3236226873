//! Health check endpoint tests.
//!
//! Tests `/health`, `/ready` and `/live` against the in-memory store,
//! including the unhealthy path when the store cannot be reached.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use flowbridge_api::{create_router, AppState};
use flowbridge_core::storage::mock::MockReadingStore;
use serde_json::Value;
use tower::ServiceExt;

fn app(store: &MockReadingStore) -> Router {
    create_router(AppState::new(Arc::new(store.clone())), Duration::from_secs(30))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap();

    let response = app.oneshot(request).await.expect("failed to make request");
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    let body = serde_json::from_slice(&body_bytes).expect("response should be valid JSON");

    (status, body)
}

/// Test health check returns 200 with component detail when the store is
/// reachable.
#[tokio::test]
async fn health_check_returns_success_when_healthy() {
    let store = MockReadingStore::new();

    let (status, body) = get(app(&store), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["database"]["status"], "up");
    assert!(body["checks"]["database"]["response_time_ms"].is_u64());
    assert!(body["version"].is_string());
    assert!(body["timestamp"].is_string());
}

/// Test health check returns 503 when the store is unreachable.
#[tokio::test]
async fn health_check_returns_unavailable_when_store_down() {
    let store = MockReadingStore::new();
    store.set_unhealthy("connection refused").await;

    let (status, body) = get(app(&store), "/health").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["checks"]["database"]["status"], "down");
    assert!(body["checks"]["database"]["message"]
        .as_str()
        .unwrap()
        .contains("connection refused"));
}

/// Test readiness follows store health in both directions.
#[tokio::test]
async fn readiness_tracks_store_health() {
    let store = MockReadingStore::new();

    store.set_unhealthy("starting").await;
    let (down, _) = get(app(&store), "/ready").await;

    store.set_healthy().await;
    let (up, _) = get(app(&store), "/ready").await;

    assert_eq!(down, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(up, StatusCode::OK);
}

/// Test liveness does not depend on the store.
#[tokio::test]
async fn liveness_ignores_store_health() {
    let store = MockReadingStore::new();
    store.set_unhealthy("connection refused").await;

    let (status, body) = get(app(&store), "/live").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");
    assert_eq!(body["service"], "flowbridge");
}
