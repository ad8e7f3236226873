//! Reading ingestion: the invocation contract and its HTTP adapter.
//!
//! [`IngestHandler`] turns one invocation event into one invocation
//! response. The same handler backs the `/ingest` route and the Lambda
//! runtime, so both surfaces answer with identical status codes and bodies.

use std::{collections::BTreeMap, fmt, sync::Arc};

use axum::{
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use flowbridge_core::{decode_reading, IngestError, Reading, ReadingStore};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument, warn};

use crate::AppState;

/// Message returned when a reading was stored.
pub const SUCCESS_MESSAGE: &str = "Data saved successfully";
/// Message returned for every failure.
pub const FAILURE_MESSAGE: &str = "Error processing data";

const CONTENT_TYPE_HEADER: &str = "Content-Type";
const JSON_CONTENT_TYPE: &str = "application/json";

/// One webhook delivery as handed over by the hosting platform.
///
/// Only `body` is interpreted. Every other field of the platform event is
/// kept in `context` so the raw event can be logged as received. `body` is
/// kept as any JSON value so a direct invocation with a non-string body
/// still reaches the handler and gets a failure response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationEvent {
    /// Request body, expected to be the string `{"data": "<json string>"}`
    #[serde(default)]
    pub body: Option<Value>,
    /// Remaining platform fields (headers, request context, ...)
    #[serde(flatten)]
    pub context: Map<String, Value>,
}

impl InvocationEvent {
    /// Creates an event carrying only a body.
    pub fn with_body(body: impl Into<String>) -> Self {
        Self { body: Some(Value::String(body.into())), context: Map::new() }
    }

    /// Builds an event from an arbitrary platform payload.
    ///
    /// # Errors
    ///
    /// Returns `MalformedOuterPayload` if the payload is not a JSON object.
    pub fn from_value(value: Value) -> Result<Self, IngestError> {
        match value {
            Value::Object(_) => serde_json::from_value(value).map_err(|e| {
                IngestError::MalformedOuterPayload { reason: format!("invalid event: {e}") }
            }),
            other => Err(IngestError::MalformedOuterPayload {
                reason: format!("event must be a JSON object, found {}", value_kind(&other)),
            }),
        }
    }

    /// Returns the body text, treating `null` as absent.
    ///
    /// # Errors
    ///
    /// Returns `MalformedOuterPayload` if the body is present but not a
    /// string.
    pub fn body_text(&self) -> Result<Option<&str>, IngestError> {
        match &self.body {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(body)) => Ok(Some(body)),
            Some(other) => Err(IngestError::MalformedOuterPayload {
                reason: format!("body must be a string, found {}", value_kind(other)),
            }),
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl fmt::Display for InvocationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{self:?}"),
        }
    }
}

/// HTTP-shaped result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    /// 200 on success, 500 on any failure
    pub status_code: u16,
    /// Always `{"Content-Type": "application/json"}`
    pub headers: BTreeMap<String, String>,
    /// JSON-encoded [`ResponseBody`]
    pub body: String,
}

/// JSON body of an invocation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseBody {
    /// Whether the reading was stored
    pub success: bool,
    /// Fixed human-readable summary
    pub message: String,
    /// Description of the failure, absent on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InvocationResponse {
    /// Response for a stored reading.
    pub fn success() -> Self {
        Self::json(
            StatusCode::OK,
            &ResponseBody { success: true, message: SUCCESS_MESSAGE.to_string(), error: None },
        )
    }

    /// Response for a failed invocation.
    ///
    /// Every failure kind maps to 500, matching the platform contract the
    /// device webhooks were configured against.
    pub fn failure(error: &IngestError) -> Self {
        Self::json(
            StatusCode::INTERNAL_SERVER_ERROR,
            &ResponseBody {
                success: false,
                message: FAILURE_MESSAGE.to_string(),
                error: Some(error.to_string()),
            },
        )
    }

    fn json(status: StatusCode, body: &ResponseBody) -> Self {
        let body = serde_json::to_string(body).unwrap_or_else(|e| {
            error!(error = %e, "Failed to serialize response body");
            format!(r#"{{"success":false,"message":"{FAILURE_MESSAGE}"}}"#)
        });

        Self {
            status_code: status.as_u16(),
            headers: BTreeMap::from([(
                CONTENT_TYPE_HEADER.to_string(),
                JSON_CONTENT_TYPE.to_string(),
            )]),
            body,
        }
    }

    /// Decodes the JSON body.
    ///
    /// # Errors
    ///
    /// Returns error if the body is not a [`ResponseBody`].
    pub fn parsed_body(&self) -> serde_json::Result<ResponseBody> {
        serde_json::from_str(&self.body)
    }
}

impl IntoResponse for InvocationResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) =
                (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str()))
            {
                headers.insert(name, value);
            }
        }

        (status, headers, self.body).into_response()
    }
}

/// Decodes webhook deliveries and writes one reading per delivery.
///
/// Holds the process-wide store; clones share it.
#[derive(Clone)]
pub struct IngestHandler {
    store: Arc<dyn ReadingStore>,
}

impl IngestHandler {
    /// Creates a handler writing to `store`.
    pub fn new(store: Arc<dyn ReadingStore>) -> Self {
        Self { store }
    }

    /// Handles one invocation.
    ///
    /// Never fails: every error is logged and reported in the response.
    #[instrument(name = "ingest_reading", skip_all)]
    pub async fn handle(&self, event: &InvocationEvent) -> InvocationResponse {
        info!(event = %event, "Received event");

        match self.ingest(event).await {
            Ok(reading) => {
                info!(
                    device_id = %reading.device_id(),
                    timestamp = reading.timestamp(),
                    "Data saved to store successfully"
                );
                InvocationResponse::success()
            },
            Err(e) => Self::reject(&e),
        }
    }

    /// Handles a platform payload that has not been decoded yet.
    ///
    /// A payload that is not an event object is answered like any other
    /// malformed delivery.
    pub async fn handle_value(&self, payload: Value) -> InvocationResponse {
        match InvocationEvent::from_value(payload) {
            Ok(event) => self.handle(&event).await,
            Err(e) => Self::reject(&e),
        }
    }

    fn reject(e: &IngestError) -> InvocationResponse {
        if e.is_client_error() {
            warn!(error = %e, code = e.code(), "Rejected webhook payload");
        } else {
            error!(error = %e, code = e.code(), "Failed to store reading");
        }
        InvocationResponse::failure(e)
    }

    async fn ingest(&self, event: &InvocationEvent) -> Result<Reading, IngestError> {
        let reading = decode_reading(event.body_text()?)?;
        debug!(item = ?reading, "Prepared reading");

        self.store.put_reading(reading.clone()).await?;

        Ok(reading)
    }
}

/// Adapts a raw HTTP request into an invocation event.
///
/// An empty body counts as absent. Request headers are kept in the event
/// context for logging.
///
/// # Errors
///
/// Returns `MalformedOuterPayload` if the body is not UTF-8.
pub fn event_from_request(headers: &HeaderMap, body: Bytes) -> Result<InvocationEvent, IngestError> {
    let body = if body.is_empty() {
        None
    } else {
        let text = String::from_utf8(body.to_vec()).map_err(|e| {
            IngestError::MalformedOuterPayload { reason: format!("body is not UTF-8: {e}") }
        })?;
        Some(Value::String(text))
    };

    let header_map: Map<String, Value> = headers
        .iter()
        .filter_map(|(name, value)| {
            value.to_str().ok().map(|v| (name.as_str().to_string(), Value::String(v.to_string())))
        })
        .collect();

    let mut context = Map::new();
    context.insert("headers".to_string(), Value::Object(header_map));

    Ok(InvocationEvent { body, context })
}

/// Ingests one webhook delivered over HTTP.
///
/// Responds exactly as the invocation handler does: 200 with a success body
/// or 500 with a failure body.
#[instrument(
    name = "ingest_webhook",
    skip_all,
    fields(
        content_length = body.len(),
        content_type = headers.get("content-type").and_then(|v| v.to_str().ok()).unwrap_or("unknown"),
    )
)]
pub async fn ingest_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    info!("Processing webhook ingestion request");

    match event_from_request(&headers, body) {
        Ok(event) => state.handler.handle(&event).await.into_response(),
        Err(e) => {
            warn!(error = %e, "Rejected webhook request");
            InvocationResponse::failure(&e).into_response()
        },
    }
}

#[cfg(test)]
mod tests {
    use std::{io, sync::Mutex};

    use flowbridge_core::storage::mock::MockReadingStore;
    use serde_json::json;
    use tracing_subscriber::fmt::MakeWriter;

    use super::*;

    const REFERENCE_BODY: &str = r#"{"data": "{\"device_id\":\"pool-1\",\"timestamp\":1,\"gallons_used\":1,\"signal_strength\":-50}"}"#;

    /// Log sink collecting formatted output for assertions.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn handler() -> (IngestHandler, MockReadingStore) {
        let store = MockReadingStore::new();
        (IngestHandler::new(Arc::new(store.clone())), store)
    }

    #[test]
    fn success_response_matches_contract() {
        let response = InvocationResponse::success();

        assert_eq!(response.status_code, 200);
        assert_eq!(response.headers.get("Content-Type").unwrap(), "application/json");
        assert_eq!(response.body, r#"{"success":true,"message":"Data saved successfully"}"#);
    }

    #[test]
    fn failure_response_carries_error_description() {
        let error = IngestError::MissingField { field: "timestamp" };

        let response = InvocationResponse::failure(&error);
        let body = response.parsed_body().unwrap();

        assert_eq!(response.status_code, 500);
        assert!(!body.success);
        assert_eq!(body.message, "Error processing data");
        assert_eq!(body.error.as_deref(), Some("[E1003] Missing field: timestamp"));
    }

    #[test]
    fn invocation_response_serializes_platform_field_names() {
        let json = serde_json::to_value(InvocationResponse::success()).unwrap();

        assert_eq!(json["statusCode"], 200);
        assert_eq!(json["headers"]["Content-Type"], "application/json");
        assert!(json["headers"].get("content-type").is_none());
        assert!(json["body"].is_string());
    }

    #[test]
    fn platform_event_keeps_unknown_fields() {
        let event: InvocationEvent = serde_json::from_str(
            r#"{"body": "{}", "httpMethod": "POST", "isBase64Encoded": false}"#,
        )
        .unwrap();

        assert_eq!(event.body_text().unwrap(), Some("{}"));
        assert_eq!(event.context["httpMethod"], "POST");
    }

    #[test]
    fn event_without_body_deserializes() {
        let event: InvocationEvent = serde_json::from_str(r#"{"body": null}"#).unwrap();
        assert!(event.body.is_none());
    }

    #[test]
    fn empty_http_body_is_absent() {
        let event = event_from_request(&HeaderMap::new(), Bytes::new()).unwrap();
        assert!(event.body.is_none());
    }

    #[test]
    fn non_utf8_http_body_is_rejected() {
        let err = event_from_request(&HeaderMap::new(), Bytes::from_static(&[0xff, 0xfe])).unwrap_err();
        assert!(matches!(err, IngestError::MalformedOuterPayload { .. }));
    }

    #[tokio::test]
    async fn store_failure_becomes_500() {
        let (handler, store) = handler();
        store.inject_write_error("connection reset").await;
        let response = handler.handle(&InvocationEvent::with_body(REFERENCE_BODY)).await;
        let parsed = response.parsed_body().unwrap();

        assert_eq!(response.status_code, 500);
        assert!(parsed.error.unwrap().contains("connection reset"));
        assert_eq!(store.write_count(), 1);
        assert!(store.readings().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_payload_never_reaches_store() {
        let (handler, store) = handler();

        let response = handler.handle(&InvocationEvent::with_body("not json")).await;

        assert_eq!(response.status_code, 500);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn non_string_body_becomes_500() {
        let (handler, store) = handler();
        let payload = json!({ "body": { "data": "{}" } });

        let response = handler.handle_value(payload).await;
        let parsed = response.parsed_body().unwrap();

        assert_eq!(response.status_code, 500);
        assert_eq!(response.headers.get("Content-Type").unwrap(), "application/json");
        assert!(parsed.error.unwrap().contains("body must be a string, found object"));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn non_object_payload_becomes_500() {
        let (handler, store) = handler();

        for payload in [json!("just a string"), json!([1, 2]), json!(null)] {
            let response = handler.handle_value(payload.clone()).await;
            let parsed = response.parsed_body().unwrap();

            assert_eq!(response.status_code, 500, "payload: {payload}");
            assert!(parsed.error.unwrap().starts_with("[E1001]"), "payload: {payload}");
        }
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn undecoded_payload_with_string_body_is_stored() {
        let (handler, store) = handler();
        let payload = json!({ "body": REFERENCE_BODY, "httpMethod": "POST" });

        let response = handler.handle_value(payload).await;

        assert_eq!(response.status_code, 200);
        assert_eq!(store.readings().await.len(), 1);
    }

    #[tokio::test]
    async fn diagnostics_are_logged_at_info() {
        let (handler, _store) = handler();
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(logs.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let response = handler.handle(&InvocationEvent::with_body(REFERENCE_BODY)).await;

        assert_eq!(response.status_code, 200);
        let output = logs.contents();
        assert!(output.contains("Received event"), "{output}");
        assert!(output.contains("Parsed body"), "{output}");
        assert!(output.contains("Device data"), "{output}");
    }
}
