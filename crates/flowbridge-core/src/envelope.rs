//! Two-layer webhook envelope decoding.
//!
//! The device platform delivers `{"data": "<json string>"}`: the outer body
//! is JSON and its `data` field is itself a JSON document encoded as a
//! string. Decoding peels both layers, then coerces the four device fields
//! into a [`Reading`].

use std::{collections::BTreeMap, fmt};

use serde_json::{value::RawValue, Map, Value};
use tracing::info;

use crate::{coerce, error::IngestError, models::Reading};

/// Envelope field holding the double-encoded device payload.
pub const DATA_FIELD: &str = "data";
/// Device payload field with the device identifier.
pub const DEVICE_ID_FIELD: &str = "device_id";
/// Device payload field with the sample time in epoch seconds.
pub const TIMESTAMP_FIELD: &str = "timestamp";
/// Device payload field with the gallons used.
pub const GALLONS_USED_FIELD: &str = "gallons_used";
/// Device payload field with the cellular signal strength.
pub const SIGNAL_STRENGTH_FIELD: &str = "signal_strength";

/// Decoded device payload with every value kept as raw JSON text.
#[derive(Debug)]
pub struct DeviceFields(BTreeMap<String, Box<RawValue>>);

impl DeviceFields {
    fn require(&self, field: &'static str) -> Result<&RawValue, IngestError> {
        self.0.get(field).map(|raw| &**raw).ok_or(IngestError::MissingField { field })
    }

    /// Extracts and coerces the required fields into a reading.
    ///
    /// Presence of all four fields is checked before any coercion, in the
    /// order `device_id`, `timestamp`, `gallons_used`, `signal_strength`.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` for the first absent field, or `TypeCoercion`
    /// for the first value that cannot be converted.
    pub fn into_reading(self) -> Result<Reading, IngestError> {
        let device_id = self.require(DEVICE_ID_FIELD)?;
        let timestamp = self.require(TIMESTAMP_FIELD)?;
        let gallons_used = self.require(GALLONS_USED_FIELD)?;
        let signal_strength = self.require(SIGNAL_STRENGTH_FIELD)?;

        Ok(Reading::new(
            coerce::device_id(DEVICE_ID_FIELD, device_id)?,
            coerce::integer::<i64>(TIMESTAMP_FIELD, timestamp)?,
            coerce::decimal(GALLONS_USED_FIELD, gallons_used)?,
            coerce::integer::<i32>(SIGNAL_STRENGTH_FIELD, signal_strength)?,
        ))
    }
}

impl fmt::Display for DeviceFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.0) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}

/// Decodes the outer request body into a JSON object.
///
/// # Errors
///
/// Returns `MalformedOuterPayload` if the body is absent, not JSON, or not
/// an object.
pub fn decode_outer(body: Option<&str>) -> Result<Map<String, Value>, IngestError> {
    let body = body.ok_or_else(|| IngestError::MalformedOuterPayload {
        reason: "request body is missing".to_string(),
    })?;

    let value: Value = serde_json::from_str(body)
        .map_err(|e| IngestError::MalformedOuterPayload { reason: format!("invalid JSON: {e}") })?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(IngestError::MalformedOuterPayload {
            reason: format!("expected a JSON object, found {}", value_kind(&other)),
        }),
    }
}

/// Decodes the JSON document carried as a string in the `data` field.
///
/// # Errors
///
/// Returns `MalformedInnerPayload` if `data` is missing, not a string, not
/// JSON, or not an object.
pub fn decode_inner(outer: &Map<String, Value>) -> Result<DeviceFields, IngestError> {
    let data = match outer.get(DATA_FIELD) {
        Some(Value::String(data)) => data,
        Some(other) => {
            return Err(IngestError::MalformedInnerPayload {
                reason: format!(
                    "`{DATA_FIELD}` must be a JSON-encoded string, found {}",
                    value_kind(other)
                ),
            })
        },
        None => {
            return Err(IngestError::MalformedInnerPayload {
                reason: format!("missing `{DATA_FIELD}` field"),
            })
        },
    };

    serde_json::from_str::<BTreeMap<String, Box<RawValue>>>(data)
        .map(DeviceFields)
        .map_err(|e| IngestError::MalformedInnerPayload {
            reason: format!("`{DATA_FIELD}` is not a JSON object: {e}"),
        })
}

/// Decodes a webhook body all the way down to a reading.
///
/// # Example
///
/// ```
/// use flowbridge_core::decode_reading;
///
/// let body = r#"{"data": "{\"device_id\":\"pool-1\",\"timestamp\":1700000000,\"gallons_used\":3.5,\"signal_strength\":-62}"}"#;
/// let reading = decode_reading(Some(body)).unwrap();
/// assert_eq!(reading.device_id().as_str(), "pool-1");
/// assert_eq!(reading.signal_strength(), -62);
/// ```
///
/// # Errors
///
/// Returns the first [`IngestError`] encountered while peeling the layers
/// or coercing fields.
pub fn decode_reading(body: Option<&str>) -> Result<Reading, IngestError> {
    let outer = decode_outer(body)?;
    let parsed = Value::Object(outer.clone());
    info!(body = %parsed, "Parsed body");

    let fields = decode_inner(&outer)?;
    info!(device_data = %fields, "Device data");

    fields.into_reading()
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
