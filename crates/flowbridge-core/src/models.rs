//! Reading record and strongly-typed identifiers.
//!
//! A `Reading` is one telemetry sample from a flow sensor. It is built once
//! from a decoded webhook payload, handed to the store, and dropped. Nothing
//! in this crate mutates a reading after construction.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

type PgDb = sqlx::Postgres;
type PgValueRef<'r> = sqlx::postgres::PgValueRef<'r>;
type PgTypeInfo = sqlx::postgres::PgTypeInfo;
type PgArgumentBuffer = sqlx::postgres::PgArgumentBuffer;
type EncodeResult =
    Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync + 'static>>;
type BoxDynError = sqlx::error::BoxDynError;

/// Opaque device identifier as reported by the sensor firmware.
///
/// # Example
///
/// ```
/// use flowbridge_core::models::DeviceId;
/// let device = DeviceId::from("pool-1");
/// assert_eq!(device.as_str(), "pool-1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub String);

impl DeviceId {
    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl sqlx::Type<PgDb> for DeviceId {
    fn type_info() -> PgTypeInfo {
        <String as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for DeviceId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let id = <String as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(id))
    }
}

impl sqlx::Encode<'_, PgDb> for DeviceId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <String as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// Store key of a reading: one row per device and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadingKey {
    /// Reporting device
    pub device_id: DeviceId,
    /// Epoch seconds of the sample
    pub timestamp: i64,
}

impl ReadingKey {
    /// Creates a key from its parts.
    pub fn new(device_id: impl Into<DeviceId>, timestamp: i64) -> Self {
        Self { device_id: device_id.into(), timestamp }
    }
}

impl fmt::Display for ReadingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.device_id, self.timestamp)
    }
}

/// One flow sensor telemetry record.
///
/// Fields are private so a reading cannot change between decoding and the
/// store write. Serializes with the store's camelCase attribute names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    device_id: DeviceId,
    timestamp: i64,
    gallons_used: Decimal,
    signal_strength: i32,
}

impl Reading {
    /// Creates a reading from already-coerced values.
    pub fn new(
        device_id: impl Into<DeviceId>,
        timestamp: i64,
        gallons_used: Decimal,
        signal_strength: i32,
    ) -> Self {
        Self { device_id: device_id.into(), timestamp, gallons_used, signal_strength }
    }

    /// Reporting device.
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Epoch seconds of the sample.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Gallons used in the reporting interval, exact.
    pub fn gallons_used(&self) -> Decimal {
        self.gallons_used
    }

    /// Cellular signal strength reported alongside the sample.
    pub fn signal_strength(&self) -> i32 {
        self.signal_strength
    }

    /// Returns the store key of this reading.
    pub fn key(&self) -> ReadingKey {
        ReadingKey { device_id: self.device_id.clone(), timestamp: self.timestamp }
    }
}
