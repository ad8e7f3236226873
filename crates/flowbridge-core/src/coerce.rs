//! Scalar coercion of raw device payload fields.
//!
//! Fields arrive as raw JSON text so numbers keep the exact digits the device
//! sent. Integers accept JSON integers, JSON numbers with a fraction or
//! exponent (truncated toward zero) and strings holding an integer. Decimals
//! are parsed straight from the number's text and never pass through `f64`.

use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde_json::value::RawValue;

use crate::{error::IngestError, models::DeviceId};

/// Shape of a raw JSON value, borrowed from its source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawKind<'a> {
    String,
    Number(&'a str),
    Boolean,
    Null,
    Array,
    Object,
}

impl RawKind<'_> {
    fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number(_) => "number",
            Self::Boolean => "boolean",
            Self::Null => "null",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

fn classify(raw: &RawValue) -> RawKind<'_> {
    let text = raw.get().trim();
    match text.as_bytes().first() {
        Some(b'"') => RawKind::String,
        Some(b't' | b'f') => RawKind::Boolean,
        Some(b'n') => RawKind::Null,
        Some(b'[') => RawKind::Array,
        Some(b'{') => RawKind::Object,
        _ => RawKind::Number(text),
    }
}

fn raw_string(field: &'static str, raw: &RawValue) -> Result<String, IngestError> {
    serde_json::from_str::<String>(raw.get())
        .map_err(|e| IngestError::coercion(field, format!("invalid string: {e}")))
}

/// Parses decimal text exactly, accepting scientific notation.
///
/// Fails instead of rounding when the value does not fit in 28 significant
/// digits.
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    if text.contains(['e', 'E']) {
        Decimal::from_scientific(text).ok()
    } else {
        Decimal::from_str_exact(text).ok()
    }
}

/// Coerces the device identifier. Only JSON strings are accepted.
pub fn device_id(field: &'static str, raw: &RawValue) -> Result<DeviceId, IngestError> {
    match classify(raw) {
        RawKind::String => raw_string(field, raw).map(DeviceId),
        kind => Err(IngestError::coercion(field, format!("expected a string, found {}", kind.name()))),
    }
}

/// Coerces a raw value to an integer of type `T`.
pub fn integer<T>(field: &'static str, raw: &RawValue) -> Result<T, IngestError>
where
    T: TryFrom<i64>,
{
    let wide = match classify(raw) {
        RawKind::Number(text) => match text.parse::<i64>() {
            Ok(value) => value,
            Err(_) => parse_decimal(text)
                .and_then(|d| d.trunc().to_i64())
                .ok_or_else(|| IngestError::coercion(field, format!("{text} is out of range")))?,
        },
        RawKind::String => {
            let text = raw_string(field, raw)?;
            text.trim().parse::<i64>().map_err(|_| {
                IngestError::coercion(field, format!("invalid integer literal: {text:?}"))
            })?
        },
        kind => {
            return Err(IngestError::coercion(
                field,
                format!("expected an integer, found {}", kind.name()),
            ))
        },
    };

    T::try_from(wide).map_err(|_| {
        IngestError::coercion(
            field,
            format!("{wide} is out of range for {}", std::any::type_name::<T>()),
        )
    })
}

/// Coerces a raw value to an exact decimal.
pub fn decimal(field: &'static str, raw: &RawValue) -> Result<Decimal, IngestError> {
    match classify(raw) {
        RawKind::Number(text) => parse_decimal(text)
            .ok_or_else(|| IngestError::coercion(field, format!("{text} is not representable"))),
        RawKind::String => {
            let text = raw_string(field, raw)?;
            parse_decimal(text.trim()).ok_or_else(|| {
                IngestError::coercion(field, format!("invalid decimal literal: {text:?}"))
            })
        },
        kind => {
            Err(IngestError::coercion(field, format!("expected a number, found {}", kind.name())))
        },
    }
}
