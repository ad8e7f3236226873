//! Property-based tests for payload decoding invariants.
//!
//! Checks that well-formed envelopes always decode to exactly the values
//! that were sent, whichever JSON encoding the device chose for each
//! scalar, and that rejected payloads are rejected for the right reason.

#![allow(clippy::unwrap_used)]

use flowbridge_core::{decode_reading, IngestError, Reading};
use proptest::{prelude::*, test_runner::Config as ProptestConfig};
use rust_decimal::Decimal;

/// Deterministic property test configuration for CI stability.
fn proptest_config() -> ProptestConfig {
    ProptestConfig {
        cases: 200,
        failure_persistence: None,
        source_file: None,
        ..ProptestConfig::default()
    }
}

fn device_id_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_-]{1,32}").unwrap()
}

fn gallons_strategy() -> impl Strategy<Value = Decimal> {
    (0_i64..10_000_000_000, 0_u32..=6).prop_map(|(mantissa, scale)| Decimal::new(mantissa, scale))
}

/// Wraps raw inner JSON text in the platform envelope.
fn envelope(inner: &str) -> String {
    serde_json::json!({ "data": inner }).to_string()
}

fn inner_json(
    device_id: &str,
    timestamp: &str,
    gallons_used: &str,
    signal_strength: &str,
) -> String {
    format!(
        r#"{{"device_id":{},"timestamp":{timestamp},"gallons_used":{gallons_used},"signal_strength":{signal_strength}}}"#,
        serde_json::to_string(device_id).unwrap()
    )
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn numeric_fields_decode_exactly(
        device_id in device_id_strategy(),
        timestamp in any::<i64>(),
        gallons in gallons_strategy(),
        signal in any::<i32>(),
    ) {
        let inner = inner_json(&device_id, &timestamp.to_string(), &gallons.to_string(), &signal.to_string());

        let reading = decode_reading(Some(&envelope(&inner))).unwrap();

        prop_assert_eq!(reading.clone(), Reading::new(device_id.as_str(), timestamp, gallons, signal));
        prop_assert_eq!(reading.gallons_used().to_string(), gallons.to_string());
    }

    #[test]
    fn string_encoded_fields_decode_like_numbers(
        device_id in device_id_strategy(),
        timestamp in any::<i64>(),
        gallons in gallons_strategy(),
        signal in any::<i32>(),
    ) {
        let quoted = |s: String| format!("\"{s}\"");
        let inner = inner_json(
            &device_id,
            &quoted(timestamp.to_string()),
            &quoted(gallons.to_string()),
            &quoted(signal.to_string()),
        );

        let reading = decode_reading(Some(&envelope(&inner))).unwrap();

        prop_assert_eq!(reading, Reading::new(device_id.as_str(), timestamp, gallons, signal));
    }

    #[test]
    fn signal_strength_outside_i32_is_rejected(
        signal in prop_oneof![i64::MIN..i64::from(i32::MIN), (i64::from(i32::MAX) + 1)..i64::MAX],
    ) {
        let inner = inner_json("pool-1", "1700000000", "1.0", &signal.to_string());

        let err = decode_reading(Some(&envelope(&inner))).unwrap_err();

        let is_signal_coercion =
            matches!(err, IngestError::TypeCoercion { field: "signal_strength", .. });
        prop_assert!(is_signal_coercion);
    }

    #[test]
    fn arbitrary_bodies_never_panic(body in ".{0,256}") {
        let _ = decode_reading(Some(&body));
    }
}
