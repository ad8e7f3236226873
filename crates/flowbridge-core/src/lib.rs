//! Core domain model, payload decoding and storage for flowbridge.
//!
//! Provides the `Reading` record produced from a flow sensor webhook, the
//! two-layer envelope decoder that builds it, the error taxonomy for every
//! failure along the way, and the storage seam that persists readings.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod coerce;
pub mod envelope;
pub mod error;
pub mod models;
pub mod storage;

pub use envelope::decode_reading;
pub use error::{CoreError, IngestError, Result};
pub use models::{DeviceId, Reading, ReadingKey};
pub use storage::{ReadingStore, Storage};
