//! SQL for every table. Functions take a `&Connection` so callers choose
//! the writer or a pooled reader.

pub mod codemods;
pub mod decisions;
pub mod pairs;
pub mod patterns;
pub mod sync;

use chrono::{DateTime, Utc};

use fixloop_core::errors::StorageError;

/// Instants are stored as microseconds since the Unix epoch.
pub(crate) fn to_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

pub(crate) fn from_micros(micros: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| StorageError::Serialization {
        message: format!("timestamp {micros} out of range"),
    })
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|e| StorageError::Serialization {
        message: e.to_string(),
    })
}

pub(crate) fn from_json<T: serde::de::DeserializeOwned>(json: &str) -> Result<T, StorageError> {
    serde_json::from_str(json).map_err(|e| StorageError::Serialization {
        message: e.to_string(),
    })
}
