//! Storage Layer
//!
//! In-memory alert repository keyed by composite alert identity, persisted
//! as a JSON snapshot. Implements the status-write capability used by
//! the auto-close policy.

mod repository;
mod snapshot;

pub use repository::Repository;

use alerting::{AlertKey, StatusWriteError};
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Lock error: {0}")]
    Lock(String),
    #[error("Alert {0} not found")]
    NotFound(AlertKey),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Invalid snapshot: {0}")]
    Validation(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

impl From<StorageError> for StatusWriteError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => StatusWriteError::NotFound(key),
            other => StatusWriteError::Storage(other.to_string()),
        }
    }
}
