//! Storage-side error types
//!
//! Errors raised while loading samples for the in-memory scan.

use thiserror::Error;

/// Errors that can occur while preparing a scan
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV decoding failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A row could not be turned into a sample
    #[error("Invalid sample at line {line}: {reason}")]
    InvalidSample { line: u64, reason: String },

    /// Identifier table persistence failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
