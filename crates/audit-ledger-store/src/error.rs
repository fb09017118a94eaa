//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
///
/// A lost compare-and-append race is not an error; see
/// [`AppendResult::Conflict`](crate::AppendResult::Conflict).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Entry serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The entry handed to `compare_and_append` does not extend the expected head.
    #[error("entry for {record_id} does not extend the expected head: {reason}")]
    InvalidEntry { record_id: String, reason: String },

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("store lock poisoned: {0}")]
    Poisoned(String),

    /// A blocking task could not be joined.
    #[error("background task failed: {0}")]
    Task(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
