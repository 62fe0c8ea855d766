//! Error types for the store subsystem.

use ananya_core::errors::AnanyaError;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// An entry with the same key already exists.
    #[error("already exists: {0}")]
    Duplicate(String),

    /// Requested entry was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation would violate a store invariant.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Backend could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Internal error (e.g. a failed blocking task).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for AnanyaError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(_) | StoreError::NotFound(_) | StoreError::InvalidOperation(_) => {
                AnanyaError::validation(err.to_string())
            }
            other => AnanyaError::store(other.to_string()),
        }
    }
}
