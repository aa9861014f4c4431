//! Error types for record store operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The on-disk document could not be decoded.
    #[error("store corrupted: {0}")]
    Corrupted(String),

    /// A record with the same `(owner, id)` already exists.
    #[error("record {id:?} already exists for {owner:?}")]
    AlreadyExists {
        /// Owner identity.
        owner: String,
        /// Record identifier.
        id: String,
    },

    /// Another process holds the store's lock file.
    #[error("store is locked by another process: {0}")]
    Locked(PathBuf),

    /// The record failed validation.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl StoreError {
    /// Creates an invalid record error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        StoreError::InvalidRecord(msg.into())
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Io(_) | StoreError::Locked(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Corrupted(e.to_string())
    }
}
