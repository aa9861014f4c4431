//! Error types for the client sync engine.

use keepsync_crypto::CryptoError;
use keepsync_protocol::ProtocolError;
use keepsync_store::StoreError;
use thiserror::Error;

/// Result type for client operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur on the client side.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The crypto session timed out or the server token expired.
    ///
    /// Terminal for the session; the user has to log in again.
    #[error("session expired")]
    SessionExpired,

    /// The remote could not be reached.
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// Identity or password was rejected.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The caller supplied an unusable value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An account or record with that name already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Local persistence failed.
    #[error("storage error: {0}")]
    Storage(StoreError),

    /// The remote sent something undecodable or unexpected.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Sealing or opening a secret failed for a reason other than expiry.
    #[error("crypto error: {0}")]
    Crypto(CryptoError),
}

impl SyncError {
    /// Returns true if the operation may succeed later without user action.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Unavailable(_) => true,
            SyncError::Storage(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Returns true if the session cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::SessionExpired)
    }
}

impl From<CryptoError> for SyncError {
    fn from(e: CryptoError) -> Self {
        if e.is_session_expired() {
            SyncError::SessionExpired
        } else {
            SyncError::Crypto(e)
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AlreadyExists { id, .. } => SyncError::AlreadyExists(id),
            StoreError::InvalidRecord(msg) => SyncError::InvalidArgument(msg),
            other => SyncError::Storage(other),
        }
    }
}

impl From<ProtocolError> for SyncError {
    fn from(e: ProtocolError) -> Self {
        SyncError::Protocol(e.to_string())
    }
}
