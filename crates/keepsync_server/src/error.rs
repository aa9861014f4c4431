//! Error types for the sync server.

use keepsync_protocol::{status, ProtocolError};
use keepsync_store::StoreError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Lifecycle errors of the merge pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The pipeline has not been started, or has already shut down.
    #[error("merge pipeline is not running")]
    NotRunning,

    /// The pipeline was stopped and cannot be started again.
    #[error("merge pipeline already stopped")]
    AlreadyStopped,
}

/// Errors that can occur in the sync server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Wrong credentials, or a missing, forged or expired token.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// The identity is already registered.
    #[error("user {0:?} already exists")]
    UserExists(String),

    /// No such endpoint.
    #[error("no route for {0}")]
    NotFound(String),

    /// Store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Merge pipeline failure.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ProtocolError> for ServerError {
    fn from(e: ProtocolError) -> Self {
        ServerError::InvalidRequest(e.to_string())
    }
}

impl ServerError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) => status::BAD_REQUEST,
            ServerError::NotAuthorized(_) => status::UNAUTHORIZED,
            ServerError::UserExists(_) => status::CONFLICT,
            ServerError::NotFound(_) => status::NOT_FOUND,
            ServerError::Pipeline(_) => status::SERVICE_UNAVAILABLE,
            ServerError::Store(StoreError::InvalidRecord(_)) => status::BAD_REQUEST,
            ServerError::Store(_) | ServerError::Internal(_) => status::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}
