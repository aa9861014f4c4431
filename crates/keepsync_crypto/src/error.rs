//! Error types for the crypto session gate.

use std::time::Duration;
use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while sealing or opening secrets.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The session has been idle longer than its timeout.
    #[error("crypto session expired after {idle:?} of inactivity (timeout {timeout:?})")]
    SessionExpired {
        /// Time since the last successful operation.
        idle: Duration,
        /// Configured inactivity window.
        timeout: Duration,
    },

    /// The sealed payload could not be decoded.
    #[error("malformed ciphertext: {0}")]
    MalformedInput(String),

    /// The authentication tag did not verify (wrong key or tampered data).
    #[error("ciphertext failed authentication")]
    AuthenticationFailure,

    /// The cipher refused to seal the payload.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Raw key material had the wrong length.
    #[error("invalid key size: expected {expected}, got {actual}")]
    InvalidKeySize {
        /// Expected size in bytes.
        expected: usize,
        /// Actual size in bytes.
        actual: usize,
    },
}

impl CryptoError {
    /// Returns true if the error means the session must be re-established.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, CryptoError::SessionExpired { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_expiry_is_recognised() {
        let err = CryptoError::SessionExpired {
            idle: Duration::from_secs(301),
            timeout: Duration::from_secs(300),
        };
        assert!(err.is_session_expired());
        assert!(!CryptoError::AuthenticationFailure.is_session_expired());
    }

    #[test]
    fn error_display() {
        let err = CryptoError::InvalidKeySize {
            expected: 32,
            actual: 16,
        };
        assert!(err.to_string().contains("32"));
        assert!(err.to_string().contains("16"));
    }
}
