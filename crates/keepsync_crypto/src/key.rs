//! Symmetric key material.

use crate::error::{CryptoError, CryptoResult};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;

/// A 256-bit key used to seal a user's secrets.
///
/// The key is automatically zeroized when dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    bytes: [u8; KEY_SIZE],
}

impl SecretKey {
    /// Derives a key from an identity and its secret.
    ///
    /// The derivation is `SHA-256(identity ‖ secret)`. It carries no salt and
    /// no randomness: the same pair always produces the same key, which is
    /// what lets a user re-open secrets sealed on another device.
    #[must_use]
    pub fn derive(identity: &str, secret: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(identity.as_bytes());
        hasher.update(secret.as_bytes());
        Self {
            bytes: hasher.finalize().into(),
        }
    }

    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeySize {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }

        let mut key_bytes = [0u8; KEY_SIZE];
        key_bytes.copy_from_slice(bytes);
        Ok(Self { bytes: key_bytes })
    }

    /// Returns the key as a byte slice.
    ///
    /// # Security
    ///
    /// Don't log or serialize the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let a = SecretKey::derive("alice@example.com", "hunter2");
        let b = SecretKey::derive("alice@example.com", "hunter2");
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn derivation_depends_on_both_inputs() {
        let base = SecretKey::derive("alice@example.com", "hunter2");
        assert_ne!(base, SecretKey::derive("bob@example.com", "hunter2"));
        assert_ne!(base, SecretKey::derive("alice@example.com", "hunter3"));
    }

    #[test]
    fn derivation_matches_sha256_of_concatenation() {
        let key = SecretKey::derive("usr", "pass");
        let expected: [u8; KEY_SIZE] = Sha256::digest(b"usrpass").into();
        assert_eq!(key.as_bytes(), &expected);
    }

    #[test]
    fn key_wrong_size() {
        assert!(SecretKey::from_bytes(&[0u8; 16]).is_err());
        assert!(SecretKey::from_bytes(&[0u8; 64]).is_err());
        assert!(SecretKey::from_bytes(&[7u8; KEY_SIZE]).is_ok());
    }

    #[test]
    fn debug_redacts_bytes() {
        let key = SecretKey::derive("usr", "pass");
        let printed = format!("{key:?}");
        assert!(printed.contains("REDACTED"));
    }
}
