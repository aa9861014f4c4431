//! Stateless AES-256-GCM sealing of text payloads.
//!
//! These functions know nothing about sessions or inactivity; they are the
//! primitive that [`CryptoSession`](crate::CryptoSession) guards.

use crate::error::{CryptoError, CryptoResult};
use crate::key::SecretKey;
use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;

/// Size of the GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

fn cipher_for(key: &SecretKey) -> Aes256Gcm {
    // SecretKey is always exactly 32 bytes.
    Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()))
}

/// Seals `plaintext` under `key`.
///
/// The output is lowercase hex of `nonce (12 bytes) ‖ ciphertext ‖ tag (16 bytes)`.
/// A fresh nonce is drawn for every call, so sealing the same plaintext twice
/// produces different output.
pub fn seal(key: &SecretKey, plaintext: &[u8]) -> CryptoResult<String> {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher_for(key)
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::EncryptionFailed("aes-gcm refused payload".into()))?;

    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(hex::encode(out))
}

/// Opens a payload produced by [`seal`].
///
/// # Errors
///
/// - [`CryptoError::MalformedInput`] if the text is not hex or is shorter than
///   a nonce plus a tag
/// - [`CryptoError::AuthenticationFailure`] if the tag does not verify
pub fn open(key: &SecretKey, sealed: &str) -> CryptoResult<Vec<u8>> {
    let raw = hex::decode(sealed.trim())
        .map_err(|e| CryptoError::MalformedInput(format!("not hex: {e}")))?;

    if raw.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::MalformedInput(format!(
            "{} bytes is shorter than nonce plus tag ({})",
            raw.len(),
            NONCE_SIZE + TAG_SIZE
        )));
    }

    let (nonce_bytes, ciphertext) = raw.split_at(NONCE_SIZE);
    cipher_for(key)
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| CryptoError::AuthenticationFailure)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SecretKey {
        SecretKey::derive("alice@example.com", "hunter2")
    }

    #[test]
    fn seal_open_roundtrip() {
        let key = key();
        let sealed = seal(&key, b"card 4111 1111 1111 1111").unwrap();
        assert_eq!(open(&key, &sealed).unwrap(), b"card 4111 1111 1111 1111");
    }

    #[test]
    fn sealed_output_is_hex_with_overhead() {
        let sealed = seal(&key(), b"abc").unwrap();
        assert!(sealed.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(sealed.len(), 2 * (NONCE_SIZE + 3 + TAG_SIZE));
    }

    #[test]
    fn nonces_differ_between_calls() {
        let key = key();
        let a = seal(&key, b"same").unwrap();
        let b = seal(&key, b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_plaintext_roundtrips() {
        let key = key();
        let sealed = seal(&key, b"").unwrap();
        assert!(open(&key, &sealed).unwrap().is_empty());
    }

    #[test]
    fn open_with_wrong_key_fails_authentication() {
        let sealed = seal(&key(), b"secret").unwrap();
        let other = SecretKey::derive("bob@example.com", "hunter2");
        assert!(matches!(
            open(&other, &sealed),
            Err(CryptoError::AuthenticationFailure)
        ));
    }

    #[test]
    fn open_tampered_fails_authentication() {
        let key = key();
        let mut raw = hex::decode(seal(&key, b"secret").unwrap()).unwrap();
        raw[NONCE_SIZE] ^= 0xFF;
        assert!(matches!(
            open(&key, &hex::encode(raw)),
            Err(CryptoError::AuthenticationFailure)
        ));
    }

    #[test]
    fn open_non_hex_is_malformed() {
        assert!(matches!(
            open(&key(), "not-hex!"),
            Err(CryptoError::MalformedInput(_))
        ));
    }

    #[test]
    fn open_too_short_is_malformed() {
        // 12 bytes of nonce and nothing else
        let short = hex::encode([0u8; NONCE_SIZE]);
        assert!(matches!(
            open(&key(), &short),
            Err(CryptoError::MalformedInput(_))
        ));
    }
}
