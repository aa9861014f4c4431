//! Session tokens.
//!
//! Tokens are HMAC-SHA256 signed and carry their own issue time, so the
//! server keeps no session table.
//!
//! ## Token Format
//!
//! - 8 bytes: issue time (Unix millis, big-endian)
//! - N bytes: owner identity (UTF-8)
//! - 32 bytes: HMAC-SHA256 signature over the preceding bytes
//!
//! The whole blob is hex-encoded for transport in the `token` cookie.

use crate::error::{ServerError, ServerResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

const STAMP_LEN: usize = 8;
const SIG_LEN: usize = 32;

/// Authentication configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// Secret key for HMAC.
    pub secret: Vec<u8>,
    /// Token expiration duration.
    pub token_expiry: Duration,
}

impl AuthConfig {
    /// Creates a new auth configuration with a 30 minute expiry.
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            token_expiry: Duration::from_secs(30 * 60),
        }
    }

    /// Sets the token expiration duration.
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"[REDACTED]")
            .field("token_expiry", &self.token_expiry)
            .finish()
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Issues and checks session tokens.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    config: AuthConfig,
}

impl TokenValidator {
    /// Creates a new token validator.
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Issues a token for `owner`, valid from now.
    pub fn create_token(&self, owner: &str) -> ServerResult<String> {
        self.create_token_at(owner, now_millis())
    }

    /// Issues a token for `owner` stamped with `issued_at` (Unix millis).
    pub fn create_token_at(&self, owner: &str, issued_at: u64) -> ServerResult<String> {
        let mut data = Vec::with_capacity(STAMP_LEN + owner.len() + SIG_LEN);
        data.extend_from_slice(&issued_at.to_be_bytes());
        data.extend_from_slice(owner.as_bytes());

        let signature = self.mac()?.chain_update(&data).finalize().into_bytes();
        data.extend_from_slice(&signature);
        Ok(hex::encode(data))
    }

    /// Checks a token and returns the owner it was issued to.
    pub fn validate_token(&self, token: &str) -> ServerResult<String> {
        self.validate_token_at(token, now_millis())
    }

    /// Checks a token as of `now` (Unix millis).
    ///
    /// # Errors
    ///
    /// `NotAuthorized` if the token is malformed, the signature doesn't
    /// verify, or the token is older than the configured expiry.
    pub fn validate_token_at(&self, token: &str, now: u64) -> ServerResult<String> {
        let raw = hex::decode(token)
            .map_err(|_| ServerError::NotAuthorized("malformed token".into()))?;
        if raw.len() < STAMP_LEN + SIG_LEN {
            return Err(ServerError::NotAuthorized("invalid token length".into()));
        }

        let (data, signature) = raw.split_at(raw.len() - SIG_LEN);
        self.mac()?
            .chain_update(data)
            .verify_slice(signature)
            .map_err(|_| ServerError::NotAuthorized("invalid signature".into()))?;

        let (stamp, owner) = data.split_at(STAMP_LEN);
        let mut stamp_bytes = [0u8; STAMP_LEN];
        stamp_bytes.copy_from_slice(stamp);
        let issued_at = u64::from_be_bytes(stamp_bytes);

        let expiry_millis = self.config.token_expiry.as_millis() as u64;
        if now > issued_at.saturating_add(expiry_millis) {
            return Err(ServerError::NotAuthorized("token expired".into()));
        }

        String::from_utf8(owner.to_vec())
            .map_err(|_| ServerError::NotAuthorized("malformed token".into()))
    }

    fn mac(&self) -> ServerResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.config.secret)
            .map_err(|e| ServerError::Internal(format!("hmac key: {e}")))
    }
}
