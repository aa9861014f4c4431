//! Inactivity-gated crypto session.

use crate::cipher;
use crate::error::{CryptoError, CryptoResult};
use crate::key::SecretKey;
use std::time::{Duration, Instant};

/// Inactivity window after which a session refuses to seal or open secrets.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// A derived key plus the time it was last used successfully.
///
/// Every successful [`encrypt`](Self::encrypt) or [`decrypt`](Self::decrypt)
/// resets the idle timer. Once the session has been idle for longer than its
/// timeout every operation fails with [`CryptoError::SessionExpired`] and the
/// caller has to derive a new session from the user's credentials.
///
/// The `*_at` variants take the current instant explicitly; the plain variants
/// use `Instant::now()`.
pub struct CryptoSession {
    key: SecretKey,
    last_activity: Instant,
    timeout: Duration,
}

impl CryptoSession {
    /// Derives a session from credentials with the default timeout.
    #[must_use]
    pub fn derive(identity: &str, secret: &str) -> Self {
        Self::new(SecretKey::derive(identity, secret), DEFAULT_SESSION_TIMEOUT)
    }

    /// Wraps an existing key; the session counts as freshly active.
    #[must_use]
    pub fn new(key: SecretKey, timeout: Duration) -> Self {
        Self::new_at(key, timeout, Instant::now())
    }

    /// Wraps an existing key, marking it active at `now`.
    #[must_use]
    pub fn new_at(key: SecretKey, timeout: Duration, now: Instant) -> Self {
        Self {
            key,
            last_activity: now,
            timeout,
        }
    }

    /// Returns the configured inactivity window.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the instant of the last successful operation.
    #[must_use]
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Returns true if an operation at `now` would be refused.
    #[must_use]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.idle_at(now) > self.timeout
    }

    /// Returns true if the session has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    fn idle_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    fn check_at(&self, now: Instant) -> CryptoResult<()> {
        let idle = self.idle_at(now);
        if idle > self.timeout {
            return Err(CryptoError::SessionExpired {
                idle,
                timeout: self.timeout,
            });
        }
        Ok(())
    }

    /// Seals `plaintext`, failing if the session has expired.
    pub fn encrypt(&mut self, plaintext: &str) -> CryptoResult<String> {
        self.encrypt_at(plaintext, Instant::now())
    }

    /// Seals `plaintext` as of `now`.
    pub fn encrypt_at(&mut self, plaintext: &str, now: Instant) -> CryptoResult<String> {
        self.check_at(now)?;
        let sealed = cipher::seal(&self.key, plaintext.as_bytes())?;
        self.last_activity = now;
        Ok(sealed)
    }

    /// Opens a sealed payload, failing if the session has expired.
    pub fn decrypt(&mut self, sealed: &str) -> CryptoResult<String> {
        self.decrypt_at(sealed, Instant::now())
    }

    /// Opens a sealed payload as of `now`.
    ///
    /// A failed open does not count as activity.
    pub fn decrypt_at(&mut self, sealed: &str, now: Instant) -> CryptoResult<String> {
        self.check_at(now)?;
        let raw = cipher::open(&self.key, sealed)?;
        let text = String::from_utf8(raw)
            .map_err(|_| CryptoError::MalformedInput("plaintext is not UTF-8".into()))?;
        self.last_activity = now;
        Ok(text)
    }
}

impl std::fmt::Debug for CryptoSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoSession")
            .field("key", &self.key)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
