//! Configuration for the client sync engine.

use keepsync_crypto::DEFAULT_SESSION_TIMEOUT;
use std::time::Duration;

/// Shortest background sync period; shorter values are raised to it.
pub const MIN_SYNC_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration for the client and its background sync loop.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Period of the download-then-upload cycle.
    pub sync_interval: Duration,
    /// Wait between the upload and the read-back download after a local entry.
    pub readback_delay: Duration,
    /// Fixed wait before checking an offline login.
    pub offline_login_delay: Duration,
    /// Inactivity window of the crypto session.
    pub session_timeout: Duration,
    /// Lifetime of a server token, counted from login.
    pub token_expiry: Duration,
}

impl SyncConfig {
    /// Creates a configuration with default timings.
    pub fn new() -> Self {
        Self {
            sync_interval: Duration::from_secs(60),
            readback_delay: Duration::from_secs(10),
            offline_login_delay: Duration::from_millis(500),
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            token_expiry: Duration::from_secs(30 * 60),
        }
    }

    /// Sets the background sync period.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval.max(MIN_SYNC_INTERVAL);
        self
    }

    /// Sets the read-back delay after a local entry.
    pub fn with_readback_delay(mut self, delay: Duration) -> Self {
        self.readback_delay = delay;
        self
    }

    /// Sets the offline login delay.
    pub fn with_offline_login_delay(mut self, delay: Duration) -> Self {
        self.offline_login_delay = delay;
        self
    }

    /// Sets the crypto session inactivity window.
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Sets the token lifetime the client assumes.
    pub fn with_token_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.sync_interval, Duration::from_secs(60));
        assert_eq!(config.readback_delay, Duration::from_secs(10));
        assert_eq!(config.offline_login_delay, Duration::from_millis(500));
        assert_eq!(config.session_timeout, Duration::from_secs(300));
        assert_eq!(config.token_expiry, Duration::from_secs(1800));
    }

    #[test]
    fn builder() {
        let config = SyncConfig::new()
            .with_sync_interval(Duration::from_millis(50))
            .with_readback_delay(Duration::ZERO)
            .with_token_expiry(Duration::from_secs(1));
        assert_eq!(config.sync_interval, Duration::from_millis(50));
        assert_eq!(config.readback_delay, Duration::ZERO);
        assert_eq!(config.token_expiry, Duration::from_secs(1));
    }

    #[test]
    fn zero_sync_interval_is_clamped() {
        let config = SyncConfig::new().with_sync_interval(Duration::ZERO);
        assert_eq!(config.sync_interval, MIN_SYNC_INTERVAL);
    }
}
