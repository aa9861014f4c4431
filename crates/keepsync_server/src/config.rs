//! Server configuration.

use rand::RngCore;
use std::time::Duration;

/// Shortest flush interval the pipeline accepts; shorter values are raised to it.
pub const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration for the merge batch pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Flush as soon as the buffer holds this many records.
    pub batch_size: usize,
    /// Flush a non-empty buffer this long after the last flush.
    pub flush_interval: Duration,
}

impl PipelineConfig {
    /// Creates a pipeline configuration.
    pub fn new(batch_size: usize, flush_interval: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            flush_interval: flush_interval.max(MIN_FLUSH_INTERVAL),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(1))
    }
}

/// Argon2id cost parameters for stored password hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl PasswordParams {
    /// Minimum-cost parameters for tests. Never use these in production.
    pub fn insecure_fast() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }
}

impl Default for PasswordParams {
    fn default() -> Self {
        // 19 MiB, 2 passes, 1 lane
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Configuration for the sync server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Merge pipeline settings.
    pub pipeline: PipelineConfig,
    /// HMAC key for session tokens.
    pub token_secret: Vec<u8>,
    /// How long an issued token stays valid.
    pub token_expiry: Duration,
    /// Password hashing cost.
    pub password: PasswordParams,
}

impl ServerConfig {
    /// Creates a configuration with the given token secret.
    pub fn new(token_secret: Vec<u8>) -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            token_secret,
            token_expiry: Duration::from_secs(30 * 60),
            password: PasswordParams::default(),
        }
    }

    /// Sets the pipeline batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.pipeline.batch_size = size.max(1);
        self
    }

    /// Sets the pipeline flush interval.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.pipeline.flush_interval = interval.max(MIN_FLUSH_INTERVAL);
        self
    }

    /// Sets the token expiry.
    pub fn with_token_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }

    /// Sets the password hashing cost.
    pub fn with_password_params(mut self, params: PasswordParams) -> Self {
        self.password = params;
        self
    }
}

impl Default for ServerConfig {
    /// Uses a random token secret, so tokens don't survive a restart.
    fn default() -> Self {
        let mut secret = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        Self::new(secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.pipeline.batch_size, 10);
        assert_eq!(config.pipeline.flush_interval, Duration::from_secs(1));
        assert_eq!(config.token_expiry, Duration::from_secs(1800));
        assert_eq!(config.token_secret.len(), 32);
    }

    #[test]
    fn default_secrets_differ() {
        assert_ne!(
            ServerConfig::default().token_secret,
            ServerConfig::default().token_secret
        );
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::new(vec![1, 2, 3])
            .with_batch_size(0)
            .with_flush_interval(Duration::from_millis(50))
            .with_token_expiry(Duration::from_secs(5))
            .with_password_params(PasswordParams::insecure_fast());

        // Zero is clamped to one
        assert_eq!(config.pipeline.batch_size, 1);
        assert_eq!(config.pipeline.flush_interval, Duration::from_millis(50));
        assert_eq!(config.token_expiry, Duration::from_secs(5));
        assert_eq!(config.password.memory_kib, 8);
    }

    #[test]
    fn zero_flush_interval_is_clamped() {
        let pipeline = PipelineConfig::new(10, Duration::ZERO);
        assert_eq!(pipeline.flush_interval, MIN_FLUSH_INTERVAL);

        let config = ServerConfig::new(vec![1]).with_flush_interval(Duration::ZERO);
        assert_eq!(config.pipeline.flush_interval, MIN_FLUSH_INTERVAL);
    }
}
