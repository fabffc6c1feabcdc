//! Manager configuration.

use std::time::Duration;

/// Configuration applied when building a [`crate::Manager`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// TTL for cache writes. `None` keeps the cache's own TTL;
    /// `Some(Duration::ZERO)` means entries never expire.
    pub cache_ttl: Option<Duration>,

    /// Whether `commit` logs every staged change after a failed batch.
    pub log_failed_batches: bool,
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the TTL for cache writes.
    #[must_use]
    pub const fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Sets whether failed batches are logged change by change.
    #[must_use]
    pub const fn log_failed_batches(mut self, value: bool) -> Self {
        self.log_failed_batches = value;
        self
    }
}
