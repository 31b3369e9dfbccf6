//! Cache configuration.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_INDEX_TTL_SECONDS: u64 = 20;

/// Cache configuration from `yatube.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the index page cache.
    pub enabled: bool,
    /// Seconds a cached index page stays valid.
    pub index_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            index_ttl_seconds: DEFAULT_INDEX_TTL_SECONDS,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.index_ttl_seconds)
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            index_ttl_seconds: settings.index_ttl_seconds,
        }
    }
}
