use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{CacheError, CacheResult};

/// Settings for one distributed cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries held locally
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Namespace prefix for the invalidation topic
    #[serde(default)]
    pub scope: String,

    /// Seconds between expired-entry sweeps (0 disables the sweeper)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// TTL applied by callers that do not pick one themselves
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
}

fn default_capacity() -> usize {
    10000
}

fn default_sweep_interval_secs() -> u64 {
    4 * 60 * 60
}

fn default_ttl_secs() -> u64 {
    3600 // 1 hour
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            scope: String::new(),
            sweep_interval_secs: default_sweep_interval_secs(),
            default_ttl_secs: default_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> CacheResult<()> {
        if self.capacity == 0 {
            return Err(CacheError::configuration("cache.capacity must be > 0"));
        }
        if self.default_ttl_secs == 0 {
            return Err(CacheError::configuration("cache.default_ttl_secs must be > 0"));
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }
}
