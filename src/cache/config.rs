//! Cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_TTL: Duration = Duration::from_secs(20);
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    /// How long a stored response is served before the handler runs again.
    pub ttl: Duration,
    /// Maximum stored responses; least recently used entries go first.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: DEFAULT_TTL,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ttl: Duration::from_secs(u64::from(settings.index_ttl_seconds.get())),
            capacity: settings.capacity.get() as usize,
        }
    }
}

impl CacheConfig {
    /// Capacity as `NonZeroUsize`, clamped to 1.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
