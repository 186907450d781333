//! Cache configuration.
//!
//! Controls image cache retention via the `[cache]` section of `vitrine.toml`.

use std::num::NonZeroUsize;

use super::keyed::RetentionPolicy;

const DEFAULT_IMAGE_CAPACITY: usize = 0;

/// Resolved cache settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum decoded images kept in memory; `0` keeps every image.
    pub image_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            image_capacity: DEFAULT_IMAGE_CAPACITY,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            image_capacity: settings.image_capacity,
        }
    }
}

impl CacheConfig {
    /// Retention policy for the image cache.
    pub fn image_retention(&self) -> RetentionPolicy {
        match NonZeroUsize::new(self.image_capacity) {
            Some(capacity) => RetentionPolicy::Lru(capacity),
            None => RetentionPolicy::Unbounded,
        }
    }
}
