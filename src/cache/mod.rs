//! Vitrine cache.
//!
//! [`KeyedCache`] maps a resource address to a decoded value and guarantees at
//! most one population per key in flight. It is constructed explicitly and
//! shared by handle (`Arc`) with every consumer that resolves the same
//! resources, typically list rows and the detail view.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! # 0 keeps every image for the lifetime of the process.
//! image_capacity = 256
//! ```

mod config;
mod keyed;

pub use config::CacheConfig;
pub use keyed::{CacheError, CacheResolved, KeyedCache, RetentionPolicy};
pub(crate) use keyed::{
    METRIC_CACHE_COALESCED, METRIC_CACHE_EVICT, METRIC_CACHE_HIT, METRIC_CACHE_MISS,
    METRIC_CACHE_POPULATE_FAILED,
};
