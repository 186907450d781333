//! Keyed cache with coalesced asynchronous population.
//!
//! Each key maps to a [`Slot`]: either a ready value or a pending population.
//! The claim step (look up, or install a pending slot) runs under the dashmap
//! shard lock for that key, so concurrent callers for one key agree on a
//! single leader while callers for other keys proceed independently.

use std::{fmt, future::Future, num::NonZeroUsize, sync::Mutex};

use dashmap::{DashMap, mapref::entry::Entry};
use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use crate::{application::error::FetchError, util::lock::mutex_lock};

const SOURCE: &str = "cache::keyed";
const RESOLVED_CHANNEL_CAPACITY: usize = 64;

pub(crate) const METRIC_CACHE_HIT: &str = "vitrine_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "vitrine_cache_miss_total";
pub(crate) const METRIC_CACHE_COALESCED: &str = "vitrine_cache_coalesced_total";
pub(crate) const METRIC_CACHE_EVICT: &str = "vitrine_cache_evict_total";
pub(crate) const METRIC_CACHE_POPULATE_FAILED: &str = "vitrine_cache_populate_failed_total";

/// How many ready entries the cache retains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    /// Keep every entry for the lifetime of the cache.
    #[default]
    Unbounded,
    /// Keep at most `capacity` ready entries, evicting the least recently used.
    /// Pending populations never count against the limit.
    Lru(NonZeroUsize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError<E> {
    /// The populate function failed; every coalesced caller sees the same error.
    #[error("{0}")]
    Populate(E),
    /// The caller running the population was dropped before it finished.
    #[error("population of `{key}` was abandoned before completing")]
    Abandoned { key: String },
}

/// Emitted once per successful population.
#[derive(Debug, Clone)]
pub struct CacheResolved<V> {
    pub key: String,
    pub value: V,
}

type Resolution<V, E> = Option<Result<V, E>>;

enum Slot<V, E> {
    Ready(V),
    Pending(watch::Receiver<Resolution<V, E>>),
}

impl<V, E> Slot<V, E> {
    fn is_ready(&self) -> bool {
        matches!(self, Slot::Ready(_))
    }

    fn is_pending(&self) -> bool {
        matches!(self, Slot::Pending(_))
    }
}

enum Claim<V, E> {
    Ready(V),
    Wait(watch::Receiver<Resolution<V, E>>),
    Lead(watch::Sender<Resolution<V, E>>),
}

/// Thread-safe `String -> V` cache where at most one population per key is in
/// flight at any time.
pub struct KeyedCache<V, E = FetchError> {
    slots: DashMap<String, Slot<V, E>>,
    recency: Option<Mutex<LruCache<String, ()>>>,
    policy: RetentionPolicy,
    resolved: broadcast::Sender<CacheResolved<V>>,
}

impl<V, E> KeyedCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + fmt::Display + Send + Sync + 'static,
{
    pub fn new(policy: RetentionPolicy) -> Self {
        let recency = match policy {
            RetentionPolicy::Unbounded => None,
            RetentionPolicy::Lru(capacity) => Some(Mutex::new(LruCache::new(capacity))),
        };
        let (resolved, _) = broadcast::channel(RESOLVED_CHANNEL_CAPACITY);
        Self {
            slots: DashMap::new(),
            recency,
            policy,
            resolved,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(RetentionPolicy::Unbounded)
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Return the ready value for `key` without ever starting a population.
    pub fn get(&self, key: &str) -> Option<V> {
        let value = self.slots.get(key).and_then(|slot| match &*slot {
            Slot::Ready(value) => Some(value.clone()),
            Slot::Pending(_) => None,
        });

        if value.is_some() {
            self.touch(key);
            counter!(METRIC_CACHE_HIT).increment(1);
        } else {
            counter!(METRIC_CACHE_MISS).increment(1);
        }
        value
    }

    /// Return the cached value for `key`, running `populate` only if no value
    /// is cached and no other caller is already populating this key.
    ///
    /// Callers that find a population in flight wait for it and receive the
    /// same value or the same error. A failed population leaves no entry
    /// behind, so the next call starts afresh.
    pub async fn get_or_populate<F, Fut>(
        &self,
        key: &str,
        populate: F,
    ) -> Result<V, CacheError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let claim = match self.slots.entry(key.to_owned()) {
            Entry::Occupied(entry) => match entry.get() {
                Slot::Ready(value) => Claim::Ready(value.clone()),
                Slot::Pending(receiver) => Claim::Wait(receiver.clone()),
            },
            Entry::Vacant(entry) => {
                let (sender, receiver) = watch::channel(None);
                entry.insert(Slot::Pending(receiver));
                Claim::Lead(sender)
            }
        };

        match claim {
            Claim::Ready(value) => {
                self.touch(key);
                counter!(METRIC_CACHE_HIT).increment(1);
                Ok(value)
            }
            Claim::Wait(receiver) => {
                counter!(METRIC_CACHE_COALESCED).increment(1);
                debug!(key, "joining in-flight population");
                Self::wait(key, receiver).await
            }
            Claim::Lead(sender) => {
                counter!(METRIC_CACHE_MISS).increment(1);
                self.lead(key, sender, populate).await
            }
        }
    }

    /// Drop the ready entry for `key`. In-flight populations are left alone.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self
            .slots
            .remove_if(key, |_, slot| slot.is_ready())
            .is_some();
        if let Some(recency) = &self.recency {
            mutex_lock(recency, SOURCE, "invalidate").pop(key);
        }
        removed
    }

    /// Drop every ready entry. In-flight populations are left alone.
    pub fn clear(&self) {
        self.slots.retain(|_, slot| slot.is_pending());
        if let Some(recency) = &self.recency {
            mutex_lock(recency, SOURCE, "clear").clear();
        }
    }

    /// Number of ready entries.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| entry.value().is_ready())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of populations currently in flight.
    pub fn pending_len(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| entry.value().is_pending())
            .count()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheResolved<V>> {
        self.resolved.subscribe()
    }

    async fn wait(
        key: &str,
        mut receiver: watch::Receiver<Resolution<V, E>>,
    ) -> Result<V, CacheError<E>> {
        let resolution = match receiver.wait_for(Option::is_some).await {
            Ok(resolved) => (*resolved).clone(),
            Err(_) => None,
        };

        match resolution {
            Some(Ok(value)) => Ok(value),
            Some(Err(error)) => Err(CacheError::Populate(error)),
            None => Err(CacheError::Abandoned {
                key: key.to_owned(),
            }),
        }
    }

    async fn lead<F, Fut>(
        &self,
        key: &str,
        sender: watch::Sender<Resolution<V, E>>,
        populate: F,
    ) -> Result<V, CacheError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let mut guard = PendingGuard {
            slots: &self.slots,
            key,
            armed: true,
        };
        let outcome = populate().await;
        guard.armed = false;

        match outcome {
            Ok(value) => {
                self.slots
                    .insert(key.to_owned(), Slot::Ready(value.clone()));
                self.record(key);
                sender.send_replace(Some(Ok(value.clone())));
                let _ = self.resolved.send(CacheResolved {
                    key: key.to_owned(),
                    value: value.clone(),
                });
                debug!(key, "cache entry populated");
                Ok(value)
            }
            Err(error) => {
                self.slots.remove_if(key, |_, slot| slot.is_pending());
                sender.send_replace(Some(Err(error.clone())));
                counter!(METRIC_CACHE_POPULATE_FAILED).increment(1);
                warn!(key, error = %error, "cache population failed");
                Err(CacheError::Populate(error))
            }
        }
    }

    fn touch(&self, key: &str) {
        if let Some(recency) = &self.recency {
            mutex_lock(recency, SOURCE, "touch").promote(key);
        }
    }

    fn record(&self, key: &str) {
        let Some(recency) = &self.recency else {
            return;
        };
        let displaced = mutex_lock(recency, SOURCE, "record").push(key.to_owned(), ());

        if let Some((evicted, ())) = displaced
            && evicted != key
        {
            self.slots.remove_if(&evicted, |_, slot| slot.is_ready());
            counter!(METRIC_CACHE_EVICT).increment(1);
            debug!(key = %evicted, "evicted least recently used entry");
        }

        // An invalidate may have landed between the slot insert and the push.
        let still_ready = self.slots.get(key).is_some_and(|slot| slot.is_ready());
        if !still_ready {
            mutex_lock(recency, SOURCE, "record").pop(key);
        }
    }
}

impl<V, E> Default for KeyedCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + fmt::Display + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Removes the pending slot if the leading future is dropped mid-population.
struct PendingGuard<'a, V, E> {
    slots: &'a DashMap<String, Slot<V, E>>,
    key: &'a str,
    armed: bool,
}

impl<V, E> Drop for PendingGuard<'_, V, E> {
    fn drop(&mut self) {
        if self.armed {
            self.slots.remove_if(self.key, |_, slot| slot.is_pending());
            warn!(key = self.key, "cache population abandoned");
        }
    }
}
