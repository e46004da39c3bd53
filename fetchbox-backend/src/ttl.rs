//! In-memory cache with per-entry expiry.
//!
//! Every [`set`](Cache::set) restarts the entry's clock: a background tokio
//! task sleeps for the TTL and then removes the entry, unless a newer `set`
//! or a `delete` has replaced it in the meantime. Reads do not extend the
//! lifetime.
//!
//! Expiry is also checked on read, so an entry is gone at exactly `T + ttl`
//! even if its timer task has not been polled yet.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry as Slot;
use fetchbox_core::CacheKey;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{trace, warn};

use crate::Cache;

/// Default entry lifetime: 30 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// A stored value together with the timer that removes it.
///
/// Value and timer are replaced in one map operation, so a key never ends
/// up with a timer of another generation.
#[derive(Debug)]
struct Entry {
    generation: u64,
    value: Value,
    expires_at: Instant,
    timer: Option<AbortHandle>,
}

impl Entry {
    fn abort_timer(&self) {
        if let Some(timer) = &self.timer {
            timer.abort();
        }
    }
}

#[derive(Debug)]
struct Inner {
    ttl: Duration,
    generation: AtomicU64,
    entries: DashMap<CacheKey, Entry>,
}

impl Inner {
    fn expire(&self, key: &CacheKey, generation: u64) {
        if let Some((_, entry)) = self
            .entries
            .remove_if(key, |_, entry| entry.generation == generation)
        {
            entry.abort_timer();
            trace!(key = %key, "cache entry expired");
        }
    }

    fn abort_all(&self) {
        for entry in self.entries.iter() {
            entry.abort_timer();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.abort_all();
    }
}

/// An unbounded cache whose entries expire a fixed time after their last
/// write.
///
/// Cloning is cheap and clones share storage.
///
/// Timers need a tokio runtime. Outside of one, entries still expire lazily
/// on read but are not removed proactively.
///
/// ```
/// use std::time::Duration;
/// use fetchbox_backend::TtlCache;
///
/// let cache = TtlCache::builder().ttl(Duration::from_secs(60)).build();
/// assert_eq!(cache.ttl(), Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct TtlCache {
    inner: Arc<Inner>,
}

impl TtlCache {
    /// Creates a cache with [`DEFAULT_TTL`].
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Creates a cache whose entries live for `ttl`.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                ttl,
                generation: AtomicU64::new(0),
                entries: DashMap::new(),
            }),
        }
    }

    /// Returns a builder.
    pub fn builder() -> TtlCacheBuilder {
        TtlCacheBuilder::default()
    }

    /// Entry lifetime.
    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Number of stored entries, including expired ones not yet removed.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// Returns `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    fn schedule(&self, key: CacheKey, generation: u64) -> Option<AbortHandle> {
        let Ok(runtime) = Handle::try_current() else {
            warn!(key = %key, "no tokio runtime, cache entry will only expire on read");
            return None;
        };

        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        let ttl = self.inner.ttl;
        let handle = runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(inner) = inner.upgrade() {
                inner.expire(&key, generation);
            }
        });
        Some(handle.abort_handle())
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache for TtlCache {
    fn get(&self, key: &CacheKey) -> Option<Value> {
        let now = Instant::now();
        let expired = {
            let entry = self.inner.entries.get(key)?;
            if entry.expires_at > now {
                return Some(entry.value.clone());
            }
            entry.generation
        };
        self.inner.expire(key, expired);
        None
    }

    fn set(&self, key: CacheKey, value: Value) {
        // The shard stays locked until the new entry and its timer are in.
        let slot = self.inner.entries.entry(key.clone());
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let entry = Entry {
            generation,
            value,
            expires_at: Instant::now() + self.inner.ttl,
            timer: self.schedule(key, generation),
        };
        match slot {
            Slot::Occupied(mut occupied) => occupied.insert(entry).abort_timer(),
            Slot::Vacant(vacant) => {
                vacant.insert(entry);
            }
        }
    }

    fn delete(&self, key: &CacheKey) {
        if let Some((_, entry)) = self.inner.entries.remove(key) {
            entry.abort_timer();
        }
    }

    fn clear(&self) {
        self.inner.abort_all();
        self.inner.entries.clear();
    }
}

/// Builder for [`TtlCache`].
#[derive(Debug, Clone)]
pub struct TtlCacheBuilder {
    ttl: Duration,
}

impl Default for TtlCacheBuilder {
    fn default() -> Self {
        Self { ttl: DEFAULT_TTL }
    }
}

impl TtlCacheBuilder {
    /// Sets the entry lifetime.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Builds the cache.
    pub fn build(self) -> TtlCache {
        TtlCache::with_ttl(self.ttl)
    }
}
