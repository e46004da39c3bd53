//! Unbounded in-memory cache.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use fetchbox_core::CacheKey;
use serde_json::Value;

use crate::Cache;

/// A concurrent map with no expiry and no eviction.
///
/// Entries live until deleted or cleared.
#[derive(Debug, Default)]
pub struct MapCache {
    entries: DashMap<CacheKey, Value>,
}

impl MapCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Cache for MapCache {
    fn get(&self, key: &CacheKey) -> Option<Value> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: CacheKey, value: Value) {
        self.entries.insert(key, value);
    }

    fn delete(&self, key: &CacheKey) {
        self.entries.remove(key);
    }

    fn clear(&self) {
        self.entries.clear();
    }
}

static GLOBAL: OnceLock<Arc<MapCache>> = OnceLock::new();

/// The process-wide default cache.
///
/// Created on first use and shared by every context that does not configure
/// its own cache. It is never reset implicitly; call [`Cache::clear`] to
/// empty it.
pub fn global_cache() -> Arc<MapCache> {
    Arc::clone(GLOBAL.get_or_init(|| Arc::new(MapCache::new())))
}
