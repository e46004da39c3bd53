//! The cache trait and the enabled/disabled slot.

use std::fmt;
use std::sync::Arc;

use fetchbox_core::CacheKey;
use serde_json::Value;

/// A key/value store for successful payloads.
///
/// Implementations must be safe to share between resources and tasks.
/// Operations are synchronous and infallible: a backend that cannot store a
/// value simply behaves as a miss on the next `get`.
pub trait Cache: Send + Sync {
    /// Returns the stored value, or `None` on a miss.
    fn get(&self, key: &CacheKey) -> Option<Value>;

    /// Stores `value`, replacing any previous entry.
    fn set(&self, key: CacheKey, value: Value);

    /// Removes the entry for `key`.
    fn delete(&self, key: &CacheKey);

    /// Removes every entry.
    fn clear(&self);
}

impl<C> Cache for Arc<C>
where
    C: Cache + ?Sized,
{
    fn get(&self, key: &CacheKey) -> Option<Value> {
        (**self).get(key)
    }

    fn set(&self, key: CacheKey, value: Value) {
        (**self).set(key, value)
    }

    fn delete(&self, key: &CacheKey) {
        (**self).delete(key)
    }

    fn clear(&self) {
        (**self).clear()
    }
}

impl<C> Cache for Box<C>
where
    C: Cache + ?Sized,
{
    fn get(&self, key: &CacheKey) -> Option<Value> {
        (**self).get(key)
    }

    fn set(&self, key: CacheKey, value: Value) {
        (**self).set(key, value)
    }

    fn delete(&self, key: &CacheKey) {
        (**self).delete(key)
    }

    fn clear(&self) {
        (**self).clear()
    }
}

/// A cache that may be switched off.
#[derive(Clone)]
pub enum CacheSlot {
    /// Reads and writes go to this cache.
    Enabled(Arc<dyn Cache>),
    /// Caching is off; no cache method is ever called.
    Disabled,
}

impl CacheSlot {
    /// Wraps `cache` in an enabled slot.
    pub fn enabled<C>(cache: C) -> Self
    where
        C: Cache + 'static,
    {
        CacheSlot::Enabled(Arc::new(cache))
    }

    /// Returns `true` for [`CacheSlot::Enabled`].
    pub fn is_enabled(&self) -> bool {
        matches!(self, CacheSlot::Enabled(_))
    }

    /// The cache, when enabled.
    pub fn cache(&self) -> Option<&Arc<dyn Cache>> {
        match self {
            CacheSlot::Enabled(cache) => Some(cache),
            CacheSlot::Disabled => None,
        }
    }
}

impl From<Arc<dyn Cache>> for CacheSlot {
    fn from(cache: Arc<dyn Cache>) -> Self {
        CacheSlot::Enabled(cache)
    }
}

impl fmt::Debug for CacheSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheSlot::Enabled(_) => f.write_str("Enabled(..)"),
            CacheSlot::Disabled => f.write_str("Disabled"),
        }
    }
}
