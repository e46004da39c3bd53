//! In-flight call bookkeeping.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use fetchbox_core::CancelSource;
use tracing::trace;

/// Cancels one call. Returned by every trigger.
#[derive(Debug, Clone, Default)]
pub struct Canceller {
    source: Option<CancelSource>,
}

impl Canceller {
    pub(crate) fn new(source: CancelSource) -> Self {
        Self {
            source: Some(source),
        }
    }

    /// A canceller that does nothing.
    pub fn noop() -> Self {
        Self::default()
    }

    /// Cancels the call. Repeated calls keep the first message.
    pub fn cancel(&self, message: Option<&str>) {
        if let Some(source) = &self.source {
            source.cancel(message);
        }
    }

    /// Returns `true` when this canceller controls no call.
    pub fn is_noop(&self) -> bool {
        self.source.is_none()
    }
}

/// Cancel sources of the calls currently in flight for one requester.
#[derive(Debug, Default)]
pub(crate) struct PendingSet {
    next_id: AtomicU64,
    calls: DashMap<u64, CancelSource>,
}

impl PendingSet {
    pub(crate) fn insert(&self, source: CancelSource) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.calls.insert(id, source);
        id
    }

    pub(crate) fn remove(&self, id: u64) {
        self.calls.remove(&id);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.calls.len()
    }

    /// Cancels and forgets every pending call.
    pub(crate) fn cancel_all(&self, message: Option<&str>) {
        let mut cancelled = 0usize;
        self.calls.retain(|_, source| {
            source.cancel(message);
            cancelled += 1;
            false
        });
        if cancelled > 0 {
            trace!(cancelled, reason = message, "pending calls cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_all_empties_the_set() {
        let pending = PendingSet::default();
        let a = CancelSource::new();
        let b = CancelSource::new();
        pending.insert(a.clone());
        let id = pending.insert(b.clone());
        assert_eq!(pending.len(), 2);

        pending.remove(id);
        pending.cancel_all(Some("clear"));

        assert!(pending.is_empty());
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
        assert_eq!(a.token().reason(), Some("clear"));
    }

    #[test]
    fn noop_canceller() {
        let canceller = Canceller::noop();
        assert!(canceller.is_noop());
        canceller.cancel(Some("ignored"));
    }
}
