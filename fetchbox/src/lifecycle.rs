//! The "still alive" flag shared by a requester and its resource.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared "still mounted" flag.
///
/// Starts active and can only ever be switched off. Clones observe the same
/// flag.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    active: Arc<AtomicBool>,
}

impl Lifecycle {
    /// Creates an active lifecycle.
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Returns `false` once [`dispose`](Self::dispose) has been called.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Marks the lifecycle as finished.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn dispose(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
