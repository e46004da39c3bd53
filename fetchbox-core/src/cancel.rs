//! Cooperative cancellation.
//!
//! A [`CancelSource`] is held by whoever may cancel a call; the matching
//! [`CancelToken`] is handed to the [`Transport`](crate::Transport), which
//! should stop work and fail with [`TransportFailure::cancelled`] once the
//! token fires. The first message passed to [`CancelSource::cancel`] is kept
//! and reported through the token.

use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

use crate::TransportFailure;

#[derive(Debug, Default)]
struct Shared {
    token: CancellationToken,
    reason: OnceLock<Option<String>>,
}

/// The cancelling side of a call.
#[derive(Debug, Clone, Default)]
pub struct CancelSource {
    shared: Arc<Shared>,
}

impl CancelSource {
    /// Creates a fresh, uncancelled source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a token observing this source.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Cancels the call. Later calls are no-ops and keep the first message.
    pub fn cancel(&self, message: Option<&str>) {
        let _ = self.shared.reason.set(message.map(str::to_string));
        self.shared.token.cancel();
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.shared.token.is_cancelled()
    }
}

/// The observing side of a call, passed to the transport.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    shared: Arc<Shared>,
}

impl CancelToken {
    /// A token that never fires.
    pub fn never() -> Self {
        Self::default()
    }

    /// Returns `true` once the source has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.shared.token.is_cancelled()
    }

    /// Completes when the source is cancelled.
    pub async fn cancelled(&self) {
        self.shared.token.cancelled().await
    }

    /// The message given to `cancel`, if any.
    pub fn reason(&self) -> Option<&str> {
        self.shared.reason.get().and_then(|reason| reason.as_deref())
    }

    /// The failure a transport should report for this cancellation.
    pub fn to_failure(&self) -> TransportFailure {
        TransportFailure::cancelled(self.reason().map(str::to_string))
    }
}
