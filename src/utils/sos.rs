//! Signal-of-Stop: cooperative cancellation primitive.
//!
//! A clonable, async-aware token: cancelling any clone notifies every
//! waiter. Used to tie Ctrl+C, the UI loop, and background pollers to a
//! single shutdown signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct SignalOfStop {
    internal: Arc<SharedState>,
}

#[derive(Debug, Default)]
struct SharedState {
    closing: AtomicBool,
    notify: Notify,
}

impl SignalOfStop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to all waiters.
    pub fn cancel(&self) {
        self.internal.closing.store(true, Ordering::Release);
        self.internal.notify.notify_waiters();
    }

    pub fn cancelled(&self) -> bool {
        self.internal.closing.load(Ordering::Acquire)
    }

    /// Wait for cancellation. Returns immediately if already cancelled.
    pub async fn wait(&self) {
        let notified = self.internal.notify.notified();
        tokio::pin!(notified);
        // Register before re-checking the flag so a concurrent cancel()
        // cannot slip between the check and the await.
        notified.as_mut().enable();
        if self.cancelled() {
            return;
        }
        notified.await;
    }
}

impl Clone for SignalOfStop {
    fn clone(&self) -> Self {
        Self {
            internal: Arc::clone(&self.internal),
        }
    }
}
