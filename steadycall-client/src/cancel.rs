//! Cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// A cloneable cancellation flag shared between a caller and its calls.
///
/// Cancelling is sticky: once [`cancel`](Self::cancel) has been called every
/// clone reports [`is_canceled`](Self::is_canceled) and every pending or
/// future [`canceled`](Self::canceled) wait completes.
///
/// # Example
///
/// ```
/// use steadycall_client::{CallOptions, CancellationSignal};
///
/// let signal = CancellationSignal::new();
/// let options = CallOptions::new().cancellation(signal.clone());
///
/// // From any task:
/// signal.cancel();
/// assert!(signal.is_canceled());
/// # drop(options);
/// ```
#[derive(Clone, Debug, Default)]
pub struct CancellationSignal {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    canceled: AtomicBool,
    notify: Notify,
}

impl CancellationSignal {
    /// Create a signal that is not canceled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every call observing this signal.
    pub fn cancel(&self) {
        if !self.inner.canceled.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    /// Returns whether [`cancel`](Self::cancel) has been called.
    pub fn is_canceled(&self) -> bool {
        self.inner.canceled.load(Ordering::SeqCst)
    }

    /// Wait until the signal is canceled.
    ///
    /// Returns immediately if it already is.
    pub async fn canceled(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent cancel is not missed.
        notified.as_mut().enable();
        if self.is_canceled() {
            return;
        }
        notified.await;
    }
}
