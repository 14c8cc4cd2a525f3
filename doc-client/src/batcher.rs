//! Debounce timer for patch batching.
//!
//! The timer is an explicit, cancellable handle owned by the client
//! rather than a closure-captured variable: every local edit restarts
//! it, closing the session cancels it, and only an undisturbed expiry
//! runs the flush.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A restartable one-shot timer driving debounced flushes.
#[derive(Debug, Default)]
pub struct DebounceTimer {
    handle: Option<JoinHandle<()>>,
}

impl DebounceTimer {
    /// Create an unarmed timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer, cancelling any previous arming.
    ///
    /// `on_expiry` runs only if the window elapses without another
    /// restart or a cancel.
    pub fn restart<F>(&mut self, window: Duration, on_expiry: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            on_expiry.await;
        }));
    }

    /// Cancel the pending expiry, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Whether an expiry is currently pending.
    pub fn is_armed(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn counter_expiry(counter: &Arc<AtomicU32>) -> impl Future<Output = ()> + Send + 'static {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_window() {
        let fired = Arc::new(AtomicU32::new(0));
        let mut timer = DebounceTimer::new();

        timer.restart(Duration::from_millis(300), counter_expiry(&fired));
        assert!(timer.is_armed());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_supersedes_previous_arming() {
        let fired = Arc::new(AtomicU32::new(0));
        let mut timer = DebounceTimer::new();

        timer.restart(Duration::from_millis(300), counter_expiry(&fired));
        tokio::time::sleep(Duration::from_millis(200)).await;
        timer.restart(Duration::from_millis(300), counter_expiry(&fired));

        // The first arming would have fired by now; it was superseded.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_expiry() {
        let fired = Arc::new(AtomicU32::new(0));
        let mut timer = DebounceTimer::new();

        timer.restart(Duration::from_millis(300), counter_expiry(&fired));
        timer.cancel();
        assert!(!timer.is_armed());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
