use std::future::Future;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::trace;

/// Re-armable one-shot timer.
///
/// Each `schedule` call replaces (aborts) the previously pending callback, so
/// a burst of triggers collapses into a single callback `delay` after the
/// last one. Used for viewport-settle debouncing and rotation quiescence.
///
/// Callbacks must not re-arm the same timer: that would abort the task that
/// is currently running the callback.
#[derive(Debug)]
pub struct Debounce {
    label: &'static str,
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debounce {
    pub fn new(label: &'static str, delay: Duration) -> Self {
        Self {
            label,
            delay,
            pending: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm (or re-arm) the timer. Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, callback: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback.await;
        });
        if let Some(prev) = self.pending.lock().replace(handle) {
            prev.abort();
        }
        trace!(timer = self.label, delay_ms = delay.as_millis() as u64, "armed");
    }

    /// Disarm the timer. Returns `true` if a callback was still pending.
    pub fn cancel(&self) -> bool {
        match self.pending.lock().take() {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                was_pending
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Debounce {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.get_mut().take() {
            handle.abort();
        }
    }
}
