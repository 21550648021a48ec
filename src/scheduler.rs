//! # Deadline Scheduler
//!
//! One-shot timers that run a callback on the Tokio worker pool after a delay.
//! Sessions use it to detect stalled completion.
//!
//! Cancellation aborts the timer task and is best-effort: a callback whose
//! timer already elapsed may still run after [`DeadlineScheduler::cancel`]
//! returns. Callers must make the callback itself idempotent.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::trace;

/// Arms and cancels one-shot deadline callbacks
#[derive(Debug, Clone)]
pub struct DeadlineScheduler {
    runtime: Handle,
    armed: Arc<AtomicUsize>,
}

/// Opaque reference to one armed deadline
#[derive(Debug)]
pub struct DeadlineHandle {
    task: AbortHandle,
    settled: Arc<AtomicBool>,
}

impl DeadlineHandle {
    /// Whether the deadline fired or was cancelled
    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::Acquire)
    }
}

impl DeadlineScheduler {
    /// Create a scheduler that spawns its timers onto `runtime`
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            armed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Run `callback` once `delay` has elapsed, unless cancelled first
    pub fn schedule<F>(&self, delay: Duration, callback: F) -> DeadlineHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let settled = Arc::new(AtomicBool::new(false));
        let armed = Arc::clone(&self.armed);
        armed.fetch_add(1, Ordering::AcqRel);

        let task_settled = Arc::clone(&settled);
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if !task_settled.swap(true, Ordering::AcqRel) {
                armed.fetch_sub(1, Ordering::AcqRel);
            }
            callback();
        });

        trace!(delay_ms = delay.as_millis() as u64, "⏱️ Deadline armed");

        DeadlineHandle {
            task: task.abort_handle(),
            settled,
        }
    }

    /// Best-effort cancellation of a previously armed deadline
    pub fn cancel(&self, handle: DeadlineHandle) {
        handle.task.abort();
        if !handle.settled.swap(true, Ordering::AcqRel) {
            self.armed.fetch_sub(1, Ordering::AcqRel);
            trace!("⏱️ Deadline cancelled");
        }
    }

    /// Number of deadlines that have neither fired nor been cancelled
    pub fn armed_count(&self) -> usize {
        self.armed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_fires_after_delay() {
        let scheduler = DeadlineScheduler::new(Handle::current());
        let fired = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&fired);
        let handle = scheduler.schedule(Duration::from_secs(60), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(scheduler.armed_count(), 1);

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(handle.is_settled());
        assert_eq!(scheduler.armed_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_deadline_never_fires() {
        let scheduler = DeadlineScheduler::new(Handle::current());
        let fired = Arc::new(AtomicU32::new(0));

        let counter = Arc::clone(&fired);
        let handle = scheduler.schedule(Duration::from_secs(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        scheduler.cancel(handle);
        assert_eq!(scheduler.armed_count(), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_fire_keeps_count_consistent() {
        let scheduler = DeadlineScheduler::new(Handle::current());

        let handle = scheduler.schedule(Duration::from_millis(10), || {});
        tokio::time::sleep(Duration::from_millis(20)).await;

        scheduler.cancel(handle);
        assert_eq!(scheduler.armed_count(), 0);
    }
}
