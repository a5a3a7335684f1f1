//! Cancellable delayed tasks keyed by attempt.
//!
//! The coordinator keeps at most one scheduled poll. Scheduling stores the
//! new task; `cancel` aborts whatever is stored. A poll that schedules its
//! own successor replaces itself in the slot without being aborted.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tokio::task::AbortHandle;

use crate::payments::types::AttemptId;

/// Boxed unit of scheduled work.
pub type PollFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct ScheduledPoll {
    attempt: AttemptId,
    handle: AbortHandle,
}

/// Single-slot timer for status polls.
#[derive(Default)]
pub struct PollScheduler {
    slot: ArcSwapOption<ScheduledPoll>,
}

impl PollScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay` on the tokio runtime.
    pub fn schedule(&self, attempt: AttemptId, delay: Duration, task: PollFuture) {
        let join = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        tracing::trace!(attempt = %attempt, delay = ?delay, "Poll scheduled");
        self.slot.store(Some(Arc::new(ScheduledPoll {
            attempt,
            handle: join.abort_handle(),
        })));
    }

    /// Abort the scheduled task, if any. Returns the attempt it belonged to.
    pub fn cancel(&self) -> Option<AttemptId> {
        let scheduled = self.slot.swap(None)?;
        scheduled.handle.abort();
        tracing::debug!(attempt = %scheduled.attempt, "Scheduled poll cancelled");
        Some(scheduled.attempt)
    }

    /// Attempt owning the stored task, if it has not finished yet.
    pub fn pending_for(&self) -> Option<AttemptId> {
        self.slot
            .load()
            .as_ref()
            .filter(|s| !s.handle.is_finished())
            .map(|s| s.attempt)
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
