use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;

use super::{CacheInner, Invalidation, QueryCache, ResourceKey};

/// Intervals below this are raised to it
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Background refresh of one key; stops when cancelled or dropped
#[derive(Debug)]
pub struct PollHandle {
    key: ResourceKey,
    interval: Duration,
    task: AbortHandle,
}

impl PollHandle {
    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn cancel(self) {
        // Drop aborts the task
    }

    pub(crate) fn abort_handle(&self) -> AbortHandle {
        self.task.clone()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// The task only holds a weak reference, so a dropped cache ends the loop
pub(super) fn spawn(
    inner: &Arc<CacheInner>,
    key: ResourceKey,
    interval: Duration,
    stale_after: Duration,
) -> PollHandle {
    let interval = interval.max(MIN_POLL_INTERVAL);
    let weak: Weak<CacheInner> = Arc::downgrade(inner);
    let task_key = key.clone();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately; the caller already holds a fresh read
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(inner) = weak.upgrade() else {
                break;
            };
            let cache = QueryCache { inner };
            cache.invalidate(Invalidation::Exact(task_key.clone()));
            let entry = cache.load(task_key.clone(), stale_after).await;
            tracing::debug!(key = %task_key, status = ?entry.status, "poll refreshed");
        }
    });

    PollHandle {
        key,
        interval,
        task: task.abort_handle(),
    }
}
