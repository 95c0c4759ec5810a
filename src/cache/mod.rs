//! Remote query cache.
//!
//! Keyed by [`ResourceKey`]. Fresh entries are served without a network call,
//! concurrent readers of the same key share one in-flight fetch, and writes
//! declare which keys they make stale. Fetches and mutations run as their own
//! tokio tasks, so a caller that goes away never leaves the cache half-written.

mod entry;
mod key;
mod mutation;
mod poll;

pub use entry::{CacheEntry, CacheStatus};
pub use key::{Invalidation, ResourceKey};
pub use mutation::{Mutation, MutationIntent, MutationState, OptimisticUpdate};
pub use poll::{PollHandle, MIN_POLL_INTERVAL};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::AbortHandle;

use crate::error::{ClientError, NetworkError};
use crate::gateway::{Gateway, RequestOptions};

type FetchResult = Result<Arc<Value>, ClientError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// Per-read overrides of the cache defaults
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub stale_after: Option<Duration>,
    /// Keep the key refreshed in the background while it stays cached
    pub refresh_interval: Option<Duration>,
}

impl QueryOptions {
    pub fn stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = Some(stale_after);
        self
    }

    pub fn refresh_every(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }
}

#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    gateway: Gateway,
    stale_after: Duration,
    slots: Mutex<HashMap<ResourceKey, Slot>>,
    polls: Mutex<Vec<AbortHandle>>,
    fetch_ids: AtomicU64,
}

struct Slot {
    entry: CacheEntry,
    /// Fetch that currently owns the entry, by id
    inflight: Option<(u64, SharedFetch)>,
    /// Fetch that lost ownership through invalidation but has not finished;
    /// the next fetch waits for it so a key never has two requests running
    superseded: Option<(u64, SharedFetch)>,
    /// Optimistic writes awaiting server confirmation
    holds: usize,
    refresh: Option<PollHandle>,
}

impl Slot {
    fn new(key: ResourceKey, stale_after: Duration) -> Self {
        Self {
            entry: CacheEntry::new(key, stale_after),
            inflight: None,
            superseded: None,
            holds: 0,
            refresh: None,
        }
    }
}

impl QueryCache {
    pub fn new(gateway: Gateway, stale_after: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                gateway,
                stale_after,
                slots: Mutex::new(HashMap::new()),
                polls: Mutex::new(Vec::new()),
                fetch_ids: AtomicU64::new(0),
            }),
        }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.inner.gateway
    }

    pub fn default_stale_after(&self) -> Duration {
        self.inner.stale_after
    }

    pub async fn read(&self, key: impl Into<ResourceKey>) -> CacheEntry {
        self.read_with(key, QueryOptions::default()).await
    }

    /// Returns the cached entry, fetching first unless it is fresh.
    ///
    /// A failed fetch comes back as an entry with status `Error` that still
    /// carries the last good data. A read after invalidation always gets a
    /// new response, but its request only starts once the invalidated one
    /// has finished.
    pub async fn read_with(&self, key: impl Into<ResourceKey>, options: QueryOptions) -> CacheEntry {
        let key = key.into();
        let stale_after = options.stale_after.unwrap_or(self.inner.stale_after);
        if let Some(interval) = options.refresh_interval {
            self.keep_refreshed(&key, interval, stale_after);
        }
        self.load(key, stale_after).await
    }

    async fn load(&self, key: ResourceKey, stale_after: Duration) -> CacheEntry {
        let fetch = {
            let mut slots = self.slots();
            let slot = slots
                .entry(key.clone())
                .or_insert_with(|| Slot::new(key.clone(), stale_after));
            slot.entry.stale_after = stale_after;

            if slot.entry.is_fresh(Instant::now()) {
                tracing::debug!(key = %key, "cache hit");
                return slot.entry.clone();
            }

            match &slot.inflight {
                Some((_, fetch)) => {
                    tracing::debug!(key = %key, "joining in-flight fetch");
                    fetch.clone()
                }
                None => {
                    let id = self.inner.fetch_ids.fetch_add(1, Ordering::Relaxed);
                    let after = slot.superseded.as_ref().map(|(_, fetch)| fetch.clone());
                    let fetch = self.spawn_fetch(key.clone(), id, after);
                    slot.inflight = Some((id, fetch.clone()));
                    slot.entry.status = CacheStatus::Loading;
                    fetch
                }
            }
        };

        let result = fetch.await;

        let mut entry = self
            .peek(&key)
            .unwrap_or_else(|| CacheEntry::new(key.clone(), stale_after));
        match result {
            Ok(value) => {
                if entry.status != CacheStatus::Success {
                    let stale = entry.stale;
                    entry.store(value, stale);
                }
            }
            Err(error) => entry.fail(error),
        }
        entry
    }

    // One refresh task per cached key, evicted together with the entry
    fn keep_refreshed(&self, key: &ResourceKey, interval: Duration, stale_after: Duration) {
        let mut slots = self.slots();
        let slot = slots
            .entry(key.clone())
            .or_insert_with(|| Slot::new(key.clone(), stale_after));
        if slot.refresh.is_none() {
            slot.refresh = Some(poll::spawn(&self.inner, key.clone(), interval, stale_after));
        }
    }

    /// `read` for callers that only want the data
    pub async fn fetch(&self, key: impl Into<ResourceKey>) -> FetchResult {
        self.read(key).await.into_result()
    }

    /// Snapshot of the current entry, never touching the network
    pub fn peek(&self, key: &ResourceKey) -> Option<CacheEntry> {
        self.slots().get(key).map(|slot| slot.entry.clone())
    }

    /// Marks matching entries stale and returns how many matched.
    ///
    /// In-flight fetches for those keys lose ownership of the entry, so the
    /// next read always goes back to the server.
    pub fn invalidate(&self, invalidation: impl Into<Invalidation>) -> usize {
        let invalidation = invalidation.into();
        let mut slots = self.slots();
        let mut count = 0;
        for (key, slot) in slots.iter_mut() {
            if invalidation.matches(key) {
                slot.entry.stale = true;
                if let Some(fetch) = slot.inflight.take() {
                    slot.superseded = Some(fetch);
                }
                count += 1;
            }
        }
        tracing::debug!(?invalidation, count, "invalidated cache entries");
        count
    }

    pub fn remove(&self, key: &ResourceKey) -> Option<CacheEntry> {
        self.slots().remove(key).map(|slot| slot.entry)
    }

    pub fn clear(&self) {
        let evicted = {
            let mut slots = self.slots();
            std::mem::take(&mut *slots)
        };
        tracing::debug!(count = evicted.len(), "cache cleared");
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts a background refresh of `key`; drop the handle to stop it
    pub fn poll(&self, key: impl Into<ResourceKey>, interval: Duration) -> PollHandle {
        let handle = poll::spawn(&self.inner, key.into(), interval, self.inner.stale_after);
        let mut polls = self.inner.polls.lock().unwrap_or_else(PoisonError::into_inner);
        polls.retain(|task| !task.is_finished());
        polls.push(handle.abort_handle());
        handle
    }

    /// Stops every poll and evicts every entry
    pub fn dispose(&self) {
        let polls = {
            let mut polls = self.inner.polls.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *polls)
        };
        for task in polls {
            task.abort();
        }
        self.clear();
    }

    /// Runs the write and waits for it to settle
    pub async fn mutate(&self, intent: MutationIntent) -> Result<Value, ClientError> {
        self.execute(intent).settled().await.into_result()
    }

    /// Starts the write in the background and returns its state handle
    pub fn execute(&self, intent: MutationIntent) -> Mutation {
        let (sender, receiver) = watch::channel(MutationState::Pending);
        let cache = self.clone();
        tokio::spawn(async move {
            let state = MutationState::from(cache.run_mutation(intent).await);
            sender.send_replace(state);
        });
        Mutation::new(receiver)
    }

    async fn run_mutation(&self, intent: MutationIntent) -> Result<Value, ClientError> {
        let snapshot = intent
            .optimistic
            .as_ref()
            .map(|update| self.apply_optimistic(update));

        let result = self
            .inner
            .gateway
            .request(&intent.path, intent.request_options())
            .await;

        if let (Some(update), Some(snapshot)) = (&intent.optimistic, snapshot) {
            self.release_optimistic(&update.key, snapshot, result.is_err());
        }

        match &result {
            Ok(_) => {
                for invalidation in &intent.invalidates {
                    self.invalidate(invalidation.clone());
                }
            }
            Err(error) => {
                tracing::warn!(method = %intent.method, path = %intent.path, %error, "mutation failed");
            }
        }
        result
    }

    /// Applies the update and returns the entry as it was before
    fn apply_optimistic(&self, update: &OptimisticUpdate) -> CacheEntry {
        let stale_after = self.inner.stale_after;
        let mut slots = self.slots();
        let slot = slots
            .entry(update.key.clone())
            .or_insert_with(|| Slot::new(update.key.clone(), stale_after));

        let snapshot = slot.entry.clone();
        let next = update.apply(slot.entry.data());
        slot.entry.data = Some(Arc::new(next));
        slot.entry.status = CacheStatus::Success;
        slot.entry.error = None;
        slot.holds += 1;
        snapshot
    }

    fn release_optimistic(&self, key: &ResourceKey, snapshot: CacheEntry, rollback: bool) {
        let mut slots = self.slots();
        let Some(slot) = slots.get_mut(key) else {
            return;
        };
        slot.holds = slot.holds.saturating_sub(1);
        if rollback {
            let stale = slot.entry.stale;
            slot.entry = snapshot;
            slot.entry.stale |= stale;
            tracing::warn!(key = %key, "rolled back optimistic update");
        }
    }

    fn spawn_fetch(&self, key: ResourceKey, id: u64, after: Option<SharedFetch>) -> SharedFetch {
        let cache = self.clone();
        let task = tokio::spawn(async move {
            if let Some(previous) = after {
                let _ = previous.await;
            }
            tracing::debug!(key = %key, "fetching");
            let options = RequestOptions::get().with_params(key.filters().clone());
            let result = cache
                .inner
                .gateway
                .request(key.path(), options)
                .await
                .map(Arc::new);
            cache.settle(&key, id, &result);
            result
        });

        task.map(|joined| {
            joined.unwrap_or_else(|e| {
                Err(ClientError::Network(NetworkError::new(format!("fetch task failed: {}", e))))
            })
        })
        .boxed()
        .shared()
    }

    /// Writes a finished fetch into its slot.
    ///
    /// Evicted keys are left alone. A fetch that lost ownership through
    /// invalidation only lands, marked stale, when no newer fetch is running.
    fn settle(&self, key: &ResourceKey, id: u64, result: &FetchResult) {
        let mut slots = self.slots();
        let Some(slot) = slots.get_mut(key) else {
            return;
        };

        if matches!(&slot.superseded, Some((previous, _)) if *previous == id) {
            slot.superseded = None;
        }

        let owner = matches!(&slot.inflight, Some((current, _)) if *current == id);
        if owner {
            slot.inflight = None;
        } else if slot.inflight.is_some() {
            return;
        }

        if slot.holds > 0 {
            slot.entry.stale = true;
            return;
        }

        match result {
            Ok(value) => slot.entry.store(Arc::clone(value), !owner),
            Err(error) => {
                tracing::warn!(key = %key, %error, "fetch failed, keeping last good data");
                slot.entry.fail(error.clone());
            }
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<ResourceKey, Slot>> {
        self.inner.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
