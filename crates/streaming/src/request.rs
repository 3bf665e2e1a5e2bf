use std::collections::BTreeMap;

use catalog::{BoxFuture, ServiceError};
use futures_util::FutureExt;
use futures_util::future::Shared;
use parking_lot::Mutex;

/// A fetch that any number of callers can await; all observe one result.
pub type SharedFetch<V> = Shared<BoxFuture<'static, Result<V, ServiceError>>>;

/// Deduplicates concurrent requests for the same key.
///
/// The first caller for a key starts the fetch; later callers join it until
/// it completes. Completed fetches are forgotten, so failures are retried on
/// the next request instead of being memoized.
pub struct Inflight<K, V> {
    pending: Mutex<BTreeMap<K, SharedFetch<V>>>,
}

impl<K, V> Default for Inflight<K, V> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(BTreeMap::new()),
        }
    }
}

impl<K, V> Inflight<K, V>
where
    K: Ord + Clone,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the pending fetch for `key`, or start one with `start`.
    ///
    /// Returns the shared fetch and whether this call started it.
    pub fn join_or_start<F>(&self, key: &K, start: F) -> (SharedFetch<V>, bool)
    where
        F: FnOnce() -> BoxFuture<'static, Result<V, ServiceError>>,
    {
        let mut pending = self.pending.lock();
        if let Some(existing) = pending.get(key) {
            // A fetch that already resolved but was never collected (its
            // awaiting task was dropped) must not be reused.
            if existing.peek().is_none() {
                return (existing.clone(), false);
            }
        }
        let fetch = start().shared();
        pending.insert(key.clone(), fetch.clone());
        (fetch, true)
    }

    /// Forget `fetch` once it has resolved, unless a newer fetch replaced it.
    pub fn complete(&self, key: &K, fetch: &SharedFetch<V>) {
        let mut pending = self.pending.lock();
        if pending.get(key).is_some_and(|f| f.ptr_eq(fetch)) {
            pending.remove(key);
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending
            .lock()
            .get(key)
            .is_some_and(|f| f.peek().is_none())
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}
