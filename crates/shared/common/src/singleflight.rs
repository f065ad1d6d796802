//! Request coalescing for concurrent work on the same key.
//!
//! The first caller for a key becomes the leader: its work is spawned onto
//! the runtime and every caller arriving while it runs awaits the same
//! shared result. Dropping a waiter (including the leader) only stops that
//! caller from waiting; the spawned work runs to completion and removes its
//! map entry before publishing the result.

use std::{
    future::Future,
    hash::Hash,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use dashmap::{mapref::entry::Entry, DashMap};
use futures::future::{BoxFuture, FutureExt, Shared};

use crate::error::{AppError, AppResult};

type SharedResult<T> = Shared<BoxFuture<'static, Result<T, Arc<AppError>>>>;

struct Call<T> {
    id: u64,
    result: SharedResult<T>,
}

pub struct Singleflight<K, T> {
    calls: Arc<DashMap<K, Call<T>>>,
    next_id: Arc<AtomicU64>,
}

impl<K, T> Singleflight<K, T>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            calls: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run `work` for `key`, or join the call already in flight.
    ///
    /// `work` is only invoked by the leader.
    pub async fn execute<F, Fut>(&self, key: K, work: F) -> AppResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        let shared = match self.calls.entry(key.clone()) {
            Entry::Occupied(entry) => entry.get().result.clone(),
            Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let calls = Arc::clone(&self.calls);
                let fut = work();
                // remove_if() blocks on this shard until the entry below is inserted
                let handle = tokio::spawn(async move {
                    let result = fut.await.map_err(Arc::new);
                    calls.remove_if(&key, |_, call| call.id == id);
                    result
                });

                let shared = handle
                    .map(|joined| match joined {
                        Ok(result) => result,
                        Err(e) => Err(Arc::new(AppError::internal(format!(
                            "coalesced call failed: {e}"
                        )))),
                    })
                    .boxed()
                    .shared();
                entry.insert(Call {
                    id,
                    result: shared.clone(),
                });
                shared
            }
        };

        shared.await.map_err(AppError::from_shared)
    }

    /// Detach the call in flight for `key`, if any.
    ///
    /// Callers already waiting still get its result; later callers start a
    /// new call instead of joining it.
    pub fn forget(&self, key: &K) {
        self.calls.remove(key);
    }

    /// Number of keys with work currently in flight.
    pub fn in_flight(&self) -> usize {
        self.calls.len()
    }
}

impl<K, T> Clone for Singleflight<K, T> {
    fn clone(&self) -> Self {
        Self {
            calls: Arc::clone(&self.calls),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<K, T> Default for Singleflight<K, T>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
