//! Cache-aside decorator over a durable [`UserRepository`].
//!
//! Reads by id go to the cache first and fall back to the durable store.
//! Concurrent misses for the same id are coalesced into one durable read.
//! Writes hit the durable store first and then drop the cached snapshot.
//! Cache failures are logged and never fail a call.
//!
//! Each id carries a write generation. A durable read only fills the cache
//! if no write to that id completed while it was running, and writes detach
//! the read in flight so later readers start a fresh one.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, warn};

use common::{AppResult, Singleflight};
use domain::{ListQuery, NewUser, User};

use super::UserRepository;
use crate::infra::CacheStore;

/// Cache key prefix for user snapshots
pub const CACHE_PREFIX_USER: &str = "user:";

pub fn user_cache_key(id: i64) -> String {
    format!("{}{}", CACHE_PREFIX_USER, id)
}

/// Read a cached snapshot. Errors and undecodable entries count as misses.
async fn cached_user(cache: &dyn CacheStore, key: &str) -> Option<User> {
    match cache.get(key).await {
        Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!("Failed to deserialize cached value for key {}: {}", key, e);
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(key, error = ?e, "Cache read failed, falling back to store");
            None
        }
    }
}

type Generations = Arc<DashMap<i64, u64>>;

fn generation(generations: &Generations, id: i64) -> u64 {
    generations.get(&id).map_or(0, |g| *g)
}

pub struct CachedUserRepository {
    inner: Arc<dyn UserRepository>,
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
    flights: Singleflight<String, User>,
    generations: Generations,
}

impl CachedUserRepository {
    pub fn new(inner: Arc<dyn UserRepository>, cache: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            inner,
            cache,
            ttl,
            flights: Singleflight::new(),
            generations: Arc::new(DashMap::new()),
        }
    }

    /// Mark `id` as written: reads already running for it must not cache
    /// their result, and new reads must not join them.
    async fn written(&self, id: i64) {
        *self.generations.entry(id).or_insert(0) += 1;
        self.flights.forget(&user_cache_key(id));
        self.invalidate(id).await;
    }

    /// Drop cached snapshots for several users in one call.
    pub async fn invalidate_many(&self, ids: &[i64]) -> AppResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let keys: Vec<String> = ids.iter().copied().map(user_cache_key).collect();
        self.cache.delete(&keys).await
    }

    async fn invalidate(&self, id: i64) {
        if let Err(e) = self.cache.delete(&[user_cache_key(id)]).await {
            warn!(user_id = id, error = ?e, "Cache invalidation failed");
        }
    }
}

#[async_trait]
impl UserRepository for CachedUserRepository {
    async fn create(&self, new_user: NewUser) -> AppResult<i64> {
        self.inner.create(new_user).await
    }

    async fn get_by_id(&self, id: i64) -> AppResult<User> {
        let key = user_cache_key(id);
        if let Some(user) = cached_user(self.cache.as_ref(), &key).await {
            return Ok(user);
        }

        let inner = Arc::clone(&self.inner);
        let cache = Arc::clone(&self.cache);
        let generations = Arc::clone(&self.generations);
        let ttl = self.ttl;
        let flight_key = key.clone();

        self.flights
            .execute(flight_key, move || {
                let started = generation(&generations, id);
                async move {
                    // A previous flight may have filled the cache since our miss
                    if let Some(user) = cached_user(cache.as_ref(), &key).await {
                        return Ok(user);
                    }

                    let user = inner.get_by_id(id).await?;
                    if generation(&generations, id) != started {
                        debug!(key = %key, "User written during read, not caching");
                        return Ok(user);
                    }
                    match serde_json::to_vec(&user) {
                        Ok(bytes) => {
                            if let Err(e) = cache.set(&key, bytes, ttl).await {
                                warn!(key = %key, error = ?e, "Cache write failed");
                            } else if generation(&generations, id) != started {
                                // A write slipped in between the check and the set
                                if let Err(e) = cache.delete(&[key.clone()]).await {
                                    warn!(key = %key, error = ?e, "Cache invalidation failed");
                                }
                            } else {
                                debug!(key = %key, "Cached user snapshot");
                            }
                        }
                        Err(e) => warn!("Failed to serialize user {}: {}", id, e),
                    }
                    Ok(user)
                }
            })
            .await
    }

    async fn get_for_update(&self, id: i64) -> AppResult<User> {
        self.inner.get_for_update(id).await
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.inner.get_by_email(email).await
    }

    async fn update(&self, user: &User) -> AppResult<i64> {
        let id = self.inner.update(user).await?;
        self.written(user.id).await;
        Ok(id)
    }

    async fn delete(&self, id: i64) -> AppResult<i64> {
        let deleted = self.inner.delete(id).await?;
        self.written(id).await;
        Ok(deleted)
    }

    async fn list(&self, query: &ListQuery) -> AppResult<(Vec<User>, u64)> {
        self.inner.list(query).await
    }
}
