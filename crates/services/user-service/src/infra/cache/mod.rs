//! Key/value cache stores.
//!
//! Two backends implement [`CacheStore`]: Redis for deployments and an
//! in-process map for development and tests. Both evaluate the rate limit
//! scripts atomically per key.

mod memory_cache;
mod redis_cache;
mod scripts;

use std::time::Duration;

use async_trait::async_trait;

use common::AppResult;

pub use self::memory_cache::MemoryCache;
pub use self::redis_cache::RedisCache;
pub use self::scripts::{refill_and_take, BucketState, LimitScript, DENIED};

/// Cache store capability used by the cached repository and the rate limiter.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch raw bytes. `None` when the key is absent or expired.
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>>;

    /// Replace the value at `key`, expiring it after `ttl`.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> AppResult<()>;

    /// Delete keys. Missing keys and an empty slice are not errors.
    async fn delete(&self, keys: &[String]) -> AppResult<()>;

    /// Run a rate limit script atomically against `key`.
    async fn eval(&self, script: LimitScript, key: &str, args: &[i64]) -> AppResult<i64>;

    /// Check connectivity.
    async fn ping(&self) -> AppResult<()>;
}
