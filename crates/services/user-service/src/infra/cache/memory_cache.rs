//! In-process cache store.

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use common::{AppError, AppResult};

use super::{refill_and_take, BucketState, CacheStore, LimitScript};

/// Expired entries are swept once every this many writes.
const SWEEP_EVERY: usize = 1024;

#[derive(Debug, Clone)]
enum Value {
    Empty,
    Bytes(Vec<u8>),
    Counter(i64),
    Bucket(BucketState),
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    expires_at: Option<Instant>,
}

impl Slot {
    fn empty() -> Self {
        Self {
            value: Value::Empty,
            expires_at: None,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        !matches!(self.value, Value::Empty) && self.expires_at.map_or(true, |at| at > now)
    }
}

/// Cache store kept in process memory.
///
/// Expiry is checked on access. Script evaluation holds the key's shard
/// lock, so concurrent evaluations on one key are serialized.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, Slot>,
    writes: AtomicUsize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|slot| slot.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record_write(&self) {
        if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            let now = Instant::now();
            self.entries.retain(|_, slot| slot.is_live(now));
        }
    }
}

fn wrong_type(key: &str) -> AppError {
    AppError::internal(format!(
        "WRONGTYPE operation against key {key} holding the wrong kind of value"
    ))
}

fn script_args<const N: usize>(script: LimitScript, args: &[i64]) -> AppResult<[i64; N]> {
    args.try_into().map_err(|_| {
        AppError::internal(format!(
            "{script:?} expects {} arguments, got {}",
            script.arity(),
            args.len()
        ))
    })
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(slot) if slot.is_live(now) => match &slot.value {
                Value::Bytes(bytes) => Ok(Some(bytes.clone())),
                _ => Err(wrong_type(key)),
            },
            _ => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> AppResult<()> {
        self.entries.insert(
            key.to_string(),
            Slot {
                value: Value::Bytes(value),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        self.record_write();
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> AppResult<()> {
        for key in keys {
            self.entries.remove(key);
        }
        Ok(())
    }

    async fn eval(&self, script: LimitScript, key: &str, args: &[i64]) -> AppResult<i64> {
        let now = Instant::now();
        let mut slot = self.entries.entry(key.to_string()).or_insert_with(Slot::empty);
        if !slot.is_live(now) {
            *slot = Slot::empty();
        }

        let result = match script {
            LimitScript::FixedWindow => {
                let [window_seconds] = script_args::<1>(script, args)?;
                let count = match slot.value {
                    Value::Empty => 1,
                    Value::Counter(count) => count + 1,
                    _ => return Err(wrong_type(key)),
                };
                if count == 1 {
                    slot.expires_at = Some(now + Duration::from_secs(window_seconds.max(1) as u64));
                }
                slot.value = Value::Counter(count);
                count
            }
            LimitScript::TokenBucket => {
                let [rate, capacity, now_ms, idle_ttl] = script_args::<4>(script, args)?;
                let state = match slot.value {
                    Value::Empty => None,
                    Value::Bucket(state) => Some(state),
                    _ => return Err(wrong_type(key)),
                };
                let (state, result) = refill_and_take(state, rate, capacity, now_ms);
                slot.value = Value::Bucket(state);
                slot.expires_at = Some(now + Duration::from_secs(idle_ttl.max(1) as u64));
                result
            }
        };

        drop(slot);
        self.record_write();
        Ok(result)
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::cache::DENIED;

    #[tokio::test]
    async fn set_then_get_returns_bytes() {
        let cache = MemoryCache::new();
        cache
            .set("user:1", b"snapshot".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.get("user:1").await.unwrap(), Some(b"snapshot".to_vec()));
        assert_eq!(cache.get("user:2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn entries_expire() {
        let cache = MemoryCache::new();
        cache
            .set("user:1", b"x".to_vec(), Duration::from_millis(50))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(cache.get("user:1").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let cache = MemoryCache::new();
        cache
            .set("user:1", b"x".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        cache
            .delete(&["user:1".to_string(), "user:404".to_string()])
            .await
            .unwrap();
        cache.delete(&[]).await.unwrap();
        assert_eq!(cache.get("user:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn fixed_window_counts_and_resets() {
        let cache = MemoryCache::new();
        for expected in 1..=3 {
            let count = cache
                .eval(LimitScript::FixedWindow, "rl", &[1])
                .await
                .unwrap();
            assert_eq!(count, expected);
        }

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let count = cache
            .eval(LimitScript::FixedWindow, "rl", &[1])
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn token_bucket_drains_to_denial() {
        let cache = MemoryCache::new();
        let now_ms = 1_000;
        for expected in (0..3).rev() {
            let left = cache
                .eval(LimitScript::TokenBucket, "rl", &[1, 3, now_ms, 60])
                .await
                .unwrap();
            assert_eq!(left, expected);
        }

        let left = cache
            .eval(LimitScript::TokenBucket, "rl", &[1, 3, now_ms, 60])
            .await
            .unwrap();
        assert_eq!(left, DENIED);
    }

    #[tokio::test]
    async fn scripts_reject_bad_arguments_and_types() {
        let cache = MemoryCache::new();
        assert!(cache.eval(LimitScript::TokenBucket, "rl", &[1]).await.is_err());

        cache
            .set("user:1", b"x".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(cache
            .eval(LimitScript::FixedWindow, "user:1", &[1])
            .await
            .is_err());
    }
}
