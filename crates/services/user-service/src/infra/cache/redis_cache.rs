//! Redis-backed cache store.

use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use redis::{
    aio::{ConnectionManager, ConnectionManagerConfig},
    AsyncCommands, RedisError, Script,
};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use common::{AppResult, CacheConfig};

use super::{CacheStore, LimitScript};

/// Reconnect backoff: delays grow as `factor * base^attempt` milliseconds.
const BACKOFF_BASE: u64 = 2;
const BACKOFF_FACTOR_MS: u64 = 100;

/// Redis cache with a fixed set of multiplexed connections.
///
/// Connections are handed out round-robin. The first `min_idle` are opened at
/// startup, the rest on first use. Each [`ConnectionManager`] reconnects on
/// its own, retrying up to `max_retries` times.
pub struct RedisCache {
    client: redis::Client,
    connections: Vec<OnceCell<ConnectionManager>>,
    next: AtomicUsize,
    max_retries: usize,
    fixed_window: Script,
    token_bucket: Script,
}

impl RedisCache {
    /// Connect to Redis and warm up the idle connections.
    ///
    /// Fails only on a malformed URL.
    pub async fn connect(config: &CacheConfig) -> Result<Self, RedisError> {
        debug!("Connecting to Redis at {}", config.url);
        let client = redis::Client::open(config.url.as_str())?;

        let cache = Self {
            client,
            connections: (0..config.pool_size.max(1)).map(|_| OnceCell::new()).collect(),
            next: AtomicUsize::new(0),
            max_retries: config.max_retries,
            fixed_window: Script::new(LimitScript::FixedWindow.source()),
            token_bucket: Script::new(LimitScript::TokenBucket.source()),
        };

        // An unreachable server is not fatal: requests fail open and the
        // remaining slots connect lazily.
        for slot in cache.connections.iter().take(config.min_idle) {
            if let Err(e) = slot.get_or_try_init(|| cache.open()).await {
                warn!(error = %e, "Redis warm-up failed, continuing without idle connections");
                break;
            }
        }

        debug!(
            pool_size = cache.connections.len(),
            min_idle = config.min_idle,
            "Redis pool ready"
        );
        Ok(cache)
    }

    async fn open(&self) -> Result<ConnectionManager, RedisError> {
        let config = ConnectionManagerConfig::new()
            .set_exponent_base(BACKOFF_BASE)
            .set_factor(BACKOFF_FACTOR_MS)
            .set_number_of_retries(self.max_retries);
        ConnectionManager::new_with_config(self.client.clone(), config).await
    }

    async fn connection(&self) -> AppResult<ConnectionManager> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.connections.len();
        let conn = self.connections[index]
            .get_or_try_init(|| self.open())
            .await?;
        Ok(conn.clone())
    }

    fn script(&self, script: LimitScript) -> &Script {
        match script {
            LimitScript::FixedWindow => &self.fixed_window,
            LimitScript::TokenBucket => &self.token_bucket,
        }
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> AppResult<()> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> AppResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(keys).await?;
        Ok(())
    }

    async fn eval(&self, script: LimitScript, key: &str, args: &[i64]) -> AppResult<i64> {
        let mut conn = self.connection().await?;
        let mut invocation = self.script(script).prepare_invoke();
        invocation.key(key);
        for arg in args {
            invocation.arg(*arg);
        }
        // EVALSHA, falling back to EVAL when the script is not loaded yet
        let result: i64 = invocation.invoke_async(&mut conn).await?;
        Ok(result)
    }

    async fn ping(&self) -> AppResult<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
