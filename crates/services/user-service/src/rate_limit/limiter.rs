//! Rate limiter evaluated atomically against the cache store.

use std::sync::Arc;

use tracing::warn;

use common::{AppError, AppResult, RateLimitAlgorithm, RateLimitConfig};

use crate::infra::{CacheStore, LimitScript, DENIED};

/// Key prefix for throttling state: `rate_limit:{route}:{identity}`
pub const RATE_LIMIT_PREFIX: &str = "rate_limit:";

/// Idle token buckets expire after this many seconds.
pub const BUCKET_IDLE_TTL_SECONDS: i64 = 60;

/// Outcome of a rate limit check that let the request through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Throttling is disabled; the store was not consulted
    Bypassed,
    Allowed { limit: u64, remaining: u64 },
    /// The store could not be evaluated; the request is let through
    FailedOpen,
}

/// Per-route, per-client throttle.
///
/// One algorithm is configured process-wide and applied to every route.
pub struct RateLimiter {
    store: Arc<dyn CacheStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CacheStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count one request from `identity` on `route`.
    ///
    /// Returns `TooManyRequests` when the client is over its limit. Store
    /// failures never reject a request.
    pub async fn check(&self, route: &str, identity: &str) -> AppResult<Decision> {
        if !self.config.enabled {
            return Ok(Decision::Bypassed);
        }

        let key = format!("{}{}:{}", RATE_LIMIT_PREFIX, route, identity);
        let limit = self.config.limit();

        let remaining = match self.config.algorithm {
            RateLimitAlgorithm::FixedWindow => self
                .store
                .eval(
                    LimitScript::FixedWindow,
                    &key,
                    &[self.config.window_seconds as i64],
                )
                .await
                .map(|count| limit.checked_sub(count.max(0) as u64)),
            RateLimitAlgorithm::TokenBucket => self
                .store
                .eval(
                    LimitScript::TokenBucket,
                    &key,
                    &[
                        self.config.rate_per_second as i64,
                        self.config.burst as i64,
                        chrono::Utc::now().timestamp_millis(),
                        BUCKET_IDLE_TTL_SECONDS,
                    ],
                )
                .await
                .map(|left| (left != DENIED).then_some(left.max(0) as u64)),
        };

        match remaining {
            Ok(Some(remaining)) => Ok(Decision::Allowed { limit, remaining }),
            Ok(None) => {
                warn!(client = identity, route, limit, "Rate limit exceeded");
                Err(AppError::TooManyRequests(self.config.info()))
            }
            Err(e) => {
                warn!(client = identity, route, error = ?e, "Rate limiter unavailable, allowing request");
                Ok(Decision::FailedOpen)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use common::RateLimitInfo;

    use super::*;
    use crate::infra::MemoryCache;
    use crate::test_support::FailingCache;

    fn limiter(algorithm: RateLimitAlgorithm) -> RateLimiter {
        RateLimiter::new(
            Arc::new(MemoryCache::new()),
            RateLimitConfig {
                enabled: true,
                algorithm,
                rate_per_second: 10,
                window_seconds: 1,
                burst: 20,
            },
        )
    }

    async fn admitted(limiter: &RateLimiter, attempts: usize) -> usize {
        let mut admitted = 0;
        for _ in 0..attempts {
            if limiter.check("/user.UserService/GetUser", "203.0.113.7").await.is_ok() {
                admitted += 1;
            }
        }
        admitted
    }

    #[tokio::test]
    async fn fixed_window_allows_quota_then_resets() {
        let limiter = limiter(RateLimitAlgorithm::FixedWindow);

        assert_eq!(admitted(&limiter, 10).await, 10);
        let denied = limiter.check("/user.UserService/GetUser", "203.0.113.7").await;
        assert!(matches!(denied, Err(AppError::TooManyRequests(_))));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(limiter.check("/user.UserService/GetUser", "203.0.113.7").await.is_ok());
    }

    #[tokio::test]
    async fn token_bucket_allows_burst_then_refills() {
        let limiter = limiter(RateLimitAlgorithm::TokenBucket);

        assert_eq!(admitted(&limiter, 20).await, 20);
        let denied = limiter.check("/user.UserService/GetUser", "203.0.113.7").await;
        assert!(matches!(denied, Err(AppError::TooManyRequests(_))));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(admitted(&limiter, 20).await >= 10);
    }

    #[tokio::test]
    async fn allowed_requests_report_remaining() {
        let limiter = limiter(RateLimitAlgorithm::TokenBucket);
        let decision = limiter.check("/users", "198.51.100.2").await.unwrap();
        assert_eq!(
            decision,
            Decision::Allowed {
                limit: 20,
                remaining: 19
            }
        );
    }

    #[tokio::test]
    async fn denial_carries_limit_parameters() {
        let limiter = limiter(RateLimitAlgorithm::FixedWindow);
        admitted(&limiter, 10).await;

        match limiter.check("/user.UserService/GetUser", "203.0.113.7").await {
            Err(AppError::TooManyRequests(info)) => assert_eq!(
                info,
                RateLimitInfo {
                    limit: 10,
                    rate_per_second: 10,
                    retry_after_seconds: 1
                }
            ),
            other => panic!("expected rate limit error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn clients_and_routes_are_isolated() {
        let limiter = limiter(RateLimitAlgorithm::FixedWindow);
        admitted(&limiter, 10).await;

        assert!(limiter.check("/user.UserService/GetUser", "198.51.100.2").await.is_ok());
        assert!(limiter.check("/user.UserService/ListUsers", "203.0.113.7").await.is_ok());
    }

    #[tokio::test]
    async fn store_failure_fails_open() {
        let store = Arc::new(FailingCache::default());
        let limiter = RateLimiter::new(store.clone(), RateLimitConfig::default());

        for _ in 0..50 {
            let decision = limiter.check("/users", "203.0.113.7").await.unwrap();
            assert_eq!(decision, Decision::FailedOpen);
        }
        assert_eq!(store.calls(), 50);
    }

    #[tokio::test]
    async fn disabled_limiter_never_touches_store() {
        let store = Arc::new(FailingCache::default());
        let config = RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        };
        let limiter = RateLimiter::new(store.clone(), config);

        for _ in 0..100 {
            assert_eq!(
                limiter.check("/users", "203.0.113.7").await.unwrap(),
                Decision::Bypassed
            );
        }
        assert_eq!(store.calls(), 0);
    }
}
