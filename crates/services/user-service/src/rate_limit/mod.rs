//! Per-client request throttling.

mod limiter;

pub use common::client_identity;
pub use limiter::{Decision, RateLimiter, BUCKET_IDLE_TTL_SECONDS, RATE_LIMIT_PREFIX};
