//! Rate limit scripts.
//!
//! Each script is evaluated as one atomic unit against a single key. The Lua
//! sources run inside Redis; [`MemoryCache`](super::MemoryCache) evaluates the
//! same arithmetic in Rust while holding the key's map lock.

/// Result returned by the token bucket script when no token was available.
pub const DENIED: i64 = -1;

/// `KEYS[1]` = counter, `ARGV[1]` = window seconds. Returns the new count.
const FIXED_WINDOW_LUA: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
  redis.call('EXPIRE', KEYS[1], tonumber(ARGV[1]))
end
return count
"#;

/// `KEYS[1]` = bucket hash, `ARGV` = rate per second, capacity, now (ms),
/// idle expiry (s). Returns the whole tokens left, or -1 when denied.
const TOKEN_BUCKET_LUA: &str = r#"
local rate = tonumber(ARGV[1])
local capacity = tonumber(ARGV[2])
local now = tonumber(ARGV[3])
local idle_ttl = tonumber(ARGV[4])

local state = redis.call('HMGET', KEYS[1], 'ts', 'tokens')
local ts = tonumber(state[1])
local tokens = tonumber(state[2])
if ts == nil or tokens == nil then
  ts = now
  tokens = capacity
end

local elapsed = math.max(0, now - ts)
tokens = math.min(capacity, tokens + elapsed * rate / 1000)

local result = -1
if tokens >= 1 then
  tokens = tokens - 1
  result = math.floor(tokens)
end

redis.call('HSET', KEYS[1], 'ts', now, 'tokens', tokens)
redis.call('EXPIRE', KEYS[1], idle_ttl)
return result
"#;

/// Atomic scripts understood by every [`CacheStore`](super::CacheStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitScript {
    /// Args: `[window_seconds]`
    FixedWindow,
    /// Args: `[rate_per_second, capacity, now_ms, idle_ttl_seconds]`
    TokenBucket,
}

impl LimitScript {
    pub fn source(&self) -> &'static str {
        match self {
            LimitScript::FixedWindow => FIXED_WINDOW_LUA,
            LimitScript::TokenBucket => TOKEN_BUCKET_LUA,
        }
    }

    /// Number of arguments the script expects.
    pub fn arity(&self) -> usize {
        match self {
            LimitScript::FixedWindow => 1,
            LimitScript::TokenBucket => 4,
        }
    }
}

/// Persisted token bucket state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketState {
    pub ts_ms: i64,
    pub tokens: f64,
}

/// Refill a bucket for the time elapsed since its last update and try to
/// take one token.
///
/// Returns the state to persist and the script result: the whole tokens
/// left, or [`DENIED`].
pub fn refill_and_take(
    state: Option<BucketState>,
    rate_per_second: i64,
    capacity: i64,
    now_ms: i64,
) -> (BucketState, i64) {
    let capacity = capacity as f64;
    let BucketState { ts_ms, tokens } = state.unwrap_or(BucketState {
        ts_ms: now_ms,
        tokens: capacity,
    });

    let elapsed = (now_ms - ts_ms).max(0) as f64;
    let mut tokens = (tokens + elapsed * rate_per_second as f64 / 1000.0).min(capacity);

    let result = if tokens >= 1.0 {
        tokens -= 1.0;
        tokens.floor() as i64
    } else {
        DENIED
    };

    (
        BucketState {
            ts_ms: now_ms,
            tokens,
        },
        result,
    )
}
