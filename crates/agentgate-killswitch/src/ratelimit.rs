// crates/agentgate-killswitch/src/ratelimit.rs
// ============================================================================
// Module: Redis Rate Limit Store
// Description: `agentgate_core::RateLimitStore` over the same shared Redis
//              instance the kill-switch store uses.
// Purpose: Give every gateway replica a consistent sliding-window call count
//          per key, with the resilience a shared counter store requires.
// Dependencies: agentgate-core, redis
// ============================================================================

//! ## Overview
//! Each key is a Redis sorted set: the score is the call's timestamp in
//! milliseconds, the member is a value unique to that call. `record_and_count`
//! adds the current call, trims members older than the trailing window, and
//! returns the set's resulting cardinality, the call count the sliding
//! sliding window needs. As with [`crate::RedisKillSwitchStore`], a read or
//! write retries exactly once against a fresh connection; a second failure
//! is reported as `unavailable`, which the limiter resolves to "exceeded"
//! (fail-closed).

use agentgate_core::RateLimitStore;
use agentgate_core::RateLimitStoreError;
use agentgate_core::Timestamp;
use redis::Commands;
use redis::RedisError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// Key prefix every rate-limit sorted set is stored under.
const KEY_PREFIX: &str = "agentgate:ratelimit:";
/// Number of attempts made per operation: the initial attempt plus one retry.
const MAX_ATTEMPTS: u32 = 2;

/// [`RateLimitStore`] backed by a shared Redis instance.
pub struct RedisRateLimitStore {
    /// Lazily-connected Redis client; each operation opens its own connection.
    client: redis::Client,
    /// Disambiguates same-millisecond calls so sorted-set members stay unique.
    sequence: AtomicU64,
}

impl RedisRateLimitStore {
    /// Opens a store against `redis_url`. Does not connect eagerly; the
    /// first call establishes the connection.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitStoreError`] when `redis_url` cannot be parsed.
    pub fn new(redis_url: &str) -> Result<Self, RateLimitStoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|err| RateLimitStoreError::Unavailable(err.to_string()))?;
        Ok(Self { client, sequence: AtomicU64::new(0) })
    }

    /// Runs `op` against a fresh connection, retrying once on transport error.
    fn with_retry<T>(
        &self,
        op: impl Fn(&mut redis::Connection) -> Result<T, RedisError>,
    ) -> Result<T, RateLimitStoreError> {
        let mut last_error = None;
        for _attempt in 0..MAX_ATTEMPTS {
            match self.client.get_connection() {
                Ok(mut connection) => match op(&mut connection) {
                    Ok(value) => return Ok(value),
                    Err(error) => last_error = Some(error.to_string()),
                },
                Err(error) => last_error = Some(error.to_string()),
            }
        }
        Err(RateLimitStoreError::Unavailable(last_error.unwrap_or_else(|| "unknown error".to_string())))
    }
}

impl RateLimitStore for RedisRateLimitStore {
    fn record_and_count(
        &self,
        key: &str,
        now: Timestamp,
        window_millis: u64,
    ) -> Result<u32, RateLimitStoreError> {
        let redis_key = format!("{KEY_PREFIX}{key}");
        let now_millis = now.as_unix_millis();
        let cutoff = now_millis.saturating_sub(i64::try_from(window_millis).unwrap_or(i64::MAX));
        let member = format!("{now_millis}-{}", self.sequence.fetch_add(1, Ordering::Relaxed));
        let ttl_seconds = window_millis / 1000 + 1;

        self.with_retry(|connection| {
            let _: () = connection.zadd(&redis_key, &member, now_millis)?;
            let _: () = connection.zrembyscore(&redis_key, i64::MIN, cutoff)?;
            let _: () = connection.expire(&redis_key, i64::try_from(ttl_seconds).unwrap_or(i64::MAX))?;
            let count: u64 = connection.zcard(&redis_key)?;
            Ok(u32::try_from(count).unwrap_or(u32::MAX))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::RedisRateLimitStore;
    use agentgate_core::RateLimitStore;
    use agentgate_core::RateLimitStoreError;
    use agentgate_core::Timestamp;

    #[test]
    fn unreachable_host_surfaces_as_unavailable_after_retry() {
        let store = RedisRateLimitStore::new("redis://127.0.0.1:1").expect("url parses");
        let result = store.record_and_count("tenant-1:tool-x", Timestamp::from_unix_millis(0), 60_000);
        assert!(matches!(result, Err(RateLimitStoreError::Unavailable(_))));
    }

    #[test]
    fn invalid_url_is_rejected_at_construction() {
        let result = RedisRateLimitStore::new("not-a-url");
        assert!(result.is_err());
    }
}
