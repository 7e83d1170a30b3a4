// crates/agentgate-killswitch/src/lib.rs
// ============================================================================
// Module: Redis Kill-Switch Store
// Description: `agentgate_core::KillSwitchStore` and `RateLimitStore` over a
//              shared Redis instance (one `REDIS_URL` configures both).
// Purpose: Give every gateway replica a consistent view of the three
//          kill-switch scopes, and a consistent sliding-window call count,
//          with the resilience these components require.
// Dependencies: agentgate-core, redis, serde_json, thiserror, tracing
// ============================================================================

//! ## Overview
//! Kill-switch rows are stored as JSON under a key namespaced by
//! [`KillSwitchScope::store_key`]. A read or write that hits a transient
//! transport error retries exactly once against a fresh connection (spec
//! §4.3); a second failure is reported as `unavailable`, which the Gateway
//! pipeline resolves to DENY. A successful call immediately following a
//! prior failure emits a `health.recovered` event.
//!
//! [`RedisRateLimitStore`] lives in this crate rather than its own because it
//! shares both the target Redis instance and the retry-once idiom above; see
//! [`ratelimit`] for the sliding-window implementation.

// ============================================================================
// SECTION: Imports
// ============================================================================

mod ratelimit;

pub use ratelimit::RedisRateLimitStore;

use agentgate_core::KillSwitchRow;
use agentgate_core::KillSwitchScope;
use agentgate_core::KillSwitchStore;
use agentgate_core::KillSwitchStoreError;
use redis::Commands;
use redis::RedisError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Key prefix every kill-switch row is stored under.
const KEY_PREFIX: &str = "agentgate:killswitch:";
/// Number of attempts made per operation: the initial attempt plus one retry.
const MAX_ATTEMPTS: u32 = 2;

// ============================================================================
// SECTION: Redis Kill-Switch Store
// ============================================================================

/// [`KillSwitchStore`] backed by a shared Redis instance.
pub struct RedisKillSwitchStore {
    /// Lazily-connected Redis client; each operation opens its own connection.
    client: redis::Client,
    /// Set once the retry budget has been exhausted; cleared on next success.
    degraded: AtomicBool,
}

impl RedisKillSwitchStore {
    /// Opens a store against `redis_url`. Does not connect eagerly; the
    /// first read or write establishes the connection.
    ///
    /// # Errors
    ///
    /// Returns [`KillSwitchStoreError`] when `redis_url` cannot be parsed.
    pub fn new(redis_url: &str) -> Result<Self, KillSwitchStoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|err| KillSwitchStoreError::Unavailable(err.to_string()))?;
        Ok(Self { client, degraded: AtomicBool::new(false) })
    }

    /// Runs `op` against a fresh connection, retrying once on transport error.
    fn with_retry<T>(
        &self,
        op: impl Fn(&mut redis::Connection) -> Result<T, RedisError>,
    ) -> Result<T, KillSwitchStoreError> {
        let mut last_error = None;
        for _attempt in 0..MAX_ATTEMPTS {
            match self.client.get_connection() {
                Ok(mut connection) => match op(&mut connection) {
                    Ok(value) => {
                        self.note_success();
                        return Ok(value);
                    }
                    Err(error) => last_error = Some(error.to_string()),
                },
                Err(error) => last_error = Some(error.to_string()),
            }
        }
        self.degraded.store(true, Ordering::SeqCst);
        Err(KillSwitchStoreError::Unavailable(last_error.unwrap_or_else(|| "unknown error".to_string())))
    }

    /// Emits `health.recovered` the first time an operation succeeds after a
    /// prior operation exhausted its retry budget.
    fn note_success(&self) {
        if self.degraded.swap(false, Ordering::SeqCst) {
            tracing::info!(target: "agentgate::killswitch", "health.recovered");
        }
    }
}

impl KillSwitchStore for RedisKillSwitchStore {
    fn read(&self, scope: &KillSwitchScope) -> Result<Option<KillSwitchRow>, KillSwitchStoreError> {
        let key = format!("{KEY_PREFIX}{}", scope.store_key());
        let raw: Option<String> = self.with_retry(|connection| connection.get(&key))?;
        match raw {
            None => Ok(None),
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|err| KillSwitchStoreError::Unavailable(format!("corrupt kill-switch row: {err}"))),
        }
    }

    fn write(&self, row: &KillSwitchRow) -> Result<(), KillSwitchStoreError> {
        let key = format!("{KEY_PREFIX}{}", row.scope.store_key());
        let json = serde_json::to_string(row)
            .map_err(|err| KillSwitchStoreError::Unavailable(format!("cannot serialize kill-switch row: {err}")))?;
        self.with_retry(|connection| connection.set(&key, &json))
    }
}

#[cfg(test)]
mod tests {
    use super::RedisKillSwitchStore;
    use agentgate_core::KillSwitchScope;
    use agentgate_core::KillSwitchStore;
    use agentgate_core::KillSwitchStoreError;

    #[test]
    fn unreachable_host_surfaces_as_unavailable_after_retry() {
        let store = RedisKillSwitchStore::new("redis://127.0.0.1:1").expect("url parses");
        let result = store.write(&agentgate_core::KillSwitchRow {
            scope: KillSwitchScope::Global,
            active: true,
            set_at: agentgate_core::Timestamp::from_unix_millis(0),
            set_by: "test".to_string(),
            reason: "test".to_string(),
        });
        assert!(matches!(result, Err(KillSwitchStoreError::Unavailable(_))));
    }

    #[test]
    fn invalid_url_is_rejected_at_construction() {
        let result = RedisKillSwitchStore::new("not-a-url");
        assert!(result.is_err());
    }
}
