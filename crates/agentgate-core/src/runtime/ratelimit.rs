// crates/agentgate-core/src/runtime/ratelimit.rs
// ============================================================================
// Module: Rate Limiter
// Description: Sliding-window request budget per (tenant, session, tool).
// Purpose: Enforce per-tuple call budgets and produce the snapshot persisted
//          alongside a decision event.
// Dependencies: crate::{identifiers, interfaces, model, time}
// ============================================================================

//! ## Overview
//! Budget bookkeeping (the sliding window itself) lives behind
//! [`crate::interfaces::RateLimitStore`]; this type only computes the key,
//! interprets the count the store returns, and renders the
//! `X-RateLimit-*`-equivalent snapshot.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::identifiers::SessionId;
use crate::identifiers::TenantId;
use crate::identifiers::ToolName;
use crate::interfaces::RateLimitStore;
use crate::interfaces::RateLimitStoreError;
use crate::model::RateLimitSnapshot;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while enforcing a rate-limit check.
#[derive(Debug, Error)]
pub enum RateLimiterError {
    /// The backing store was unreachable.
    #[error("rate limiter store unavailable: {0}")]
    Unavailable(#[from] RateLimitStoreError),
}

// ============================================================================
// SECTION: Verdict
// ============================================================================

/// Outcome of one rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitVerdict {
    /// The call is within budget.
    Allowed(RateLimitSnapshot),
    /// The budget for the current window is exhausted.
    Exceeded(RateLimitSnapshot),
}

// ============================================================================
// SECTION: Rate Limiter
// ============================================================================

/// Sliding-window limiter over a pluggable shared counter store.
pub struct RateLimiter<S> {
    /// Shared counter store.
    store: S,
    /// Window width in milliseconds.
    window_millis: u64,
}

impl<S: RateLimitStore> RateLimiter<S> {
    /// Creates a new rate limiter over `store` with the given window width.
    #[must_use]
    pub const fn new(store: S, window_millis: u64) -> Self {
        Self { store, window_millis }
    }

    /// Checks and records one call against the budget for
    /// `(tenant_id, session_id, tool_name)`, returning the resulting verdict.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimiterError`] when the backing store is unreachable.
    pub fn check(
        &self,
        tenant_id: TenantId,
        session_id: &SessionId,
        tool_name: &ToolName,
        limit: u32,
        now: Timestamp,
    ) -> Result<RateLimitVerdict, RateLimiterError> {
        let key = format!("{tenant_id}:{session_id}:{tool_name}");
        let count = self.store.record_and_count(&key, now, self.window_millis)?;
        let reset_at = Timestamp::from_unix_millis(
            now.as_unix_millis().saturating_add(i64::try_from(self.window_millis).unwrap_or(i64::MAX)),
        );
        let remaining = limit.saturating_sub(count);
        let snapshot = RateLimitSnapshot { limit, remaining, reset_at };
        if count > limit { Ok(RateLimitVerdict::Exceeded(snapshot)) } else { Ok(RateLimitVerdict::Allowed(snapshot)) }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::RateLimitVerdict;
    use super::RateLimiter;
    use crate::interfaces::RateLimitStore;
    use crate::interfaces::RateLimitStoreError;
    use crate::time::Timestamp;

    struct FixedCounterStore {
        counts: RefCell<HashMap<String, u32>>,
    }

    impl RateLimitStore for FixedCounterStore {
        fn record_and_count(
            &self,
            key: &str,
            _now: Timestamp,
            _window_millis: u64,
        ) -> Result<u32, RateLimitStoreError> {
            let mut counts = self.counts.borrow_mut();
            let entry = counts.entry(key.to_string()).or_insert(0);
            *entry += 1;
            Ok(*entry)
        }
    }

    #[test]
    fn budget_exhaustion_flips_verdict_to_exceeded() {
        let limiter = RateLimiter::new(FixedCounterStore { counts: RefCell::new(HashMap::new()) }, 60_000);
        let tenant = crate::identifiers::TenantId::from_raw(1).expect("non-zero");
        let session = crate::identifiers::SessionId::new("s1");
        let tool = crate::identifiers::ToolName::new("db_query");
        let now = Timestamp::from_unix_millis(0);

        for _ in 0..3 {
            let verdict = limiter.check(tenant, &session, &tool, 3, now).expect("check");
            assert!(matches!(verdict, RateLimitVerdict::Allowed(_)));
        }
        let verdict = limiter.check(tenant, &session, &tool, 3, now).expect("check");
        assert!(matches!(verdict, RateLimitVerdict::Exceeded(_)));
    }
}
