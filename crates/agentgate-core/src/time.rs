// crates/agentgate-core/src/time.rs
// ============================================================================
// Module: AgentGate Time Model
// Description: Canonical timestamp representation for trace events and leases.
// Purpose: Provide a serializable, comparable timestamp independent of wall-clock reads.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! AgentGate timestamps are always supplied explicitly by the caller that
//! observed an event (the gateway worker, the kill-switch controller, the
//! rollout ticker) rather than read implicitly deep inside a component. This
//! keeps trace replay deterministic and keeps clock access at the edges,
//! where it can be mocked in tests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Unix-epoch millisecond timestamp used throughout AgentGate records.
///
/// # Invariants
/// - No validation is performed; monotonicity within a session is a caller
///   responsibility, enforced instead at the `event_id` layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Returns the elapsed milliseconds since `earlier`, or zero if `self`
    /// predates `earlier`.
    #[must_use]
    pub fn saturating_since(self, earlier: Self) -> u64 {
        u64::try_from(self.0.saturating_sub(earlier.0)).unwrap_or(0)
    }
}

/// Source of wall-clock time, injected so request handling stays testable.
///
/// # Invariants
/// - Implementations must return non-decreasing values under normal
///   operation; a brief backward step (NTP correction) is tolerated by
///   callers via `saturating_since`.
pub trait Clock: Send + Sync {
    /// Returns the current timestamp.
    fn now(&self) -> Timestamp;
}

/// System-clock implementation of [`Clock`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Timestamp::from_unix_millis(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::Clock;
    use super::SystemClock;
    use super::Timestamp;

    #[test]
    fn saturating_since_never_underflows() {
        let earlier = Timestamp::from_unix_millis(100);
        let later = Timestamp::from_unix_millis(40);
        assert_eq!(later.saturating_since(earlier), 0);
        assert_eq!(earlier.saturating_since(later), 60);
    }

    #[test]
    fn system_clock_is_positive() {
        assert!(SystemClock.now().as_unix_millis() > 0);
    }
}
