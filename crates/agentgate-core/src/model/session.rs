// crates/agentgate-core/src/model/session.rs
// ============================================================================
// Module: Session
// Description: Logical conversation between one agent and the gateway.
// Purpose: Bind a session to exactly one tenant for its lifetime and carry
//          its retention / legal-hold posture.
// Dependencies: crate::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! A session is bound to exactly one tenant for its lifetime.
//! Once `legal_hold` is set, neither the session nor
//! any of its trace events may be deleted. The Trace Store enforces this at
//! the storage layer, but the flag itself lives on this type so every
//! component can reason about it without a store round trip.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::SessionId;
use crate::identifiers::TenantId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Retention Policy
// ============================================================================

/// Retention posture for a session.
///
/// # Invariants
/// - `legal_hold = true` overrides `deadline`: the session is never purged
///   regardless of how far in the past `deadline` lies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Optional deadline after which the session becomes eligible for purge.
    pub deadline: Option<Timestamp>,
    /// Legal hold flag; blocks deletion and purge unconditionally.
    pub legal_hold: bool,
}

impl RetentionPolicy {
    /// The default retention policy: no deadline, no hold.
    #[must_use]
    pub const fn unset() -> Self {
        Self { deadline: None, legal_hold: false }
    }

    /// Returns whether a session under this policy is eligible for purge at `now`.
    #[must_use]
    pub fn is_purge_eligible(self, now: Timestamp) -> bool {
        if self.legal_hold {
            return false;
        }
        match self.deadline {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// Logical conversation between one agent and the gateway.
///
/// # Invariants
/// - `tenant_id` is set on first call and is immutable thereafter; a second
///   bind attempt to a different tenant must fail with `tenant_conflict`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque, unique session identifier.
    pub session_id: SessionId,
    /// Tenant the session is bound to.
    pub tenant_id: TenantId,
    /// Session creation timestamp.
    pub created_at: Timestamp,
    /// Retention policy and legal-hold flag.
    pub retention: RetentionPolicy,
}

impl Session {
    /// Creates a new session bound to `tenant_id` at `created_at`, with no
    /// retention deadline and no legal hold.
    #[must_use]
    pub fn new(session_id: SessionId, tenant_id: TenantId, created_at: Timestamp) -> Self {
        Self { session_id, tenant_id, created_at, retention: RetentionPolicy::unset() }
    }

    /// Validates that `candidate_tenant` matches the session's bound tenant.
    ///
    /// # Errors
    ///
    /// Returns `Err(())` when the session is already bound to a different
    /// tenant; the caller maps this to `FailureKind::TenantConflict`.
    pub fn check_tenant(&self, candidate_tenant: TenantId) -> Result<(), ()> {
        if self.tenant_id == candidate_tenant { Ok(()) } else { Err(()) }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use super::RetentionPolicy;
    use super::Session;
    use crate::identifiers::SessionId;
    use crate::identifiers::TenantId;
    use crate::time::Timestamp;

    fn tenant(n: u64) -> TenantId {
        TenantId::new(NonZeroU64::new(n).expect("non-zero"))
    }

    #[test]
    fn tenant_binding_is_immutable() {
        let session = Session::new(SessionId::new("s1"), tenant(1), Timestamp::from_unix_millis(0));
        assert!(session.check_tenant(tenant(1)).is_ok());
        assert!(session.check_tenant(tenant(2)).is_err());
    }

    #[test]
    fn legal_hold_blocks_purge_regardless_of_deadline() {
        let policy = RetentionPolicy {
            deadline: Some(Timestamp::from_unix_millis(0)),
            legal_hold: true,
        };
        assert!(!policy.is_purge_eligible(Timestamp::from_unix_millis(1_000_000)));
    }

    #[test]
    fn purge_eligible_only_after_deadline() {
        let policy = RetentionPolicy { deadline: Some(Timestamp::from_unix_millis(100)), legal_hold: false };
        assert!(!policy.is_purge_eligible(Timestamp::from_unix_millis(50)));
        assert!(policy.is_purge_eligible(Timestamp::from_unix_millis(100)));
    }
}
