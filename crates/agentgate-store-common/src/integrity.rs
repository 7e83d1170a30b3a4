// crates/agentgate-store-common/src/integrity.rs
// ============================================================================
// Module: Trace Event Integrity Hashing
// Description: Computes and verifies the integrity hash carried on every
//              TraceEvent.
// Purpose: Give both backends one canonical definition of "the hash of this
//          event", computed identically regardless of which SQL engine
//          persisted it.
// Dependencies: agentgate-core
// ============================================================================

//! The integrity hash on a [`TraceEvent`] covers every field except the hash
//! itself, over the event's canonical JSON form.

use agentgate_core::DEFAULT_HASH_ALGORITHM;
use agentgate_core::HashDigest;
use agentgate_core::TraceEvent;
use agentgate_core::hashing::HashError;
use agentgate_core::hashing::hash_canonical_json;

/// Computes the integrity hash for `event`, covering every field except
/// `integrity_hash` itself.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails.
pub fn compute_event_integrity_hash(event: &TraceEvent) -> Result<HashDigest, HashError> {
    let hashable = serde_json::json!({
        "event_id": event.event_id,
        "session_id": event.session_id,
        "tenant_id": event.tenant_id,
        "timestamp": event.timestamp,
        "kind": event.kind,
        "tool_name": event.tool_name,
        "decision": event.decision,
        "reason": event.reason,
        "policy_version": event.policy_version,
        "rate_limit_snapshot": event.rate_limit_snapshot,
        "payload": event.payload,
    });
    hash_canonical_json(DEFAULT_HASH_ALGORITHM, &hashable)
}

/// Returns whether `event.integrity_hash` matches the hash computed over its
/// other fields.
///
/// # Errors
///
/// Returns [`HashError`] when canonicalization fails; a computed mismatch is
/// `Ok(false)`, not an error.
pub fn verify_event_integrity_hash(event: &TraceEvent) -> Result<bool, HashError> {
    let expected = compute_event_integrity_hash(event)?;
    Ok(expected == event.integrity_hash)
}

#[cfg(test)]
mod tests {
    use super::compute_event_integrity_hash;
    use super::verify_event_integrity_hash;
    use agentgate_core::EventId;
    use agentgate_core::SessionId;
    use agentgate_core::TenantId;
    use agentgate_core::Timestamp;
    use agentgate_core::TraceEvent;
    use agentgate_core::TraceEventKind;
    use std::num::NonZeroU64;

    fn event_with_hash(hash: agentgate_core::HashDigest) -> TraceEvent {
        TraceEvent {
            event_id: EventId::FIRST,
            session_id: SessionId::new("s1"),
            tenant_id: TenantId::new(NonZeroU64::new(1).expect("non-zero")),
            timestamp: Timestamp::from_unix_millis(0),
            kind: TraceEventKind::ToolCall,
            tool_name: None,
            decision: None,
            reason: "observed".to_string(),
            policy_version: None,
            rate_limit_snapshot: None,
            payload: None,
            integrity_hash: hash,
        }
    }

    #[test]
    fn computed_hash_verifies_against_itself() {
        let placeholder = agentgate_core::HashDigest::new(agentgate_core::HashAlgorithm::Sha256, &[]);
        let event = event_with_hash(placeholder);
        let computed = compute_event_integrity_hash(&event).expect("hash computes");
        let stamped = event_with_hash(computed);
        assert!(verify_event_integrity_hash(&stamped).expect("verify"));
    }

    #[test]
    fn tampered_hash_fails_verification() {
        let placeholder = agentgate_core::HashDigest::new(agentgate_core::HashAlgorithm::Sha256, &[]);
        let event = event_with_hash(placeholder);
        assert!(!verify_event_integrity_hash(&event).expect("verify"));
    }
}
