// crates/agentgate-credential-broker/src/inert.rs
// ============================================================================
// Module: Inert Stub Broker
// Description: No-op CredentialBroker that never reaches an external system.
// Purpose: Let a deployment run the full gateway pipeline without a real
//          credential backend, for local development and pipeline tests.
// Dependencies: agentgate-core
// ============================================================================

//! ## Overview
//! [`InertStubBroker`] synthesizes credential material locally and never
//! performs network I/O. `issue` always succeeds; `revoke`/`revoke_session`
//! are no-ops that still satisfy the idempotent-revoke invariant. It exists
//! for deployments where tool invocation itself enforces authorization out
//! of band, so the gateway's own credential step is a pass-through.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use agentgate_core::BrokerError;
use agentgate_core::Clock;
use agentgate_core::CredentialBroker;
use agentgate_core::CredentialId;
use agentgate_core::IssuedCredential;
use agentgate_core::SessionId;
use agentgate_core::ToolName;

// ============================================================================
// SECTION: Inert Stub Broker
// ============================================================================

/// [`CredentialBroker`] that issues locally synthesized, unenforced material.
pub struct InertStubBroker {
    /// Clock used to compute `expires_at` from the requested TTL.
    clock: Arc<dyn Clock>,
    /// Monotonic counter giving each issued credential a unique id.
    issued: AtomicU64,
}

impl InertStubBroker {
    /// Creates a stub broker backed by `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, issued: AtomicU64::new(0) }
    }
}

impl CredentialBroker for InertStubBroker {
    fn issue(
        &self,
        session_id: &SessionId,
        tool_name: &ToolName,
        ttl_millis: u64,
    ) -> Result<IssuedCredential, BrokerError> {
        let sequence = self.issued.fetch_add(1, Ordering::Relaxed);
        let now = self.clock.now();
        let expires_at = agentgate_core::Timestamp::from_unix_millis(
            now.as_unix_millis().saturating_add(i64::try_from(ttl_millis).unwrap_or(i64::MAX)),
        );
        tracing::debug!(
            target: "agentgate::credential_broker",
            session_id = %session_id,
            tool_name = %tool_name,
            "issuing stub credential"
        );
        Ok(IssuedCredential {
            credential_id: CredentialId::new(format!("stub-{sequence}")),
            material: format!("stub:{session_id}:{tool_name}"),
            expires_at,
        })
    }

    fn revoke(&self, _credential_id: &CredentialId, _reason: &str) -> Result<(), BrokerError> {
        Ok(())
    }

    fn revoke_session(&self, _session_id: &SessionId, _reason: &str) -> Result<(), BrokerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::InertStubBroker;
    use agentgate_core::CredentialBroker;
    use agentgate_core::SessionId;
    use agentgate_core::SystemClock;
    use agentgate_core::ToolName;
    use std::sync::Arc;

    #[test]
    fn issue_succeeds_and_revoke_is_idempotent() {
        let broker = InertStubBroker::new(Arc::new(SystemClock));
        let session_id = SessionId::new("s1");
        let tool_name = ToolName::new("search");
        let credential = broker.issue(&session_id, &tool_name, 60_000).expect("issues");
        broker.revoke(&credential.credential_id, "done").expect("first revoke");
        broker.revoke(&credential.credential_id, "done").expect("second revoke is a no-op");
    }

    #[test]
    fn each_issue_gets_a_distinct_credential_id() {
        let broker = InertStubBroker::new(Arc::new(SystemClock));
        let session_id = SessionId::new("s1");
        let tool_name = ToolName::new("search");
        let first = broker.issue(&session_id, &tool_name, 1_000).expect("issues");
        let second = broker.issue(&session_id, &tool_name, 1_000).expect("issues");
        assert_ne!(first.credential_id, second.credential_id);
    }

    #[test]
    fn revoke_session_never_fails() {
        let broker = InertStubBroker::new(Arc::new(SystemClock));
        broker.revoke_session(&SessionId::new("s1"), "containment").expect("no-op succeeds");
    }
}
