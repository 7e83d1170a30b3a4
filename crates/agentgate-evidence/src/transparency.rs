// crates/agentgate-evidence/src/transparency.rs
// ============================================================================
// Module: Transparency Log
// Description: Periodic, optionally externally anchored Merkle checkpoints.
// Purpose: Let a third party detect tampering or silent deletion of trace
//          history without trusting the gateway's own storage layer.
// Dependencies: agentgate-core
// ============================================================================

//! ## Overview
//! [`TransparencyLog::checkpoint`] computes a Merkle root over every trace
//! event recorded for a session so far, using the same leaf-hash rule as the
//! Evidence Exporter, and persists it as a [`TransparencyCheckpoint`] through
//! [`EvidenceBackend`]. When an anchor URL is supplied its scheme is checked
//! against a deployment allowlist and fails closed on any scheme the
//! allowlist does not name.

use agentgate_core::Clock;
use agentgate_core::EventId;
use agentgate_core::HashDigest;
use agentgate_core::InclusionProof;
use agentgate_core::MerkleTree;
use agentgate_core::SessionId;
use agentgate_core::TenantId;
use agentgate_core::TransparencyCheckpoint;
use agentgate_core::hashing::DEFAULT_HASH_ALGORITHM;
use std::sync::Arc;

use crate::backend::EvidenceBackend;
use crate::backend::EvidenceStoreError;
use crate::exporter::leaf_hash;
use crate::exporter::read_all_events;

/// Anchor source recorded for a checkpoint that was not externally anchored.
const UNANCHORED_SOURCE: &str = "none";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised computing or persisting a transparency checkpoint.
#[derive(Debug, thiserror::Error)]
pub enum TransparencyError {
    /// Reading events or persisting the checkpoint failed.
    #[error("evidence store error: {0}")]
    Store(#[from] EvidenceStoreError),
    /// Hashing a trace event for its Merkle leaf failed.
    #[error("evidence hashing error: {0}")]
    Hashing(#[from] agentgate_core::HashError),
    /// The anchor URL's scheme is not in the configured allowlist.
    #[error("anchor scheme '{0}' is not allowlisted")]
    DisallowedAnchorScheme(String),
    /// The anchor URL has no recognizable `scheme://` prefix.
    #[error("anchor url '{0}' has no scheme")]
    MalformedAnchorUrl(String),
}

impl From<agentgate_core::StoreError> for TransparencyError {
    fn from(err: agentgate_core::StoreError) -> Self {
        Self::Store(EvidenceStoreError(err.to_string()))
    }
}

// ============================================================================
// SECTION: Output Types
// ============================================================================

/// A freshly computed checkpoint together with an inclusion proof for every
/// event it commits to, in event order.
#[derive(Debug, Clone)]
pub struct CheckpointedRoot {
    /// The persisted checkpoint row.
    pub checkpoint: TransparencyCheckpoint,
    /// Per-event inclusion proofs against `checkpoint.root`.
    pub inclusion_proofs: Vec<(EventId, InclusionProof)>,
}

// ============================================================================
// SECTION: Transparency Log
// ============================================================================

/// Computes and persists periodic Merkle checkpoints over a session's trace history.
pub struct TransparencyLog<Store> {
    store: Store,
    allowed_anchor_schemes: Vec<String>,
    clock: Arc<dyn Clock>,
}

impl<Store> TransparencyLog<Store>
where
    Store: EvidenceBackend,
{
    /// Creates a transparency log over the given backend, restricting anchor
    /// URLs to schemes already validated at config load time.
    pub const fn new(store: Store, allowed_anchor_schemes: Vec<String>, clock: Arc<dyn Clock>) -> Self {
        Self { store, allowed_anchor_schemes, clock }
    }

    /// Computes a checkpoint over every event recorded for `session_id` so
    /// far and persists it. When `anchor_url` is `Some`, its scheme must be
    /// present in the configured allowlist or the call fails closed without
    /// writing anything.
    ///
    /// # Errors
    ///
    /// Returns [`TransparencyError`] when reading events, validating the
    /// anchor scheme, or persisting the checkpoint fails.
    pub fn checkpoint(
        &self,
        tenant_id: TenantId,
        session_id: &SessionId,
        anchor_url: Option<&str>,
    ) -> Result<CheckpointedRoot, TransparencyError> {
        let anchor_source = match anchor_url {
            Some(url) => self.validate_anchor_scheme(url)?,
            None => UNANCHORED_SOURCE.to_string(),
        };

        let events = read_all_events(&self.store, tenant_id, session_id)?;
        let mut leaves = Vec::with_capacity(events.len());
        for event in &events {
            leaves.push(leaf_hash(event)?);
        }
        let tree = MerkleTree::build(DEFAULT_HASH_ALGORITHM, leaves);
        let root = tree.root().cloned().unwrap_or_else(|| empty_root());

        let prior = self.store.latest_transparency_checkpoint(session_id)?;
        let sequence = prior.as_ref().map_or(0, |checkpoint| checkpoint.sequence + 1);

        let checkpoint = TransparencyCheckpoint {
            sequence,
            root,
            tree_size: u64::try_from(events.len()).unwrap_or(u64::MAX),
            computed_at: self.clock.now(),
            anchor_ref: anchor_url.map(str::to_string),
        };

        self.store.put_transparency_checkpoint(session_id, &anchor_source, &checkpoint)?;

        let inclusion_proofs = events
            .iter()
            .enumerate()
            .filter_map(|(index, event)| tree.prove(index).map(|proof| (event.event_id, proof)))
            .collect();

        Ok(CheckpointedRoot { checkpoint, inclusion_proofs })
    }

    /// Returns the most recently published checkpoint for a session, if any.
    ///
    /// # Errors
    ///
    /// Returns [`TransparencyError`] on store I/O failure.
    pub fn latest(&self, session_id: &SessionId) -> Result<Option<TransparencyCheckpoint>, TransparencyError> {
        Ok(self.store.latest_transparency_checkpoint(session_id)?)
    }

    fn validate_anchor_scheme(&self, anchor_url: &str) -> Result<String, TransparencyError> {
        let scheme = anchor_url
            .split_once("://")
            .map(|(scheme, _)| scheme)
            .ok_or_else(|| TransparencyError::MalformedAnchorUrl(anchor_url.to_string()))?;
        if self.allowed_anchor_schemes.iter().any(|allowed| allowed == scheme) {
            Ok(scheme.to_string())
        } else {
            Err(TransparencyError::DisallowedAnchorScheme(scheme.to_string()))
        }
    }
}

/// Root published for a session with zero trace events, kept distinct from
/// [`crate::exporter`]'s empty-session seed so the two artifacts never
/// coincidentally collide.
fn empty_root() -> HashDigest {
    agentgate_core::hashing::hash_bytes(DEFAULT_HASH_ALGORITHM, b"agentgate:transparency:empty-session")
}

#[cfg(test)]
mod tests {
    use super::TransparencyError;
    use super::TransparencyLog;
    use crate::backend::EvidenceBackend;
    use crate::backend::EvidenceStoreError;
    use agentgate_core::Decision;
    use agentgate_core::EventId;
    use agentgate_core::EvidenceArchive;
    use agentgate_core::HashDigest;
    use agentgate_core::Session;
    use agentgate_core::SessionId;
    use agentgate_core::StoreError;
    use agentgate_core::SystemClock;
    use agentgate_core::TenantId;
    use agentgate_core::Timestamp;
    use agentgate_core::TraceEvent;
    use agentgate_core::TraceEventKind;
    use agentgate_core::TraceStore;
    use agentgate_core::TransparencyCheckpoint;
    use agentgate_core::hashing::DEFAULT_HASH_ALGORITHM;
    use agentgate_core::hashing::hash_bytes;
    use std::num::NonZeroU64;
    use std::sync::Arc;
    use std::sync::Mutex;

    struct FixtureStore {
        events: Vec<TraceEvent>,
        checkpoints: Mutex<Vec<(String, TransparencyCheckpoint)>>,
    }

    impl FixtureStore {
        fn new(events: Vec<TraceEvent>) -> Self {
            Self { events, checkpoints: Mutex::new(Vec::new()) }
        }
    }

    impl TraceStore for FixtureStore {
        fn load_session(&self, _tenant_id: TenantId, _session_id: &SessionId) -> Result<Option<Session>, StoreError> {
            Ok(None)
        }

        fn bind_session(&self, _session: &Session) -> Result<(), StoreError> {
            Ok(())
        }

        fn append_event(&self, _event: &TraceEvent) -> Result<EventId, StoreError> {
            Err(StoreError::Io("not used in this fixture".to_string()))
        }

        fn read_events(
            &self,
            _tenant_id: TenantId,
            _session_id: &SessionId,
            from: EventId,
            limit: usize,
        ) -> Result<Vec<TraceEvent>, StoreError> {
            Ok(self.events.iter().filter(|event| event.event_id.get() >= from.get()).take(limit).cloned().collect())
        }

        fn active_incident(&self, _session_id: &SessionId) -> Result<Option<agentgate_core::Incident>, StoreError> {
            Ok(None)
        }

        fn upsert_incident(&self, _incident: &agentgate_core::Incident) -> Result<(), StoreError> {
            Ok(())
        }

        fn delete_session(&self, _tenant_id: TenantId, _session_id: &SessionId) -> Result<(), StoreError> {
            Ok(())
        }

        fn set_retention(
            &self,
            _tenant_id: TenantId,
            _session_id: &SessionId,
            _retention: agentgate_core::RetentionPolicy,
        ) -> Result<(), StoreError> {
            Ok(())
        }

        fn purge_expired(&self, _before: Timestamp) -> Result<u64, StoreError> {
            Ok(0)
        }
    }

    impl EvidenceBackend for FixtureStore {
        fn put_evidence_archive(&self, _archive: &EvidenceArchive, _integrity_hash: &HashDigest) -> Result<(), EvidenceStoreError> {
            Ok(())
        }

        fn list_evidence_archives(&self, _session_id: &SessionId) -> Result<Vec<EvidenceArchive>, EvidenceStoreError> {
            Ok(Vec::new())
        }

        fn put_transparency_checkpoint(
            &self,
            _session_id: &SessionId,
            anchor_source: &str,
            checkpoint: &TransparencyCheckpoint,
        ) -> Result<(), EvidenceStoreError> {
            self.checkpoints
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push((anchor_source.to_string(), checkpoint.clone()));
            Ok(())
        }

        fn latest_transparency_checkpoint(&self, _session_id: &SessionId) -> Result<Option<TransparencyCheckpoint>, EvidenceStoreError> {
            Ok(self.checkpoints.lock().unwrap_or_else(std::sync::PoisonError::into_inner).last().map(|(_, checkpoint)| checkpoint.clone()))
        }
    }

    fn event(id: u64) -> TraceEvent {
        TraceEvent {
            event_id: EventId::from_raw(id).expect("nonzero"),
            session_id: SessionId::new("s1"),
            tenant_id: TenantId::new(NonZeroU64::new(1).expect("nonzero")),
            timestamp: Timestamp::from_unix_millis(i64::try_from(id).unwrap_or(0)),
            kind: TraceEventKind::Decision,
            tool_name: None,
            decision: Some(Decision::Allow),
            reason: "ok".to_string(),
            policy_version: None,
            rate_limit_snapshot: None,
            payload: None,
            integrity_hash: hash_bytes(DEFAULT_HASH_ALGORITHM, b"ok"),
        }
    }

    fn tenant() -> TenantId {
        TenantId::new(NonZeroU64::new(1).expect("nonzero"))
    }

    #[test]
    fn unanchored_checkpoint_starts_at_sequence_zero() {
        let store = FixtureStore::new(vec![event(1), event(2)]);
        let log = TransparencyLog::new(store, Vec::new(), Arc::new(SystemClock));
        let checkpointed = log.checkpoint(tenant(), &SessionId::new("s1"), None).expect("checkpoint");
        assert_eq!(checkpointed.checkpoint.sequence, 0);
        assert_eq!(checkpointed.checkpoint.tree_size, 2);
        assert!(checkpointed.checkpoint.anchor_ref.is_none());
        assert_eq!(checkpointed.inclusion_proofs.len(), 2);
    }

    #[test]
    fn sequence_advances_across_successive_checkpoints() {
        let store = FixtureStore::new(vec![event(1)]);
        let log = TransparencyLog::new(store, Vec::new(), Arc::new(SystemClock));
        let session_id = SessionId::new("s1");
        let first = log.checkpoint(tenant(), &session_id, None).expect("checkpoint");
        let second = log.checkpoint(tenant(), &session_id, None).expect("checkpoint");
        assert_eq!(first.checkpoint.sequence, 0);
        assert_eq!(second.checkpoint.sequence, 1);
    }

    #[test]
    fn anchor_scheme_outside_allowlist_fails_closed() {
        let store = FixtureStore::new(vec![event(1)]);
        let log = TransparencyLog::new(store, vec!["s3".to_string()], Arc::new(SystemClock));
        let result = log.checkpoint(tenant(), &SessionId::new("s1"), Some("https://example.invalid/anchor"));
        assert!(matches!(result, Err(TransparencyError::DisallowedAnchorScheme(scheme)) if scheme == "https"));
    }

    #[test]
    fn allowlisted_anchor_scheme_is_persisted() {
        let store = FixtureStore::new(vec![event(1)]);
        let log = TransparencyLog::new(store, vec!["s3".to_string()], Arc::new(SystemClock));
        let checkpointed = log.checkpoint(tenant(), &SessionId::new("s1"), Some("s3://bucket/key")).expect("checkpoint");
        assert_eq!(checkpointed.checkpoint.anchor_ref.as_deref(), Some("s3://bucket/key"));
    }

    #[test]
    fn malformed_anchor_url_is_rejected() {
        let store = FixtureStore::new(vec![event(1)]);
        let log = TransparencyLog::new(store, vec!["s3".to_string()], Arc::new(SystemClock));
        let result = log.checkpoint(tenant(), &SessionId::new("s1"), Some("not-a-url"));
        assert!(matches!(result, Err(TransparencyError::MalformedAnchorUrl(_))));
    }

    #[test]
    fn empty_session_still_checkpoints() {
        let store = FixtureStore::new(Vec::new());
        let log = TransparencyLog::new(store, Vec::new(), Arc::new(SystemClock));
        let checkpointed = log.checkpoint(tenant(), &SessionId::new("s1"), None).expect("checkpoint");
        assert_eq!(checkpointed.checkpoint.tree_size, 0);
        assert!(checkpointed.inclusion_proofs.is_empty());
    }
}
