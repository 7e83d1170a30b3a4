// crates/agentgate-evidence/src/exporter.rs
// ============================================================================
// Module: Evidence Exporter
// Description: Produces signed, Merkle-proved audit artifacts for a session.
// Purpose: Give auditors a self-verifying artifact in one of three formats,
//          all derived from the same underlying trace events.
// Dependencies: agentgate-core
// ============================================================================

//! ## Overview
//! [`EvidenceExporter::export`] reads every trace event for a session, hashes
//! each as a Merkle leaf (`H(event_id ‖ canonical(event))`), builds the tree,
//! renders the requested [`EvidenceFormat`], and signs the rendered bytes
//! with the configured [`SigningScheme`]. The resulting [`EvidenceArchive`]
//! metadata row is persisted through [`EvidenceBackend`] before the artifact
//! is handed back to the caller, so a re-export of the same range is
//! byte-identical and a no-op against the write-once table.

use std::fmt::Write as _;
use std::sync::Arc;

use agentgate_core::Clock;
use agentgate_core::EventId;
use agentgate_core::EvidenceArchive;
use agentgate_core::EvidenceFormat;
use agentgate_core::HashDigest;
use agentgate_core::HashError;
use agentgate_core::InclusionProof;
use agentgate_core::MerkleTree;
use agentgate_core::SessionId;
use agentgate_core::SigningError;
use agentgate_core::SigningScheme;
use agentgate_core::TenantId;
use agentgate_core::TraceEvent;
use agentgate_core::TraceStore;
use agentgate_core::hashing::DEFAULT_HASH_ALGORITHM;
use agentgate_core::hashing::canonical_json_bytes;
use agentgate_core::hashing::hash_bytes;

use crate::backend::EvidenceBackend;
use crate::backend::EvidenceStoreError;

/// Page size used walking a session's trace events via
/// [`TraceStore::read_events`].
const READ_PAGE_SIZE: usize = 500;

/// Root published for a session with zero trace events, so an empty export
/// still has a well-defined `merkle_root` rather than requiring a special case.
const EMPTY_SESSION_ROOT_SEED: &[u8] = b"agentgate:evidence:empty-session";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised exporting an evidence archive.
#[derive(Debug, thiserror::Error)]
pub enum EvidenceExportError {
    /// Reading trace events or persisting the archive row failed.
    #[error("evidence store error: {0}")]
    Store(#[from] EvidenceStoreError),
    /// Signing the rendered artifact failed.
    #[error("evidence signing error: {0}")]
    Signing(#[from] SigningError),
    /// Canonicalizing an event for its leaf hash failed.
    #[error("evidence hashing error: {0}")]
    Hashing(#[from] HashError),
}

impl From<agentgate_core::StoreError> for EvidenceExportError {
    fn from(err: agentgate_core::StoreError) -> Self {
        Self::Store(EvidenceStoreError(err.to_string()))
    }
}

// ============================================================================
// SECTION: Output Types
// ============================================================================

/// Signature block written alongside an exported artifact.
#[derive(Debug, Clone)]
pub struct SignatureBlock {
    /// Algorithm identifier reported by the signing scheme.
    pub algorithm_id: &'static str,
    /// Raw signature bytes.
    pub signature: Vec<u8>,
}

/// One exported artifact: the persisted metadata row, the rendered body the
/// metadata's `integrity_hash` commits to, its signature, and a per-event
/// inclusion proof against `archive.merkle_root`.
#[derive(Debug, Clone)]
pub struct ExportedEvidence {
    /// Persisted archive metadata.
    pub archive: EvidenceArchive,
    /// Rendered artifact bytes in the requested format.
    pub body: Vec<u8>,
    /// Hash of `body`; this is the `integrity_hash` the archive row is keyed by.
    pub body_hash: HashDigest,
    /// Signature over `body`.
    pub signature: SignatureBlock,
    /// Per-event inclusion proof against `archive.merkle_root`, in event order.
    pub inclusion_proofs: Vec<(EventId, InclusionProof)>,
}

// ============================================================================
// SECTION: Evidence Exporter
// ============================================================================

/// Produces signed evidence archives from a session's trace events.
pub struct EvidenceExporter<Store, Signer> {
    store: Store,
    signer: Signer,
    clock: Arc<dyn Clock>,
}

impl<Store, Signer> EvidenceExporter<Store, Signer>
where
    Store: EvidenceBackend,
    Signer: SigningScheme,
{
    /// Creates an exporter over the given collaborators.
    pub const fn new(store: Store, signer: Signer, clock: Arc<dyn Clock>) -> Self {
        Self { store, signer, clock }
    }

    /// Exports every trace event recorded for `session_id` in `format`,
    /// signs the result, and persists its metadata row.
    ///
    /// # Errors
    ///
    /// Returns [`EvidenceExportError`] when reading events, rendering,
    /// signing, or persisting the archive row fails.
    pub fn export(
        &self,
        tenant_id: TenantId,
        session_id: &SessionId,
        format: EvidenceFormat,
    ) -> Result<ExportedEvidence, EvidenceExportError> {
        let events = self.read_all_events(tenant_id, session_id)?;

        let mut leaves = Vec::with_capacity(events.len());
        for event in &events {
            leaves.push(leaf_hash(event)?);
        }
        let tree = MerkleTree::build(DEFAULT_HASH_ALGORITHM, leaves);
        let merkle_root =
            tree.root().cloned().unwrap_or_else(|| hash_bytes(DEFAULT_HASH_ALGORITHM, EMPTY_SESSION_ROOT_SEED));

        let body = render(format, session_id, &merkle_root, &events)?;
        let body_hash = hash_bytes(DEFAULT_HASH_ALGORITHM, &body);
        let signature_bytes = self.signer.sign(&body)?;

        let archive = EvidenceArchive {
            session_id: session_id.clone(),
            tenant_id,
            format,
            first_event_id: events.first().map_or(0, |event| event.event_id.get()),
            event_count: u64::try_from(events.len()).unwrap_or(u64::MAX),
            merkle_root,
            generated_at: self.clock.now(),
            anchored_checkpoint: None,
        };
        self.store.put_evidence_archive(&archive, &body_hash)?;

        let inclusion_proofs = events
            .iter()
            .enumerate()
            .filter_map(|(index, event)| tree.prove(index).map(|proof| (event.event_id, proof)))
            .collect();

        Ok(ExportedEvidence {
            archive,
            body,
            body_hash,
            signature: SignatureBlock { algorithm_id: self.signer.algorithm_id(), signature: signature_bytes },
            inclusion_proofs,
        })
    }

    /// Returns every evidence archive previously exported for a session.
    ///
    /// # Errors
    ///
    /// Returns [`EvidenceExportError`] on store I/O failure.
    pub fn history(&self, session_id: &SessionId) -> Result<Vec<EvidenceArchive>, EvidenceExportError> {
        Ok(self.store.list_evidence_archives(session_id)?)
    }

    fn read_all_events(&self, tenant_id: TenantId, session_id: &SessionId) -> Result<Vec<TraceEvent>, EvidenceExportError> {
        Ok(read_all_events(&self.store, tenant_id, session_id)?)
    }
}

/// Walks a session's full event history through [`TraceStore::read_events`],
/// paginating in [`READ_PAGE_SIZE`]-sized chunks. Shared by the exporter and
/// the transparency log so both compute their Merkle root over the same
/// event sequence.
pub(crate) fn read_all_events(
    store: &impl TraceStore,
    tenant_id: TenantId,
    session_id: &SessionId,
) -> Result<Vec<TraceEvent>, agentgate_core::StoreError> {
    let mut events = Vec::new();
    let mut from = EventId::FIRST;
    loop {
        let page = store.read_events(tenant_id, session_id, from, READ_PAGE_SIZE)?;
        let page_len = page.len();
        let Some(last) = page.last() else {
            break;
        };
        let next = last.event_id.next();
        events.extend(page);
        if page_len < READ_PAGE_SIZE {
            break;
        }
        from = next;
    }
    Ok(events)
}

/// Computes a Merkle leaf hash `H(event_id ‖ canonical(event))`.
///
/// Shared with [`crate::transparency`] so the exporter's archive root and the
/// transparency log's checkpoint root are computed identically.
pub(crate) fn leaf_hash(event: &TraceEvent) -> Result<HashDigest, HashError> {
    let mut bytes = event.event_id.get().to_be_bytes().to_vec();
    bytes.extend(canonical_json_bytes(event)?);
    Ok(hash_bytes(DEFAULT_HASH_ALGORITHM, &bytes))
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

fn render(
    format: EvidenceFormat,
    session_id: &SessionId,
    merkle_root: &HashDigest,
    events: &[TraceEvent],
) -> Result<Vec<u8>, HashError> {
    match format {
        EvidenceFormat::Structured => render_structured(session_id, merkle_root, events),
        EvidenceFormat::Rendered => Ok(render_rendered(session_id, merkle_root, events)),
        EvidenceFormat::Printable => Ok(render_printable(session_id, merkle_root, events)),
    }
}

#[derive(serde::Serialize)]
struct StructuredExport<'a> {
    session_id: &'a SessionId,
    merkle_root: &'a HashDigest,
    event_count: usize,
    events: &'a [TraceEvent],
}

fn render_structured(session_id: &SessionId, merkle_root: &HashDigest, events: &[TraceEvent]) -> Result<Vec<u8>, HashError> {
    let export = StructuredExport { session_id, merkle_root, event_count: events.len(), events };
    canonical_json_bytes(&export)
}

fn render_rendered(session_id: &SessionId, merkle_root: &HashDigest, events: &[TraceEvent]) -> Vec<u8> {
    let mut out = String::new();
    let _ = writeln!(out, "AgentGate evidence transcript for session {session_id}");
    let _ = writeln!(out, "merkle root: {merkle_root}");
    let _ = writeln!(out, "{} event(s)", events.len());
    out.push('\n');
    for event in events {
        let _ = writeln!(
            out,
            "[{}] event {} kind={:?} tool={} decision={} reason={}",
            event.timestamp.as_unix_millis(),
            event.event_id.get(),
            event.kind,
            event.tool_name.as_ref().map_or("-", agentgate_core::ToolName::as_str),
            event.decision.map_or_else(|| "-".to_string(), |decision| format!("{decision:?}")),
            event.reason,
        );
    }
    out.into_bytes()
}

fn render_printable(session_id: &SessionId, merkle_root: &HashDigest, events: &[TraceEvent]) -> Vec<u8> {
    const RULE: &str = "--------------------------------------------------------------------------------";
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "AGENTGATE EVIDENCE ARCHIVE");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "session    : {session_id}");
    let _ = writeln!(out, "merkle root: {merkle_root}");
    let _ = writeln!(out, "event count: {}", events.len());
    let _ = writeln!(out, "{RULE}");
    for event in events {
        let _ = writeln!(out, "{:>8} | {:>13} | {:<10} | {}", event.event_id.get(), event.timestamp.as_unix_millis(), format!("{:?}", event.kind), event.reason);
    }
    let _ = writeln!(out, "{RULE}");
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::EvidenceExporter;
    use crate::backend::EvidenceBackend;
    use crate::backend::EvidenceStoreError;
    use crate::signing_hmac::HmacSigningScheme;
    use agentgate_core::Decision;
    use agentgate_core::EventId;
    use agentgate_core::EvidenceArchive;
    use agentgate_core::EvidenceFormat;
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
        events: Mutex<Vec<TraceEvent>>,
        archives: Mutex<Vec<(EvidenceArchive, HashDigest)>>,
    }

    impl FixtureStore {
        fn new(events: Vec<TraceEvent>) -> Self {
            Self { events: Mutex::new(events), archives: Mutex::new(Vec::new()) }
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
            let guard = self.events.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            Ok(guard.iter().filter(|event| event.event_id.get() >= from.get()).take(limit).cloned().collect())
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
        fn put_evidence_archive(&self, archive: &EvidenceArchive, integrity_hash: &HashDigest) -> Result<(), EvidenceStoreError> {
            self.archives.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push((archive.clone(), integrity_hash.clone()));
            Ok(())
        }

        fn list_evidence_archives(&self, _session_id: &SessionId) -> Result<Vec<EvidenceArchive>, EvidenceStoreError> {
            Ok(self.archives.lock().unwrap_or_else(std::sync::PoisonError::into_inner).iter().map(|(a, _)| a.clone()).collect())
        }

        fn put_transparency_checkpoint(
            &self,
            _session_id: &SessionId,
            _anchor_source: &str,
            _checkpoint: &TransparencyCheckpoint,
        ) -> Result<(), EvidenceStoreError> {
            Ok(())
        }

        fn latest_transparency_checkpoint(&self, _session_id: &SessionId) -> Result<Option<TransparencyCheckpoint>, EvidenceStoreError> {
            Ok(None)
        }
    }

    fn event(id: u64, reason: &str) -> TraceEvent {
        TraceEvent {
            event_id: EventId::from_raw(id).expect("nonzero"),
            session_id: SessionId::new("s1"),
            tenant_id: TenantId::new(NonZeroU64::new(1).expect("nonzero")),
            timestamp: Timestamp::from_unix_millis(i64::try_from(id).unwrap_or(0)),
            kind: TraceEventKind::Decision,
            tool_name: Some(agentgate_core::ToolName::new("search")),
            decision: Some(Decision::Allow),
            reason: reason.to_string(),
            policy_version: None,
            rate_limit_snapshot: None,
            payload: None,
            integrity_hash: hash_bytes(DEFAULT_HASH_ALGORITHM, reason.as_bytes()),
        }
    }

    #[test]
    fn export_structured_produces_a_verifiable_proof_per_event() {
        let events = vec![event(1, "ok"), event(2, "ok"), event(3, "throttled")];
        let store = FixtureStore::new(events);
        let signer = HmacSigningScheme::new(b"key".to_vec()).expect("key accepted");
        let exporter = EvidenceExporter::new(store, signer, Arc::new(SystemClock));
        let tenant = TenantId::new(NonZeroU64::new(1).expect("nonzero"));

        let exported = exporter.export(tenant, &SessionId::new("s1"), EvidenceFormat::Structured).expect("export");
        assert_eq!(exported.archive.event_count, 3);
        assert_eq!(exported.inclusion_proofs.len(), 3);
        for (_, proof) in &exported.inclusion_proofs {
            assert!(agentgate_core::MerkleTree::verify(DEFAULT_HASH_ALGORITHM, &exported.archive.merkle_root, proof));
        }
        assert!(exporter.history(&SessionId::new("s1")).expect("history").len() == 1);
    }

    #[test]
    fn empty_session_still_exports_with_a_stable_root() {
        let store = FixtureStore::new(Vec::new());
        let signer = HmacSigningScheme::new(b"key".to_vec()).expect("key accepted");
        let exporter = EvidenceExporter::new(store, signer, Arc::new(SystemClock));
        let tenant = TenantId::new(NonZeroU64::new(1).expect("nonzero"));

        let exported = exporter.export(tenant, &SessionId::new("s1"), EvidenceFormat::Rendered).expect("export");
        assert_eq!(exported.archive.event_count, 0);
        assert!(exported.inclusion_proofs.is_empty());
    }

    #[test]
    fn all_three_formats_share_the_same_merkle_root() {
        let events = vec![event(1, "ok")];
        let tenant = TenantId::new(NonZeroU64::new(1).expect("nonzero"));
        let mut roots = Vec::new();
        for format in [EvidenceFormat::Structured, EvidenceFormat::Rendered, EvidenceFormat::Printable] {
            let store = FixtureStore::new(events.clone());
            let signer = HmacSigningScheme::new(b"key".to_vec()).expect("key accepted");
            let exporter = EvidenceExporter::new(store, signer, Arc::new(SystemClock));
            let exported = exporter.export(tenant, &SessionId::new("s1"), format).expect("export");
            roots.push(exported.archive.merkle_root);
        }
        assert_eq!(roots[0], roots[1]);
        assert_eq!(roots[1], roots[2]);
    }
}
