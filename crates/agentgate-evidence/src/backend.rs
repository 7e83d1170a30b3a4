// crates/agentgate-evidence/src/backend.rs
// ============================================================================
// Module: Evidence Backend
// Description: The admin-surface persistence capability the exporter and
//              transparency log need beyond agentgate_core::TraceStore.
// Purpose: Let this crate stay generic over either Trace Store backend
//          without depending on agentgate-store-sqlite or
//          agentgate-store-postgres directly.
// Dependencies: agentgate-core, thiserror
// ============================================================================

//! ## Overview
//! `agentgate_core::TraceStore` is scoped to the gateway pipeline's
//! per-request needs and deliberately excludes evidence archives and
//! transparency checkpoints. `agentgate-gateway` wires a concrete backend
//! (`SqliteTraceStore` or `PostgresTraceStore`) into [`EvidenceBackend`] by
//! forwarding to that backend's own inherent `extra` methods and mapping its
//! backend-specific error into [`EvidenceStoreError`]; this crate never
//! depends on either backend crate.

use agentgate_core::EvidenceArchive;
use agentgate_core::HashDigest;
use agentgate_core::SessionId;
use agentgate_core::TraceStore;
use agentgate_core::TransparencyCheckpoint;

/// Error raised by an [`EvidenceBackend`] operation.
///
/// Wraps whatever backend-specific error the concrete store produced; the
/// backend's `Display` text is preserved, its type is not.
#[derive(Debug, thiserror::Error)]
#[error("evidence backend error: {0}")]
pub struct EvidenceStoreError(pub String);

/// Archival persistence the Evidence Exporter and Transparency Log need.
pub trait EvidenceBackend: TraceStore {
    /// Persists a write-once evidence archive record keyed by
    /// `(session_id, format, integrity_hash)`.
    ///
    /// # Errors
    ///
    /// Returns [`EvidenceStoreError`] on I/O failure.
    fn put_evidence_archive(&self, archive: &EvidenceArchive, integrity_hash: &HashDigest) -> Result<(), EvidenceStoreError>;

    /// Lists every evidence archive exported for a session, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`EvidenceStoreError`] on I/O failure.
    fn list_evidence_archives(&self, session_id: &SessionId) -> Result<Vec<EvidenceArchive>, EvidenceStoreError>;

    /// Persists a write-once transparency checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`EvidenceStoreError`] on I/O failure.
    fn put_transparency_checkpoint(
        &self,
        session_id: &SessionId,
        anchor_source: &str,
        checkpoint: &TransparencyCheckpoint,
    ) -> Result<(), EvidenceStoreError>;

    /// Reads the most recently published checkpoint for a session, if any.
    ///
    /// # Errors
    ///
    /// Returns [`EvidenceStoreError`] on I/O failure.
    fn latest_transparency_checkpoint(&self, session_id: &SessionId) -> Result<Option<TransparencyCheckpoint>, EvidenceStoreError>;
}
