// crates/agentgate-core/src/model/evidence.rs
// ============================================================================
// Module: Evidence Archive
// Description: Exported, hash-chained bundle of trace events for one session.
// Purpose: Give auditors and incident responders a self-verifying artifact
//          that does not require trusting the gateway at inspection time.
// Dependencies: crate::{hashing, identifiers, time}, serde
// ============================================================================

//! ## Overview
//! The Evidence Exporter produces archives in one of three formats (spec
//! §4.7): `Structured` (machine-readable, the canonical form), `Rendered`
//! (human-readable transcript), and `Printable` (fixed-layout, for cases
//! where the archive may be printed or stored outside any tool). All three
//! carry the same `merkle_root` so a reader can confirm the archive is
//! complete against the Transparency Log's published checkpoint.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::hashing::HashDigest;
use crate::identifiers::SessionId;
use crate::identifiers::TenantId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Evidence Format
// ============================================================================

/// Export format for an evidence archive.
///
/// # Invariants
/// - All three formats are derived from the same underlying trace events and
///   carry the same `merkle_root`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceFormat {
    /// Machine-readable JSON, the canonical representation.
    Structured,
    /// Human-readable transcript suitable for a report attachment.
    Rendered,
    /// Fixed-layout representation suitable for offline storage or printing.
    Printable,
}

// ============================================================================
// SECTION: Evidence Archive
// ============================================================================

/// Exported, hash-chained bundle of trace events for one session.
///
/// # Invariants
/// - `merkle_root` is the root of a Merkle tree over the leaf hashes of
///   `event_count` consecutive trace events starting at `first_event_id`.
/// - An archive is immutable once exported; re-exporting the same session
///   range produces a byte-identical archive for the `Structured` format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceArchive {
    /// Session the archive was exported for.
    pub session_id: SessionId,
    /// Tenant the session is bound to.
    pub tenant_id: TenantId,
    /// Export format.
    pub format: EvidenceFormat,
    /// First event id included in the archive.
    pub first_event_id: u64,
    /// Number of trace events included in the archive.
    pub event_count: u64,
    /// Merkle root over the included events' leaf hashes.
    pub merkle_root: HashDigest,
    /// Timestamp the archive was generated.
    pub generated_at: Timestamp,
    /// Identity of the transparency-log checkpoint this archive can be
    /// verified against, when one had already been published.
    pub anchored_checkpoint: Option<HashDigest>,
}

impl EvidenceArchive {
    /// Returns `true` if the archive's event range is non-empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.event_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::EvidenceFormat;

    #[test]
    fn format_serializes_snake_case() {
        let json = serde_json::to_string(&EvidenceFormat::Printable).expect("serialize");
        assert_eq!(json, "\"printable\"");
    }
}
