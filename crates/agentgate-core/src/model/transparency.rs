// crates/agentgate-core/src/model/transparency.rs
// ============================================================================
// Module: Transparency Checkpoint
// Description: Periodically published root over all trace events to date.
// Purpose: Let a third party detect tampering or silent deletion without
//          trusting the gateway's own storage layer.
// Dependencies: crate::{hashing, time}, serde
// ============================================================================

//! ## Overview
//! The Transparency Log periodically computes a Merkle root over every trace
//! event appended since the prior checkpoint and publishes it, optionally
//! anchoring the root to an external medium. `tree_size` is the total
//! number of leaves the root commits to, which is what makes checkpoints
//! independently comparable for consistency proofs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::hashing::HashDigest;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Transparency Checkpoint
// ============================================================================

/// Periodically published root over all trace events to date.
///
/// # Invariants
/// - `tree_size` only grows between consecutive checkpoints; a consistency
///   proof must exist from any earlier checkpoint's root to a later one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransparencyCheckpoint {
    /// Monotonically increasing checkpoint sequence number.
    pub sequence: u64,
    /// Merkle root over all leaves up to `tree_size`.
    pub root: HashDigest,
    /// Total number of leaves committed to by `root`.
    pub tree_size: u64,
    /// Timestamp the checkpoint was computed.
    pub computed_at: Timestamp,
    /// Identifier of the external anchor this checkpoint was published to,
    /// when an anchor scheme is configured (e.g. a transaction id or object key).
    pub anchor_ref: Option<String>,
}

impl TransparencyCheckpoint {
    /// Returns `true` if `other` could be a valid successor to this checkpoint
    /// based on sequence and tree size alone (a necessary, not sufficient,
    /// condition; the actual consistency proof is checked by the Merkle tree
    /// logic in `crate::runtime`).
    #[must_use]
    pub const fn can_precede(&self, other: &Self) -> bool {
        other.sequence > self.sequence && other.tree_size >= self.tree_size
    }
}

#[cfg(test)]
mod tests {
    use super::TransparencyCheckpoint;
    use crate::hashing::HashAlgorithm;
    use crate::hashing::HashDigest;
    use crate::time::Timestamp;

    fn checkpoint(sequence: u64, tree_size: u64) -> TransparencyCheckpoint {
        TransparencyCheckpoint {
            sequence,
            root: HashDigest::new(HashAlgorithm::Sha256, b"root"),
            tree_size,
            computed_at: Timestamp::from_unix_millis(0),
            anchor_ref: None,
        }
    }

    #[test]
    fn later_sequence_with_equal_or_larger_tree_can_precede() {
        assert!(checkpoint(1, 10).can_precede(&checkpoint(2, 10)));
        assert!(checkpoint(1, 10).can_precede(&checkpoint(2, 20)));
    }

    #[test]
    fn shrinking_tree_size_cannot_succeed() {
        assert!(!checkpoint(1, 10).can_precede(&checkpoint(2, 5)));
    }

    #[test]
    fn non_increasing_sequence_cannot_succeed() {
        assert!(!checkpoint(2, 10).can_precede(&checkpoint(2, 20)));
    }
}
