// crates/agentgate-core/src/runtime/merkle.rs
// ============================================================================
// Module: Merkle Tree
// Description: Binary Merkle tree over a session's trace event leaf hashes.
// Purpose: Produce a verifiable root and per-event inclusion proofs for the
//          transparency log and evidence exporter.
// Dependencies: crate::hashing
// ============================================================================

//! ## Overview
//! For a session with events `e_1 .. e_n`, the leaf hash is
//! `H(event_id || canonical(e))`. The tree duplicates the last leaf at odd
//! levels so every level has an even number of nodes.
//! Construction and proof generation are pure functions of the leaf hashes;
//! this module performs no I/O.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::hashing::HashAlgorithm;
use crate::hashing::HashDigest;
use crate::hashing::hash_pair;

// ============================================================================
// SECTION: Proof Step
// ============================================================================

/// One sibling hash consumed while walking an inclusion proof from a leaf to
/// the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofStep {
    /// Sibling hash at this level.
    pub sibling: HashDigest,
    /// Whether the sibling is the left node (the proved node is on the right).
    pub sibling_is_left: bool,
}

// ============================================================================
// SECTION: Inclusion Proof
// ============================================================================

/// Path of sibling hashes from one leaf to the tree root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionProof {
    /// Index of the proved leaf within the original (pre-duplication) leaf list.
    pub leaf_index: usize,
    /// Leaf hash being proved.
    pub leaf_hash: HashDigest,
    /// Sibling path from the leaf level up to (excluding) the root.
    pub steps: Vec<ProofStep>,
}

// ============================================================================
// SECTION: Merkle Tree
// ============================================================================

/// Binary Merkle tree with last-leaf duplication on odd levels.
///
/// # Invariants
/// - `root()` over an empty leaf set returns `None`; callers must not publish
///   a checkpoint for zero events.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// Hash algorithm used throughout the tree.
    algorithm: HashAlgorithm,
    /// Levels of the tree, level 0 is the (possibly duplicated) leaf layer.
    levels: Vec<Vec<HashDigest>>,
    /// Number of leaves before duplication was applied.
    leaf_count: usize,
}

impl MerkleTree {
    /// Builds a tree over `leaves`, given in event order.
    #[must_use]
    pub fn build(algorithm: HashAlgorithm, leaves: Vec<HashDigest>) -> Self {
        let leaf_count = leaves.len();
        let mut levels = Vec::new();
        if leaves.is_empty() {
            return Self { algorithm, levels, leaf_count };
        }
        levels.push(leaves);
        while levels.last().is_some_and(|level| level.len() > 1) {
            let current = levels.last().expect("checked non-empty above");
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            let mut i = 0;
            while i < current.len() {
                let left = &current[i];
                let right = if i + 1 < current.len() { &current[i + 1] } else { left };
                next.push(hash_pair(algorithm, left, right));
                i += 2;
            }
            levels.push(next);
        }
        Self { algorithm, levels, leaf_count }
    }

    /// Returns the root hash, or `None` for an empty tree.
    #[must_use]
    pub fn root(&self) -> Option<&HashDigest> {
        self.levels.last().and_then(|level| level.first())
    }

    /// Returns the number of leaves the tree was built over, before any
    /// last-leaf duplication.
    #[must_use]
    pub const fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Produces an inclusion proof for the leaf at `leaf_index`.
    ///
    /// Returns `None` if `leaf_index` is out of range.
    #[must_use]
    pub fn prove(&self, leaf_index: usize) -> Option<InclusionProof> {
        if leaf_index >= self.leaf_count {
            return None;
        }
        let leaf_hash = self.levels.first()?.get(leaf_index)?.clone();
        let mut steps = Vec::new();
        let mut index = leaf_index;
        for level in &self.levels[..self.levels.len().saturating_sub(1)] {
            let sibling_index = if index % 2 == 0 { index + 1 } else { index - 1 };
            let sibling_is_left = index % 2 == 1;
            let sibling = level.get(sibling_index).or_else(|| level.get(index))?.clone();
            steps.push(ProofStep { sibling, sibling_is_left });
            index /= 2;
        }
        Some(InclusionProof { leaf_index, leaf_hash, steps })
    }

    /// Verifies `proof` against `root` using `algorithm`.
    #[must_use]
    pub fn verify(algorithm: HashAlgorithm, root: &HashDigest, proof: &InclusionProof) -> bool {
        let mut current = proof.leaf_hash.clone();
        for step in &proof.steps {
            current = if step.sibling_is_left {
                hash_pair(algorithm, &step.sibling, &current)
            } else {
                hash_pair(algorithm, &current, &step.sibling)
            };
        }
        &current == root
    }
}

#[cfg(test)]
mod tests {
    use super::MerkleTree;
    use crate::hashing::DEFAULT_HASH_ALGORITHM;
    use crate::hashing::hash_bytes;

    fn leaves(n: usize) -> Vec<crate::hashing::HashDigest> {
        (0..n).map(|i| hash_bytes(DEFAULT_HASH_ALGORITHM, format!("event-{i}").as_bytes())).collect()
    }

    #[test]
    fn empty_tree_has_no_root() {
        let tree = MerkleTree::build(DEFAULT_HASH_ALGORITHM, Vec::new());
        assert!(tree.root().is_none());
    }

    #[test]
    fn single_leaf_root_equals_leaf_hash() {
        let leaf_hashes = leaves(1);
        let tree = MerkleTree::build(DEFAULT_HASH_ALGORITHM, leaf_hashes.clone());
        assert_eq!(tree.root(), Some(&leaf_hashes[0]));
    }

    #[test]
    fn every_leaf_proves_inclusion_for_odd_and_even_counts() {
        for count in [1, 2, 3, 5, 8] {
            let tree = MerkleTree::build(DEFAULT_HASH_ALGORITHM, leaves(count));
            let root = tree.root().expect("non-empty tree has a root").clone();
            for index in 0..count {
                let proof = tree.prove(index).expect("leaf index in range");
                assert!(
                    MerkleTree::verify(DEFAULT_HASH_ALGORITHM, &root, &proof),
                    "proof for leaf {index} of {count} failed to verify"
                );
            }
        }
    }

    #[test]
    fn tampered_leaf_hash_fails_verification() {
        let tree = MerkleTree::build(DEFAULT_HASH_ALGORITHM, leaves(4));
        let root = tree.root().expect("non-empty tree has a root").clone();
        let mut proof = tree.prove(2).expect("leaf index in range");
        proof.leaf_hash = hash_bytes(DEFAULT_HASH_ALGORITHM, b"tampered");
        assert!(!MerkleTree::verify(DEFAULT_HASH_ALGORITHM, &root, &proof));
    }
}
