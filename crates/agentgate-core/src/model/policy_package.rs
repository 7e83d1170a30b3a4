// crates/agentgate-core/src/model/policy_package.rs
// ============================================================================
// Module: Policy Package
// Description: Signed, versioned bundle of policy rules for one tenant.
// Purpose: Give the Policy Decision Engine an immutable, verifiable unit of
//          distribution and rollback.
// Dependencies: crate::{hashing, identifiers}, serde
// ============================================================================

//! ## Overview
//! A policy package is content-addressed: `bundle_hash` is the canonical hash
//! of `bundle`. The Rollout Controller
//! and Policy Decision Engine never trust a package whose signature does not
//! verify against the tenant's configured signer, and never apply a package
//! whose `bundle_hash` does not match a fresh hash of `bundle`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::hashing::HashDigest;
use crate::hashing::hash_canonical_json;
use crate::identifiers::PolicyVersion;
use crate::identifiers::TenantId;

// ============================================================================
// SECTION: Policy Package
// ============================================================================

/// Signed, versioned bundle of policy rules for one tenant.
///
/// # Invariants
/// - `bundle_hash` must equal `hash_canonical_json(&bundle)`; a mismatch means
///   the package was tampered with or corrupted in transit.
/// - `signature` is verified against `signer` before a package is trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyPackage {
    /// Tenant this package applies to.
    pub tenant_id: TenantId,
    /// Monotonically assigned version within the tenant.
    pub version: PolicyVersion,
    /// Canonical hash of `bundle`.
    pub bundle_hash: HashDigest,
    /// Identity of the signer (key id or principal) that produced `signature`.
    pub signer: String,
    /// Signature over `bundle_hash`, base64-encoded.
    pub signature: String,
    /// The policy rule bundle itself, opaque to this crate.
    pub bundle: serde_json::Value,
}

impl PolicyPackage {
    /// Returns `true` if `bundle_hash` matches a freshly computed hash of `bundle`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `bundle` cannot be canonicalized.
    pub fn verify_bundle_hash(&self) -> Result<bool, crate::hashing::HashError> {
        let fresh = hash_canonical_json(self.bundle_hash.algorithm, &self.bundle)?;
        Ok(fresh == self.bundle_hash)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use super::PolicyPackage;
    use crate::hashing::DEFAULT_HASH_ALGORITHM;
    use crate::hashing::hash_canonical_json;
    use crate::identifiers::PolicyVersion;
    use crate::identifiers::TenantId;

    #[test]
    fn bundle_hash_mismatch_is_detected() {
        let bundle = serde_json::json!({"rules": []});
        let hash = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &bundle).expect("hash");
        let mut package = PolicyPackage {
            tenant_id: TenantId::new(NonZeroU64::new(1).expect("non-zero")),
            version: PolicyVersion::new("v1"),
            bundle_hash: hash,
            signer: "key-1".to_string(),
            signature: "sig".to_string(),
            bundle,
        };
        assert!(package.verify_bundle_hash().expect("verify"));
        package.bundle = serde_json::json!({"rules": ["deny_all"]});
        assert!(!package.verify_bundle_hash().expect("verify"));
    }
}
