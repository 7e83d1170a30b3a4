// crates/agentgate-policy-client/src/package.rs
// ============================================================================
// Module: Policy Package Verification
// Description: Signature and digest verification for loaded policy bundles.
// Purpose: Enforce strict-provenance mode: a bundle is trusted
//          only once its digest and signature both check out.
// Dependencies: agentgate-core, ed25519-dalek, base64
// ============================================================================

//! ## Overview
//! Strict-provenance mode (required in production) rejects a bundle whose
//! `bundle_hash` does not match a fresh hash of `bundle`, or whose
//! `signature` does not verify against the signer's registered public key.
//! A rejected bundle never replaces the active policy.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::RwLock;

use agentgate_core::PolicyPackage;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::Signature;
use ed25519_dalek::Verifier;
use ed25519_dalek::VerifyingKey;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised verifying or activating a policy package.
#[derive(Debug, thiserror::Error)]
pub enum PolicyPackageError {
    /// `bundle_hash` did not match a fresh hash of `bundle`.
    #[error("policy package bundle hash mismatch")]
    DigestMismatch,
    /// `signer` has no registered verifying key.
    #[error("policy package signer '{0}' is not registered")]
    UnknownSigner(String),
    /// `signature` was not valid base64 or not a well-formed Ed25519 signature.
    #[error("policy package signature malformed: {0}")]
    MalformedSignature(String),
    /// The signature did not verify against the signer's public key.
    #[error("policy package signature does not verify")]
    SignatureInvalid,
    /// Canonicalizing `bundle` to compute its digest failed.
    #[error("policy package digest computation failed: {0}")]
    Digest(String),
}

// ============================================================================
// SECTION: Policy Package Verifier
// ============================================================================

/// Verifies policy packages against a registry of per-signer Ed25519 keys.
pub struct PolicyPackageVerifier {
    /// Registered signer id to verifying key, loaded at startup.
    signer_keys: HashMap<String, VerifyingKey>,
}

impl PolicyPackageVerifier {
    /// Builds a verifier from base64-encoded, 32-byte Ed25519 public keys.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyPackageError::MalformedSignature`] when a key is not
    /// valid base64 or not a well-formed Ed25519 public key.
    pub fn new(signer_public_keys: &HashMap<String, String>) -> Result<Self, PolicyPackageError> {
        let mut signer_keys = HashMap::with_capacity(signer_public_keys.len());
        for (signer, encoded) in signer_public_keys {
            let bytes = BASE64
                .decode(encoded)
                .map_err(|err| PolicyPackageError::MalformedSignature(err.to_string()))?;
            let array: [u8; 32] = bytes
                .try_into()
                .map_err(|_| PolicyPackageError::MalformedSignature("public key must be 32 bytes".to_string()))?;
            let key = VerifyingKey::from_bytes(&array)
                .map_err(|err| PolicyPackageError::MalformedSignature(err.to_string()))?;
            signer_keys.insert(signer.clone(), key);
        }
        Ok(Self { signer_keys })
    }

    /// Verifies both the digest and the signature of `package`.
    ///
    /// # Errors
    ///
    /// Returns a [`PolicyPackageError`] variant describing the first check
    /// that failed.
    pub fn verify(&self, package: &PolicyPackage) -> Result<(), PolicyPackageError> {
        let digest_ok = package.verify_bundle_hash().map_err(|err| PolicyPackageError::Digest(err.to_string()))?;
        if !digest_ok {
            return Err(PolicyPackageError::DigestMismatch);
        }
        let key = self
            .signer_keys
            .get(&package.signer)
            .ok_or_else(|| PolicyPackageError::UnknownSigner(package.signer.clone()))?;
        let signature_bytes = BASE64
            .decode(&package.signature)
            .map_err(|err| PolicyPackageError::MalformedSignature(err.to_string()))?;
        let signature_array: [u8; 64] = signature_bytes
            .try_into()
            .map_err(|_| PolicyPackageError::MalformedSignature("signature must be 64 bytes".to_string()))?;
        let signature = Signature::from_bytes(&signature_array);
        key.verify(package.bundle_hash.value.as_bytes(), &signature)
            .map_err(|_| PolicyPackageError::SignatureInvalid)
    }
}

// ============================================================================
// SECTION: Active Policy
// ============================================================================

/// Holds the currently active policy package per tenant, replacing it only
/// on a successful [`PolicyPackageVerifier::verify`] ("Policy
/// reload failures leave the previously active policy in place").
pub struct ActivePolicyStore {
    verifier: PolicyPackageVerifier,
    current: RwLock<HashMap<String, PolicyPackage>>,
}

impl ActivePolicyStore {
    /// Creates an empty store backed by `verifier`.
    #[must_use]
    pub fn new(verifier: PolicyPackageVerifier) -> Self {
        Self { verifier, current: RwLock::new(HashMap::new()) }
    }

    /// Returns the active package for `tenant_key`, if one has been loaded.
    ///
    /// # Panics
    ///
    /// Panics only if the internal lock is poisoned by an earlier panic.
    #[must_use]
    pub fn active(&self, tenant_key: &str) -> Option<PolicyPackage> {
        self.current.read().unwrap_or_else(std::sync::PoisonError::into_inner).get(tenant_key).cloned()
    }

    /// Attempts to reload the active package for a tenant. On failure the
    /// previously active package, if any, is left untouched.
    ///
    /// # Errors
    ///
    /// Returns the [`PolicyPackageError`] the verifier reported; the store
    /// is not mutated in that case.
    pub fn reload(&self, tenant_key: &str, candidate: PolicyPackage) -> Result<(), PolicyPackageError> {
        self.verifier.verify(&candidate)?;
        let mut guard = self.current.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.insert(tenant_key.to_string(), candidate);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ActivePolicyStore;
    use super::PolicyPackageError;
    use super::PolicyPackageVerifier;
    use agentgate_core::PolicyPackage;
    use agentgate_core::TenantId;
    use agentgate_core::hashing::DEFAULT_HASH_ALGORITHM;
    use agentgate_core::hashing::hash_canonical_json;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use ed25519_dalek::Signer;
    use ed25519_dalek::SigningKey;
    use std::collections::HashMap;
    use std::num::NonZeroU64;

    fn signed_package(signing_key: &SigningKey, signer: &str, bundle: serde_json::Value) -> PolicyPackage {
        let bundle_hash = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &bundle).expect("hash");
        let signature = signing_key.sign(bundle_hash.value.as_bytes());
        PolicyPackage {
            tenant_id: TenantId::new(NonZeroU64::new(1).expect("non-zero")),
            version: agentgate_core::PolicyVersion::new("v1"),
            bundle_hash,
            signer: signer.to_string(),
            signature: BASE64.encode(signature.to_bytes()),
            bundle,
        }
    }

    fn verifier_with_key(signer: &str, signing_key: &SigningKey) -> PolicyPackageVerifier {
        let mut keys = HashMap::new();
        keys.insert(signer.to_string(), BASE64.encode(signing_key.verifying_key().to_bytes()));
        PolicyPackageVerifier::new(&keys).expect("verifier builds")
    }

    #[test]
    fn valid_signature_and_digest_verify() {
        let signing_key = SigningKey::from_bytes(&[7_u8; 32]);
        let verifier = verifier_with_key("key-1", &signing_key);
        let package = signed_package(&signing_key, "key-1", serde_json::json!({"rules": []}));
        assert!(verifier.verify(&package).is_ok());
    }

    #[test]
    fn tampered_bundle_fails_digest_check() {
        let signing_key = SigningKey::from_bytes(&[7_u8; 32]);
        let verifier = verifier_with_key("key-1", &signing_key);
        let mut package = signed_package(&signing_key, "key-1", serde_json::json!({"rules": []}));
        package.bundle = serde_json::json!({"rules": ["deny_all"]});
        assert!(matches!(verifier.verify(&package), Err(PolicyPackageError::DigestMismatch)));
    }

    #[test]
    fn unregistered_signer_is_rejected() {
        let signing_key = SigningKey::from_bytes(&[7_u8; 32]);
        let verifier = verifier_with_key("key-1", &signing_key);
        let package = signed_package(&signing_key, "key-unknown", serde_json::json!({"rules": []}));
        assert!(matches!(verifier.verify(&package), Err(PolicyPackageError::UnknownSigner(_))));
    }

    #[test]
    fn reload_leaves_prior_package_in_place_on_failure() {
        let signing_key = SigningKey::from_bytes(&[7_u8; 32]);
        let other_key = SigningKey::from_bytes(&[9_u8; 32]);
        let verifier = verifier_with_key("key-1", &signing_key);
        let store = ActivePolicyStore::new(verifier);
        let good = signed_package(&signing_key, "key-1", serde_json::json!({"rules": ["v1"]}));
        store.reload("tenant-1", good).expect("first reload succeeds");

        let bad = signed_package(&other_key, "key-1", serde_json::json!({"rules": ["v2"]}));
        let result = store.reload("tenant-1", bad);
        assert!(matches!(result, Err(PolicyPackageError::SignatureInvalid)));

        let active = store.active("tenant-1").expect("prior package remains active");
        assert_eq!(active.bundle, serde_json::json!({"rules": ["v1"]}));
    }
}
