// crates/agentgate-evidence/src/signing_hmac.rs
// ============================================================================
// Module: HMAC Signing Scheme
// Description: Symmetric SigningScheme variant backed by HMAC-SHA256.
// Purpose: Give deployments without a distributed key authority a
//          single-shared-secret integrity scheme for exported evidence.
// Dependencies: agentgate-core, hmac, sha2, subtle
// ============================================================================

//! ## Overview
//! `HmacSigningScheme` holds one shared key, loaded once at startup per
//! `config::SigningConfig`. Both signing and verification use the same key,
//! matching every gateway replica trusting the same secret.

use hmac::Hmac;
use hmac::Mac;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use agentgate_core::SigningError;
use agentgate_core::SigningScheme;

/// Errors raised constructing an [`HmacSigningScheme`].
#[derive(Debug, thiserror::Error)]
pub enum HmacSigningBuildError {
    /// The configured key material was empty.
    #[error("hmac signing key must not be empty")]
    EmptyKey,
}

/// [`SigningScheme`] backed by HMAC-SHA256 over a shared key.
pub struct HmacSigningScheme {
    /// Shared secret used for both signing and verification.
    key: Vec<u8>,
}

impl HmacSigningScheme {
    /// Builds a scheme from raw key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`HmacSigningBuildError::EmptyKey`] when `key` is empty.
    pub fn new(key: Vec<u8>) -> Result<Self, HmacSigningBuildError> {
        if key.is_empty() {
            return Err(HmacSigningBuildError::EmptyKey);
        }
        Ok(Self { key })
    }
}

impl SigningScheme for HmacSigningScheme {
    fn algorithm_id(&self) -> &'static str {
        "hmac-sha256"
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, SigningError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.key)
            .map_err(|err| SigningError::KeyUnavailable(err.to_string()))?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<bool, SigningError> {
        let expected = self.sign(payload)?;
        Ok(bool::from(expected.ct_eq(signature)))
    }
}

#[cfg(test)]
mod tests {
    use super::HmacSigningBuildError;
    use super::HmacSigningScheme;
    use agentgate_core::SigningScheme;

    #[test]
    fn empty_key_is_rejected() {
        let result = HmacSigningScheme::new(Vec::new());
        assert!(matches!(result, Err(HmacSigningBuildError::EmptyKey)));
    }

    #[test]
    fn signature_round_trips() {
        let scheme = HmacSigningScheme::new(b"shared-secret".to_vec()).expect("key accepted");
        let signature = scheme.sign(b"payload").expect("sign");
        assert!(scheme.verify(b"payload", &signature).expect("verify"));
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let scheme = HmacSigningScheme::new(b"shared-secret".to_vec()).expect("key accepted");
        let signature = scheme.sign(b"payload").expect("sign");
        assert!(!scheme.verify(b"other-payload", &signature).expect("verify"));
    }

    #[test]
    fn algorithm_id_is_stable() {
        let scheme = HmacSigningScheme::new(b"shared-secret".to_vec()).expect("key accepted");
        assert_eq!(scheme.algorithm_id(), "hmac-sha256");
    }
}
