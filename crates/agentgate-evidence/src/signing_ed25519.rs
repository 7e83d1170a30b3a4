// crates/agentgate-evidence/src/signing_ed25519.rs
// ============================================================================
// Module: Ed25519 Signing Scheme
// Description: Asymmetric SigningScheme variant backed by Ed25519.
// Purpose: Let evidence be verified by a third party holding only the public
//          key, without trusting the gateway that produced it.
// Dependencies: agentgate-core, ed25519-dalek, base64
// ============================================================================

//! ## Overview
//! A replica holding the signing key can both sign and verify; a verify-only
//! deployment (an auditor checking previously exported evidence, for
//! example) builds from just the public key and errors on `sign`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ed25519_dalek::Signature;
use ed25519_dalek::Signer;
use ed25519_dalek::SigningKey;
use ed25519_dalek::Verifier;
use ed25519_dalek::VerifyingKey;

use agentgate_core::SigningError;
use agentgate_core::SigningScheme;

/// Errors raised constructing an [`Ed25519SigningScheme`].
#[derive(Debug, thiserror::Error)]
pub enum Ed25519SigningBuildError {
    /// Key material was not valid base64.
    #[error("ed25519 key material is not valid base64: {0}")]
    Base64(String),
    /// Decoded key material was not 32 bytes.
    #[error("ed25519 key material must be 32 bytes")]
    WrongLength,
}

/// [`SigningScheme`] backed by Ed25519.
pub struct Ed25519SigningScheme {
    /// Signing key, present only on replicas configured to produce signatures.
    signing_key: Option<SigningKey>,
    /// Verifying key, always present.
    verifying_key: VerifyingKey,
}

impl Ed25519SigningScheme {
    /// Builds a scheme that can both sign and verify from a base64-encoded
    /// 32-byte seed.
    ///
    /// # Errors
    ///
    /// Returns [`Ed25519SigningBuildError`] when `seed` is not valid base64
    /// or is not 32 bytes once decoded.
    pub fn from_signing_seed(seed: &str) -> Result<Self, Ed25519SigningBuildError> {
        let bytes = decode_32(seed)?;
        let signing_key = SigningKey::from_bytes(&bytes);
        let verifying_key = signing_key.verifying_key();
        Ok(Self { signing_key: Some(signing_key), verifying_key })
    }

    /// Builds a verify-only scheme from a base64-encoded 32-byte public key.
    ///
    /// # Errors
    ///
    /// Returns [`Ed25519SigningBuildError`] when `public_key` is not valid
    /// base64, is not 32 bytes once decoded, or is not a valid point.
    pub fn from_verifying_key(public_key: &str) -> Result<Self, Ed25519SigningBuildError> {
        let bytes = decode_32(public_key)?;
        let verifying_key = VerifyingKey::from_bytes(&bytes).map_err(|_| Ed25519SigningBuildError::WrongLength)?;
        Ok(Self { signing_key: None, verifying_key })
    }
}

fn decode_32(encoded: &str) -> Result<[u8; 32], Ed25519SigningBuildError> {
    let bytes = BASE64.decode(encoded).map_err(|err| Ed25519SigningBuildError::Base64(err.to_string()))?;
    bytes.try_into().map_err(|_| Ed25519SigningBuildError::WrongLength)
}

impl SigningScheme for Ed25519SigningScheme {
    fn algorithm_id(&self) -> &'static str {
        "ed25519"
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, SigningError> {
        let signing_key =
            self.signing_key.as_ref().ok_or_else(|| SigningError::KeyUnavailable("no ed25519 signing key loaded".to_string()))?;
        Ok(signing_key.sign(payload).to_bytes().to_vec())
    }

    fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<bool, SigningError> {
        let signature_bytes: [u8; 64] =
            signature.try_into().map_err(|_| SigningError::KeyUnavailable("signature must be 64 bytes".to_string()))?;
        let signature = Signature::from_bytes(&signature_bytes);
        Ok(self.verifying_key.verify(payload, &signature).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::Ed25519SigningBuildError;
    use super::Ed25519SigningScheme;
    use agentgate_core::SigningError;
    use agentgate_core::SigningScheme;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;

    #[test]
    fn signature_round_trips() {
        let seed = BASE64.encode([7_u8; 32]);
        let scheme = Ed25519SigningScheme::from_signing_seed(&seed).expect("seed accepted");
        let signature = scheme.sign(b"payload").expect("sign");
        assert!(scheme.verify(b"payload", &signature).expect("verify"));
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let seed = BASE64.encode([7_u8; 32]);
        let scheme = Ed25519SigningScheme::from_signing_seed(&seed).expect("seed accepted");
        let signature = scheme.sign(b"payload").expect("sign");
        assert!(!scheme.verify(b"other-payload", &signature).expect("verify"));
    }

    #[test]
    fn verify_only_scheme_cannot_sign() {
        let seed = BASE64.encode([7_u8; 32]);
        let signing_scheme = Ed25519SigningScheme::from_signing_seed(&seed).expect("seed accepted");
        let public_key = BASE64.encode(signing_scheme.verifying_key.to_bytes());
        let verify_only = Ed25519SigningScheme::from_verifying_key(&public_key).expect("key accepted");
        assert!(matches!(verify_only.sign(b"payload"), Err(SigningError::KeyUnavailable(_))));
    }

    #[test]
    fn malformed_seed_is_rejected() {
        assert!(matches!(Ed25519SigningScheme::from_signing_seed("not-base64!!"), Err(Ed25519SigningBuildError::Base64(_))));
        assert!(matches!(Ed25519SigningScheme::from_signing_seed("AAAA"), Err(Ed25519SigningBuildError::WrongLength)));
    }
}
