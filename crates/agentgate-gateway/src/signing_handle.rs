// crates/agentgate-gateway/src/signing_handle.rs
// ============================================================================
// Module: Signing Scheme Handle
// Description: Selects and wraps one SigningScheme variant at startup.
// Purpose: Resolve `agentgate_config::SigningConfig` (inline key or key file)
//          into a concrete signer once, shared by the Evidence Exporter and
//          Transparency Log.
// Dependencies: agentgate-core, agentgate-config, agentgate-evidence
// ============================================================================

//! ## Overview
//! [`agentgate_config::config::SigningConfig`] names a backend
//! (`hmac` or `ed25519`) and either inline key material or a path to a key
//! file; [`SigningSchemeHandle::build`] reads whichever is present and
//! constructs the matching [`agentgate_evidence`] scheme, the same
//! closed-set-of-variants shape used for [`crate::broker_handle::CredentialBrokerHandle`]
//! and [`crate::store_handle::TraceStoreHandle`].

use std::fs;

use agentgate_config::config::SigningBackend;
use agentgate_config::config::SigningConfig;
use agentgate_core::SigningError;
use agentgate_core::SigningScheme;
use agentgate_evidence::Ed25519SigningBuildError;
use agentgate_evidence::Ed25519SigningScheme;
use agentgate_evidence::HmacSigningBuildError;
use agentgate_evidence::HmacSigningScheme;

/// Error raised resolving a [`SigningConfig`] into a concrete scheme.
#[derive(Debug, thiserror::Error)]
pub enum SigningHandleError {
    /// Neither `key` nor `key_file` was set; `agentgate_config` itself
    /// already rejects this combination, but the handle re-checks because it
    /// is the one resolving `key_file` to bytes.
    #[error("signing key material is missing")]
    NoKeyMaterial,
    /// `key_file` could not be read.
    #[error("failed to read signing key file: {0}")]
    KeyFile(#[from] std::io::Error),
    /// The HMAC scheme rejected the resolved key material.
    #[error("hmac signing scheme: {0}")]
    Hmac(#[from] HmacSigningBuildError),
    /// The Ed25519 scheme rejected the resolved key material.
    #[error("ed25519 signing scheme: {0}")]
    Ed25519(#[from] Ed25519SigningBuildError),
}

/// One of the two [`SigningScheme`] variants this deployment selected.
pub enum SigningSchemeHandle {
    /// Symmetric HMAC-SHA256 signing with a shared key.
    Hmac(HmacSigningScheme),
    /// Asymmetric Ed25519 signing.
    Ed25519(Ed25519SigningScheme),
}

impl SigningSchemeHandle {
    /// Resolves key material from `config` (inline, or read from `key_file`)
    /// and builds the selected backend's scheme.
    ///
    /// # Errors
    ///
    /// Returns [`SigningHandleError`] when key material is missing, the key
    /// file cannot be read, or the selected backend rejects the key.
    pub fn build(config: &SigningConfig) -> Result<Self, SigningHandleError> {
        let key_material = resolve_key_material(config)?;
        match config.backend {
            SigningBackend::Hmac => Ok(Self::Hmac(HmacSigningScheme::new(key_material.into_bytes())?)),
            SigningBackend::Ed25519 => Ok(Self::Ed25519(Ed25519SigningScheme::from_signing_seed(key_material.trim())?)),
        }
    }
}

/// Reads inline key material or the contents of `key_file`, trimming
/// trailing newlines a key file commonly carries.
fn resolve_key_material(config: &SigningConfig) -> Result<String, SigningHandleError> {
    if let Some(key) = &config.key {
        return Ok(key.clone());
    }
    if let Some(path) = &config.key_file {
        return Ok(fs::read_to_string(path)?.trim_end().to_string());
    }
    Err(SigningHandleError::NoKeyMaterial)
}

impl SigningScheme for SigningSchemeHandle {
    fn algorithm_id(&self) -> &'static str {
        match self {
            Self::Hmac(scheme) => scheme.algorithm_id(),
            Self::Ed25519(scheme) => scheme.algorithm_id(),
        }
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, SigningError> {
        match self {
            Self::Hmac(scheme) => scheme.sign(payload),
            Self::Ed25519(scheme) => scheme.sign(payload),
        }
    }

    fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<bool, SigningError> {
        match self {
            Self::Hmac(scheme) => scheme.verify(payload, signature),
            Self::Ed25519(scheme) => scheme.verify(payload, signature),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SigningSchemeHandle;
    use agentgate_config::config::SigningBackend;
    use agentgate_config::config::SigningConfig;

    #[test]
    fn hmac_backend_builds_from_inline_key() {
        let config = SigningConfig { key: Some("a-shared-secret".to_string()), backend: SigningBackend::Hmac, key_file: None };
        let handle = SigningSchemeHandle::build(&config).expect("builds");
        assert!(matches!(handle, SigningSchemeHandle::Hmac(_)));
    }

    #[test]
    fn missing_key_material_is_rejected() {
        let config = SigningConfig { key: None, backend: SigningBackend::Hmac, key_file: None };
        let result = SigningSchemeHandle::build(&config);
        assert!(result.is_err());
    }
}
