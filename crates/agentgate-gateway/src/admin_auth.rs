// crates/agentgate-gateway/src/admin_auth.rs
// ============================================================================
// Module: Admin Endpoint Authentication
// Description: Bearer authentication for the admin control-plane endpoints,
//              either a static API key or an HS256 JWT.
// Purpose: Give the admin surface (policy reload, rollout control, session
//          retention, evidence export) its own fail-closed gate, independent
//          of the per-tenant tool-call pipeline's policy engine.
// Dependencies: agentgate-config, hmac, sha2, base64, subtle
// ============================================================================

//! ## Overview
//! No `jsonwebtoken`-style crate is part of this workspace's dependency
//! stack, so HS256 verification is built directly from the `hmac` and `sha2`
//! primitives this workspace already depends on for evidence signing (see
//! `agentgate-evidence::signing_hmac`) — the same shared-secret MAC
//! construction, applied to a compact JWT instead of an evidence payload.
//! Only verification is implemented; this gateway never issues admin tokens
//! itself. A static API key, compared in constant time via
//! `subtle::ConstantTimeEq`, is accepted as a simpler alternative when
//! `AdminConfig::allow_api_key` is set.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::Hmac;
use hmac::Mac;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use agentgate_config::config::AdminConfig;

/// Errors raised authenticating an admin request.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AdminAuthError {
    /// No `Authorization` header was presented.
    #[error("missing Authorization header")]
    MissingAuthorization,
    /// The header was not a `Bearer` token.
    #[error("Authorization header must use the Bearer scheme")]
    InvalidScheme,
    /// This deployment has neither a JWT secret nor an API key configured;
    /// every admin request is therefore denied.
    #[error("no admin authentication method is configured")]
    NotConfigured,
    /// The presented token was not a well-formed compact JWT.
    #[error("malformed JWT")]
    MalformedToken,
    /// The JWT's `alg` header was not `HS256`.
    #[error("unsupported JWT algorithm")]
    UnsupportedAlgorithm,
    /// The JWT signature did not verify against the configured secret.
    #[error("JWT signature is invalid")]
    SignatureInvalid,
    /// The JWT's `exp` claim is in the past.
    #[error("JWT has expired")]
    Expired,
    /// The presented bearer token matched neither the API key nor the JWT secret.
    #[error("bearer token is not authorized")]
    Unauthorized,
}

/// The claims this gateway reads from an admin JWT; every other claim is
/// ignored.
#[derive(Debug, Deserialize)]
struct Claims {
    /// Expiry, in seconds since the Unix epoch; absent means the token never expires.
    exp: Option<i64>,
}

/// Verifies admin-endpoint bearer credentials against [`AdminConfig`].
pub struct AdminAuth {
    /// The admin authentication configuration this instance verifies against.
    config: AdminConfig,
}

impl AdminAuth {
    /// Wraps the admin authentication configuration.
    #[must_use]
    pub fn new(config: AdminConfig) -> Self {
        Self { config }
    }

    /// Authenticates one admin request from its raw `Authorization` header
    /// value, `now_unix_seconds` used to check JWT expiry.
    ///
    /// # Errors
    ///
    /// Returns [`AdminAuthError`] when the header is absent, malformed, or
    /// the credential it carries does not verify.
    pub fn authenticate(&self, authorization_header: Option<&str>, now_unix_seconds: i64) -> Result<(), AdminAuthError> {
        let header = authorization_header.ok_or(AdminAuthError::MissingAuthorization)?;
        let token = header.strip_prefix("Bearer ").ok_or(AdminAuthError::InvalidScheme)?;

        if self.config.jwt_secret.is_none() && !self.config.allow_api_key {
            return Err(AdminAuthError::NotConfigured);
        }

        if self.config.allow_api_key {
            if let Some(expected) = &self.config.api_key {
                if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) {
                    return Ok(());
                }
            }
        }

        if let Some(secret) = &self.config.jwt_secret {
            return verify_jwt(token, secret.as_bytes(), now_unix_seconds);
        }

        Err(AdminAuthError::Unauthorized)
    }
}

/// Verifies a compact `header.payload.signature` HS256 JWT against `secret`.
fn verify_jwt(token: &str, secret: &[u8], now_unix_seconds: i64) -> Result<(), AdminAuthError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(signature_b64)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(AdminAuthError::MalformedToken);
    };
    if parts.next().is_some() {
        return Err(AdminAuthError::MalformedToken);
    }

    let header_bytes = URL_SAFE_NO_PAD.decode(header_b64).map_err(|_| AdminAuthError::MalformedToken)?;
    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|_| AdminAuthError::MalformedToken)?;
    if header.get("alg").and_then(serde_json::Value::as_str) != Some("HS256") {
        return Err(AdminAuthError::UnsupportedAlgorithm);
    }

    let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|_| AdminAuthError::MalformedToken)?;
    let signing_input = format!("{header_b64}.{payload_b64}");
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).map_err(|_| AdminAuthError::SignatureInvalid)?;
    mac.update(signing_input.as_bytes());
    let expected = mac.finalize().into_bytes();
    if !bool::from(expected.as_slice().ct_eq(&signature)) {
        return Err(AdminAuthError::SignatureInvalid);
    }

    let payload_bytes = URL_SAFE_NO_PAD.decode(payload_b64).map_err(|_| AdminAuthError::MalformedToken)?;
    let claims: Claims = serde_json::from_slice(&payload_bytes).map_err(|_| AdminAuthError::MalformedToken)?;
    if let Some(exp) = claims.exp {
        if exp < now_unix_seconds {
            return Err(AdminAuthError::Expired);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::AdminAuth;
    use super::AdminAuthError;
    use agentgate_config::config::AdminConfig;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use hmac::Hmac;
    use hmac::Mac;
    use sha2::Sha256;

    fn sign_token(secret: &[u8], payload_json: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(payload_json.as_bytes());
        let signing_input = format!("{header}.{payload}");
        let mut mac = Hmac::<Sha256>::new_from_slice(secret).expect("key");
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{signing_input}.{signature}")
    }

    #[test]
    fn missing_header_is_rejected() {
        let auth = AdminAuth::new(AdminConfig { jwt_secret: None, allow_api_key: true, api_key: Some("k".to_string()) });
        assert_eq!(auth.authenticate(None, 0), Err(AdminAuthError::MissingAuthorization));
    }

    #[test]
    fn matching_api_key_is_accepted() {
        let auth = AdminAuth::new(AdminConfig { jwt_secret: None, allow_api_key: true, api_key: Some("secret-key".to_string()) });
        assert!(auth.authenticate(Some("Bearer secret-key"), 0).is_ok());
    }

    #[test]
    fn wrong_api_key_falls_through_to_unauthorized() {
        let auth = AdminAuth::new(AdminConfig { jwt_secret: None, allow_api_key: true, api_key: Some("secret-key".to_string()) });
        assert_eq!(auth.authenticate(Some("Bearer wrong"), 0), Err(AdminAuthError::Unauthorized));
    }

    #[test]
    fn valid_unexpired_jwt_is_accepted() {
        let secret = b"a-sufficiently-long-jwt-secret";
        let token = sign_token(secret, r#"{"exp":1000}"#);
        let auth = AdminAuth::new(AdminConfig {
            jwt_secret: Some(String::from_utf8(secret.to_vec()).expect("utf8")),
            allow_api_key: false,
            api_key: None,
        });
        assert!(auth.authenticate(Some(&format!("Bearer {token}")), 500).is_ok());
    }

    #[test]
    fn expired_jwt_is_rejected() {
        let secret = b"a-sufficiently-long-jwt-secret";
        let token = sign_token(secret, r#"{"exp":100}"#);
        let auth = AdminAuth::new(AdminConfig {
            jwt_secret: Some(String::from_utf8(secret.to_vec()).expect("utf8")),
            allow_api_key: false,
            api_key: None,
        });
        assert_eq!(auth.authenticate(Some(&format!("Bearer {token}")), 500), Err(AdminAuthError::Expired));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let secret = b"a-sufficiently-long-jwt-secret";
        let mut token = sign_token(secret, r#"{"exp":1000}"#);
        token.push('x');
        let auth = AdminAuth::new(AdminConfig {
            jwt_secret: Some(String::from_utf8(secret.to_vec()).expect("utf8")),
            allow_api_key: false,
            api_key: None,
        });
        assert_eq!(auth.authenticate(Some(&format!("Bearer {token}")), 0), Err(AdminAuthError::SignatureInvalid));
    }

    #[test]
    fn nothing_configured_denies_everything() {
        let auth = AdminAuth::new(AdminConfig { jwt_secret: None, allow_api_key: false, api_key: None });
        assert_eq!(auth.authenticate(Some("Bearer anything"), 0), Err(AdminAuthError::NotConfigured));
    }
}
