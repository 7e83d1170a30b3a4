// crates/agentgate-credential-broker/src/client_credentials.rs
// ============================================================================
// Module: OAuth2 Client-Credentials Exchange Broker
// Description: CredentialBroker backed by an OAuth2 client_credentials grant.
// Purpose: Reuse one client-level bearer token across issuances instead of
//          minting a fresh token per tool call.
// Dependencies: agentgate-core, reqwest (blocking)
// ============================================================================

//! ## Overview
//! [`ClientCredentialsBroker`] fetches a bearer token via the OAuth2
//! `client_credentials` grant and caches it until shortly before it expires.
//! Because every issued credential shares that one client-level token,
//! revoking a single credential cannot selectively invalidate it without
//! cooperation from the authorization server the broker has no channel to:
//! `revoke` and `revoke_session` instead drop the cached token, which forces
//! a fresh grant on the next `issue` and bounds the blast radius to
//! credentials minted after the revoke call.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use agentgate_core::BrokerError;
use agentgate_core::Clock;
use agentgate_core::CredentialBroker;
use agentgate_core::CredentialId;
use agentgate_core::IssuedCredential;
use agentgate_core::SessionId;
use agentgate_core::Timestamp;
use agentgate_core::ToolName;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::transport::build_client;

/// Grace period subtracted from a fetched token's lifetime so a token is
/// refreshed before the authorization server would reject it.
const EXPIRY_SKEW_MILLIS: i64 = 5_000;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for [`ClientCredentialsBroker`].
#[derive(Debug, Clone)]
pub struct ClientCredentialsConfig {
    /// OAuth2 token endpoint.
    pub token_url: String,
    /// Registered client id.
    pub client_id: String,
    /// Registered client secret.
    pub client_secret: String,
    /// Per-request timeout.
    pub timeout_millis: u64,
}

/// Errors raised constructing [`ClientCredentialsBroker`].
#[derive(Debug, thiserror::Error)]
pub enum ClientCredentialsBuildError {
    /// The underlying HTTP client could not be built.
    #[error("client-credentials broker build failed: {0}")]
    Build(String),
}

/// Token response from the OAuth2 token endpoint.
#[derive(Deserialize)]
struct TokenResponse {
    /// Bearer token value.
    access_token: String,
    /// Token lifetime in seconds, as returned by the authorization server.
    expires_in: u64,
}

/// A cached client-level bearer token.
struct CachedToken {
    /// Bearer token value.
    access_token: String,
    /// Expiry, inclusive of [`EXPIRY_SKEW_MILLIS`].
    expires_at: Timestamp,
}

// ============================================================================
// SECTION: Client Credentials Broker
// ============================================================================

/// [`CredentialBroker`] backed by a shared OAuth2 client-credentials token.
pub struct ClientCredentialsBroker {
    /// Blocking HTTP client.
    client: Client,
    /// OAuth2 token endpoint.
    token_url: String,
    /// Registered client id.
    client_id: String,
    /// Registered client secret.
    client_secret: String,
    /// Clock used to judge cached-token freshness.
    clock: Arc<dyn Clock>,
    /// Cached client-level token, refreshed lazily.
    cached: Mutex<Option<CachedToken>>,
    /// Monotonic counter giving each derived credential a unique id.
    issued: AtomicU64,
}

impl ClientCredentialsBroker {
    /// Builds a broker from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientCredentialsBuildError`] when the HTTP client cannot be built.
    pub fn new(config: ClientCredentialsConfig, clock: Arc<dyn Clock>) -> Result<Self, ClientCredentialsBuildError> {
        let client = build_client(config.timeout_millis).map_err(ClientCredentialsBuildError::Build)?;
        Ok(Self {
            client,
            token_url: config.token_url,
            client_id: config.client_id,
            client_secret: config.client_secret,
            clock,
            cached: Mutex::new(None),
            issued: AtomicU64::new(0),
        })
    }

    /// Returns a live cached token, fetching a fresh one if needed.
    fn live_token(&self) -> Result<String, BrokerError> {
        let now = self.clock.now();
        let mut guard = self.cached.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(cached) = guard.as_ref()
            && cached.expires_at > now
        {
            return Ok(cached.access_token.clone());
        }
        let fetched = self.fetch_token()?;
        let expires_at = Timestamp::from_unix_millis(
            now.as_unix_millis().saturating_add(
                i64::try_from(fetched.expires_in.saturating_mul(1_000)).unwrap_or(i64::MAX),
            ) - EXPIRY_SKEW_MILLIS,
        );
        let access_token = fetched.access_token;
        *guard = Some(CachedToken { access_token: access_token.clone(), expires_at });
        Ok(access_token)
    }

    /// Performs the client_credentials grant against the token endpoint.
    fn fetch_token(&self) -> Result<TokenResponse, BrokerError> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .map_err(|err| BrokerError::Failed(err.to_string()))?;
        if !response.status().is_success() {
            return Err(BrokerError::Failed(format!("token endpoint returned {}", response.status())));
        }
        response.json::<TokenResponse>().map_err(|err| BrokerError::Failed(err.to_string()))
    }
}

impl CredentialBroker for ClientCredentialsBroker {
    fn issue(
        &self,
        session_id: &SessionId,
        tool_name: &ToolName,
        ttl_millis: u64,
    ) -> Result<IssuedCredential, BrokerError> {
        let access_token = self.live_token()?;
        let sequence = self.issued.fetch_add(1, Ordering::Relaxed);
        let now = self.clock.now();
        let expires_at = Timestamp::from_unix_millis(
            now.as_unix_millis().saturating_add(i64::try_from(ttl_millis).unwrap_or(i64::MAX)),
        );
        tracing::debug!(
            target: "agentgate::credential_broker",
            session_id = %session_id,
            tool_name = %tool_name,
            "issuing client-credentials-derived credential"
        );
        Ok(IssuedCredential {
            credential_id: CredentialId::new(format!("cc-{sequence}")),
            material: access_token,
            expires_at,
        })
    }

    fn revoke(&self, _credential_id: &CredentialId, _reason: &str) -> Result<(), BrokerError> {
        *self.cached.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = None;
        Ok(())
    }

    fn revoke_session(&self, _session_id: &SessionId, _reason: &str) -> Result<(), BrokerError> {
        *self.cached.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ClientCredentialsBroker;
    use super::ClientCredentialsConfig;
    use agentgate_core::CredentialBroker;
    use agentgate_core::SessionId;
    use agentgate_core::SystemClock;
    use agentgate_core::ToolName;
    use std::sync::Arc;
    use std::thread;
    use tiny_http::Response;
    use tiny_http::Server;

    #[test]
    fn issue_fetches_a_token_once_and_reuses_it() {
        let server = Server::http("127.0.0.1:0").expect("bind ephemeral port");
        let port = server.server_addr().to_ip().expect("ip address").port();
        let handle = thread::spawn(move || {
            let request = server.recv().expect("receive one token request");
            let body = r#"{"access_token":"bearer-xyz","expires_in":3600}"#;
            request.respond(Response::from_string(body).with_status_code(200)).expect("respond");
        });

        let broker = ClientCredentialsBroker::new(
            ClientCredentialsConfig {
                token_url: format!("http://127.0.0.1:{port}"),
                client_id: "client-1".to_string(),
                client_secret: "secret".to_string(),
                timeout_millis: 2_000,
            },
            Arc::new(SystemClock),
        )
        .expect("broker builds");

        let first = broker.issue(&SessionId::new("s1"), &ToolName::new("search"), 60_000).expect("issues");
        let second = broker.issue(&SessionId::new("s2"), &ToolName::new("search"), 60_000).expect("issues");
        assert_eq!(first.material, "bearer-xyz");
        assert_eq!(second.material, "bearer-xyz");
        assert_ne!(first.credential_id, second.credential_id);
        handle.join().expect("server thread joins");
    }

    #[test]
    fn revoke_forces_a_fresh_token_on_next_issue() {
        let server = Server::http("127.0.0.1:0").expect("bind ephemeral port");
        let port = server.server_addr().to_ip().expect("ip address").port();
        let handle = thread::spawn(move || {
            for token in ["bearer-1", "bearer-2"] {
                let request = server.recv().expect("receive token request");
                let body = format!(r#"{{"access_token":"{token}","expires_in":3600}}"#);
                request.respond(Response::from_string(body).with_status_code(200)).expect("respond");
            }
        });

        let broker = ClientCredentialsBroker::new(
            ClientCredentialsConfig {
                token_url: format!("http://127.0.0.1:{port}"),
                client_id: "client-1".to_string(),
                client_secret: "secret".to_string(),
                timeout_millis: 2_000,
            },
            Arc::new(SystemClock),
        )
        .expect("broker builds");

        let first = broker.issue(&SessionId::new("s1"), &ToolName::new("search"), 60_000).expect("issues");
        broker.revoke_session(&SessionId::new("s1"), "containment").expect("revoke succeeds");
        let second = broker.issue(&SessionId::new("s1"), &ToolName::new("search"), 60_000).expect("issues");
        assert_eq!(first.material, "bearer-1");
        assert_eq!(second.material, "bearer-2");
        handle.join().expect("server thread joins");
    }
}
