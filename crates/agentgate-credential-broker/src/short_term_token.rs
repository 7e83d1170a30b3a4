// crates/agentgate-credential-broker/src/short_term_token.rs
// ============================================================================
// Module: Short-Term Token Service Broker
// Description: CredentialBroker backed by a dedicated token-minting service
//              that issues one brand-new, narrowly scoped token per call.
// Purpose: Satisfy deployments whose credential authority is a security
//          token service (STS-style) rather than a generic issue/revoke API.
// Dependencies: agentgate-core, reqwest (blocking)
// ============================================================================

//! ## Overview
//! Unlike [`crate::http_exchange::HttpExchangeBroker`], which calls a
//! generic issue/revoke contract, this broker calls a single `mint` endpoint
//! per issuance and never revokes: short-term tokens from an STS are
//! expected to expire on their own, and the services fronting them typically
//! expose no revoke call. `revoke` and `revoke_session` are no-ops here,
//! satisfying the idempotent-revoke invariant the same way the containment
//! grace period (letting a short-lived token simply expire) would.

// ============================================================================
// SECTION: Imports
// ============================================================================

use agentgate_core::BrokerError;
use agentgate_core::CredentialBroker;
use agentgate_core::CredentialId;
use agentgate_core::IssuedCredential;
use agentgate_core::SessionId;
use agentgate_core::Timestamp;
use agentgate_core::ToolName;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde::Serialize;

use crate::transport::build_client;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for [`ShortTermTokenBroker`].
#[derive(Debug, Clone)]
pub struct ShortTermTokenConfig {
    /// Mint endpoint of the short-term token service.
    pub mint_url: String,
    /// Per-request timeout.
    pub timeout_millis: u64,
}

/// Errors raised constructing [`ShortTermTokenBroker`].
#[derive(Debug, thiserror::Error)]
pub enum ShortTermTokenBuildError {
    /// The underlying HTTP client could not be built.
    #[error("short-term token broker build failed: {0}")]
    Build(String),
}

/// Request body sent to the mint endpoint.
#[derive(Serialize)]
struct MintRequest<'a> {
    /// Session the token is scoped to.
    session_id: &'a str,
    /// Tool the token is scoped to.
    tool_name: &'a str,
    /// Requested time-to-live, in milliseconds.
    ttl_millis: u64,
}

/// Response body from the mint endpoint.
#[derive(Deserialize)]
struct MintResponse {
    /// Service-assigned token identifier.
    token_id: String,
    /// Opaque token material.
    token: String,
    /// Expiry timestamp, unix epoch milliseconds.
    expires_at_millis: i64,
}

// ============================================================================
// SECTION: Short-Term Token Broker
// ============================================================================

/// [`CredentialBroker`] backed by a short-term token minting service.
pub struct ShortTermTokenBroker {
    /// Blocking HTTP client.
    client: Client,
    /// Mint endpoint.
    mint_url: String,
}

impl ShortTermTokenBroker {
    /// Builds a broker from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ShortTermTokenBuildError`] when the HTTP client cannot be built.
    pub fn new(config: ShortTermTokenConfig) -> Result<Self, ShortTermTokenBuildError> {
        let client = build_client(config.timeout_millis).map_err(ShortTermTokenBuildError::Build)?;
        Ok(Self { client, mint_url: config.mint_url })
    }
}

impl CredentialBroker for ShortTermTokenBroker {
    fn issue(
        &self,
        session_id: &SessionId,
        tool_name: &ToolName,
        ttl_millis: u64,
    ) -> Result<IssuedCredential, BrokerError> {
        let request =
            MintRequest { session_id: session_id.as_str(), tool_name: tool_name.as_str(), ttl_millis };
        let response = self
            .client
            .post(&self.mint_url)
            .json(&request)
            .send()
            .map_err(|err| BrokerError::Failed(err.to_string()))?;
        if !response.status().is_success() {
            return Err(BrokerError::Failed(format!("token service returned {}", response.status())));
        }
        let body: MintResponse = response.json().map_err(|err| BrokerError::Failed(err.to_string()))?;
        Ok(IssuedCredential {
            credential_id: CredentialId::new(body.token_id),
            material: body.token,
            expires_at: Timestamp::from_unix_millis(body.expires_at_millis),
        })
    }

    fn revoke(&self, _credential_id: &CredentialId, _reason: &str) -> Result<(), BrokerError> {
        Ok(())
    }

    fn revoke_session(&self, _session_id: &SessionId, _reason: &str) -> Result<(), BrokerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ShortTermTokenBroker;
    use super::ShortTermTokenConfig;
    use agentgate_core::CredentialBroker;
    use agentgate_core::SessionId;
    use agentgate_core::ToolName;
    use std::thread;
    use tiny_http::Response;
    use tiny_http::Server;

    #[test]
    fn issue_mints_a_scoped_token() {
        let server = Server::http("127.0.0.1:0").expect("bind ephemeral port");
        let port = server.server_addr().to_ip().expect("ip address").port();
        let handle = thread::spawn(move || {
            let request = server.recv().expect("receive mint request");
            let body = r#"{"token_id":"tok-1","token":"scoped-token","expires_at_millis":5000}"#;
            request.respond(Response::from_string(body).with_status_code(200)).expect("respond");
        });

        let broker = ShortTermTokenBroker::new(ShortTermTokenConfig {
            mint_url: format!("http://127.0.0.1:{port}"),
            timeout_millis: 2_000,
        })
        .expect("broker builds");
        let credential =
            broker.issue(&SessionId::new("s1"), &ToolName::new("search"), 5_000).expect("issues");
        assert_eq!(credential.material, "scoped-token");
        handle.join().expect("server thread joins");
    }

    #[test]
    fn revoke_is_always_a_no_op_success() {
        let broker = ShortTermTokenBroker::new(ShortTermTokenConfig {
            mint_url: "http://127.0.0.1:1".to_string(),
            timeout_millis: 200,
        })
        .expect("broker builds");
        broker.revoke_session(&SessionId::new("s1"), "containment").expect("no-op succeeds");
    }
}
