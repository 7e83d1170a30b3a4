// crates/agentgate-credential-broker/src/http_exchange.rs
// ============================================================================
// Module: HTTP Request/Response Exchange Broker
// Description: CredentialBroker that issues and revokes over a synchronous
//              HTTP request/response exchange with an external service.
// Purpose: Satisfy deployments whose credential authority speaks a plain
//          issue/revoke HTTP contract rather than OAuth2.
// Dependencies: agentgate-core, reqwest (blocking)
// ============================================================================

//! ## Overview
//! One POST to `{base_url}/issue` per [`CredentialBroker::issue`] call, and
//! one POST to `{base_url}/revoke` per revoke. The broker does not retry;
//! [`agentgate_core::BrokerError`] is fail-closed and the gateway denies the
//! call.

// ============================================================================
// SECTION: Imports
// ============================================================================

use agentgate_core::BrokerError;
use agentgate_core::CredentialBroker;
use agentgate_core::CredentialId;
use agentgate_core::IssuedCredential;
use agentgate_core::SessionId;
use agentgate_core::ToolName;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde::Serialize;

use crate::transport::build_client;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for [`HttpExchangeBroker`].
#[derive(Debug, Clone)]
pub struct HttpExchangeConfig {
    /// Base URL of the external credential authority.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout_millis: u64,
}

/// Errors raised constructing [`HttpExchangeBroker`].
#[derive(Debug, thiserror::Error)]
pub enum HttpExchangeBuildError {
    /// The underlying HTTP client could not be built.
    #[error("http exchange broker build failed: {0}")]
    Build(String),
}

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Request body for `{base_url}/issue`.
#[derive(Serialize)]
struct IssueRequest<'a> {
    /// Session the credential is scoped to.
    session_id: &'a str,
    /// Tool the credential is scoped to.
    tool_name: &'a str,
    /// Requested time-to-live, in milliseconds.
    ttl_millis: u64,
}

/// Response body from `{base_url}/issue`.
#[derive(Deserialize)]
struct IssueResponse {
    /// Authority-assigned credential identifier.
    credential_id: String,
    /// Opaque credential material.
    material: String,
    /// Expiry timestamp, unix epoch milliseconds.
    expires_at_millis: i64,
}

/// Request body for `{base_url}/revoke`.
#[derive(Serialize)]
struct RevokeRequest<'a> {
    /// Credential identifier to revoke, when revoking a single credential.
    credential_id: Option<&'a str>,
    /// Session identifier to revoke, when revoking every credential for a session.
    session_id: Option<&'a str>,
    /// Human-readable revocation reason, recorded by the authority.
    reason: &'a str,
}

// ============================================================================
// SECTION: HTTP Exchange Broker
// ============================================================================

/// [`CredentialBroker`] that issues and revokes over HTTP request/response.
pub struct HttpExchangeBroker {
    /// Blocking HTTP client.
    client: Client,
    /// Issue endpoint, `{base_url}/issue`.
    issue_url: String,
    /// Revoke endpoint, `{base_url}/revoke`.
    revoke_url: String,
}

impl HttpExchangeBroker {
    /// Builds a broker from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`HttpExchangeBuildError`] when the HTTP client cannot be built.
    pub fn new(config: HttpExchangeConfig) -> Result<Self, HttpExchangeBuildError> {
        let client = build_client(config.timeout_millis).map_err(HttpExchangeBuildError::Build)?;
        let base = config.base_url.trim_end_matches('/');
        Ok(Self { client, issue_url: format!("{base}/issue"), revoke_url: format!("{base}/revoke") })
    }
}

impl CredentialBroker for HttpExchangeBroker {
    fn issue(
        &self,
        session_id: &SessionId,
        tool_name: &ToolName,
        ttl_millis: u64,
    ) -> Result<IssuedCredential, BrokerError> {
        let request =
            IssueRequest { session_id: session_id.as_str(), tool_name: tool_name.as_str(), ttl_millis };
        let response = self
            .client
            .post(&self.issue_url)
            .json(&request)
            .send()
            .map_err(|err| BrokerError::Failed(err.to_string()))?;
        if !response.status().is_success() {
            return Err(BrokerError::Failed(format!("credential authority returned {}", response.status())));
        }
        let body: IssueResponse =
            response.json().map_err(|err| BrokerError::Failed(err.to_string()))?;
        Ok(IssuedCredential {
            credential_id: CredentialId::new(body.credential_id),
            material: body.material,
            expires_at: agentgate_core::Timestamp::from_unix_millis(body.expires_at_millis),
        })
    }

    fn revoke(&self, credential_id: &CredentialId, reason: &str) -> Result<(), BrokerError> {
        let request = RevokeRequest { credential_id: Some(credential_id.as_str()), session_id: None, reason };
        send_revoke(&self.client, &self.revoke_url, &request)
    }

    fn revoke_session(&self, session_id: &SessionId, reason: &str) -> Result<(), BrokerError> {
        let request = RevokeRequest { credential_id: None, session_id: Some(session_id.as_str()), reason };
        send_revoke(&self.client, &self.revoke_url, &request)
    }
}

/// Posts a revoke request and maps a non-success response to [`BrokerError`].
fn send_revoke(client: &Client, url: &str, request: &RevokeRequest<'_>) -> Result<(), BrokerError> {
    let response =
        client.post(url).json(request).send().map_err(|err| BrokerError::Failed(err.to_string()))?;
    if !response.status().is_success() {
        return Err(BrokerError::Failed(format!("credential authority returned {}", response.status())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::HttpExchangeBroker;
    use super::HttpExchangeConfig;
    use agentgate_core::CredentialBroker;
    use agentgate_core::SessionId;
    use agentgate_core::ToolName;
    use std::thread;
    use tiny_http::Response;
    use tiny_http::Server;

    #[test]
    fn issue_parses_a_successful_response() {
        let server = Server::http("127.0.0.1:0").expect("bind ephemeral port");
        let port = server.server_addr().to_ip().expect("ip address").port();
        let handle = thread::spawn(move || {
            let request = server.recv().expect("receive request");
            let body = r#"{"credential_id":"cred-1","material":"token-abc","expires_at_millis":60000}"#;
            request.respond(Response::from_string(body).with_status_code(200)).expect("respond");
        });

        let broker = HttpExchangeBroker::new(HttpExchangeConfig {
            base_url: format!("http://127.0.0.1:{port}"),
            timeout_millis: 2_000,
        })
        .expect("broker builds");
        let credential =
            broker.issue(&SessionId::new("s1"), &ToolName::new("search"), 60_000).expect("issues");
        assert_eq!(credential.material, "token-abc");
        handle.join().expect("server thread joins");
    }

    #[test]
    fn issue_surfaces_non_success_status_as_broker_failed() {
        let server = Server::http("127.0.0.1:0").expect("bind ephemeral port");
        let port = server.server_addr().to_ip().expect("ip address").port();
        let handle = thread::spawn(move || {
            let request = server.recv().expect("receive request");
            request.respond(Response::from_string("denied").with_status_code(403)).expect("respond");
        });

        let broker = HttpExchangeBroker::new(HttpExchangeConfig {
            base_url: format!("http://127.0.0.1:{port}"),
            timeout_millis: 2_000,
        })
        .expect("broker builds");
        let result = broker.issue(&SessionId::new("s1"), &ToolName::new("search"), 60_000);
        assert!(result.is_err());
        handle.join().expect("server thread joins");
    }
}
