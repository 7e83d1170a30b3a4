// crates/agentgate-policy-client/src/client.rs
// ============================================================================
// Module: HTTP Policy Engine Client
// Description: `agentgate_core::PolicyEngineClient` over a blocking HTTP
//              transport with optional mutual TLS.
// Purpose: Reach the external rule evaluator, retrying
//          transient transport errors exactly once.
// Dependencies: agentgate-core, reqwest (blocking), serde_json
// ============================================================================

//! ## Overview
//! The Policy Decision Engine is always external to this gateway; this
//! client is the only seam `agentgate-core::runtime::GatewayPipeline` uses
//! to reach it. Missing mTLS material when mTLS is required by
//! configuration is a construction-time error, not a runtime one: it is
//! treated as a startup failure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use agentgate_core::PolicyEngineClient;
use agentgate_core::PolicyQuery;
use agentgate_core::PolicyTransportError;
use agentgate_core::PolicyVerdict;
use reqwest::blocking::Client;
use reqwest::blocking::ClientBuilder;
use reqwest::Certificate;
use reqwest::Identity;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Mutual TLS material for the policy engine transport.
#[derive(Debug, Clone)]
pub struct MtlsMaterial {
    /// Client certificate, PEM-encoded.
    pub cert_pem: Vec<u8>,
    /// Client private key, PEM-encoded.
    pub key_pem: Vec<u8>,
    /// CA bundle used to verify the policy engine's certificate, PEM-encoded.
    pub ca_pem: Vec<u8>,
}

/// Configuration for [`HttpPolicyEngineClient`].
#[derive(Debug, Clone)]
pub struct HttpPolicyClientConfig {
    /// Base URL of the external policy engine.
    pub base_url: String,
    /// Request timeout, applied per attempt.
    pub timeout_millis: u64,
    /// Mutual TLS material, required when the deployment mandates mTLS.
    pub mtls: Option<MtlsMaterial>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised constructing [`HttpPolicyEngineClient`].
#[derive(Debug, thiserror::Error)]
pub enum PolicyClientBuildError {
    /// The HTTP client or its TLS identity could not be built.
    #[error("policy client build failed: {0}")]
    Build(String),
}

// ============================================================================
// SECTION: HTTP Policy Engine Client
// ============================================================================

/// [`PolicyEngineClient`] over a blocking HTTP transport.
pub struct HttpPolicyEngineClient {
    client: Client,
    evaluate_url: String,
}

impl HttpPolicyEngineClient {
    /// Builds a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyClientBuildError`] when the mTLS identity or CA
    /// material is malformed, or the underlying HTTP client cannot be built.
    pub fn new(config: HttpPolicyClientConfig) -> Result<Self, PolicyClientBuildError> {
        let mut builder = ClientBuilder::new().timeout(Duration::from_millis(config.timeout_millis));
        if let Some(mtls) = &config.mtls {
            let mut combined = mtls.cert_pem.clone();
            combined.extend_from_slice(&mtls.key_pem);
            let identity = Identity::from_pem(&combined)
                .map_err(|err| PolicyClientBuildError::Build(err.to_string()))?;
            let ca = Certificate::from_pem(&mtls.ca_pem)
                .map_err(|err| PolicyClientBuildError::Build(err.to_string()))?;
            builder = builder.identity(identity).add_root_certificate(ca).use_rustls_tls();
        }
        let client = builder.build().map_err(|err| PolicyClientBuildError::Build(err.to_string()))?;
        Ok(Self { client, evaluate_url: format!("{}/evaluate", config.base_url.trim_end_matches('/')) })
    }

    /// Sends one evaluation request without retrying.
    fn send_once(&self, query: &PolicyQuery) -> Result<PolicyVerdict, PolicyTransportError> {
        let response = self
            .client
            .post(&self.evaluate_url)
            .json(query)
            .send()
            .map_err(|err| PolicyTransportError::Transport(err.to_string()))?;
        if !response.status().is_success() {
            return Err(PolicyTransportError::Transport(format!("policy engine returned {}", response.status())));
        }
        response.json::<PolicyVerdict>().map_err(|err| PolicyTransportError::Transport(err.to_string()))
    }
}

impl PolicyEngineClient for HttpPolicyEngineClient {
    fn evaluate(&self, query: &PolicyQuery) -> Result<PolicyVerdict, PolicyTransportError> {
        match self.send_once(query) {
            Ok(verdict) => Ok(verdict),
            Err(first_error) => {
                tracing::warn!(target: "agentgate::policy_client", error = %first_error, "retrying policy evaluation");
                self.send_once(query).map_err(|_second_error| first_error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::HttpPolicyClientConfig;
    use super::HttpPolicyEngineClient;
    use agentgate_core::PolicyEngineClient;

    #[test]
    fn transport_error_against_a_closed_port_is_surfaced() {
        let client = HttpPolicyEngineClient::new(HttpPolicyClientConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout_millis: 200,
            mtls: None,
        })
        .expect("client builds");
        let query = agentgate_core::PolicyQuery {
            tenant_id: agentgate_core::TenantId::new(std::num::NonZeroU64::new(1).expect("non-zero")),
            session_id: agentgate_core::SessionId::new("s1"),
            tool_name: agentgate_core::ToolName::new("search"),
            approval_presented: false,
            arguments: serde_json::json!({}),
            policy_version: agentgate_core::PolicyVersion::new("v1"),
        };
        let result = client.evaluate(&query);
        assert!(result.is_err());
    }
}
