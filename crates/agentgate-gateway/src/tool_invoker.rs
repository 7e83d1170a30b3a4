// crates/agentgate-gateway/src/tool_invoker.rs
// ============================================================================
// Module: HTTP Tool Invoker
// Description: `agentgate_core::ToolInvoker` over a blocking HTTP transport.
// Purpose: Forward an allowed call to the configured downstream tool server;
//          the gateway never executes tool side effects itself.
// Dependencies: agentgate-core, reqwest (blocking), serde_json
// ============================================================================

//! ## Overview
//! Mirrors `agentgate-policy-client::client::HttpPolicyEngineClient`: one
//! `reqwest::blocking::Client` built once at startup, one POST per call. The
//! pipeline's `deadline` is an absolute [`Timestamp`], so each request clamps
//! its own timeout to whatever of it remains rather than trusting the
//! client's baseline timeout alone.

use std::time::Duration;

use agentgate_core::Clock;
use agentgate_core::IssuedCredential;
use agentgate_core::Timestamp;
use agentgate_core::ToolInvocationError;
use agentgate_core::ToolInvocationResult;
use agentgate_core::ToolInvoker;
use agentgate_core::ToolName;
use reqwest::blocking::Client;
use serde::Serialize;
use std::sync::Arc;

/// Errors raised constructing [`HttpToolInvoker`].
#[derive(Debug, thiserror::Error)]
pub enum ToolInvokerBuildError {
    /// The underlying HTTP client could not be built.
    #[error("tool invoker client build failed: {0}")]
    Build(String),
}

/// [`ToolInvoker`] over a blocking HTTP transport.
pub struct HttpToolInvoker {
    client: Client,
    invoke_url: String,
    clock: Arc<dyn Clock>,
}

/// Wire body posted to the downstream tool server.
#[derive(Serialize)]
struct InvokeRequest<'a> {
    tool_name: &'a str,
    arguments: &'a serde_json::Value,
    credential: Option<&'a str>,
}

impl HttpToolInvoker {
    /// Builds an invoker targeting `base_url`, using `default_timeout_millis`
    /// as the client's baseline (each call still clamps to its own deadline).
    ///
    /// # Errors
    ///
    /// Returns [`ToolInvokerBuildError`] when the HTTP client cannot be built.
    pub fn new(base_url: &str, default_timeout_millis: u64, clock: Arc<dyn Clock>) -> Result<Self, ToolInvokerBuildError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(default_timeout_millis))
            .build()
            .map_err(|err| ToolInvokerBuildError::Build(err.to_string()))?;
        Ok(Self { client, invoke_url: format!("{}/invoke", base_url.trim_end_matches('/')), clock })
    }
}

impl ToolInvoker for HttpToolInvoker {
    fn invoke(
        &self,
        tool_name: &ToolName,
        arguments: &serde_json::Value,
        credential: Option<&IssuedCredential>,
        deadline: Timestamp,
    ) -> Result<ToolInvocationResult, ToolInvocationError> {
        let remaining_millis = deadline.saturating_since(self.clock.now()).max(1);
        let request = InvokeRequest {
            tool_name: tool_name.as_str(),
            arguments,
            credential: credential.map(|issued| issued.material.as_str()),
        };
        let response = self
            .client
            .post(&self.invoke_url)
            .timeout(Duration::from_millis(remaining_millis))
            .json(&request)
            .send()
            .map_err(|err| ToolInvocationError::Failed(err.to_string()))?;
        if !response.status().is_success() {
            return Err(ToolInvocationError::Failed(format!("downstream tool server returned {}", response.status())));
        }
        let result = response.json::<serde_json::Value>().map_err(|err| ToolInvocationError::Failed(err.to_string()))?;
        Ok(ToolInvocationResult { result })
    }
}

#[cfg(test)]
mod tests {
    use super::HttpToolInvoker;
    use agentgate_core::Clock;
    use agentgate_core::Timestamp;
    use agentgate_core::ToolInvoker;
    use agentgate_core::ToolName;
    use agentgate_core::time::SystemClock;
    use std::sync::Arc;

    #[test]
    fn unreachable_server_is_a_tool_invocation_error() {
        let invoker = HttpToolInvoker::new("http://127.0.0.1:1", 200, Arc::new(SystemClock)).expect("builds");
        let deadline = Timestamp::from_unix_millis(SystemClock.now().as_unix_millis() + 200);
        let result = invoker.invoke(&ToolName::new("search"), &serde_json::json!({}), None, deadline);
        assert!(result.is_err());
    }
}
