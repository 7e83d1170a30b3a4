// crates/agentgate-gateway/src/broker_handle.rs
// ============================================================================
// Module: Credential Broker Handle
// Description: Selects and wraps one CredentialBroker variant at startup.
// Purpose: Let the gateway pipeline stay generic over `CredentialBrokerHandle`
//          instead of matching on `BrokerSelection` at every call site.
// Dependencies: agentgate-core, agentgate-credential-broker
// ============================================================================

//! ## Overview
//! [`crate::settings::BrokerSelection`] names which
//! [`agentgate_credential_broker`] variant a deployment configured;
//! [`CredentialBrokerHandle::build`] constructs the matching broker once at
//! startup and forwards `CredentialBroker` to it, the same closed-set-of-
//! variants shape [`crate::store_handle::TraceStoreHandle`] uses for the
//! trace store.

use std::sync::Arc;

use agentgate_core::BrokerError;
use agentgate_core::Clock;
use agentgate_core::CredentialBroker;
use agentgate_core::CredentialId;
use agentgate_core::IssuedCredential;
use agentgate_core::SessionId;
use agentgate_core::ToolName;
use agentgate_credential_broker::ClientCredentialsBroker;
use agentgate_credential_broker::ClientCredentialsBuildError;
use agentgate_credential_broker::HttpExchangeBroker;
use agentgate_credential_broker::HttpExchangeBuildError;
use agentgate_credential_broker::InertStubBroker;
use agentgate_credential_broker::ShortTermTokenBroker;
use agentgate_credential_broker::ShortTermTokenBuildError;

use crate::settings::BrokerSelection;

/// Error raised constructing the configured broker variant.
#[derive(Debug, thiserror::Error)]
pub enum BrokerHandleError {
    /// The `client_credentials` broker failed to build its HTTP client.
    #[error("client credentials broker: {0}")]
    ClientCredentials(#[from] ClientCredentialsBuildError),
    /// The `http_exchange` broker failed to build its HTTP client.
    #[error("http exchange broker: {0}")]
    HttpExchange(#[from] HttpExchangeBuildError),
    /// The `short_term_token` broker failed to build its HTTP client.
    #[error("short term token broker: {0}")]
    ShortTermToken(#[from] ShortTermTokenBuildError),
}

/// One of the four [`CredentialBroker`] variants this deployment selected.
pub enum CredentialBrokerHandle {
    /// No credential authority configured; every issuance is denied.
    Inert(InertStubBroker),
    /// OAuth2 `client_credentials` grant.
    ClientCredentials(ClientCredentialsBroker),
    /// Generic issue/revoke HTTP contract.
    HttpExchange(HttpExchangeBroker),
    /// Single-purpose token-minting service.
    ShortTermToken(ShortTermTokenBroker),
}

impl CredentialBrokerHandle {
    /// Builds the broker variant named by `selection`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerHandleError`] when the selected variant's HTTP client
    /// fails to build.
    pub fn build(selection: BrokerSelection, clock: Arc<dyn Clock>) -> Result<Self, BrokerHandleError> {
        match selection {
            BrokerSelection::Inert => Ok(Self::Inert(InertStubBroker::new(clock))),
            BrokerSelection::ClientCredentials(config) => {
                Ok(Self::ClientCredentials(ClientCredentialsBroker::new(config, clock)?))
            }
            BrokerSelection::HttpExchange(config) => Ok(Self::HttpExchange(HttpExchangeBroker::new(config)?)),
            BrokerSelection::ShortTermToken(config) => Ok(Self::ShortTermToken(ShortTermTokenBroker::new(config)?)),
        }
    }
}

impl CredentialBroker for CredentialBrokerHandle {
    fn issue(&self, session_id: &SessionId, tool_name: &ToolName, ttl_millis: u64) -> Result<IssuedCredential, BrokerError> {
        match self {
            Self::Inert(broker) => broker.issue(session_id, tool_name, ttl_millis),
            Self::ClientCredentials(broker) => broker.issue(session_id, tool_name, ttl_millis),
            Self::HttpExchange(broker) => broker.issue(session_id, tool_name, ttl_millis),
            Self::ShortTermToken(broker) => broker.issue(session_id, tool_name, ttl_millis),
        }
    }

    fn revoke(&self, credential_id: &CredentialId, reason: &str) -> Result<(), BrokerError> {
        match self {
            Self::Inert(broker) => broker.revoke(credential_id, reason),
            Self::ClientCredentials(broker) => broker.revoke(credential_id, reason),
            Self::HttpExchange(broker) => broker.revoke(credential_id, reason),
            Self::ShortTermToken(broker) => broker.revoke(credential_id, reason),
        }
    }

    fn revoke_session(&self, session_id: &SessionId, reason: &str) -> Result<(), BrokerError> {
        match self {
            Self::Inert(broker) => broker.revoke_session(session_id, reason),
            Self::ClientCredentials(broker) => broker.revoke_session(session_id, reason),
            Self::HttpExchange(broker) => broker.revoke_session(session_id, reason),
            Self::ShortTermToken(broker) => broker.revoke_session(session_id, reason),
        }
    }
}

// Mirrors `store_handle`'s `Arc<TraceStoreHandle>` impl: the credential
// broker is shared between the hot-path pipeline and the Quarantine
// Coordinator's session revocation, both of which take `Broker` by value.
impl CredentialBroker for std::sync::Arc<CredentialBrokerHandle> {
    fn issue(&self, session_id: &SessionId, tool_name: &ToolName, ttl_millis: u64) -> Result<IssuedCredential, BrokerError> {
        self.as_ref().issue(session_id, tool_name, ttl_millis)
    }

    fn revoke(&self, credential_id: &CredentialId, reason: &str) -> Result<(), BrokerError> {
        self.as_ref().revoke(credential_id, reason)
    }

    fn revoke_session(&self, session_id: &SessionId, reason: &str) -> Result<(), BrokerError> {
        self.as_ref().revoke_session(session_id, reason)
    }
}

#[cfg(test)]
mod tests {
    use super::CredentialBrokerHandle;
    use crate::settings::BrokerSelection;
    use agentgate_core::CredentialBroker;
    use agentgate_core::SessionId;
    use agentgate_core::ToolName;
    use agentgate_core::time::SystemClock;
    use std::sync::Arc;

    #[test]
    fn inert_selection_builds_and_issues() {
        let handle = CredentialBrokerHandle::build(BrokerSelection::Inert, Arc::new(SystemClock)).expect("builds");
        let credential = handle.issue(&SessionId::new("s1"), &ToolName::new("search"), 1_000).expect("issues");
        assert!(!credential.credential_id.as_str().is_empty());
    }
}
