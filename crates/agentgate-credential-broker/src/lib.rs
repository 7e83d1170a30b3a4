// crates/agentgate-credential-broker/src/lib.rs
// ============================================================================
// Crate: agentgate-credential-broker
// Description: The four CredentialBroker provider variants selected by
//              deployment configuration.
// Dependencies: agentgate-core, reqwest
// ============================================================================

//! ## Overview
//! Every variant satisfies the same `issue`/`revoke`/`revoke_session`
//! capability set and fails closed with `BrokerError`; only the mechanism
//! reaching the credential authority differs between them.

#![deny(missing_docs)]

mod client_credentials;
mod http_exchange;
mod inert;
mod short_term_token;
mod transport;

pub use client_credentials::ClientCredentialsBroker;
pub use client_credentials::ClientCredentialsBuildError;
pub use client_credentials::ClientCredentialsConfig;
pub use http_exchange::HttpExchangeBroker;
pub use http_exchange::HttpExchangeBuildError;
pub use http_exchange::HttpExchangeConfig;
pub use inert::InertStubBroker;
pub use short_term_token::ShortTermTokenBroker;
pub use short_term_token::ShortTermTokenBuildError;
pub use short_term_token::ShortTermTokenConfig;
