// crates/agentgate-policy-client/src/lib.rs
// ============================================================================
// Crate: agentgate-policy-client
// Description: External Policy Decision Engine transport and policy package
//              provenance verification.
// Dependencies: agentgate-core, reqwest, ed25519-dalek, base64
// ============================================================================

//! ## Overview
//! The Policy Decision Engine itself is always external to this gateway;
//! this crate is the transport seam and the provenance check the Gateway
//! pipeline uses to reach it safely.

#![deny(missing_docs)]

mod client;
mod package;

pub use client::HttpPolicyClientConfig;
pub use client::HttpPolicyEngineClient;
pub use client::MtlsMaterial;
pub use client::PolicyClientBuildError;
pub use package::ActivePolicyStore;
pub use package::PolicyPackageError;
pub use package::PolicyPackageVerifier;
