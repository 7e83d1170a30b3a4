// crates/agentgate-credential-broker/src/transport.rs
// ============================================================================
// Module: Shared Broker Transport
// Description: Blocking HTTP client construction shared by the networked
//              broker variants.
// Purpose: Keep timeout and redirect policy identical across variants.
// Dependencies: reqwest (blocking)
// ============================================================================

//! Shared blocking HTTP client construction for the networked broker
//! variants, so timeout and redirect policy stay identical across them.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::blocking::ClientBuilder;
use reqwest::redirect::Policy;

/// Builds the blocking HTTP client shared by the networked broker variants.
///
/// Redirects are never followed: a broker endpoint that redirects is
/// reconfigured, not silently chased.
pub(crate) fn build_client(timeout_millis: u64) -> Result<Client, String> {
    ClientBuilder::new()
        .timeout(Duration::from_millis(timeout_millis))
        .redirect(Policy::none())
        .build()
        .map_err(|err| err.to_string())
}
