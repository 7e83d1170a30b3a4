// crates/agentgate-config/src/lib.rs
// ============================================================================
// Module: AgentGate Configuration
// Description: Public API surface for environment-sourced configuration.
// Purpose: Expose `AgentGateConfig::from_env` and the reference doc generator.
// Dependencies: crate::{config, docs}
// ============================================================================

//! ## Overview
//! AgentGate is configured entirely from the process environment; there is
//! no config file to locate or parse. [`config::AgentGateConfig`] reads
//! every recognized variable once at startup and validates it fail-closed,
//! rejecting an incomplete or weak configuration before the gateway ever
//! opens a listener.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod docs;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::AdminConfig;
pub use config::AgentGateConfig;
pub use config::ConfigError;
pub use config::PiiMode;
pub use config::PolicyConfig;
pub use config::QuarantineConfig;
pub use config::SigningBackend;
pub use config::SigningConfig;
pub use config::SloConfig;
pub use config::StoreConfig;
pub use config::TransparencyConfig;
pub use config::WebhookConfig;
pub use docs::config_docs_markdown;
