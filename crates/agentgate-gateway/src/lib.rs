// crates/agentgate-gateway/src/lib.rs
// ============================================================================
// Module: AgentGate Gateway Library
// Description: Collaborator wiring, HTTP surface, and request handlers
//              shared by the `agentgate-gateway` binary and its tests.
// Purpose: Keep `main.rs` a thin process entry point; everything that can be
//          exercised without a real listener lives here instead.
// Dependencies: agentgate-core, agentgate-config, agentgate-killswitch,
//               agentgate-policy-client, agentgate-credential-broker,
//               agentgate-store-sqlite, agentgate-store-postgres,
//               agentgate-evidence, tiny_http
// ============================================================================

//! ## Overview
//! This crate assembles every collaborator the Gateway Pipeline, Quarantine
//! Coordinator, Rollout Controller, SLO Monitor, Evidence Exporter, and
//! Transparency Log need, and exposes them over a blocking `tiny_http` HTTP
//! surface. [`settings`] and [`admin_auth`] are this binary's own concerns;
//! [`store_handle`], [`broker_handle`], and [`signing_handle`] each select
//! one concrete implementation of a core trait at startup; [`tool_invoker`]
//! is the one concrete [`agentgate_core::ToolInvoker`] this deployment uses;
//! [`server`] and [`handlers`] wire all of the above to the HTTP
//! request/response surface.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Admin endpoint bearer authentication.
pub mod admin_auth;
/// Credential broker variant selection.
pub mod broker_handle;
/// Request handlers for every HTTP endpoint.
pub mod handlers;
/// Tool-call argument PII redaction applied at ingress.
pub mod pii;
/// Binary-specific wiring settings not covered by `agentgate_config`.
pub mod settings;
/// Signing scheme variant selection.
pub mod signing_handle;
/// Blocking `tiny_http` listener and request dispatch.
pub mod server;
/// Trace store backend selection.
pub mod store_handle;
/// HTTP downstream tool invoker.
pub mod tool_invoker;
