// crates/agentgate-core/src/taxonomy.rs
// ============================================================================
// Module: AgentGate Error Taxonomy
// Description: Cross-cutting failure kinds shared by every component.
// Purpose: Give every crate-local error a stable, programmatically matchable
//          kind and an HTTP status mapping for the gateway boundary.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every component-local error (`BrokerError`, `PolicyTransportError`,
//! `KillSwitchError`, `StoreError`, ...) ultimately surfaces to a client as
//! one of these kinds. The mapping is centralized here so the gateway
//! pipeline (§4.1) and the HTTP layer (§6) agree on status codes without
//! duplicating the table.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Failure Kind
// ============================================================================

/// Stable, programmatically matchable failure classification.
///
/// # Invariants
/// - Variants are stable for serialization and client-side matching; adding
///   a variant is backward compatible, renaming one is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Request failed structural or semantic validation.
    Validation,
    /// Caller could not be authenticated.
    Unauthenticated,
    /// Caller was authenticated but lacks the required capability.
    Forbidden,
    /// Session is already bound to a different tenant.
    TenantConflict,
    /// A kill-switch (session, tool, or global) is active.
    KillSwitchActive,
    /// Session is quarantined.
    Quarantined,
    /// Rate limit budget exhausted.
    RateLimited,
    /// Policy engine denied the call.
    PolicyDenied,
    /// Policy engine requires an approval token.
    ApprovalRequired,
    /// Policy engine is unreachable after retry.
    PolicyUnavailable,
    /// Credential broker failed to issue or revoke.
    BrokerFailed,
    /// Downstream tool invocation failed.
    ToolFailure,
    /// Trace store failed to append the terminal decision event.
    TraceWriteFailed,
    /// A signature failed to verify.
    SignatureInvalid,
    /// Session has an active legal hold.
    LegalHoldSet,
    /// Operation would cross a tenant boundary under isolation mode.
    CrossTenantForbidden,
    /// Client requested an unsupported API version.
    VersionUnsupported,
    /// A dependency's retry budget was exhausted.
    Unavailable,
}

impl FailureKind {
    /// Returns the HTTP status code this failure kind maps to.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::Validation | Self::VersionUnsupported => 400,
            Self::Unauthenticated => 401,
            Self::Forbidden | Self::TenantConflict | Self::PolicyDenied | Self::CrossTenantForbidden => {
                403
            }
            Self::KillSwitchActive | Self::Quarantined | Self::LegalHoldSet => 409,
            Self::ApprovalRequired => 202,
            Self::RateLimited => 429,
            Self::BrokerFailed | Self::ToolFailure | Self::TraceWriteFailed | Self::SignatureInvalid => {
                502
            }
            Self::PolicyUnavailable | Self::Unavailable => 503,
        }
    }

    /// Returns the stable wire string for this kind (the `kind` field of the
    /// structured error envelope).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::TenantConflict => "tenant_conflict",
            Self::KillSwitchActive => "kill_switch_active",
            Self::Quarantined => "quarantined",
            Self::RateLimited => "rate_limited",
            Self::PolicyDenied => "policy_denied",
            Self::ApprovalRequired => "approval_required",
            Self::PolicyUnavailable => "policy_unavailable",
            Self::BrokerFailed => "broker_failed",
            Self::ToolFailure => "tool_failure",
            Self::TraceWriteFailed => "trace_write_failed",
            Self::SignatureInvalid => "signature_invalid",
            Self::LegalHoldSet => "legal_hold_set",
            Self::CrossTenantForbidden => "cross_tenant_forbidden",
            Self::VersionUnsupported => "version_unsupported",
            Self::Unavailable => "unavailable",
        }
    }
}

/// Structured error envelope returned to API callers.
///
/// # Invariants
/// - `message` never embeds secrets; redaction rules apply to error payloads
///   exactly as they apply to trace payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Taxonomy kind.
    pub kind: FailureKind,
    /// Short human-readable reason.
    pub message: String,
    /// Optional remediation hint (missing header, supported version range, ...).
    pub hint: Option<String>,
}

impl ErrorEnvelope {
    /// Creates a new error envelope without a remediation hint.
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), hint: None }
    }

    /// Attaches a remediation hint.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::FailureKind;

    #[test]
    fn kill_switch_and_quarantine_are_409() {
        assert_eq!(FailureKind::KillSwitchActive.http_status(), 409);
        assert_eq!(FailureKind::Quarantined.http_status(), 409);
    }

    #[test]
    fn approval_required_is_202() {
        assert_eq!(FailureKind::ApprovalRequired.http_status(), 202);
    }

    #[test]
    fn broker_failed_is_502_fail_closed() {
        assert_eq!(FailureKind::BrokerFailed.http_status(), 502);
    }
}
