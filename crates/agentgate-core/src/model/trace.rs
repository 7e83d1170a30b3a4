// crates/agentgate-core/src/model/trace.rs
// ============================================================================
// Module: Trace Event
// Description: One ordered, immutable record in a session's append-only log.
// Purpose: Carry every observable pipeline event with enough context to
//          reconstruct a decision after the fact.
// Dependencies: crate::{hashing, identifiers, time}, serde
// ============================================================================

//! ## Overview
//! Trace events are never updated or deleted; retention deletes entire
//! sessions, never individual events.
//! `event_id` is assigned by the Trace Store and is dense and strictly
//! increasing per session; this type does not self-assign it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::hashing::HashDigest;
use crate::identifiers::EventId;
use crate::identifiers::PolicyVersion;
use crate::identifiers::SessionId;
use crate::identifiers::TenantId;
use crate::identifiers::ToolName;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Policy decision outcome.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// The call may proceed.
    Allow,
    /// The call is rejected.
    Deny,
    /// The call requires an approval token before it may proceed.
    RequireApproval,
}

// ============================================================================
// SECTION: Trace Event Kind
// ============================================================================

/// Trace event kind.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceEventKind {
    /// A tool call was received.
    ToolCall,
    /// A terminal policy decision was recorded for a request.
    Decision,
    /// A kill-switch scope was set.
    Kill,
    /// A credential was revoked.
    Revocation,
    /// A session entered quarantine.
    Quarantine,
    /// A quarantined session was released.
    Release,
    /// An admin approval was recorded.
    Approval,
    /// A policy reload was attempted.
    Reload,
    /// A rollout stage transition occurred.
    Rollout,
}

// ============================================================================
// SECTION: Rate-Limit Snapshot
// ============================================================================

/// Snapshot of the rate-limit budget at decision time, persisted alongside
/// the decision event so audits can reconstruct why a call was throttled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    /// Configured budget for the window.
    pub limit: u32,
    /// Requests remaining in the current window.
    pub remaining: u32,
    /// Unix millis when the current window resets.
    pub reset_at: Timestamp,
}

// ============================================================================
// SECTION: Trace Event
// ============================================================================

/// One ordered record in a session's append-only log.
///
/// # Invariants
/// - Never updated or deleted once appended.
/// - `event_id` is dense and strictly increasing within `session_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Monotonically assigned identifier within the session.
    pub event_id: EventId,
    /// Session this event belongs to.
    pub session_id: SessionId,
    /// Tenant the session is bound to.
    pub tenant_id: TenantId,
    /// Timestamp the event was observed.
    pub timestamp: Timestamp,
    /// Event kind.
    pub kind: TraceEventKind,
    /// Tool name, present for tool-call and decision events.
    pub tool_name: Option<ToolName>,
    /// Decision outcome, present for decision events.
    pub decision: Option<Decision>,
    /// Human-readable reason, e.g. the first failing check or rule id.
    pub reason: String,
    /// Policy package version in force when this event was recorded.
    pub policy_version: Option<PolicyVersion>,
    /// Rate-limit budget snapshot at decision time.
    pub rate_limit_snapshot: Option<RateLimitSnapshot>,
    /// Redacted request/response payload, subject to the configured PII mode.
    pub payload: Option<serde_json::Value>,
    /// Integrity hash over the canonical form of this event, excluding itself.
    pub integrity_hash: HashDigest,
}

impl TraceEvent {
    /// Returns `true` if this event is the terminal decision event for a request.
    #[must_use]
    pub const fn is_terminal_decision(&self) -> bool {
        matches!(self.kind, TraceEventKind::Decision)
    }
}

#[cfg(test)]
mod tests {
    use super::Decision;
    use super::TraceEventKind;

    #[test]
    fn decision_serializes_snake_case() {
        let json = serde_json::to_string(&Decision::RequireApproval).expect("serialize");
        assert_eq!(json, "\"require_approval\"");
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&TraceEventKind::ToolCall).expect("serialize");
        assert_eq!(json, "\"tool_call\"");
    }
}
