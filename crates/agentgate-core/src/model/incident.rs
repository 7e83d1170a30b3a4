// crates/agentgate-core/src/model/incident.rs
// ============================================================================
// Module: Incident
// Description: Containment case opened against a session, tool, or tenant.
// Purpose: Track the exactly-once sequence kill-switch -> revoke -> quarantine
//          through to a terminal outcome, with a full step timeline.
// Dependencies: crate::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! An incident is the record the Quarantine Coordinator drives.
//! It starts `Open`, moves to `Quarantined` once containment actions have all
//! landed, and ends in exactly one of `Released`, `Revoked`, or `Failed`.
//! The timeline records each sub-step so a partially applied containment
//! attempt (e.g. kill-switch set but credential revoke failed) is visible and
//! resumable rather than silently retried from scratch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::IncidentId;
use crate::identifiers::SessionId;
use crate::identifiers::TenantId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Incident State
// ============================================================================

/// Incident lifecycle state.
///
/// # Invariants
/// - Transitions only move forward: `Open -> Quarantined -> {Released |
///   Revoked | Failed}`. `Released`, `Revoked`, and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentState {
    /// Incident opened; containment actions not yet all confirmed landed.
    Open,
    /// All containment actions confirmed landed; session is contained.
    Quarantined,
    /// An operator released the session from quarantine.
    Released,
    /// Credentials tied to the session were permanently revoked.
    Revoked,
    /// A containment step could not be completed after retry.
    Failed,
}

impl IncidentState {
    /// Returns `true` if this state is terminal; no further transition is valid.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Released | Self::Revoked | Self::Failed)
    }
}

// ============================================================================
// SECTION: Incident Timeline Step
// ============================================================================

/// One sub-step of the containment sequence an incident drives.
///
/// # Invariants
/// - Steps are recorded in the order attempted, not the order completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentTimelineStep {
    /// The incident record was created.
    Created,
    /// A kill-switch scope was set against the session.
    KillSwitchSet,
    /// Credentials issued to the session were revoked.
    CredentialsRevoked,
    /// The session's quarantine flag was confirmed set.
    QuarantineConfirmed,
    /// An operator released the incident.
    Released,
}

/// One entry in an incident's timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentTimelineEntry {
    /// The step attempted or completed.
    pub step: IncidentTimelineStep,
    /// Timestamp the step was recorded.
    pub at: Timestamp,
    /// Whether this step succeeded.
    pub succeeded: bool,
    /// Detail, e.g. the underlying error when `succeeded` is `false`.
    pub detail: String,
}

// ============================================================================
// SECTION: Incident
// ============================================================================

/// Containment case opened against a session.
///
/// # Invariants
/// - Exactly one incident may be `Open` or `Quarantined` per session at a
///   time; the Quarantine Coordinator enforces this exactly-once property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    /// Opaque, unique incident identifier.
    pub incident_id: IncidentId,
    /// Session this incident contains.
    pub session_id: SessionId,
    /// Tenant the session is bound to.
    pub tenant_id: TenantId,
    /// Current lifecycle state.
    pub state: IncidentState,
    /// Principal or automated trigger that opened the incident.
    pub opened_by: String,
    /// Reason containment was triggered.
    pub reason: String,
    /// Timestamp the incident was opened.
    pub opened_at: Timestamp,
    /// Ordered record of containment sub-steps.
    pub timeline: Vec<IncidentTimelineEntry>,
}

impl Incident {
    /// Opens a new incident in the `Open` state with a `Created` timeline entry.
    #[must_use]
    pub fn open(
        incident_id: IncidentId,
        session_id: SessionId,
        tenant_id: TenantId,
        opened_by: impl Into<String>,
        reason: impl Into<String>,
        opened_at: Timestamp,
    ) -> Self {
        Self {
            incident_id,
            session_id,
            tenant_id,
            state: IncidentState::Open,
            opened_by: opened_by.into(),
            reason: reason.into(),
            opened_at,
            timeline: vec![IncidentTimelineEntry {
                step: IncidentTimelineStep::Created,
                at: opened_at,
                succeeded: true,
                detail: String::new(),
            }],
        }
    }

    /// Appends a timeline entry and returns whether the incident is now fully
    /// contained (every required step recorded as succeeded).
    pub fn record_step(&mut self, step: IncidentTimelineStep, at: Timestamp, succeeded: bool, detail: impl Into<String>) {
        self.timeline.push(IncidentTimelineEntry { step, at, succeeded, detail: detail.into() });
    }

    /// Returns `true` if a transition from the current state to `next` is allowed.
    #[must_use]
    pub const fn can_transition_to(&self, next: IncidentState) -> bool {
        matches!(
            (self.state, next),
            (IncidentState::Open, IncidentState::Quarantined)
                | (IncidentState::Open, IncidentState::Failed)
                | (IncidentState::Quarantined, IncidentState::Released)
                | (IncidentState::Quarantined, IncidentState::Revoked)
                | (IncidentState::Quarantined, IncidentState::Failed)
        )
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use super::Incident;
    use super::IncidentState;
    use super::IncidentTimelineStep;
    use crate::identifiers::IncidentId;
    use crate::identifiers::SessionId;
    use crate::identifiers::TenantId;
    use crate::time::Timestamp;

    fn incident() -> Incident {
        Incident::open(
            IncidentId::new("inc-1"),
            SessionId::new("s1"),
            TenantId::new(NonZeroU64::new(1).expect("non-zero")),
            "quarantine-coordinator",
            "risk threshold exceeded",
            Timestamp::from_unix_millis(0),
        )
    }

    #[test]
    fn opens_in_open_state_with_created_entry() {
        let incident = incident();
        assert_eq!(incident.state, IncidentState::Open);
        assert_eq!(incident.timeline.len(), 1);
        assert_eq!(incident.timeline[0].step, IncidentTimelineStep::Created);
    }

    #[test]
    fn terminal_states_do_not_accept_further_transitions() {
        let mut incident = incident();
        incident.state = IncidentState::Revoked;
        assert!(!incident.can_transition_to(IncidentState::Released));
        assert!(IncidentState::Revoked.is_terminal());
    }

    #[test]
    fn open_may_only_advance_to_quarantined_or_failed() {
        let incident = incident();
        assert!(incident.can_transition_to(IncidentState::Quarantined));
        assert!(incident.can_transition_to(IncidentState::Failed));
        assert!(!incident.can_transition_to(IncidentState::Released));
        assert!(!incident.can_transition_to(IncidentState::Revoked));
    }
}
