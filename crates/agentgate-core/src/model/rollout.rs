// crates/agentgate-core/src/model/rollout.rs
// ============================================================================
// Module: Rollout
// Description: Staged deployment of one policy package across a tenant.
// Purpose: Drive canary -> promote -> complete with an explicit rollback path
//          so a bad policy package never reaches full traffic unattended.
// Dependencies: crate::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! A rollout advances through fixed stages under SLO observation.
//! `RolloutVerdict` is what the SLO Monitor reports back at each
//! evaluation point; the Rollout Controller consumes it to decide whether to
//! promote, hold, or roll back.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::PolicyVersion;
use crate::identifiers::RolloutId;
use crate::identifiers::TenantId;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Rollout State
// ============================================================================

/// Rollout lifecycle stage.
///
/// # Invariants
/// - Transitions only move forward except for the explicit rollback edge from
///   `Canary` or `Promoting` back to `RolledBack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutState {
    /// Rollout accepted, waiting for the canary stage to start.
    Queued,
    /// Serving a fixed fraction of traffic on the new version.
    Canary,
    /// Canary passed; ramping to full traffic.
    Promoting,
    /// New version now serves all traffic for the tenant.
    Completed,
    /// Rollout aborted; tenant reverted to the prior version.
    RolledBack,
}

impl RolloutState {
    /// Returns `true` if this state is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::RolledBack)
    }
}

// ============================================================================
// SECTION: Rollout Verdict
// ============================================================================

/// Outcome of one SLO evaluation against an in-flight rollout.
///
/// # Invariants
/// - A `Breach` verdict always triggers an immediate rollback; it is never
///   held for a subsequent evaluation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutVerdict {
    /// SLOs held; advance to the next stage.
    Advance,
    /// SLOs held but the observation window has not yet elapsed; hold.
    Hold,
    /// An SLO was breached; roll back immediately.
    Breach,
}

// ============================================================================
// SECTION: Rollout
// ============================================================================

/// Staged deployment of one policy package across a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rollout {
    /// Opaque, unique rollout identifier.
    pub rollout_id: RolloutId,
    /// Tenant this rollout applies to.
    pub tenant_id: TenantId,
    /// Version being rolled in.
    pub target_version: PolicyVersion,
    /// Version traffic reverts to on rollback.
    pub previous_version: PolicyVersion,
    /// Current lifecycle stage.
    pub state: RolloutState,
    /// Canary traffic fraction in basis points (1..=10000).
    pub canary_fraction_bp: u16,
    /// Timestamp the rollout was created.
    pub created_at: Timestamp,
    /// Timestamp of the last stage transition.
    pub updated_at: Timestamp,
}

impl Rollout {
    /// Applies a verdict to the current state, returning the resulting state.
    ///
    /// A `Breach` verdict always yields `RolledBack` from any non-terminal
    /// state. `Advance` moves `Queued -> Canary -> Promoting -> Completed`.
    /// `Hold` never changes state.
    #[must_use]
    pub const fn apply_verdict(state: RolloutState, verdict: RolloutVerdict) -> RolloutState {
        match (state, verdict) {
            (s, _) if s.is_terminal() => s,
            (_, RolloutVerdict::Breach) => RolloutState::RolledBack,
            (s, RolloutVerdict::Hold) => s,
            (RolloutState::Queued, RolloutVerdict::Advance) => RolloutState::Canary,
            (RolloutState::Canary, RolloutVerdict::Advance) => RolloutState::Promoting,
            (RolloutState::Promoting, RolloutVerdict::Advance) => RolloutState::Completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Rollout;
    use super::RolloutState;
    use super::RolloutVerdict;

    #[test]
    fn breach_rolls_back_from_canary() {
        let next = Rollout::apply_verdict(RolloutState::Canary, RolloutVerdict::Breach);
        assert_eq!(next, RolloutState::RolledBack);
    }

    #[test]
    fn advance_walks_stages_in_order() {
        let mut state = RolloutState::Queued;
        state = Rollout::apply_verdict(state, RolloutVerdict::Advance);
        assert_eq!(state, RolloutState::Canary);
        state = Rollout::apply_verdict(state, RolloutVerdict::Advance);
        assert_eq!(state, RolloutState::Promoting);
        state = Rollout::apply_verdict(state, RolloutVerdict::Advance);
        assert_eq!(state, RolloutState::Completed);
    }

    #[test]
    fn terminal_states_ignore_further_verdicts() {
        let next = Rollout::apply_verdict(RolloutState::RolledBack, RolloutVerdict::Advance);
        assert_eq!(next, RolloutState::RolledBack);
    }

    #[test]
    fn hold_never_changes_state() {
        let next = Rollout::apply_verdict(RolloutState::Canary, RolloutVerdict::Hold);
        assert_eq!(next, RolloutState::Canary);
    }
}
