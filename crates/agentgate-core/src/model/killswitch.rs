// crates/agentgate-core/src/model/killswitch.rs
// ============================================================================
// Module: Kill-Switch State
// Description: Three disjoint containment scopes, shared across replicas.
// Purpose: Give the gateway hot path a cheap, consistent read of containment
//          state without embedding the backing-store client in this type.
// Dependencies: crate::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! A kill switch is a boolean per scope (session, tool, global) plus who set
//! it, when, and why. The row itself carries no I/O; `crate::interfaces`
//! defines the trait the Kill-Switch Controller uses to read and write rows
//! through the shared backing store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::SessionId;
use crate::identifiers::ToolName;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Kill-Switch Scope
// ============================================================================

/// The three disjoint kill-switch scopes.
///
/// # Invariants
/// - Scopes are independent; setting one does not imply another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KillSwitchScope {
    /// Pauses every call for one session.
    Session(SessionId),
    /// Disables one tool across all sessions and tenants.
    Tool(ToolName),
    /// Pauses the entire gateway.
    Global,
}

impl KillSwitchScope {
    /// Returns the backing-store key this scope maps to.
    #[must_use]
    pub fn store_key(&self) -> String {
        match self {
            Self::Session(session_id) => format!("session:{session_id}"),
            Self::Tool(tool_name) => format!("tool:{tool_name}"),
            Self::Global => "global".to_string(),
        }
    }
}

// ============================================================================
// SECTION: Kill-Switch Row
// ============================================================================

/// One kill-switch row as read from the shared backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillSwitchRow {
    /// Scope this row covers.
    pub scope: KillSwitchScope,
    /// Whether the scope is currently killed.
    pub active: bool,
    /// Timestamp the row was last set.
    pub set_at: Timestamp,
    /// Principal that set the row.
    pub set_by: String,
    /// Reason the row was set.
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::KillSwitchScope;
    use crate::identifiers::SessionId;
    use crate::identifiers::ToolName;

    #[test]
    fn store_keys_are_disjoint_across_scopes() {
        let session = KillSwitchScope::Session(SessionId::new("s1")).store_key();
        let tool = KillSwitchScope::Tool(ToolName::new("s1")).store_key();
        let global = KillSwitchScope::Global.store_key();
        assert_ne!(session, tool);
        assert_ne!(session, global);
        assert_ne!(tool, global);
    }
}
