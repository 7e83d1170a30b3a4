// crates/agentgate-core/src/identifiers.rs
// ============================================================================
// Module: AgentGate Identifiers
// Description: Canonical opaque identifiers for sessions, tenants, and audit records.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the opaque identifiers threaded through every
//! AgentGate component. Identifiers are opaque and serialize as strings or
//! numbers on the wire; numeric identifiers enforce non-zero, 1-based
//! invariants at construction boundaries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU64;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Tenant identifier a session is bound to for its lifetime.
///
/// # Invariants
/// - Always >= 1 (non-zero, 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(NonZeroU64);

impl TenantId {
    /// Creates a tenant identifier from a non-zero value.
    #[must_use]
    pub const fn new(id: NonZeroU64) -> Self {
        Self(id)
    }

    /// Creates a tenant identifier from a raw value (returns `None` if zero).
    #[must_use]
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Returns the raw identifier value (always >= 1).
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.get().fmt(f)
    }
}

/// Macro-free opaque string identifier, used for every identifier whose wire
/// form is an agent- or operator-supplied token rather than a gateway-minted
/// sequence number.
macro_rules! opaque_string_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        ///
        /// # Invariants
        /// - Opaque UTF-8 string; no normalization or validation is applied by this type.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a new ", stringify!($name), ".")]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

opaque_string_id!(SessionId, "Session identifier, opaque and unique across tenants.");
opaque_string_id!(ToolName, "Tool name as presented to the policy engine and invoker.");
opaque_string_id!(IncidentId, "Quarantine incident identifier.");
opaque_string_id!(CredentialId, "Credential identifier issued by a credential broker variant.");
opaque_string_id!(PolicyVersion, "Tenant policy package version.");
opaque_string_id!(RuleId, "Matched rule identifier returned by the policy engine.");
opaque_string_id!(RolloutId, "Rollout identifier for a tenant policy promotion.");
opaque_string_id!(TraceId, "Correlation identifier returned to callers for one gateway request.");
opaque_string_id!(PrincipalId, "Authenticated admin principal identifier.");

/// Monotonic, per-session event identifier. Dense and strictly increasing
/// within a session, assigned by the Trace Store.
///
/// # Invariants
/// - Always >= 1 (non-zero, 1-based, first event in a session is 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(NonZeroU64);

impl EventId {
    /// Creates an event identifier from a non-zero value.
    #[must_use]
    pub const fn new(id: NonZeroU64) -> Self {
        Self(id)
    }

    /// Creates an event identifier from a raw value (returns `None` if zero).
    #[must_use]
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// Returns the raw identifier value (always >= 1).
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }

    /// Returns the next dense event identifier.
    #[must_use]
    pub fn next(self) -> Self {
        Self(NonZeroU64::new(self.0.get().saturating_add(1)).unwrap_or(self.0))
    }

    /// The first event identifier in a session.
    pub const FIRST: Self = Self(NonZeroU64::MIN);
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.get().fmt(f)
    }
}
