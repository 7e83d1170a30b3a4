// crates/agentgate-core/src/interfaces/mod.rs
// ============================================================================
// Module: AgentGate Interfaces
// Description: Backend-agnostic contracts for policy, kill-switch, broker,
//              trace, and tool-invocation collaborators.
// Purpose: Let the Gateway pipeline (runtime) depend on traits instead of
//          concrete transports, so every pluggable variant in §4 of the
//          containment design satisfies one shared contract.
// Dependencies: crate::{identifiers, model, time}
// ============================================================================

//! ## Overview
//! Every external collaborator the gateway pipeline consults (the policy
//! engine, the kill-switch store, the credential broker, the trace store, the
//! downstream tool invoker, and the evidence signing scheme) is defined here
//! as a trait. Implementations must be deterministic given their inputs and
//! fail closed on transport or data errors; callers (the gateway pipeline in
//! `crate::runtime`) are responsible for retry policy and for mapping these
//! errors onto `crate::taxonomy::FailureKind`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::identifiers::CredentialId;
use crate::identifiers::EventId;
use crate::identifiers::PolicyVersion;
use crate::identifiers::RuleId;
use crate::identifiers::SessionId;
use crate::identifiers::TenantId;
use crate::identifiers::ToolName;
use crate::model::Decision;
use crate::model::Incident;
use crate::model::KillSwitchRow;
use crate::model::KillSwitchScope;
use crate::model::RetentionPolicy;
use crate::model::Session;
use crate::model::TraceEvent;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Policy Engine Client
// ============================================================================

/// Input to one policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyQuery {
    /// Tenant the session is bound to.
    pub tenant_id: TenantId,
    /// Session making the call.
    pub session_id: SessionId,
    /// Tool being invoked.
    pub tool_name: ToolName,
    /// Whether the caller presented an approval token.
    pub approval_presented: bool,
    /// Call arguments, already redacted per the configured PII mode.
    pub arguments: serde_json::Value,
    /// Active policy version for the tenant at evaluation time.
    pub policy_version: PolicyVersion,
}

/// Outcome of one policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyVerdict {
    /// The decision.
    pub decision: Decision,
    /// Machine-readable reason, surfaced in the terminal decision event.
    pub reason: String,
    /// Identifier of the rule that matched, when the engine reports one.
    pub matched_rule: Option<RuleId>,
}

/// Errors raised by a policy engine transport.
#[derive(Debug, Error)]
pub enum PolicyTransportError {
    /// The transport could not reach the engine or the engine errored.
    #[error("policy transport error: {0}")]
    Transport(String),
    /// Required mTLS material was missing in a configuration that requires it.
    #[error("policy transport missing mtls material")]
    MissingMtls,
}

/// External rule evaluator reached over a request/response transport.
///
/// # Errors
///
/// Implementations retry at most once internally; a
/// [`PolicyTransportError`] returned here has already exhausted that budget
/// and the caller must resolve it to `policy_unavailable`.
pub trait PolicyEngineClient: Send + Sync {
    /// Evaluates one query against the active policy.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyTransportError`] when the transport is unreachable or
    /// the engine reports an evaluation error.
    fn evaluate(&self, query: &PolicyQuery) -> Result<PolicyVerdict, PolicyTransportError>;
}

// ============================================================================
// SECTION: Kill-Switch Store
// ============================================================================

/// Errors raised by the shared kill-switch backing store.
#[derive(Debug, Error)]
pub enum KillSwitchStoreError {
    /// The store was unreachable after the controller's retry budget.
    #[error("kill-switch store unavailable: {0}")]
    Unavailable(String),
}

/// Shared, replica-visible backing store for kill-switch rows.
///
/// # Invariants
/// - A write linearizes before any subsequent read of the same scope by any
///   replica; implementations must provide this via the backing store's own
///   atomic operations, not client-side coordination.
pub trait KillSwitchStore: Send + Sync {
    /// Reads the current row for a scope, if one has ever been set.
    ///
    /// # Errors
    ///
    /// Returns [`KillSwitchStoreError`] when the store is unreachable.
    fn read(&self, scope: &KillSwitchScope) -> Result<Option<KillSwitchRow>, KillSwitchStoreError>;

    /// Writes a row for a scope, replacing any prior value.
    ///
    /// # Errors
    ///
    /// Returns [`KillSwitchStoreError`] when the store is unreachable.
    fn write(&self, row: &KillSwitchRow) -> Result<(), KillSwitchStoreError>;
}

// ============================================================================
// SECTION: Credential Broker
// ============================================================================

/// A time-bound, scope-limited credential issued for one allowed tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCredential {
    /// Broker-assigned credential identifier.
    pub credential_id: CredentialId,
    /// Opaque credential material, never logged in full.
    pub material: String,
    /// Expiry timestamp.
    pub expires_at: Timestamp,
}

/// Errors raised by a credential broker variant.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker failed to issue or revoke; the gateway treats this as
    /// fail-closed regardless of the underlying cause.
    #[error("credential broker failed: {0}")]
    Failed(String),
}

/// Pluggable credential issuance/revocation capability.
///
/// # Invariants
/// - `revoke` is idempotent: a repeated call for a credential already revoked
///   succeeds without error.
pub trait CredentialBroker: Send + Sync {
    /// Issues a credential scoped to one session and tool call.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when issuance fails.
    fn issue(
        &self,
        session_id: &SessionId,
        tool_name: &ToolName,
        ttl_millis: u64,
    ) -> Result<IssuedCredential, BrokerError>;

    /// Revokes a single credential.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when revocation fails.
    fn revoke(&self, credential_id: &CredentialId, reason: &str) -> Result<(), BrokerError>;

    /// Revokes every live credential issued to a session, used by the
    /// Quarantine Coordinator during containment.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when revocation fails.
    fn revoke_session(&self, session_id: &SessionId, reason: &str) -> Result<(), BrokerError>;
}

// ============================================================================
// SECTION: Trace Store
// ============================================================================

/// Errors raised by the append-only trace store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O or connection error.
    #[error("trace store io error: {0}")]
    Io(String),
    /// A uniqueness or tenant-isolation constraint was violated.
    #[error("trace store constraint violation: {0}")]
    Constraint(String),
    /// The session carries an active legal hold that forbids the operation.
    #[error("session has an active legal hold")]
    LegalHoldSet,
    /// The operation would bind a session to a second, different tenant.
    #[error("session already bound to a different tenant")]
    TenantConflict,
}

/// Durable, append-only, tenant-scoped persistence.
///
/// # Invariants
/// - `append_event` assigns a dense, strictly increasing `event_id` per
///   session; implementations must serialize concurrent appends to the same
///   session.
pub trait TraceStore: Send + Sync {
    /// Loads a session by id, scoped to `tenant_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn load_session(&self, tenant_id: TenantId, session_id: &SessionId) -> Result<Option<Session>, StoreError>;

    /// Binds a session to a tenant, creating it if it does not yet exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TenantConflict`] when the session is already
    /// bound to a different tenant.
    fn bind_session(&self, session: &Session) -> Result<(), StoreError>;

    /// Appends one trace event, assigning its `event_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure; the caller must treat this as
    /// fatal to the in-flight request per the fail-closed rule.
    fn append_event(&self, event: &TraceEvent) -> Result<EventId, StoreError>;

    /// Reads events for a session starting at `from`, up to `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn read_events(
        &self,
        tenant_id: TenantId,
        session_id: &SessionId,
        from: EventId,
        limit: usize,
    ) -> Result<Vec<TraceEvent>, StoreError>;

    /// Reads the current active (non-terminal) incident for a session, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn active_incident(&self, session_id: &SessionId) -> Result<Option<Incident>, StoreError>;

    /// Creates or updates an incident record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Constraint`] when a second non-terminal incident
    /// would be created for the same session.
    fn upsert_incident(&self, incident: &Incident) -> Result<(), StoreError>;

    /// Deletes a session and all of its trace events.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LegalHoldSet`] when the session has an active
    /// legal hold.
    fn delete_session(&self, tenant_id: TenantId, session_id: &SessionId) -> Result<(), StoreError>;

    /// Replaces a session's retention deadline and legal-hold flag.
    ///
    /// Callers that need to distinguish "no such session" should
    /// `load_session` first; this is a blind update and succeeds as a no-op
    /// against an unknown session id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn set_retention(
        &self,
        tenant_id: TenantId,
        session_id: &SessionId,
        retention: RetentionPolicy,
    ) -> Result<(), StoreError>;

    /// Deletes every session whose retention deadline has passed and which
    /// has no legal hold, returning the number of sessions purged.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on I/O failure.
    fn purge_expired(&self, now: Timestamp) -> Result<u64, StoreError>;
}

// ============================================================================
// SECTION: Tool Invoker
// ============================================================================

/// Result of forwarding a call to a downstream tool server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocationResult {
    /// Tool response payload, pre-redaction.
    pub result: serde_json::Value,
}

/// Errors raised while forwarding a call to a downstream tool.
#[derive(Debug, Error)]
pub enum ToolInvocationError {
    /// The downstream tool server errored or was unreachable.
    #[error("tool invocation failed: {0}")]
    Failed(String),
}

/// Forwards an allowed call to the configured downstream tool server.
///
/// The gateway never executes tool side effects itself; this trait is the
/// single seam through which it forwards to whatever tool runtime is
/// configured for a given tool name.
pub trait ToolInvoker: Send + Sync {
    /// Invokes `tool_name` with `arguments` using `credential` as presented
    /// authorization, subject to `deadline`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolInvocationError`] when the downstream call fails.
    fn invoke(
        &self,
        tool_name: &ToolName,
        arguments: &serde_json::Value,
        credential: Option<&IssuedCredential>,
        deadline: Timestamp,
    ) -> Result<ToolInvocationResult, ToolInvocationError>;
}

// ============================================================================
// SECTION: Rate-Limit Store
// ============================================================================

/// Errors raised by the shared rate-limit counter store.
#[derive(Debug, Error)]
pub enum RateLimitStoreError {
    /// The store was unreachable after the limiter's retry budget.
    #[error("rate-limit store unavailable: {0}")]
    Unavailable(String),
}

/// Shared, replica-visible counter store backing the sliding-window rate
/// limiter. Implementations own the window bookkeeping
/// internally (e.g. a fixed-window counter with a TTL, or a sorted set of
/// timestamps) and expose only the two operations the limiter needs.
pub trait RateLimitStore: Send + Sync {
    /// Records one call against `key` at `now` and returns the number of
    /// calls recorded for that key within the trailing `window_millis`.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitStoreError`] when the store is unreachable.
    fn record_and_count(
        &self,
        key: &str,
        now: Timestamp,
        window_millis: u64,
    ) -> Result<u32, RateLimitStoreError>;
}

// ============================================================================
// SECTION: Signing Scheme
// ============================================================================

/// Errors raised by an evidence integrity signing scheme.
#[derive(Debug, Error)]
pub enum SigningError {
    /// Key material could not be loaded from its configured source.
    #[error("signing key unavailable: {0}")]
    KeyUnavailable(String),
    /// Signing itself failed.
    #[error("signing operation failed: {0}")]
    SignFailed(String),
}

/// Pluggable integrity signature scheme for evidence exports.
///
/// # Invariants
/// - `verify` never performs network access; it is a pure function of the
///   payload, the signature block, and locally held key material.
pub trait SigningScheme: Send + Sync {
    /// Returns the algorithm identifier written into exported metadata.
    fn algorithm_id(&self) -> &'static str;

    /// Signs `payload`, returning an opaque signature block.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] when key material is unavailable or signing fails.
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, SigningError>;

    /// Verifies `signature` over `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::KeyUnavailable`] when verification key
    /// material cannot be loaded; a signature mismatch is `Ok(false)`, not an
    /// error.
    fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<bool, SigningError>;
}
