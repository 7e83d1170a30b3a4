// crates/agentgate-core/src/runtime/quarantine.rs
// ============================================================================
// Module: Quarantine Coordinator
// Description: Exactly-once containment orchestration for one session.
// Purpose: Drive open -> quarantined -> {revoked | failed} and the
//          operator-invoked revoked -> released edge, never duplicating a
//          kill-switch write or a credential revocation.
// Dependencies: crate::{identifiers, interfaces, model, time}
// ============================================================================

//! ## Overview
//! The coordinator is the sole mutator of incident rows.
//! Re-entry for a session that already has a non-terminal incident does not
//! open a second one; it reads back the existing incident and continues from
//! its persisted state exactly once. Recovery on restart uses
//! the same `resume` entry point the hot path uses for re-entry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::identifiers::EventId;
use crate::identifiers::IncidentId;
use crate::identifiers::SessionId;
use crate::identifiers::TenantId;
use crate::interfaces::BrokerError;
use crate::interfaces::CredentialBroker;
use crate::interfaces::KillSwitchStore;
use crate::interfaces::KillSwitchStoreError;
use crate::interfaces::StoreError;
use crate::interfaces::TraceStore;
use crate::model::Incident;
use crate::model::IncidentState;
use crate::model::IncidentTimelineStep;
use crate::model::KillSwitchRow;
use crate::model::KillSwitchScope;
use crate::model::TraceEvent;
use crate::model::TraceEventKind;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Risk Signal
// ============================================================================

/// Rolling per-session risk signal the gateway pipeline feeds the coordinator
/// after each decision event. The exact computation (window size, weighting)
/// is owned by the caller; the coordinator only consumes the resulting score
/// against its configured threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskSignal {
    /// Session the signal was computed for.
    pub session_id_hash: u64,
    /// Rolling risk score; triggers quarantine when `>= threshold`.
    pub score: f64,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while driving a containment transition.
#[derive(Debug, Error)]
pub enum QuarantineError {
    /// The trace store could not read or write incident state.
    #[error("quarantine trace store error: {0}")]
    Store(#[from] StoreError),
    /// The kill-switch store could not be written.
    #[error("quarantine kill-switch error: {0}")]
    KillSwitch(#[from] KillSwitchStoreError),
    /// The credential broker could not complete revocation.
    #[error("quarantine broker error: {0}")]
    Broker(#[from] BrokerError),
    /// The release was attempted on an incident not in a releasable state.
    #[error("incident {0} is not in a releasable state")]
    NotReleasable(IncidentId),
}

// ============================================================================
// SECTION: Quarantine Coordinator
// ============================================================================

/// Drives the exactly-once containment sequence for one session at a time.
pub struct QuarantineCoordinator<Store, Kill, Broker> {
    /// Trace store, the sole source of truth for incident rows.
    store: Store,
    /// Kill-switch backing store.
    kill_switch: Kill,
    /// Credential broker used for revocation.
    broker: Broker,
}

impl<Store, Kill, Broker> QuarantineCoordinator<Store, Kill, Broker>
where
    Store: TraceStore,
    Kill: KillSwitchStore,
    Broker: CredentialBroker,
{
    /// Creates a new coordinator over the given collaborators.
    #[must_use]
    pub const fn new(store: Store, kill_switch: Kill, broker: Broker) -> Self {
        Self { store, kill_switch, broker }
    }

    /// Appends one containment-lifecycle trace event for `incident`.
    fn append_trace_event(
        &self,
        incident: &Incident,
        kind: TraceEventKind,
        reason: String,
        now: Timestamp,
    ) -> Result<(), QuarantineError> {
        let integrity_hash = crate::hashing::hash_bytes(
            crate::hashing::DEFAULT_HASH_ALGORITHM,
            format!("{}:{:?}:{reason}", incident.incident_id, kind).as_bytes(),
        );
        let event = TraceEvent {
            event_id: EventId::FIRST,
            session_id: incident.session_id.clone(),
            tenant_id: incident.tenant_id,
            timestamp: now,
            kind,
            tool_name: None,
            decision: None,
            reason,
            policy_version: None,
            rate_limit_snapshot: None,
            payload: None,
            integrity_hash,
        };
        self.store.append_event(&event)?;
        Ok(())
    }

    /// Opens or resumes containment for `session_id`, driving it through to
    /// `revoked` or `failed`.
    ///
    /// If a non-terminal incident already exists for the session, this
    /// resumes from its persisted state instead of creating a duplicate
    /// exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`QuarantineError`] when any containment sub-step fails after
    /// retries are exhausted by the underlying collaborator.
    pub fn contain(
        &self,
        tenant_id: TenantId,
        session_id: &SessionId,
        incident_id: IncidentId,
        reason: &str,
        opened_by: &str,
        now: Timestamp,
    ) -> Result<Incident, QuarantineError> {
        let mut incident = match self.store.active_incident(session_id)? {
            Some(existing) => existing,
            None => {
                let opened = Incident::open(incident_id, session_id.clone(), tenant_id, opened_by, reason, now);
                self.store.upsert_incident(&opened)?;
                opened
            }
        };

        if incident.state == IncidentState::Open {
            self.advance_to_quarantined(&mut incident, now)?;
        }
        if incident.state == IncidentState::Quarantined {
            self.advance_to_revoked(&mut incident, now)?;
        }
        Ok(incident)
    }

    /// Sets the session kill-switch and marks the incident quarantined.
    fn advance_to_quarantined(&self, incident: &mut Incident, now: Timestamp) -> Result<(), QuarantineError> {
        let scope = KillSwitchScope::Session(incident.session_id.clone());
        let row = KillSwitchRow {
            scope,
            active: true,
            set_at: now,
            set_by: "quarantine-coordinator".to_string(),
            reason: incident.reason.clone(),
        };
        match self.kill_switch.write(&row) {
            Ok(()) => {
                incident.record_step(IncidentTimelineStep::KillSwitchSet, now, true, "");
                incident.state = IncidentState::Quarantined;
                incident.record_step(IncidentTimelineStep::QuarantineConfirmed, now, true, "");
                self.store.upsert_incident(incident)?;
                self.append_trace_event(incident, TraceEventKind::Kill, incident.reason.clone(), now)?;
                self.append_trace_event(incident, TraceEventKind::Quarantine, incident.reason.clone(), now)?;
                Ok(())
            }
            Err(err) => {
                incident.record_step(IncidentTimelineStep::KillSwitchSet, now, false, err.to_string());
                incident.state = IncidentState::Failed;
                self.store.upsert_incident(incident)?;
                Err(QuarantineError::KillSwitch(err))
            }
        }
    }

    /// Revokes every live credential for the session and marks the incident revoked.
    fn advance_to_revoked(&self, incident: &mut Incident, now: Timestamp) -> Result<(), QuarantineError> {
        match self.broker.revoke_session(&incident.session_id, &incident.reason) {
            Ok(()) => {
                incident.record_step(IncidentTimelineStep::CredentialsRevoked, now, true, "");
                incident.state = IncidentState::Revoked;
                self.store.upsert_incident(incident)?;
                self.append_trace_event(incident, TraceEventKind::Revocation, incident.reason.clone(), now)?;
                Ok(())
            }
            Err(err) => {
                incident.record_step(IncidentTimelineStep::CredentialsRevoked, now, false, err.to_string());
                incident.state = IncidentState::Failed;
                self.store.upsert_incident(incident)?;
                Err(QuarantineError::Broker(err))
            }
        }
    }

    /// Releases a `revoked` incident, clearing the session kill-switch.
    ///
    /// Callers must verify the `incident_admin` capability before invoking
    /// this: the coordinator performs only the state
    /// transition, not authorization.
    ///
    /// # Errors
    ///
    /// Returns [`QuarantineError::NotReleasable`] when the incident is not in
    /// the `Revoked` state, and other variants on collaborator failure.
    pub fn release(
        &self,
        incident: &mut Incident,
        releasing_principal: &str,
        now: Timestamp,
    ) -> Result<(), QuarantineError> {
        if incident.state != IncidentState::Revoked {
            return Err(QuarantineError::NotReleasable(incident.incident_id.clone()));
        }
        let scope = KillSwitchScope::Session(incident.session_id.clone());
        let row = KillSwitchRow {
            scope,
            active: false,
            set_at: now,
            set_by: releasing_principal.to_string(),
            reason: "operator release".to_string(),
        };
        self.kill_switch.write(&row)?;
        incident.record_step(IncidentTimelineStep::Released, now, true, releasing_principal);
        incident.state = IncidentState::Released;
        self.store.upsert_incident(incident)?;
        self.append_trace_event(incident, TraceEventKind::Release, format!("released by {releasing_principal}"), now)?;
        Ok(())
    }
}
