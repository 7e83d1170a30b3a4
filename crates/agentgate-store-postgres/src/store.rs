// crates/agentgate-store-postgres/src/store.rs
// ============================================================================
// Module: Postgres Trace Store
// Description: agentgate_core::TraceStore implementation backed by a single
//              postgres::Client guarded by a Mutex.
// Purpose: Give networked, multi-replica deployments a Trace Store whose
//          column shapes and normalization exactly match the embedded
//          (SQLite) backend, per agentgate-store-common's shared codecs.
// Dependencies: postgres, agentgate-core, agentgate-store-common, serde_json
// ============================================================================

//! One Postgres connection per [`PostgresTraceStore`], serialized behind a
//! `Mutex` for the same reason `agentgate-store-sqlite` serializes its
//! connection: every operation here is a handful of statements that must
//! observe a consistent view of `sessions`/`trace_events`/`incidents`, and a
//! single connection per store keeps that simple without a pool.

use std::sync::Mutex;

use agentgate_core::Decision;
use agentgate_core::EventId;
use agentgate_core::Incident;
use agentgate_core::IncidentId;
use agentgate_core::IncidentState;
use agentgate_core::IncidentTimelineEntry;
use agentgate_core::PolicyVersion;
use agentgate_core::RateLimitSnapshot;
use agentgate_core::RetentionPolicy;
use agentgate_core::Session;
use agentgate_core::SessionId;
use agentgate_core::StoreError;
use agentgate_core::TenantId;
use agentgate_core::Timestamp;
use agentgate_core::ToolName;
use agentgate_core::TraceEvent;
use agentgate_core::TraceEventKind;
use agentgate_core::TraceStore;
use agentgate_store_common::event_id_from_sql;
use agentgate_store_common::event_id_to_sql;
use agentgate_store_common::hash_digest_from_sql;
use agentgate_store_common::hash_digest_to_sql;
use agentgate_store_common::tenant_id_from_sql;
use agentgate_store_common::tenant_id_to_sql;
use postgres::Client;
use postgres::NoTls;
use postgres::Row;

use crate::error::PostgresStoreError;
use crate::migrations;

/// Postgres-backed [`TraceStore`] for networked, multi-replica deployments.
pub struct PostgresTraceStore {
    pub(crate) client: Mutex<Client>,
}

impl PostgresTraceStore {
    /// Connects to `conn_str` (a `postgres://` DSN) and applies every
    /// pending migration.
    ///
    /// Connections are unencrypted (`NoTls`); deployments requiring
    /// transport encryption must terminate TLS at the network layer, since
    /// this crate deliberately keeps its dependency footprint aligned with
    /// the rest of the workspace rather than adding a TLS connector crate
    /// the workspace does not otherwise use.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresStoreError`] when the connection cannot be
    /// established or a migration fails.
    pub fn connect(conn_str: &str) -> Result<Self, PostgresStoreError> {
        let mut client = Client::connect(conn_str, NoTls)?;
        migrations::run(&mut client)?;
        Ok(Self { client: Mutex::new(client) })
    }

    pub(crate) fn lock(&self) -> std::sync::MutexGuard<'_, Client> {
        self.client.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// ============================================================================
// SECTION: Column Codecs
// ============================================================================

fn kind_to_sql(kind: TraceEventKind) -> &'static str {
    match kind {
        TraceEventKind::ToolCall => "tool_call",
        TraceEventKind::Decision => "decision",
        TraceEventKind::Kill => "kill",
        TraceEventKind::Revocation => "revocation",
        TraceEventKind::Quarantine => "quarantine",
        TraceEventKind::Release => "release",
        TraceEventKind::Approval => "approval",
        TraceEventKind::Reload => "reload",
        TraceEventKind::Rollout => "rollout",
    }
}

fn kind_from_sql(raw: &str) -> Result<TraceEventKind, PostgresStoreError> {
    match raw {
        "tool_call" => Ok(TraceEventKind::ToolCall),
        "decision" => Ok(TraceEventKind::Decision),
        "kill" => Ok(TraceEventKind::Kill),
        "revocation" => Ok(TraceEventKind::Revocation),
        "quarantine" => Ok(TraceEventKind::Quarantine),
        "release" => Ok(TraceEventKind::Release),
        "approval" => Ok(TraceEventKind::Approval),
        "reload" => Ok(TraceEventKind::Reload),
        "rollout" => Ok(TraceEventKind::Rollout),
        other => Err(agentgate_store_common::NormalizeError::Malformed(format!("unrecognized trace event kind: {other}")).into()),
    }
}

fn decision_to_sql(decision: Decision) -> &'static str {
    match decision {
        Decision::Allow => "allow",
        Decision::Deny => "deny",
        Decision::RequireApproval => "require_approval",
    }
}

fn decision_from_sql(raw: &str) -> Result<Decision, PostgresStoreError> {
    match raw {
        "allow" => Ok(Decision::Allow),
        "deny" => Ok(Decision::Deny),
        "require_approval" => Ok(Decision::RequireApproval),
        other => Err(agentgate_store_common::NormalizeError::Malformed(format!("unrecognized decision: {other}")).into()),
    }
}

fn incident_state_to_sql(state: IncidentState) -> &'static str {
    match state {
        IncidentState::Open => "open",
        IncidentState::Quarantined => "quarantined",
        IncidentState::Released => "released",
        IncidentState::Revoked => "revoked",
        IncidentState::Failed => "failed",
    }
}

fn incident_state_from_sql(raw: &str) -> Result<IncidentState, PostgresStoreError> {
    match raw {
        "open" => Ok(IncidentState::Open),
        "quarantined" => Ok(IncidentState::Quarantined),
        "released" => Ok(IncidentState::Released),
        "revoked" => Ok(IncidentState::Revoked),
        "failed" => Ok(IncidentState::Failed),
        other => Err(agentgate_store_common::NormalizeError::Malformed(format!("unrecognized incident state: {other}")).into()),
    }
}

fn row_to_trace_event(row: &Row) -> Result<TraceEvent, PostgresStoreError> {
    let event_id_raw: i64 = row.get("event_id");
    let tenant_id_raw: String = row.get("tenant_id");
    let kind_raw: String = row.get("kind");
    let tool_name: Option<String> = row.get("tool_name");
    let decision_raw: Option<String> = row.get("decision");
    let policy_version: Option<String> = row.get("policy_version");
    let rate_limit_json: Option<String> = row.get("rate_limit_json");
    let payload_json: Option<String> = row.get("payload_json");
    let integrity_hash_raw: String = row.get("integrity_hash");
    let session_id: String = row.get("session_id");
    let timestamp: i64 = row.get("timestamp");
    let reason: String = row.get("reason");

    let decision = decision_raw.as_deref().map(decision_from_sql).transpose()?;
    let rate_limit_snapshot =
        rate_limit_json.as_deref().map(serde_json::from_str::<RateLimitSnapshot>).transpose()?;
    let payload = payload_json.as_deref().map(serde_json::from_str::<serde_json::Value>).transpose()?;
    Ok(TraceEvent {
        event_id: event_id_from_sql(event_id_raw)?,
        session_id: SessionId::new(session_id),
        tenant_id: tenant_id_from_sql(&tenant_id_raw)?,
        timestamp: Timestamp::from_unix_millis(timestamp),
        kind: kind_from_sql(&kind_raw)?,
        tool_name: tool_name.map(ToolName::new),
        decision,
        reason,
        policy_version: policy_version.map(PolicyVersion::new),
        rate_limit_snapshot,
        payload,
        integrity_hash: hash_digest_from_sql(&integrity_hash_raw)?,
    })
}

pub(crate) fn row_to_incident(row: &Row) -> Result<Incident, PostgresStoreError> {
    let incident_id: String = row.get("incident_id");
    let session_id: String = row.get("session_id");
    let tenant_id_raw: String = row.get("tenant_id");
    let state_raw: String = row.get("state");
    let opened_by: String = row.get("opened_by");
    let reason: String = row.get("reason");
    let opened_at: i64 = row.get("opened_at");
    let timeline_json: String = row.get("timeline_json");
    Ok(Incident {
        incident_id: IncidentId::new(incident_id),
        session_id: SessionId::new(session_id),
        tenant_id: tenant_id_from_sql(&tenant_id_raw)?,
        state: incident_state_from_sql(&state_raw)?,
        opened_by,
        reason,
        opened_at: Timestamp::from_unix_millis(opened_at),
        timeline: serde_json::from_str::<Vec<IncidentTimelineEntry>>(&timeline_json)?,
    })
}

// ============================================================================
// SECTION: TraceStore Implementation
// ============================================================================

impl TraceStore for PostgresTraceStore {
    fn load_session(&self, tenant_id: TenantId, session_id: &SessionId) -> Result<Option<Session>, StoreError> {
        load_session_inner(&mut self.lock(), tenant_id, session_id).map_err(Into::into)
    }

    fn bind_session(&self, session: &Session) -> Result<(), StoreError> {
        bind_session_inner(&mut self.lock(), session).map_err(Into::into)
    }

    fn append_event(&self, event: &TraceEvent) -> Result<EventId, StoreError> {
        append_event_inner(&mut self.lock(), event).map_err(Into::into)
    }

    fn read_events(
        &self,
        tenant_id: TenantId,
        session_id: &SessionId,
        from: EventId,
        limit: usize,
    ) -> Result<Vec<TraceEvent>, StoreError> {
        read_events_inner(&mut self.lock(), tenant_id, session_id, from, limit).map_err(Into::into)
    }

    fn active_incident(&self, session_id: &SessionId) -> Result<Option<Incident>, StoreError> {
        active_incident_inner(&mut self.lock(), session_id).map_err(Into::into)
    }

    fn upsert_incident(&self, incident: &Incident) -> Result<(), StoreError> {
        upsert_incident_inner(&mut self.lock(), incident).map_err(Into::into)
    }

    fn delete_session(&self, tenant_id: TenantId, session_id: &SessionId) -> Result<(), StoreError> {
        let mut client = self.lock();
        if has_legal_hold(&mut client, tenant_id, session_id)? {
            return Err(StoreError::LegalHoldSet);
        }
        delete_session_inner(&mut client, tenant_id, session_id).map_err(Into::into)
    }

    fn purge_expired(&self, now: Timestamp) -> Result<u64, StoreError> {
        purge_expired_inner(&mut self.lock(), now).map_err(Into::into)
    }

    fn set_retention(&self, tenant_id: TenantId, session_id: &SessionId, retention: RetentionPolicy) -> Result<(), StoreError> {
        set_retention_inner(&mut self.lock(), tenant_id, session_id, retention).map_err(Into::into)
    }
}

fn load_session_inner(
    client: &mut Client,
    tenant_id: TenantId,
    session_id: &SessionId,
) -> Result<Option<Session>, PostgresStoreError> {
    let row = client.query_opt(
        "SELECT session_id, tenant_id, created_at, retention_deadline, legal_hold
         FROM sessions WHERE session_id = $1 AND tenant_id = $2",
        &[&session_id.as_str(), &tenant_id_to_sql(tenant_id)],
    )?;
    row.map(|row| {
        let session_id: String = row.get(0);
        let tenant_id_raw: String = row.get(1);
        let created_at: i64 = row.get(2);
        let deadline: Option<i64> = row.get(3);
        let legal_hold: bool = row.get(4);
        Ok(Session {
            session_id: SessionId::new(session_id),
            tenant_id: tenant_id_from_sql(&tenant_id_raw)?,
            created_at: Timestamp::from_unix_millis(created_at),
            retention: RetentionPolicy { deadline: deadline.map(Timestamp::from_unix_millis), legal_hold },
        })
    })
    .transpose()
}

fn bind_session_inner(client: &mut Client, session: &Session) -> Result<(), PostgresStoreError> {
    let existing: Option<Row> = client
        .query_opt("SELECT tenant_id FROM sessions WHERE session_id = $1", &[&session.session_id.as_str()])?;

    if let Some(row) = existing {
        let existing_tenant_raw: String = row.get(0);
        let existing_tenant = tenant_id_from_sql(&existing_tenant_raw)?;
        if existing_tenant != session.tenant_id {
            return Err(PostgresStoreError::TenantConflict);
        }
        return Ok(());
    }

    client.execute(
        "INSERT INTO sessions (session_id, tenant_id, created_at, retention_deadline, legal_hold)
         VALUES ($1, $2, $3, $4, $5)",
        &[
            &session.session_id.as_str(),
            &tenant_id_to_sql(session.tenant_id),
            &session.created_at.as_unix_millis(),
            &session.retention.deadline.map(Timestamp::as_unix_millis),
            &session.retention.legal_hold,
        ],
    )?;
    Ok(())
}

fn append_event_inner(client: &mut Client, event: &TraceEvent) -> Result<EventId, PostgresStoreError> {
    let mut transaction = client.transaction()?;
    let next_raw: i64 = transaction
        .query_one(
            "SELECT COALESCE(MAX(event_id), 0) + 1 FROM trace_events WHERE session_id = $1",
            &[&event.session_id.as_str()],
        )?
        .get(0);
    let event_id = event_id_from_sql(next_raw)?;

    let rate_limit_json = event.rate_limit_snapshot.as_ref().map(serde_json::to_string).transpose()?;
    let payload_json = event.payload.as_ref().map(serde_json::to_string).transpose()?;

    transaction.execute(
        "INSERT INTO trace_events (
            session_id, event_id, tenant_id, timestamp, kind, tool_name, decision,
            reason, policy_version, rate_limit_json, payload_json, integrity_hash
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        &[
            &event.session_id.as_str(),
            &event_id_to_sql(event_id),
            &tenant_id_to_sql(event.tenant_id),
            &event.timestamp.as_unix_millis(),
            &kind_to_sql(event.kind),
            &event.tool_name.as_ref().map(ToolName::as_str),
            &event.decision.map(decision_to_sql),
            &event.reason,
            &event.policy_version.as_ref().map(PolicyVersion::as_str),
            &rate_limit_json,
            &payload_json,
            &hash_digest_to_sql(&event.integrity_hash),
        ],
    )?;
    transaction.commit()?;
    Ok(event_id)
}

fn read_events_inner(
    client: &mut Client,
    tenant_id: TenantId,
    session_id: &SessionId,
    from: EventId,
    limit: usize,
) -> Result<Vec<TraceEvent>, PostgresStoreError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = client.query(
        "SELECT session_id, event_id, tenant_id, timestamp, kind, tool_name, decision,
                reason, policy_version, rate_limit_json, payload_json, integrity_hash
         FROM trace_events
         WHERE session_id = $1 AND tenant_id = $2 AND event_id >= $3
         ORDER BY event_id ASC
         LIMIT $4",
        &[&session_id.as_str(), &tenant_id_to_sql(tenant_id), &event_id_to_sql(from), &limit],
    )?;
    rows.iter().map(row_to_trace_event).collect()
}

fn active_incident_inner(client: &mut Client, session_id: &SessionId) -> Result<Option<Incident>, PostgresStoreError> {
    let row = client.query_opt(
        "SELECT incident_id, session_id, tenant_id, state, opened_by, reason, opened_at, timeline_json
         FROM incidents WHERE session_id = $1 AND state IN ('open', 'quarantined')",
        &[&session_id.as_str()],
    )?;
    row.map(|row| row_to_incident(&row)).transpose()
}

fn upsert_incident_inner(client: &mut Client, incident: &Incident) -> Result<(), PostgresStoreError> {
    let timeline_json = serde_json::to_string(&incident.timeline)?;
    client.execute(
        "INSERT INTO incidents (incident_id, session_id, tenant_id, state, opened_by, reason, opened_at, timeline_json)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (incident_id) DO UPDATE SET
            state = excluded.state,
            timeline_json = excluded.timeline_json",
        &[
            &incident.incident_id.as_str(),
            &incident.session_id.as_str(),
            &tenant_id_to_sql(incident.tenant_id),
            &incident_state_to_sql(incident.state),
            &incident.opened_by,
            &incident.reason,
            &incident.opened_at.as_unix_millis(),
            &timeline_json,
        ],
    )?;
    Ok(())
}

fn has_legal_hold(
    client: &mut Client,
    tenant_id: TenantId,
    session_id: &SessionId,
) -> Result<bool, PostgresStoreError> {
    let row = client.query_opt(
        "SELECT legal_hold FROM sessions WHERE session_id = $1 AND tenant_id = $2",
        &[&session_id.as_str(), &tenant_id_to_sql(tenant_id)],
    )?;
    Ok(row.map(|row| row.get::<_, bool>(0)).unwrap_or(false))
}

fn delete_session_inner(
    client: &mut Client,
    tenant_id: TenantId,
    session_id: &SessionId,
) -> Result<(), PostgresStoreError> {
    client.execute("DELETE FROM trace_events WHERE session_id = $1", &[&session_id.as_str()])?;
    client.execute("DELETE FROM incidents WHERE session_id = $1", &[&session_id.as_str()])?;
    client.execute(
        "DELETE FROM sessions WHERE session_id = $1 AND tenant_id = $2",
        &[&session_id.as_str(), &tenant_id_to_sql(tenant_id)],
    )?;
    Ok(())
}

fn set_retention_inner(
    client: &mut Client,
    tenant_id: TenantId,
    session_id: &SessionId,
    retention: RetentionPolicy,
) -> Result<(), PostgresStoreError> {
    client.execute(
        "UPDATE sessions SET retention_deadline = $1, legal_hold = $2 WHERE session_id = $3 AND tenant_id = $4",
        &[&retention.deadline.map(Timestamp::as_unix_millis), &retention.legal_hold, &session_id.as_str(), &tenant_id_to_sql(tenant_id)],
    )?;
    Ok(())
}

fn purge_expired_inner(client: &mut Client, now: Timestamp) -> Result<u64, PostgresStoreError> {
    let rows = client.query(
        "SELECT session_id FROM sessions WHERE legal_hold = FALSE AND retention_deadline IS NOT NULL AND retention_deadline <= $1",
        &[&now.as_unix_millis()],
    )?;
    let expired: Vec<String> = rows.iter().map(|row| row.get(0)).collect();

    for session_id in &expired {
        client.execute("DELETE FROM trace_events WHERE session_id = $1", &[session_id])?;
        client.execute("DELETE FROM incidents WHERE session_id = $1", &[session_id])?;
        client.execute("DELETE FROM sessions WHERE session_id = $1", &[session_id])?;
    }
    Ok(expired.len() as u64)
}

#[cfg(all(test, feature = "postgres-integration"))]
mod tests {
    //! Gated behind `postgres-integration`: these tests need a reachable
    //! Postgres server and are not run by default, the same
    //! `testcontainers`-gated pattern used elsewhere in this workspace for
    //! integration suites. The embedded (SQLite) backend carries the
    //! equivalent coverage that runs on every build.

    use super::PostgresTraceStore;
    use agentgate_core::EventId;
    use agentgate_core::HashAlgorithm;
    use agentgate_core::HashDigest;
    use agentgate_core::Session;
    use agentgate_core::SessionId;
    use agentgate_core::TenantId;
    use agentgate_core::Timestamp;
    use agentgate_core::TraceEvent;
    use agentgate_core::TraceEventKind;
    use agentgate_core::TraceStore;
    use std::num::NonZeroU64;

    fn connection_string() -> String {
        std::env::var("AGENTGATE_TEST_POSTGRES_URL")
            .unwrap_or_else(|_| "postgres://postgres@127.0.0.1/agentgate_test".to_string())
    }

    #[test]
    fn bind_then_load_round_trips_a_session() {
        let store = PostgresTraceStore::connect(&connection_string()).expect("connect");
        let tenant_id = TenantId::new(NonZeroU64::new(1).expect("non-zero"));
        let session_id = SessionId::new(format!("s-{}", EventId::FIRST.get()));
        let session = Session::new(session_id.clone(), tenant_id, Timestamp::from_unix_millis(10));
        store.bind_session(&session).expect("bind");
        let loaded = store.load_session(tenant_id, &session_id).expect("load").expect("present");
        assert_eq!(loaded, session);
    }

    #[test]
    fn append_event_assigns_dense_increasing_event_ids() {
        let store = PostgresTraceStore::connect(&connection_string()).expect("connect");
        let tenant_id = TenantId::new(NonZeroU64::new(1).expect("non-zero"));
        let session_id = SessionId::new("s-append");
        store.bind_session(&Session::new(session_id.clone(), tenant_id, Timestamp::from_unix_millis(0))).expect("bind");
        let event = TraceEvent {
            event_id: EventId::FIRST,
            session_id: session_id.clone(),
            tenant_id,
            timestamp: Timestamp::from_unix_millis(0),
            kind: TraceEventKind::ToolCall,
            tool_name: None,
            decision: None,
            reason: "observed".to_string(),
            policy_version: None,
            rate_limit_snapshot: None,
            payload: None,
            integrity_hash: HashDigest::new(HashAlgorithm::Sha256, b"x"),
        };
        let first = store.append_event(&event).expect("append");
        let second = store.append_event(&event).expect("append");
        assert_eq!(second, first.next());
    }
}
