// crates/agentgate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Trace Store
// Description: agentgate_core::TraceStore implementation backed by a single
//              rusqlite Connection guarded by a Mutex.
// Purpose: Give single-process deployments (and tests) a durable store with
//          no external service dependency.
// Dependencies: rusqlite, agentgate-core, agentgate-store-common, serde_json
// ============================================================================

//! One SQLite connection per [`SqliteTraceStore`], serialized behind a
//! `Mutex`. WAL mode lets concurrent readers proceed while a write is
//! in-flight; the mutex itself is what actually serializes writers, since
//! SQLite only ever allows one writer regardless of journal mode.

use std::path::Path;
use std::sync::Mutex;

use agentgate_core::Decision;
use agentgate_core::EventId;
use agentgate_core::HashDigest;
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
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;

use crate::error::SqliteStoreError;
use crate::migrations;

/// SQLite-backed [`TraceStore`] for single-process deployments.
pub struct SqliteTraceStore {
    pub(crate) connection: Mutex<Connection>,
}

impl SqliteTraceStore {
    /// Opens (creating if absent) a database file at `path`, applying every
    /// pending migration.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the connection cannot be opened or a
    /// migration fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SqliteStoreError> {
        let mut connection = Connection::open(path)?;
        configure(&mut connection)?;
        migrations::run(&mut connection)?;
        Ok(Self { connection: Mutex::new(connection) })
    }

    /// Opens an in-memory database, primarily for tests.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the connection cannot be opened or a
    /// migration fails.
    pub fn open_in_memory() -> Result<Self, SqliteStoreError> {
        let mut connection = Connection::open_in_memory()?;
        migrations::run(&mut connection)?;
        Ok(Self { connection: Mutex::new(connection) })
    }

    pub(crate) fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Locks the connection for the admin-surface methods in
    /// [`crate::extra`]; a separate name from [`Self::lock`] only so call
    /// sites read clearly about which surface they belong to.
    pub(crate) fn lock_for_extra(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.lock()
    }
}

fn configure(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    connection.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;",
    )?;
    Ok(())
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

fn kind_from_sql(raw: &str) -> Result<TraceEventKind, SqliteStoreError> {
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

fn decision_from_sql(raw: &str) -> Result<Decision, SqliteStoreError> {
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

fn incident_state_from_sql(raw: &str) -> Result<IncidentState, SqliteStoreError> {
    match raw {
        "open" => Ok(IncidentState::Open),
        "quarantined" => Ok(IncidentState::Quarantined),
        "released" => Ok(IncidentState::Released),
        "revoked" => Ok(IncidentState::Revoked),
        "failed" => Ok(IncidentState::Failed),
        other => Err(agentgate_store_common::NormalizeError::Malformed(format!("unrecognized incident state: {other}")).into()),
    }
}

fn row_to_trace_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<TraceEvent, SqliteStoreError>> {
    let event_id_raw: i64 = row.get("event_id")?;
    let tenant_id_raw: String = row.get("tenant_id")?;
    let kind_raw: String = row.get("kind")?;
    let tool_name: Option<String> = row.get("tool_name")?;
    let decision_raw: Option<String> = row.get("decision")?;
    let policy_version: Option<String> = row.get("policy_version")?;
    let rate_limit_json: Option<String> = row.get("rate_limit_json")?;
    let payload_json: Option<String> = row.get("payload_json")?;
    let integrity_hash_raw: String = row.get("integrity_hash")?;
    let session_id: String = row.get("session_id")?;
    let timestamp: i64 = row.get("timestamp")?;
    let reason: String = row.get("reason")?;

    Ok((|| -> Result<TraceEvent, SqliteStoreError> {
        let decision = decision_raw.as_deref().map(decision_from_sql).transpose()?;
        let rate_limit_snapshot = rate_limit_json
            .as_deref()
            .map(serde_json::from_str::<RateLimitSnapshot>)
            .transpose()?;
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
    })())
}

// ============================================================================
// SECTION: TraceStore Implementation
// ============================================================================

impl TraceStore for SqliteTraceStore {
    fn load_session(&self, tenant_id: TenantId, session_id: &SessionId) -> Result<Option<Session>, StoreError> {
        load_session_inner(&self.lock(), tenant_id, session_id).map_err(Into::into)
    }

    fn bind_session(&self, session: &Session) -> Result<(), StoreError> {
        bind_session_inner(&self.lock(), session).map_err(Into::into)
    }

    fn append_event(&self, event: &TraceEvent) -> Result<EventId, StoreError> {
        append_event_inner(&self.lock(), event).map_err(Into::into)
    }

    fn read_events(
        &self,
        tenant_id: TenantId,
        session_id: &SessionId,
        from: EventId,
        limit: usize,
    ) -> Result<Vec<TraceEvent>, StoreError> {
        read_events_inner(&self.lock(), tenant_id, session_id, from, limit).map_err(Into::into)
    }

    fn active_incident(&self, session_id: &SessionId) -> Result<Option<Incident>, StoreError> {
        active_incident_inner(&self.lock(), session_id).map_err(Into::into)
    }

    fn upsert_incident(&self, incident: &Incident) -> Result<(), StoreError> {
        upsert_incident_inner(&self.lock(), incident).map_err(Into::into)
    }

    fn delete_session(&self, tenant_id: TenantId, session_id: &SessionId) -> Result<(), StoreError> {
        let connection = self.lock();
        if has_legal_hold(&connection, tenant_id, session_id).map_err(StoreError::from)? {
            return Err(StoreError::LegalHoldSet);
        }
        delete_session_inner(&connection, tenant_id, session_id).map_err(Into::into)
    }

    fn purge_expired(&self, now: Timestamp) -> Result<u64, StoreError> {
        purge_expired_inner(&self.lock(), now).map_err(Into::into)
    }

    fn set_retention(&self, tenant_id: TenantId, session_id: &SessionId, retention: RetentionPolicy) -> Result<(), StoreError> {
        set_retention_inner(&self.lock(), tenant_id, session_id, retention).map_err(Into::into)
    }
}

fn load_session_inner(
    connection: &Connection,
    tenant_id: TenantId,
    session_id: &SessionId,
) -> Result<Option<Session>, SqliteStoreError> {
    connection
        .query_row(
            "SELECT session_id, tenant_id, created_at, retention_deadline, legal_hold
             FROM sessions WHERE session_id = ?1 AND tenant_id = ?2",
            params![session_id.as_str(), tenant_id_to_sql(tenant_id)],
            |row| {
                let session_id: String = row.get(0)?;
                let tenant_id_raw: String = row.get(1)?;
                let created_at: i64 = row.get(2)?;
                let deadline: Option<i64> = row.get(3)?;
                let legal_hold: bool = row.get(4)?;
                Ok((session_id, tenant_id_raw, created_at, deadline, legal_hold))
            },
        )
        .optional()?
        .map(|(session_id, tenant_id_raw, created_at, deadline, legal_hold)| {
            Ok(Session {
                session_id: SessionId::new(session_id),
                tenant_id: tenant_id_from_sql(&tenant_id_raw)?,
                created_at: Timestamp::from_unix_millis(created_at),
                retention: RetentionPolicy { deadline: deadline.map(Timestamp::from_unix_millis), legal_hold },
            })
        })
        .transpose()
}

fn bind_session_inner(connection: &Connection, session: &Session) -> Result<(), SqliteStoreError> {
    let existing_tenant: Option<String> = connection
        .query_row(
            "SELECT tenant_id FROM sessions WHERE session_id = ?1",
            params![session.session_id.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(existing_tenant_raw) = existing_tenant {
        let existing_tenant = tenant_id_from_sql(&existing_tenant_raw)?;
        if existing_tenant != session.tenant_id {
            return Err(SqliteStoreError::TenantConflict);
        }
        return Ok(());
    }

    connection.execute(
        "INSERT INTO sessions (session_id, tenant_id, created_at, retention_deadline, legal_hold)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            session.session_id.as_str(),
            tenant_id_to_sql(session.tenant_id),
            session.created_at.as_unix_millis(),
            session.retention.deadline.map(Timestamp::as_unix_millis),
            session.retention.legal_hold,
        ],
    )?;
    Ok(())
}

fn append_event_inner(connection: &Connection, event: &TraceEvent) -> Result<EventId, SqliteStoreError> {
    let next_raw: i64 = connection.query_row(
        "SELECT COALESCE(MAX(event_id), 0) + 1 FROM trace_events WHERE session_id = ?1",
        params![event.session_id.as_str()],
        |row| row.get(0),
    )?;
    let event_id = event_id_from_sql(next_raw)?;

    let rate_limit_json = event.rate_limit_snapshot.as_ref().map(serde_json::to_string).transpose()?;
    let payload_json = event.payload.as_ref().map(serde_json::to_string).transpose()?;

    connection.execute(
        "INSERT INTO trace_events (
            session_id, event_id, tenant_id, timestamp, kind, tool_name, decision,
            reason, policy_version, rate_limit_json, payload_json, integrity_hash
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            event.session_id.as_str(),
            event_id_to_sql(event_id),
            tenant_id_to_sql(event.tenant_id),
            event.timestamp.as_unix_millis(),
            kind_to_sql(event.kind),
            event.tool_name.as_ref().map(ToolName::as_str),
            event.decision.map(decision_to_sql),
            event.reason,
            event.policy_version.as_ref().map(PolicyVersion::as_str),
            rate_limit_json,
            payload_json,
            hash_digest_to_sql(&event.integrity_hash),
        ],
    )?;
    Ok(event_id)
}

fn read_events_inner(
    connection: &Connection,
    tenant_id: TenantId,
    session_id: &SessionId,
    from: EventId,
    limit: usize,
) -> Result<Vec<TraceEvent>, SqliteStoreError> {
    let mut statement = connection.prepare(
        "SELECT session_id, event_id, tenant_id, timestamp, kind, tool_name, decision,
                reason, policy_version, rate_limit_json, payload_json, integrity_hash
         FROM trace_events
         WHERE session_id = ?1 AND tenant_id = ?2 AND event_id >= ?3
         ORDER BY event_id ASC
         LIMIT ?4",
    )?;
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = statement.query_map(
        params![session_id.as_str(), tenant_id_to_sql(tenant_id), event_id_to_sql(from), limit],
        row_to_trace_event,
    )?;
    let mut events = Vec::new();
    for row in rows {
        events.push(row??);
    }
    Ok(events)
}

fn active_incident_inner(connection: &Connection, session_id: &SessionId) -> Result<Option<Incident>, SqliteStoreError> {
    connection
        .query_row(
            "SELECT incident_id, session_id, tenant_id, state, opened_by, reason, opened_at, timeline_json
             FROM incidents WHERE session_id = ?1 AND state IN ('open', 'quarantined')",
            params![session_id.as_str()],
            row_to_incident,
        )
        .optional()?
        .transpose()
}

pub(crate) fn row_to_incident(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Incident, SqliteStoreError>> {
    let incident_id: String = row.get(0)?;
    let session_id: String = row.get(1)?;
    let tenant_id_raw: String = row.get(2)?;
    let state_raw: String = row.get(3)?;
    let opened_by: String = row.get(4)?;
    let reason: String = row.get(5)?;
    let opened_at: i64 = row.get(6)?;
    let timeline_json: String = row.get(7)?;
    Ok((|| -> Result<Incident, SqliteStoreError> {
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
    })())
}

fn upsert_incident_inner(connection: &Connection, incident: &Incident) -> Result<(), SqliteStoreError> {
    let timeline_json = serde_json::to_string(&incident.timeline)?;
    connection.execute(
        "INSERT INTO incidents (incident_id, session_id, tenant_id, state, opened_by, reason, opened_at, timeline_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(incident_id) DO UPDATE SET
            state = excluded.state,
            timeline_json = excluded.timeline_json",
        params![
            incident.incident_id.as_str(),
            incident.session_id.as_str(),
            tenant_id_to_sql(incident.tenant_id),
            incident_state_to_sql(incident.state),
            incident.opened_by,
            incident.reason,
            incident.opened_at.as_unix_millis(),
            timeline_json,
        ],
    )?;
    Ok(())
}

fn has_legal_hold(connection: &Connection, tenant_id: TenantId, session_id: &SessionId) -> Result<bool, SqliteStoreError> {
    let legal_hold: Option<bool> = connection
        .query_row(
            "SELECT legal_hold FROM sessions WHERE session_id = ?1 AND tenant_id = ?2",
            params![session_id.as_str(), tenant_id_to_sql(tenant_id)],
            |row| row.get(0),
        )
        .optional()?;
    Ok(legal_hold.unwrap_or(false))
}

fn delete_session_inner(connection: &Connection, tenant_id: TenantId, session_id: &SessionId) -> Result<(), SqliteStoreError> {
    connection.execute("DELETE FROM trace_events WHERE session_id = ?1", params![session_id.as_str()])?;
    connection.execute("DELETE FROM incidents WHERE session_id = ?1", params![session_id.as_str()])?;
    connection.execute(
        "DELETE FROM sessions WHERE session_id = ?1 AND tenant_id = ?2",
        params![session_id.as_str(), tenant_id_to_sql(tenant_id)],
    )?;
    Ok(())
}

fn set_retention_inner(
    connection: &Connection,
    tenant_id: TenantId,
    session_id: &SessionId,
    retention: RetentionPolicy,
) -> Result<(), SqliteStoreError> {
    connection.execute(
        "UPDATE sessions SET retention_deadline = ?1, legal_hold = ?2 WHERE session_id = ?3 AND tenant_id = ?4",
        params![
            retention.deadline.map(Timestamp::as_unix_millis),
            retention.legal_hold,
            session_id.as_str(),
            tenant_id_to_sql(tenant_id),
        ],
    )?;
    Ok(())
}

fn purge_expired_inner(connection: &Connection, now: Timestamp) -> Result<u64, SqliteStoreError> {
    let mut statement = connection.prepare(
        "SELECT session_id FROM sessions WHERE legal_hold = 0 AND retention_deadline IS NOT NULL AND retention_deadline <= ?1",
    )?;
    let expired: Vec<String> = statement
        .query_map(params![now.as_unix_millis()], |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    for session_id in &expired {
        connection.execute("DELETE FROM trace_events WHERE session_id = ?1", params![session_id])?;
        connection.execute("DELETE FROM incidents WHERE session_id = ?1", params![session_id])?;
        connection.execute("DELETE FROM sessions WHERE session_id = ?1", params![session_id])?;
    }
    Ok(expired.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::SqliteTraceStore;
    use agentgate_core::EventId;
    use agentgate_core::HashAlgorithm;
    use agentgate_core::HashDigest;
    use agentgate_core::Incident;
    use agentgate_core::IncidentId;
    use agentgate_core::IncidentState;
    use agentgate_core::Session;
    use agentgate_core::SessionId;
    use agentgate_core::StoreError;
    use agentgate_core::TenantId;
    use agentgate_core::Timestamp;
    use agentgate_core::TraceEvent;
    use agentgate_core::TraceEventKind;
    use agentgate_core::TraceStore;
    use std::num::NonZeroU64;

    fn tenant(n: u64) -> TenantId {
        TenantId::new(NonZeroU64::new(n).expect("non-zero"))
    }

    fn tool_call_event(session_id: &SessionId, tenant_id: TenantId) -> TraceEvent {
        TraceEvent {
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
        }
    }

    #[test]
    fn bind_then_load_round_trips_a_session() {
        let store = SqliteTraceStore::open_in_memory().expect("open");
        let session_id = SessionId::new("s1");
        let session = Session::new(session_id.clone(), tenant(1), Timestamp::from_unix_millis(10));
        store.bind_session(&session).expect("bind");
        let loaded = store.load_session(tenant(1), &session_id).expect("load").expect("present");
        assert_eq!(loaded, session);
    }

    #[test]
    fn rebinding_a_different_tenant_is_rejected() {
        let store = SqliteTraceStore::open_in_memory().expect("open");
        let session_id = SessionId::new("s1");
        store.bind_session(&Session::new(session_id.clone(), tenant(1), Timestamp::from_unix_millis(0))).expect("bind");
        let conflict = store.bind_session(&Session::new(session_id, tenant(2), Timestamp::from_unix_millis(0)));
        assert!(conflict.is_err());
    }

    #[test]
    fn append_event_assigns_dense_increasing_event_ids() {
        let store = SqliteTraceStore::open_in_memory().expect("open");
        let session_id = SessionId::new("s1");
        store.bind_session(&Session::new(session_id.clone(), tenant(1), Timestamp::from_unix_millis(0))).expect("bind");
        let first = store.append_event(&tool_call_event(&session_id, tenant(1))).expect("append");
        let second = store.append_event(&tool_call_event(&session_id, tenant(1))).expect("append");
        assert_eq!(first, EventId::FIRST);
        assert_eq!(second, first.next());
    }

    #[test]
    fn read_events_returns_them_in_order_from_a_cursor() {
        let store = SqliteTraceStore::open_in_memory().expect("open");
        let session_id = SessionId::new("s1");
        store.bind_session(&Session::new(session_id.clone(), tenant(1), Timestamp::from_unix_millis(0))).expect("bind");
        for _ in 0..3 {
            store.append_event(&tool_call_event(&session_id, tenant(1))).expect("append");
        }
        let events = store.read_events(tenant(1), &session_id, EventId::FIRST.next(), 10).expect("read");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_id, EventId::FIRST.next());
    }

    #[test]
    fn only_one_active_incident_is_visible_per_session() {
        let store = SqliteTraceStore::open_in_memory().expect("open");
        let session_id = SessionId::new("s1");
        let incident =
            Incident::open(IncidentId::new("i1"), session_id.clone(), tenant(1), "x", "risk", Timestamp::from_unix_millis(0));
        store.upsert_incident(&incident).expect("upsert");
        let found = store.active_incident(&session_id).expect("query").expect("present");
        assert_eq!(found.state, IncidentState::Open);

        let mut escalated = found;
        escalated.state = IncidentState::Quarantined;
        store.upsert_incident(&escalated).expect("transition");
        let found = store.active_incident(&session_id).expect("query").expect("present");
        assert_eq!(found.state, IncidentState::Quarantined);
    }

    #[test]
    fn legal_hold_blocks_deletion() {
        let store = SqliteTraceStore::open_in_memory().expect("open");
        let session_id = SessionId::new("s1");
        let mut session = Session::new(session_id.clone(), tenant(1), Timestamp::from_unix_millis(0));
        session.retention.legal_hold = true;
        store.bind_session(&session).expect("bind");
        let result = store.delete_session(tenant(1), &session_id);
        assert!(matches!(result, Err(StoreError::LegalHoldSet)));
    }

    #[test]
    fn purge_expired_removes_only_past_deadline_sessions_without_holds() {
        let store = SqliteTraceStore::open_in_memory().expect("open");
        let expired_id = SessionId::new("expired");
        let mut expired = Session::new(expired_id.clone(), tenant(1), Timestamp::from_unix_millis(0));
        expired.retention.deadline = Some(Timestamp::from_unix_millis(100));
        store.bind_session(&expired).expect("bind");

        let live_id = SessionId::new("live");
        let live = Session::new(live_id.clone(), tenant(1), Timestamp::from_unix_millis(0));
        store.bind_session(&live).expect("bind");

        let purged = store.purge_expired(Timestamp::from_unix_millis(100)).expect("purge");
        assert_eq!(purged, 1);
        assert!(store.load_session(tenant(1), &expired_id).expect("load").is_none());
        assert!(store.load_session(tenant(1), &live_id).expect("load").is_some());
    }
}
