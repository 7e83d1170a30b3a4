// crates/agentgate-gateway/src/store_handle.rs
// ============================================================================
// Module: Trace Store Handle
// Description: Selects and wraps one concrete TraceStore backend at startup.
// Purpose: Let the rest of the gateway stay generic over `TraceStoreHandle`
//          instead of matching on a configured backend at every call site.
// Dependencies: agentgate-core, agentgate-store-sqlite, agentgate-store-postgres,
//               agentgate-evidence
// ============================================================================

//! ## Overview
//! `agentgate_config::StoreConfig::trace_db` names a single connection string;
//! its scheme (`sqlite://` or `postgres://`) picks the backend once, at
//! startup, the same "closed set of variants selected at startup" shape used
//! throughout this workspace for [`agentgate_credential_broker`] and
//! [`agentgate_evidence::signing_hmac`]/[`agentgate_evidence::signing_ed25519`].
//! [`TraceStoreHandle`] forwards `agentgate_core::TraceStore` to whichever
//! variant is active and implements `agentgate_evidence::EvidenceBackend` by
//! forwarding to that backend's own `extra` methods, converting its
//! backend-specific error into [`agentgate_evidence::EvidenceStoreError`].

use agentgate_core::EventId;
use agentgate_core::Incident;
use agentgate_core::IncidentId;
use agentgate_core::Session;
use agentgate_core::SessionId;
use agentgate_core::StoreError;
use agentgate_core::TenantId;
use agentgate_core::Timestamp;
use agentgate_core::TraceEvent;
use agentgate_core::TraceStore;
use agentgate_core::EvidenceArchive;
use agentgate_core::HashDigest;
use agentgate_core::PolicyPackage;
use agentgate_core::PolicyVersion;
use agentgate_core::RetentionPolicy;
use agentgate_core::Rollout;
use agentgate_core::RolloutId;
use agentgate_core::TransparencyCheckpoint;
use agentgate_evidence::EvidenceBackend;
use agentgate_evidence::EvidenceStoreError;
use agentgate_store_postgres::PostgresTraceStore;
use agentgate_store_sqlite::SqliteTraceStore;

/// Error raised selecting a trace store backend from a connection string.
#[derive(Debug, thiserror::Error)]
pub enum StoreHandleError {
    /// The connection string's scheme is neither `sqlite://` nor `postgres://`.
    #[error("unsupported trace store scheme in '{0}'; expected sqlite:// or postgres://")]
    UnsupportedScheme(String),
    /// Opening the SQLite backend failed.
    #[error("sqlite trace store: {0}")]
    Sqlite(#[from] agentgate_store_sqlite::SqliteStoreError),
    /// Connecting to the Postgres backend failed.
    #[error("postgres trace store: {0}")]
    Postgres(#[from] agentgate_store_postgres::PostgresStoreError),
}

/// Error raised by an admin-surface persistence method forwarded through
/// [`TraceStoreHandle`]; wraps whatever backend-specific error the concrete
/// store produced the same way [`EvidenceStoreError`] does.
#[derive(Debug, thiserror::Error)]
#[error("trace store admin surface error: {0}")]
pub struct AdminStoreError(pub String);

/// One of the two Trace Store backends this deployment selected at startup.
pub enum TraceStoreHandle {
    /// Single-process, file- or memory-backed store.
    Sqlite(SqliteTraceStore),
    /// Networked, multi-replica store.
    Postgres(PostgresTraceStore),
}

impl TraceStoreHandle {
    /// Opens the backend named by `trace_db`'s scheme.
    ///
    /// `sqlite://:memory:` opens an in-memory database; any other
    /// `sqlite://<path>` opens (creating if absent) a file at `<path>`.
    /// `postgres://...` connects to the given DSN.
    ///
    /// # Errors
    ///
    /// Returns [`StoreHandleError`] when the scheme is unrecognized or the
    /// backend fails to open or connect.
    pub fn open(trace_db: &str) -> Result<Self, StoreHandleError> {
        if let Some(path) = trace_db.strip_prefix("sqlite://") {
            return if path == ":memory:" {
                Ok(Self::Sqlite(SqliteTraceStore::open_in_memory()?))
            } else {
                Ok(Self::Sqlite(SqliteTraceStore::open(path)?))
            };
        }
        if trace_db.starts_with("postgres://") || trace_db.starts_with("postgresql://") {
            return Ok(Self::Postgres(PostgresTraceStore::connect(trace_db)?));
        }
        Err(StoreHandleError::UnsupportedScheme(trace_db.to_string()))
    }
}

impl TraceStoreHandle {
    /// Lists every session bound to a tenant, most recently created first.
    /// Backs the `GET /sessions` admin surface; neither `TraceStore` nor any
    /// runtime pipeline collaborator needs this, so it lives here rather
    /// than on the trait, the same reasoning as the other admin methods
    /// below.
    ///
    /// # Errors
    ///
    /// Returns [`AdminStoreError`] on I/O failure.
    pub fn list_sessions(&self, tenant_id: TenantId) -> Result<Vec<Session>, AdminStoreError> {
        match self {
            Self::Sqlite(store) => store.list_sessions(tenant_id).map_err(|error| AdminStoreError(error.to_string())),
            Self::Postgres(store) => store.list_sessions(tenant_id).map_err(|error| AdminStoreError(error.to_string())),
        }
    }

    /// Reads one incident by id, regardless of its state.
    ///
    /// # Errors
    ///
    /// Returns [`AdminStoreError`] on I/O failure.
    pub fn get_incident(&self, incident_id: &IncidentId) -> Result<Option<Incident>, AdminStoreError> {
        match self {
            Self::Sqlite(store) => store.get_incident(incident_id).map_err(|error| AdminStoreError(error.to_string())),
            Self::Postgres(store) => store.get_incident(incident_id).map_err(|error| AdminStoreError(error.to_string())),
        }
    }

    /// Persists a signed policy package. See `agentgate_store_sqlite::extra`
    /// for the uniqueness contract both backends share.
    ///
    /// # Errors
    ///
    /// Returns [`AdminStoreError`] on I/O failure.
    pub fn put_policy_package(&self, package: &PolicyPackage) -> Result<(), AdminStoreError> {
        match self {
            Self::Sqlite(store) => store.put_policy_package(package).map_err(|error| AdminStoreError(error.to_string())),
            Self::Postgres(store) => store.put_policy_package(package).map_err(|error| AdminStoreError(error.to_string())),
        }
    }

    /// Reads one tenant's policy package at a specific version.
    ///
    /// # Errors
    ///
    /// Returns [`AdminStoreError`] on I/O failure.
    pub fn get_policy_package(&self, tenant_id: TenantId, version: &PolicyVersion) -> Result<Option<PolicyPackage>, AdminStoreError> {
        match self {
            Self::Sqlite(store) => store.get_policy_package(tenant_id, version).map_err(|error| AdminStoreError(error.to_string())),
            Self::Postgres(store) => {
                store.get_policy_package(tenant_id, version).map_err(|error| AdminStoreError(error.to_string()))
            }
        }
    }

    /// Persists a rollout, inserting it if new or updating its state otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`AdminStoreError`] on I/O failure.
    pub fn put_rollout(&self, rollout: &Rollout) -> Result<(), AdminStoreError> {
        match self {
            Self::Sqlite(store) => store.put_rollout(rollout).map_err(|error| AdminStoreError(error.to_string())),
            Self::Postgres(store) => store.put_rollout(rollout).map_err(|error| AdminStoreError(error.to_string())),
        }
    }

    /// Reads a rollout by id.
    ///
    /// # Errors
    ///
    /// Returns [`AdminStoreError`] on I/O failure.
    pub fn get_rollout(&self, rollout_id: &RolloutId) -> Result<Option<Rollout>, AdminStoreError> {
        match self {
            Self::Sqlite(store) => store.get_rollout(rollout_id).map_err(|error| AdminStoreError(error.to_string())),
            Self::Postgres(store) => store.get_rollout(rollout_id).map_err(|error| AdminStoreError(error.to_string())),
        }
    }

    /// Reads the current non-terminal rollout for a tenant, if one is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`AdminStoreError`] on I/O failure.
    pub fn active_rollout(&self, tenant_id: TenantId) -> Result<Option<Rollout>, AdminStoreError> {
        match self {
            Self::Sqlite(store) => store.active_rollout(tenant_id).map_err(|error| AdminStoreError(error.to_string())),
            Self::Postgres(store) => store.active_rollout(tenant_id).map_err(|error| AdminStoreError(error.to_string())),
        }
    }
}

impl TraceStore for TraceStoreHandle {
    fn load_session(&self, tenant_id: TenantId, session_id: &SessionId) -> Result<Option<Session>, StoreError> {
        match self {
            Self::Sqlite(store) => store.load_session(tenant_id, session_id),
            Self::Postgres(store) => store.load_session(tenant_id, session_id),
        }
    }

    fn bind_session(&self, session: &Session) -> Result<(), StoreError> {
        match self {
            Self::Sqlite(store) => store.bind_session(session),
            Self::Postgres(store) => store.bind_session(session),
        }
    }

    fn append_event(&self, event: &TraceEvent) -> Result<EventId, StoreError> {
        match self {
            Self::Sqlite(store) => store.append_event(event),
            Self::Postgres(store) => store.append_event(event),
        }
    }

    fn read_events(
        &self,
        tenant_id: TenantId,
        session_id: &SessionId,
        from: EventId,
        limit: usize,
    ) -> Result<Vec<TraceEvent>, StoreError> {
        match self {
            Self::Sqlite(store) => store.read_events(tenant_id, session_id, from, limit),
            Self::Postgres(store) => store.read_events(tenant_id, session_id, from, limit),
        }
    }

    fn active_incident(&self, session_id: &SessionId) -> Result<Option<Incident>, StoreError> {
        match self {
            Self::Sqlite(store) => store.active_incident(session_id),
            Self::Postgres(store) => store.active_incident(session_id),
        }
    }

    fn upsert_incident(&self, incident: &Incident) -> Result<(), StoreError> {
        match self {
            Self::Sqlite(store) => store.upsert_incident(incident),
            Self::Postgres(store) => store.upsert_incident(incident),
        }
    }

    fn delete_session(&self, tenant_id: TenantId, session_id: &SessionId) -> Result<(), StoreError> {
        match self {
            Self::Sqlite(store) => store.delete_session(tenant_id, session_id),
            Self::Postgres(store) => store.delete_session(tenant_id, session_id),
        }
    }

    fn purge_expired(&self, now: Timestamp) -> Result<u64, StoreError> {
        match self {
            Self::Sqlite(store) => store.purge_expired(now),
            Self::Postgres(store) => store.purge_expired(now),
        }
    }

    fn set_retention(&self, tenant_id: TenantId, session_id: &SessionId, retention: RetentionPolicy) -> Result<(), StoreError> {
        match self {
            Self::Sqlite(store) => store.set_retention(tenant_id, session_id, retention),
            Self::Postgres(store) => store.set_retention(tenant_id, session_id, retention),
        }
    }
}

impl EvidenceBackend for TraceStoreHandle {
    fn put_evidence_archive(&self, archive: &EvidenceArchive, integrity_hash: &HashDigest) -> Result<(), EvidenceStoreError> {
        match self {
            Self::Sqlite(store) => {
                store.put_evidence_archive(archive, integrity_hash).map_err(|error| EvidenceStoreError(error.to_string()))
            }
            Self::Postgres(store) => {
                store.put_evidence_archive(archive, integrity_hash).map_err(|error| EvidenceStoreError(error.to_string()))
            }
        }
    }

    fn list_evidence_archives(&self, session_id: &SessionId) -> Result<Vec<EvidenceArchive>, EvidenceStoreError> {
        match self {
            Self::Sqlite(store) => store.list_evidence_archives(session_id).map_err(|error| EvidenceStoreError(error.to_string())),
            Self::Postgres(store) => {
                store.list_evidence_archives(session_id).map_err(|error| EvidenceStoreError(error.to_string()))
            }
        }
    }

    fn put_transparency_checkpoint(
        &self,
        session_id: &SessionId,
        anchor_source: &str,
        checkpoint: &TransparencyCheckpoint,
    ) -> Result<(), EvidenceStoreError> {
        match self {
            Self::Sqlite(store) => store
                .put_transparency_checkpoint(session_id, anchor_source, checkpoint)
                .map_err(|error| EvidenceStoreError(error.to_string())),
            Self::Postgres(store) => store
                .put_transparency_checkpoint(session_id, anchor_source, checkpoint)
                .map_err(|error| EvidenceStoreError(error.to_string())),
        }
    }

    fn latest_transparency_checkpoint(&self, session_id: &SessionId) -> Result<Option<TransparencyCheckpoint>, EvidenceStoreError> {
        match self {
            Self::Sqlite(store) => {
                store.latest_transparency_checkpoint(session_id).map_err(|error| EvidenceStoreError(error.to_string()))
            }
            Self::Postgres(store) => {
                store.latest_transparency_checkpoint(session_id).map_err(|error| EvidenceStoreError(error.to_string()))
            }
        }
    }
}

// The admin surface (`QuarantineCoordinator`, `RolloutController`, the
// Evidence Exporter, the Transparency Log) and the hot-path `GatewayPipeline`
// each hold their `Store` generic by value, so one open `TraceStoreHandle`
// must be shared between them. Neither `TraceStore` nor `EvidenceBackend` is
// implemented for `Arc<T>` upstream, but `TraceStoreHandle` is a local type,
// so implementing them for `Arc<TraceStoreHandle>` here satisfies the orphan
// rule and lets every collaborator take `Arc<TraceStoreHandle>` instead of
// reopening the backend once per consumer.
impl TraceStore for std::sync::Arc<TraceStoreHandle> {
    fn load_session(&self, tenant_id: TenantId, session_id: &SessionId) -> Result<Option<Session>, StoreError> {
        self.as_ref().load_session(tenant_id, session_id)
    }

    fn bind_session(&self, session: &Session) -> Result<(), StoreError> {
        self.as_ref().bind_session(session)
    }

    fn append_event(&self, event: &TraceEvent) -> Result<EventId, StoreError> {
        self.as_ref().append_event(event)
    }

    fn read_events(
        &self,
        tenant_id: TenantId,
        session_id: &SessionId,
        from: EventId,
        limit: usize,
    ) -> Result<Vec<TraceEvent>, StoreError> {
        self.as_ref().read_events(tenant_id, session_id, from, limit)
    }

    fn active_incident(&self, session_id: &SessionId) -> Result<Option<Incident>, StoreError> {
        self.as_ref().active_incident(session_id)
    }

    fn upsert_incident(&self, incident: &Incident) -> Result<(), StoreError> {
        self.as_ref().upsert_incident(incident)
    }

    fn delete_session(&self, tenant_id: TenantId, session_id: &SessionId) -> Result<(), StoreError> {
        self.as_ref().delete_session(tenant_id, session_id)
    }

    fn purge_expired(&self, now: Timestamp) -> Result<u64, StoreError> {
        self.as_ref().purge_expired(now)
    }

    fn set_retention(&self, tenant_id: TenantId, session_id: &SessionId, retention: RetentionPolicy) -> Result<(), StoreError> {
        self.as_ref().set_retention(tenant_id, session_id, retention)
    }
}

impl EvidenceBackend for std::sync::Arc<TraceStoreHandle> {
    fn put_evidence_archive(&self, archive: &EvidenceArchive, integrity_hash: &HashDigest) -> Result<(), EvidenceStoreError> {
        self.as_ref().put_evidence_archive(archive, integrity_hash)
    }

    fn list_evidence_archives(&self, session_id: &SessionId) -> Result<Vec<EvidenceArchive>, EvidenceStoreError> {
        self.as_ref().list_evidence_archives(session_id)
    }

    fn put_transparency_checkpoint(
        &self,
        session_id: &SessionId,
        anchor_source: &str,
        checkpoint: &TransparencyCheckpoint,
    ) -> Result<(), EvidenceStoreError> {
        self.as_ref().put_transparency_checkpoint(session_id, anchor_source, checkpoint)
    }

    fn latest_transparency_checkpoint(&self, session_id: &SessionId) -> Result<Option<TransparencyCheckpoint>, EvidenceStoreError> {
        self.as_ref().latest_transparency_checkpoint(session_id)
    }
}

// Admin handlers hold `Arc<TraceStoreHandle>` (see `server.rs`) and reach
// the inherent admin-surface methods above via `.as_ref()`; unlike
// `TraceStore`/`EvidenceBackend`, these are inherent methods rather than
// trait impls, and Rust does not allow an inherent impl block on `Arc<T>`
// (a foreign type) even when `T` is local, so there is no forwarding block
// to add here.

#[cfg(test)]
mod tests {
    use super::TraceStoreHandle;

    #[test]
    fn in_memory_sqlite_scheme_opens() {
        let handle = TraceStoreHandle::open("sqlite://:memory:").expect("opens");
        assert!(matches!(handle, TraceStoreHandle::Sqlite(_)));
    }

    #[test]
    fn unrecognized_scheme_is_rejected() {
        let result = TraceStoreHandle::open("mysql://localhost/agentgate");
        assert!(result.is_err());
    }
}
