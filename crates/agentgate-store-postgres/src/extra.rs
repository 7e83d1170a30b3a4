// crates/agentgate-store-postgres/src/extra.rs
// ============================================================================
// Module: Extra Persistence Capabilities
// Description: Inherent methods persisting policy packages, rollouts,
//              evidence archives, and transparency checkpoints.
// Purpose: Give the admin surface (agentgate-gateway) a durable home for the
//          entities agentgate_core::TraceStore deliberately does not cover,
//          mirroring agentgate-store-sqlite's extra.rs column-for-column so
//          the two backends stay interchangeable for the admin control plane.
// Dependencies: postgres, agentgate-core, agentgate-store-common, serde_json
// ============================================================================

//! See `agentgate-store-sqlite/src/extra.rs` for the rationale: these
//! methods exist outside [`agentgate_core::TraceStore`] because no runtime
//! pipeline collaborator consumes them.

use agentgate_core::EvidenceArchive;
use agentgate_core::EvidenceFormat;
use agentgate_core::HashDigest;
use agentgate_core::Incident;
use agentgate_core::IncidentId;
use agentgate_core::PolicyPackage;
use agentgate_core::PolicyVersion;
use agentgate_core::RetentionPolicy;
use agentgate_core::Rollout;
use agentgate_core::RolloutId;
use agentgate_core::RolloutState;
use agentgate_core::Session;
use agentgate_core::SessionId;
use agentgate_core::TenantId;
use agentgate_core::Timestamp;
use agentgate_core::TransparencyCheckpoint;
use agentgate_store_common::hash_digest_from_sql;
use agentgate_store_common::hash_digest_to_sql;
use agentgate_store_common::tenant_id_from_sql;
use agentgate_store_common::tenant_id_to_sql;
use postgres::Row;

use crate::error::PostgresStoreError;
use crate::store::PostgresTraceStore;

fn rollout_state_to_sql(state: RolloutState) -> &'static str {
    match state {
        RolloutState::Queued => "queued",
        RolloutState::Canary => "canary",
        RolloutState::Promoting => "promoting",
        RolloutState::Completed => "completed",
        RolloutState::RolledBack => "rolled_back",
    }
}

fn rollout_state_from_sql(raw: &str) -> Result<RolloutState, PostgresStoreError> {
    match raw {
        "queued" => Ok(RolloutState::Queued),
        "canary" => Ok(RolloutState::Canary),
        "promoting" => Ok(RolloutState::Promoting),
        "completed" => Ok(RolloutState::Completed),
        "rolled_back" => Ok(RolloutState::RolledBack),
        other => Err(agentgate_store_common::NormalizeError::Malformed(format!("unrecognized rollout state: {other}")).into()),
    }
}

fn evidence_format_to_sql(format: EvidenceFormat) -> &'static str {
    match format {
        EvidenceFormat::Structured => "structured",
        EvidenceFormat::Rendered => "rendered",
        EvidenceFormat::Printable => "printable",
    }
}

fn evidence_format_from_sql(raw: &str) -> Result<EvidenceFormat, PostgresStoreError> {
    match raw {
        "structured" => Ok(EvidenceFormat::Structured),
        "rendered" => Ok(EvidenceFormat::Rendered),
        "printable" => Ok(EvidenceFormat::Printable),
        other => Err(agentgate_store_common::NormalizeError::Malformed(format!("unrecognized evidence format: {other}")).into()),
    }
}

impl PostgresTraceStore {
    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Lists every session bound to a tenant, most recently created first.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresStoreError`] on I/O failure.
    pub fn list_sessions(&self, tenant_id: TenantId) -> Result<Vec<Session>, PostgresStoreError> {
        let mut client = self.lock();
        let rows = client.query(
            "SELECT session_id, tenant_id, created_at, retention_deadline, legal_hold
             FROM sessions WHERE tenant_id = $1 ORDER BY created_at DESC",
            &[&tenant_id_to_sql(tenant_id)],
        )?;
        rows.iter().map(row_to_session).collect()
    }

    // ------------------------------------------------------------------
    // Incidents
    // ------------------------------------------------------------------

    /// Reads one incident by id, regardless of its state. See
    /// `agentgate-store-sqlite/src/extra.rs::get_incident` for the rationale.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresStoreError`] on I/O failure.
    pub fn get_incident(&self, incident_id: &IncidentId) -> Result<Option<Incident>, PostgresStoreError> {
        let mut client = self.lock();
        let row = client.query_opt(
            "SELECT incident_id, session_id, tenant_id, state, opened_by, reason, opened_at, timeline_json
             FROM incidents WHERE incident_id = $1",
            &[&incident_id.as_str()],
        )?;
        row.map(|row| crate::store::row_to_incident(&row)).transpose()
    }

    // ------------------------------------------------------------------
    // Policy packages
    // ------------------------------------------------------------------

    /// Persists a signed policy package, keyed by `(tenant_id, version)`.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresStoreError`] on I/O failure.
    pub fn put_policy_package(&self, package: &PolicyPackage) -> Result<(), PostgresStoreError> {
        let mut client = self.lock();
        client.execute(
            "INSERT INTO policy_packages (tenant_id, version, bundle_hash, signer, signature, bundle_json)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (tenant_id, version) DO NOTHING",
            &[
                &tenant_id_to_sql(package.tenant_id),
                &package.version.as_str(),
                &hash_digest_to_sql(&package.bundle_hash),
                &package.signer,
                &package.signature,
                &serde_json::to_string(&package.bundle)?,
            ],
        )?;
        Ok(())
    }

    /// Reads one tenant's policy package at a specific version.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresStoreError`] on I/O failure.
    pub fn get_policy_package(
        &self,
        tenant_id: TenantId,
        version: &PolicyVersion,
    ) -> Result<Option<PolicyPackage>, PostgresStoreError> {
        let mut client = self.lock();
        let row = client.query_opt(
            "SELECT tenant_id, version, bundle_hash, signer, signature, bundle_json
             FROM policy_packages WHERE tenant_id = $1 AND version = $2",
            &[&tenant_id_to_sql(tenant_id), &version.as_str()],
        )?;
        row.map(|row| row_to_policy_package(&row)).transpose()
    }

    // ------------------------------------------------------------------
    // Rollouts
    // ------------------------------------------------------------------

    /// Persists a rollout, inserting it if new or updating its mutable state
    /// and `updated_at` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresStoreError`] when the insert would violate the
    /// `(tenant_id, target_version)` uniqueness constraint for a second,
    /// distinct rollout.
    pub fn put_rollout(&self, rollout: &Rollout) -> Result<(), PostgresStoreError> {
        let mut client = self.lock();
        client.execute(
            "INSERT INTO rollouts (
                rollout_id, tenant_id, target_version, previous_version, state,
                canary_fraction_bp, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (rollout_id) DO UPDATE SET
                state = excluded.state,
                updated_at = excluded.updated_at",
            &[
                &rollout.rollout_id.as_str(),
                &tenant_id_to_sql(rollout.tenant_id),
                &rollout.target_version.as_str(),
                &rollout.previous_version.as_str(),
                &rollout_state_to_sql(rollout.state),
                &i32::from(rollout.canary_fraction_bp),
                &rollout.created_at.as_unix_millis(),
                &rollout.updated_at.as_unix_millis(),
            ],
        )?;
        Ok(())
    }

    /// Reads a rollout by id.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresStoreError`] on I/O failure.
    pub fn get_rollout(&self, rollout_id: &RolloutId) -> Result<Option<Rollout>, PostgresStoreError> {
        let mut client = self.lock();
        let row = client.query_opt(
            "SELECT rollout_id, tenant_id, target_version, previous_version, state,
                    canary_fraction_bp, created_at, updated_at
             FROM rollouts WHERE rollout_id = $1",
            &[&rollout_id.as_str()],
        )?;
        row.map(|row| row_to_rollout(&row)).transpose()
    }

    /// Reads the current non-terminal rollout for a tenant, if one is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresStoreError`] on I/O failure.
    pub fn active_rollout(&self, tenant_id: TenantId) -> Result<Option<Rollout>, PostgresStoreError> {
        let mut client = self.lock();
        let row = client.query_opt(
            "SELECT rollout_id, tenant_id, target_version, previous_version, state,
                    canary_fraction_bp, created_at, updated_at
             FROM rollouts
             WHERE tenant_id = $1 AND state NOT IN ('completed', 'rolled_back')
             ORDER BY created_at DESC LIMIT 1",
            &[&tenant_id_to_sql(tenant_id)],
        )?;
        row.map(|row| row_to_rollout(&row)).transpose()
    }

    // ------------------------------------------------------------------
    // Evidence archives
    // ------------------------------------------------------------------

    /// Persists a write-once evidence archive record.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresStoreError`] on I/O failure. An archive already
    /// present at this `(session_id, format, integrity_hash)` is a harmless
    /// no-op insert conflict; the `evidence_archives` table otherwise
    /// rejects updates and deletes at the trigger layer.
    pub fn put_evidence_archive(&self, archive: &EvidenceArchive, integrity_hash: &HashDigest) -> Result<(), PostgresStoreError> {
        let mut client = self.lock();
        client.execute(
            "INSERT INTO evidence_archives (
                session_id, format, integrity_hash, tenant_id, first_event_id, event_count,
                merkle_root, generated_at, anchored_checkpoint
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (session_id, format, integrity_hash) DO NOTHING",
            &[
                &archive.session_id.as_str(),
                &evidence_format_to_sql(archive.format),
                &hash_digest_to_sql(integrity_hash),
                &tenant_id_to_sql(archive.tenant_id),
                &i64::try_from(archive.first_event_id).unwrap_or(i64::MAX),
                &i64::try_from(archive.event_count).unwrap_or(i64::MAX),
                &hash_digest_to_sql(&archive.merkle_root),
                &archive.generated_at.as_unix_millis(),
                &archive.anchored_checkpoint.as_ref().map(hash_digest_to_sql),
            ],
        )?;
        Ok(())
    }

    /// Lists every evidence archive exported for a session, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresStoreError`] on I/O failure.
    pub fn list_evidence_archives(&self, session_id: &SessionId) -> Result<Vec<EvidenceArchive>, PostgresStoreError> {
        let mut client = self.lock();
        let rows = client.query(
            "SELECT session_id, tenant_id, format, first_event_id, event_count, merkle_root,
                    generated_at, anchored_checkpoint
             FROM evidence_archives WHERE session_id = $1 ORDER BY generated_at DESC",
            &[&session_id.as_str()],
        )?;
        rows.iter().map(row_to_evidence_archive).collect()
    }

    // ------------------------------------------------------------------
    // Transparency checkpoints
    // ------------------------------------------------------------------

    /// Persists a write-once transparency checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresStoreError`] on I/O failure.
    pub fn put_transparency_checkpoint(
        &self,
        session_id: &SessionId,
        anchor_source: &str,
        checkpoint: &TransparencyCheckpoint,
    ) -> Result<(), PostgresStoreError> {
        let mut client = self.lock();
        client.execute(
            "INSERT INTO transparency_checkpoints (
                session_id, root_hash, anchor_source, sequence, tree_size, computed_at, anchor_ref
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (session_id, root_hash, anchor_source) DO NOTHING",
            &[
                &session_id.as_str(),
                &hash_digest_to_sql(&checkpoint.root),
                &anchor_source,
                &i64::try_from(checkpoint.sequence).unwrap_or(i64::MAX),
                &i64::try_from(checkpoint.tree_size).unwrap_or(i64::MAX),
                &checkpoint.computed_at.as_unix_millis(),
                &checkpoint.anchor_ref,
            ],
        )?;
        Ok(())
    }

    /// Reads the most recently published checkpoint for a session, if any.
    ///
    /// # Errors
    ///
    /// Returns [`PostgresStoreError`] on I/O failure.
    pub fn latest_transparency_checkpoint(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<TransparencyCheckpoint>, PostgresStoreError> {
        let mut client = self.lock();
        let row = client.query_opt(
            "SELECT root_hash, sequence, tree_size, computed_at, anchor_ref
             FROM transparency_checkpoints WHERE session_id = $1
             ORDER BY sequence DESC LIMIT 1",
            &[&session_id.as_str()],
        )?;
        row.map(|row| row_to_checkpoint(&row)).transpose()
    }
}

fn row_to_session(row: &Row) -> Result<Session, PostgresStoreError> {
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
}

fn row_to_policy_package(row: &Row) -> Result<PolicyPackage, PostgresStoreError> {
    let tenant_id_raw: String = row.get(0);
    let version: String = row.get(1);
    let bundle_hash_raw: String = row.get(2);
    let signer: String = row.get(3);
    let signature: String = row.get(4);
    let bundle_json: String = row.get(5);
    Ok(PolicyPackage {
        tenant_id: tenant_id_from_sql(&tenant_id_raw)?,
        version: PolicyVersion::new(version),
        bundle_hash: hash_digest_from_sql(&bundle_hash_raw)?,
        signer,
        signature,
        bundle: serde_json::from_str(&bundle_json)?,
    })
}

fn row_to_rollout(row: &Row) -> Result<Rollout, PostgresStoreError> {
    let rollout_id: String = row.get(0);
    let tenant_id_raw: String = row.get(1);
    let target_version: String = row.get(2);
    let previous_version: String = row.get(3);
    let state_raw: String = row.get(4);
    let canary_fraction_bp: i32 = row.get(5);
    let created_at: i64 = row.get(6);
    let updated_at: i64 = row.get(7);
    Ok(Rollout {
        rollout_id: RolloutId::new(rollout_id),
        tenant_id: tenant_id_from_sql(&tenant_id_raw)?,
        target_version: PolicyVersion::new(target_version),
        previous_version: PolicyVersion::new(previous_version),
        state: rollout_state_from_sql(&state_raw)?,
        canary_fraction_bp: u16::try_from(canary_fraction_bp)
            .map_err(|_| agentgate_store_common::NormalizeError::Malformed("canary_fraction_bp out of range".to_string()))?,
        created_at: Timestamp::from_unix_millis(created_at),
        updated_at: Timestamp::from_unix_millis(updated_at),
    })
}

fn row_to_evidence_archive(row: &Row) -> Result<EvidenceArchive, PostgresStoreError> {
    let session_id: String = row.get(0);
    let tenant_id_raw: String = row.get(1);
    let format_raw: String = row.get(2);
    let first_event_id: i64 = row.get(3);
    let event_count: i64 = row.get(4);
    let merkle_root_raw: String = row.get(5);
    let generated_at: i64 = row.get(6);
    let anchored_checkpoint: Option<String> = row.get(7);
    Ok(EvidenceArchive {
        session_id: SessionId::new(session_id),
        tenant_id: tenant_id_from_sql(&tenant_id_raw)?,
        format: evidence_format_from_sql(&format_raw)?,
        first_event_id: u64::try_from(first_event_id).unwrap_or(0),
        event_count: u64::try_from(event_count).unwrap_or(0),
        merkle_root: hash_digest_from_sql(&merkle_root_raw)?,
        generated_at: Timestamp::from_unix_millis(generated_at),
        anchored_checkpoint: anchored_checkpoint.as_deref().map(hash_digest_from_sql).transpose()?,
    })
}

fn row_to_checkpoint(row: &Row) -> Result<TransparencyCheckpoint, PostgresStoreError> {
    let root_raw: String = row.get(0);
    let sequence: i64 = row.get(1);
    let tree_size: i64 = row.get(2);
    let computed_at: i64 = row.get(3);
    let anchor_ref: Option<String> = row.get(4);
    Ok(TransparencyCheckpoint {
        sequence: u64::try_from(sequence).unwrap_or(0),
        root: hash_digest_from_sql(&root_raw)?,
        tree_size: u64::try_from(tree_size).unwrap_or(0),
        computed_at: Timestamp::from_unix_millis(computed_at),
        anchor_ref,
    })
}

#[cfg(all(test, feature = "postgres-integration"))]
mod tests {
    //! Gated behind `postgres-integration`: these tests need a reachable
    //! Postgres server. See `store.rs`'s integration test module for the
    //! connection-string convention shared across this crate's tests.

    use super::PostgresTraceStore;
    use agentgate_core::HashAlgorithm;
    use agentgate_core::HashDigest;
    use agentgate_core::PolicyPackage;
    use agentgate_core::PolicyVersion;
    use agentgate_core::Rollout;
    use agentgate_core::RolloutId;
    use agentgate_core::RolloutState;
    use agentgate_core::TenantId;
    use agentgate_core::Timestamp;
    use std::num::NonZeroU64;

    fn connection_string() -> String {
        std::env::var("AGENTGATE_TEST_POSTGRES_URL")
            .unwrap_or_else(|_| "postgres://postgres@127.0.0.1/agentgate_test".to_string())
    }

    fn tenant(n: u64) -> TenantId {
        TenantId::new(NonZeroU64::new(n).expect("non-zero"))
    }

    #[test]
    fn list_sessions_filters_by_tenant() {
        use agentgate_core::Session;
        use agentgate_core::SessionId;
        use agentgate_core::TraceStore;

        let store = PostgresTraceStore::connect(&connection_string()).expect("connect");
        store
            .bind_session(&Session::new(SessionId::new("pg-s1"), tenant(201), Timestamp::from_unix_millis(100)))
            .expect("bind");
        store
            .bind_session(&Session::new(SessionId::new("pg-s2"), tenant(202), Timestamp::from_unix_millis(200)))
            .expect("bind");

        let sessions = store.list_sessions(tenant(201)).expect("list");
        assert!(sessions.iter().any(|s| s.session_id == SessionId::new("pg-s1")));
        assert!(!sessions.iter().any(|s| s.session_id == SessionId::new("pg-s2")));
    }

    #[test]
    fn get_incident_finds_by_id_in_any_state() {
        use agentgate_core::Incident;
        use agentgate_core::IncidentId;
        use agentgate_core::SessionId;
        use agentgate_core::TraceStore;

        let store = PostgresTraceStore::connect(&connection_string()).expect("connect");
        let incident = Incident::open(
            IncidentId::new("inc-pg-1"),
            SessionId::new("pg-inc-s1"),
            tenant(203),
            "risk-engine",
            "breach",
            Timestamp::from_unix_millis(0),
        );
        store.upsert_incident(&incident).expect("upsert");
        let loaded = store.get_incident(&IncidentId::new("inc-pg-1")).expect("get").expect("present");
        assert_eq!(loaded.incident_id, IncidentId::new("inc-pg-1"));
    }

    #[test]
    fn policy_package_round_trips() {
        let store = PostgresTraceStore::connect(&connection_string()).expect("connect");
        let bundle = serde_json::json!({"rules": []});
        let hash = agentgate_core::hashing::hash_canonical_json(HashAlgorithm::Sha256, &bundle).expect("hash");
        let package = PolicyPackage {
            tenant_id: tenant(101),
            version: PolicyVersion::new("v1"),
            bundle_hash: hash,
            signer: "key-1".to_string(),
            signature: "sig".to_string(),
            bundle,
        };
        store.put_policy_package(&package).expect("put");
        let loaded = store.get_policy_package(tenant(101), &PolicyVersion::new("v1")).expect("get").expect("present");
        assert_eq!(loaded, package);
    }

    #[test]
    fn active_rollout_excludes_terminal_states() {
        let store = PostgresTraceStore::connect(&connection_string()).expect("connect");
        let rollout = Rollout {
            rollout_id: RolloutId::new("r-pg-1"),
            tenant_id: tenant(102),
            target_version: PolicyVersion::new("v2"),
            previous_version: PolicyVersion::new("v1"),
            state: RolloutState::Canary,
            canary_fraction_bp: 500,
            created_at: Timestamp::from_unix_millis(0),
            updated_at: Timestamp::from_unix_millis(0),
        };
        store.put_rollout(&rollout).expect("put");
        assert!(store.active_rollout(tenant(102)).expect("query").is_some());

        let mut completed = rollout;
        completed.state = RolloutState::Completed;
        store.put_rollout(&completed).expect("update");
        assert!(store.active_rollout(tenant(102)).expect("query").is_none());
    }
}
