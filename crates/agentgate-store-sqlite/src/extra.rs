// crates/agentgate-store-sqlite/src/extra.rs
// ============================================================================
// Module: Extra Persistence Capabilities
// Description: Inherent methods persisting policy packages, rollouts,
//              evidence archives, and transparency checkpoints.
// Purpose: Give the admin surface (agentgate-gateway) a durable home for the
//          entities agentgate_core::TraceStore deliberately does not cover —
//          that trait's contract is scoped to the gateway pipeline's
//          per-request needs, not the admin control plane.
// Dependencies: rusqlite, agentgate-core, agentgate-store-common, serde_json
// ============================================================================

//! These methods live outside [`agentgate_core::TraceStore`] because no
//! runtime pipeline collaborator consumes them; they exist so that
//! `agentgate-gateway`'s admin handlers (policy reload, rollout promotion,
//! evidence export, transparency publication) have one place per backend to
//! read and write their own state.

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
use rusqlite::OptionalExtension;
use rusqlite::params;

use crate::error::SqliteStoreError;
use crate::store::SqliteTraceStore;

fn rollout_state_to_sql(state: RolloutState) -> &'static str {
    match state {
        RolloutState::Queued => "queued",
        RolloutState::Canary => "canary",
        RolloutState::Promoting => "promoting",
        RolloutState::Completed => "completed",
        RolloutState::RolledBack => "rolled_back",
    }
}

fn rollout_state_from_sql(raw: &str) -> Result<RolloutState, SqliteStoreError> {
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

fn evidence_format_from_sql(raw: &str) -> Result<EvidenceFormat, SqliteStoreError> {
    match raw {
        "structured" => Ok(EvidenceFormat::Structured),
        "rendered" => Ok(EvidenceFormat::Rendered),
        "printable" => Ok(EvidenceFormat::Printable),
        other => Err(agentgate_store_common::NormalizeError::Malformed(format!("unrecognized evidence format: {other}")).into()),
    }
}

impl SqliteTraceStore {
    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Lists every session bound to a tenant, most recently created first.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] on I/O failure.
    pub fn list_sessions(&self, tenant_id: TenantId) -> Result<Vec<Session>, SqliteStoreError> {
        let connection = self.lock_for_extra();
        let mut statement = connection.prepare(
            "SELECT session_id, tenant_id, created_at, retention_deadline, legal_hold
             FROM sessions WHERE tenant_id = ?1 ORDER BY created_at DESC",
        )?;
        let rows = statement.query_map(params![tenant_id_to_sql(tenant_id)], row_to_session)?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row??);
        }
        Ok(sessions)
    }

    // ------------------------------------------------------------------
    // Incidents
    // ------------------------------------------------------------------

    /// Reads one incident by id, regardless of its state. Backs
    /// `POST /admin/incidents/{id}/release`, which needs to look an incident
    /// up directly rather than through the one-active-per-session index
    /// `active_incident` uses.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] on I/O failure.
    pub fn get_incident(&self, incident_id: &IncidentId) -> Result<Option<Incident>, SqliteStoreError> {
        let connection = self.lock_for_extra();
        connection
            .query_row(
                "SELECT incident_id, session_id, tenant_id, state, opened_by, reason, opened_at, timeline_json
                 FROM incidents WHERE incident_id = ?1",
                params![incident_id.as_str()],
                crate::store::row_to_incident,
            )
            .optional()?
            .transpose()
    }

    // ------------------------------------------------------------------
    // Policy packages
    // ------------------------------------------------------------------

    /// Persists a signed policy package, keyed by `(tenant_id, version)`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] on I/O failure or if a package already
    /// exists at this `(tenant_id, version)` with different content (policy
    /// packages are content-addressed and immutable once stored).
    pub fn put_policy_package(&self, package: &PolicyPackage) -> Result<(), SqliteStoreError> {
        let connection = self.lock_for_extra();
        connection.execute(
            "INSERT INTO policy_packages (tenant_id, version, bundle_hash, signer, signature, bundle_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(tenant_id, version) DO NOTHING",
            params![
                tenant_id_to_sql(package.tenant_id),
                package.version.as_str(),
                hash_digest_to_sql(&package.bundle_hash),
                package.signer,
                package.signature,
                serde_json::to_string(&package.bundle)?,
            ],
        )?;
        Ok(())
    }

    /// Reads one tenant's policy package at a specific version.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] on I/O failure.
    pub fn get_policy_package(
        &self,
        tenant_id: TenantId,
        version: &PolicyVersion,
    ) -> Result<Option<PolicyPackage>, SqliteStoreError> {
        let connection = self.lock_for_extra();
        connection
            .query_row(
                "SELECT tenant_id, version, bundle_hash, signer, signature, bundle_json
                 FROM policy_packages WHERE tenant_id = ?1 AND version = ?2",
                params![tenant_id_to_sql(tenant_id), version.as_str()],
                row_to_policy_package,
            )
            .optional()?
            .transpose()
    }

    // ------------------------------------------------------------------
    // Rollouts
    // ------------------------------------------------------------------

    /// Persists a rollout, inserting it if new or updating its mutable state
    /// and `updated_at` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the insert would violate the
    /// `(tenant_id, target_version)` uniqueness constraint for a second,
    /// distinct rollout.
    pub fn put_rollout(&self, rollout: &Rollout) -> Result<(), SqliteStoreError> {
        let connection = self.lock_for_extra();
        connection.execute(
            "INSERT INTO rollouts (
                rollout_id, tenant_id, target_version, previous_version, state,
                canary_fraction_bp, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(rollout_id) DO UPDATE SET
                state = excluded.state,
                updated_at = excluded.updated_at",
            params![
                rollout.rollout_id.as_str(),
                tenant_id_to_sql(rollout.tenant_id),
                rollout.target_version.as_str(),
                rollout.previous_version.as_str(),
                rollout_state_to_sql(rollout.state),
                rollout.canary_fraction_bp,
                rollout.created_at.as_unix_millis(),
                rollout.updated_at.as_unix_millis(),
            ],
        )?;
        Ok(())
    }

    /// Reads a rollout by id.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] on I/O failure.
    pub fn get_rollout(&self, rollout_id: &RolloutId) -> Result<Option<Rollout>, SqliteStoreError> {
        let connection = self.lock_for_extra();
        connection
            .query_row(
                "SELECT rollout_id, tenant_id, target_version, previous_version, state,
                        canary_fraction_bp, created_at, updated_at
                 FROM rollouts WHERE rollout_id = ?1",
                params![rollout_id.as_str()],
                row_to_rollout,
            )
            .optional()?
            .transpose()
    }

    /// Reads the current non-terminal rollout for a tenant, if one is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] on I/O failure.
    pub fn active_rollout(&self, tenant_id: TenantId) -> Result<Option<Rollout>, SqliteStoreError> {
        let connection = self.lock_for_extra();
        connection
            .query_row(
                "SELECT rollout_id, tenant_id, target_version, previous_version, state,
                        canary_fraction_bp, created_at, updated_at
                 FROM rollouts
                 WHERE tenant_id = ?1 AND state NOT IN ('completed', 'rolled_back')
                 ORDER BY created_at DESC LIMIT 1",
                params![tenant_id_to_sql(tenant_id)],
                row_to_rollout,
            )
            .optional()?
            .transpose()
    }

    // ------------------------------------------------------------------
    // Evidence archives
    // ------------------------------------------------------------------

    /// Persists a write-once evidence archive record.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when an archive already exists at this
    /// `(session_id, format, integrity_hash)` (the `evidence_archives` table
    /// rejects updates and deletes at the trigger layer; a re-export with
    /// identical content is a harmless no-op insert conflict).
    pub fn put_evidence_archive(&self, archive: &EvidenceArchive, integrity_hash: &HashDigest) -> Result<(), SqliteStoreError> {
        let connection = self.lock_for_extra();
        connection.execute(
            "INSERT INTO evidence_archives (
                session_id, format, integrity_hash, tenant_id, first_event_id, event_count,
                merkle_root, generated_at, anchored_checkpoint
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(session_id, format, integrity_hash) DO NOTHING",
            params![
                archive.session_id.as_str(),
                evidence_format_to_sql(archive.format),
                hash_digest_to_sql(integrity_hash),
                tenant_id_to_sql(archive.tenant_id),
                archive.first_event_id,
                archive.event_count,
                hash_digest_to_sql(&archive.merkle_root),
                archive.generated_at.as_unix_millis(),
                archive.anchored_checkpoint.as_ref().map(hash_digest_to_sql),
            ],
        )?;
        Ok(())
    }

    /// Lists every evidence archive exported for a session, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] on I/O failure.
    pub fn list_evidence_archives(
        &self,
        session_id: &agentgate_core::SessionId,
    ) -> Result<Vec<EvidenceArchive>, SqliteStoreError> {
        let connection = self.lock_for_extra();
        let mut statement = connection.prepare(
            "SELECT session_id, tenant_id, format, first_event_id, event_count, merkle_root,
                    generated_at, anchored_checkpoint
             FROM evidence_archives WHERE session_id = ?1 ORDER BY generated_at DESC",
        )?;
        let rows = statement.query_map(params![session_id.as_str()], row_to_evidence_archive)?;
        let mut archives = Vec::new();
        for row in rows {
            archives.push(row??);
        }
        Ok(archives)
    }

    // ------------------------------------------------------------------
    // Transparency checkpoints
    // ------------------------------------------------------------------

    /// Persists a write-once transparency checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] on I/O failure.
    pub fn put_transparency_checkpoint(
        &self,
        session_id: &agentgate_core::SessionId,
        anchor_source: &str,
        checkpoint: &TransparencyCheckpoint,
    ) -> Result<(), SqliteStoreError> {
        let connection = self.lock_for_extra();
        connection.execute(
            "INSERT INTO transparency_checkpoints (
                session_id, root_hash, anchor_source, sequence, tree_size, computed_at, anchor_ref
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(session_id, root_hash, anchor_source) DO NOTHING",
            params![
                session_id.as_str(),
                hash_digest_to_sql(&checkpoint.root),
                anchor_source,
                checkpoint.sequence,
                checkpoint.tree_size,
                checkpoint.computed_at.as_unix_millis(),
                checkpoint.anchor_ref,
            ],
        )?;
        Ok(())
    }

    /// Reads the most recently published checkpoint for a session, if any.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] on I/O failure.
    pub fn latest_transparency_checkpoint(
        &self,
        session_id: &agentgate_core::SessionId,
    ) -> Result<Option<TransparencyCheckpoint>, SqliteStoreError> {
        let connection = self.lock_for_extra();
        connection
            .query_row(
                "SELECT root_hash, sequence, tree_size, computed_at, anchor_ref
                 FROM transparency_checkpoints WHERE session_id = ?1
                 ORDER BY sequence DESC LIMIT 1",
                params![session_id.as_str()],
                row_to_checkpoint,
            )
            .optional()?
            .transpose()
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Session, SqliteStoreError>> {
    let session_id: String = row.get(0)?;
    let tenant_id_raw: String = row.get(1)?;
    let created_at: i64 = row.get(2)?;
    let deadline: Option<i64> = row.get(3)?;
    let legal_hold: bool = row.get(4)?;
    Ok((|| -> Result<Session, SqliteStoreError> {
        Ok(Session {
            session_id: SessionId::new(session_id),
            tenant_id: tenant_id_from_sql(&tenant_id_raw)?,
            created_at: Timestamp::from_unix_millis(created_at),
            retention: RetentionPolicy { deadline: deadline.map(Timestamp::from_unix_millis), legal_hold },
        })
    })())
}

fn row_to_policy_package(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<PolicyPackage, SqliteStoreError>> {
    let tenant_id_raw: String = row.get(0)?;
    let version: String = row.get(1)?;
    let bundle_hash_raw: String = row.get(2)?;
    let signer: String = row.get(3)?;
    let signature: String = row.get(4)?;
    let bundle_json: String = row.get(5)?;
    Ok((|| -> Result<PolicyPackage, SqliteStoreError> {
        Ok(PolicyPackage {
            tenant_id: tenant_id_from_sql(&tenant_id_raw)?,
            version: PolicyVersion::new(version),
            bundle_hash: hash_digest_from_sql(&bundle_hash_raw)?,
            signer,
            signature,
            bundle: serde_json::from_str(&bundle_json)?,
        })
    })())
}

fn row_to_rollout(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Rollout, SqliteStoreError>> {
    let rollout_id: String = row.get(0)?;
    let tenant_id_raw: String = row.get(1)?;
    let target_version: String = row.get(2)?;
    let previous_version: String = row.get(3)?;
    let state_raw: String = row.get(4)?;
    let canary_fraction_bp: i64 = row.get(5)?;
    let created_at: i64 = row.get(6)?;
    let updated_at: i64 = row.get(7)?;
    Ok((|| -> Result<Rollout, SqliteStoreError> {
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
    })())
}

fn row_to_evidence_archive(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<EvidenceArchive, SqliteStoreError>> {
    let session_id: String = row.get(0)?;
    let tenant_id_raw: String = row.get(1)?;
    let format_raw: String = row.get(2)?;
    let first_event_id: i64 = row.get(3)?;
    let event_count: i64 = row.get(4)?;
    let merkle_root_raw: String = row.get(5)?;
    let generated_at: i64 = row.get(6)?;
    let anchored_checkpoint: Option<String> = row.get(7)?;
    Ok((|| -> Result<EvidenceArchive, SqliteStoreError> {
        Ok(EvidenceArchive {
            session_id: agentgate_core::SessionId::new(session_id),
            tenant_id: tenant_id_from_sql(&tenant_id_raw)?,
            format: evidence_format_from_sql(&format_raw)?,
            first_event_id: u64::try_from(first_event_id).unwrap_or(0),
            event_count: u64::try_from(event_count).unwrap_or(0),
            merkle_root: hash_digest_from_sql(&merkle_root_raw)?,
            generated_at: Timestamp::from_unix_millis(generated_at),
            anchored_checkpoint: anchored_checkpoint.as_deref().map(hash_digest_from_sql).transpose()?,
        })
    })())
}

fn row_to_checkpoint(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<TransparencyCheckpoint, SqliteStoreError>> {
    let root_raw: String = row.get(0)?;
    let sequence: i64 = row.get(1)?;
    let tree_size: i64 = row.get(2)?;
    let computed_at: i64 = row.get(3)?;
    let anchor_ref: Option<String> = row.get(4)?;
    Ok((|| -> Result<TransparencyCheckpoint, SqliteStoreError> {
        Ok(TransparencyCheckpoint {
            sequence: u64::try_from(sequence).unwrap_or(0),
            root: hash_digest_from_sql(&root_raw)?,
            tree_size: u64::try_from(tree_size).unwrap_or(0),
            computed_at: Timestamp::from_unix_millis(computed_at),
            anchor_ref,
        })
    })())
}

#[cfg(test)]
mod tests {
    use super::SqliteTraceStore;
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

    fn tenant(n: u64) -> TenantId {
        TenantId::new(NonZeroU64::new(n).expect("non-zero"))
    }

    #[test]
    fn get_incident_finds_by_id_in_any_state() {
        use agentgate_core::Incident;
        use agentgate_core::IncidentId;
        use agentgate_core::SessionId;
        use agentgate_core::TraceStore;

        let store = SqliteTraceStore::open_in_memory().expect("open");
        let mut incident =
            Incident::open(IncidentId::new("inc-1"), SessionId::new("s1"), tenant(1), "risk-engine", "breach", Timestamp::from_unix_millis(0));
        store.upsert_incident(&incident).expect("upsert");
        incident.state = agentgate_core::IncidentState::Released;
        store.upsert_incident(&incident).expect("upsert terminal");

        let loaded = store.get_incident(&IncidentId::new("inc-1")).expect("get").expect("present");
        assert_eq!(loaded.state, agentgate_core::IncidentState::Released);
    }

    #[test]
    fn policy_package_round_trips() {
        let store = SqliteTraceStore::open_in_memory().expect("open");
        let bundle = serde_json::json!({"rules": []});
        let hash = agentgate_core::hashing::hash_canonical_json(HashAlgorithm::Sha256, &bundle).expect("hash");
        let package = PolicyPackage {
            tenant_id: tenant(1),
            version: PolicyVersion::new("v1"),
            bundle_hash: hash,
            signer: "key-1".to_string(),
            signature: "sig".to_string(),
            bundle,
        };
        store.put_policy_package(&package).expect("put");
        let loaded = store.get_policy_package(tenant(1), &PolicyVersion::new("v1")).expect("get").expect("present");
        assert_eq!(loaded, package);
    }

    #[test]
    fn list_sessions_filters_by_tenant_newest_first() {
        use agentgate_core::Session;
        use agentgate_core::SessionId;
        use agentgate_core::TraceStore;

        let store = SqliteTraceStore::open_in_memory().expect("open");
        store.bind_session(&Session::new(SessionId::new("s1"), tenant(1), Timestamp::from_unix_millis(100))).expect("bind");
        store.bind_session(&Session::new(SessionId::new("s2"), tenant(1), Timestamp::from_unix_millis(200))).expect("bind");
        store.bind_session(&Session::new(SessionId::new("s3"), tenant(2), Timestamp::from_unix_millis(300))).expect("bind");

        let sessions = store.list_sessions(tenant(1)).expect("list");
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].session_id, SessionId::new("s2"));
        assert_eq!(sessions[1].session_id, SessionId::new("s1"));
    }

    #[test]
    fn active_rollout_excludes_terminal_states() {
        let store = SqliteTraceStore::open_in_memory().expect("open");
        let rollout = Rollout {
            rollout_id: RolloutId::new("r1"),
            tenant_id: tenant(1),
            target_version: PolicyVersion::new("v2"),
            previous_version: PolicyVersion::new("v1"),
            state: RolloutState::Canary,
            canary_fraction_bp: 500,
            created_at: Timestamp::from_unix_millis(0),
            updated_at: Timestamp::from_unix_millis(0),
        };
        store.put_rollout(&rollout).expect("put");
        assert!(store.active_rollout(tenant(1)).expect("query").is_some());

        let mut completed = rollout;
        completed.state = RolloutState::Completed;
        store.put_rollout(&completed).expect("update");
        assert!(store.active_rollout(tenant(1)).expect("query").is_none());
    }

    #[test]
    fn evidence_archive_is_insert_only() {
        let store = SqliteTraceStore::open_in_memory().expect("open");
        let archive = agentgate_core::EvidenceArchive {
            session_id: agentgate_core::SessionId::new("s1"),
            tenant_id: tenant(1),
            format: agentgate_core::EvidenceFormat::Structured,
            first_event_id: 1,
            event_count: 2,
            merkle_root: HashDigest::new(HashAlgorithm::Sha256, b"root"),
            generated_at: Timestamp::from_unix_millis(0),
            anchored_checkpoint: None,
        };
        let integrity_hash = HashDigest::new(HashAlgorithm::Sha256, b"archive-bytes");
        store.put_evidence_archive(&archive, &integrity_hash).expect("put");
        let listed = store.list_evidence_archives(&agentgate_core::SessionId::new("s1")).expect("list");
        assert_eq!(listed.len(), 1);
    }
}
