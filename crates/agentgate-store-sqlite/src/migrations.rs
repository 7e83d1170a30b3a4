// crates/agentgate-store-sqlite/src/migrations.rs
// ============================================================================
// Module: Schema Migrations
// Description: Monotonic `schema_migrations` table, applied in registration
//              order at process start.
// Purpose: Let the schema evolve without ever leaving partial DDL behind a
//          failed step; each migration runs inside its own savepoint.
// Dependencies: rusqlite
// ============================================================================

//! Every migration is plain SQL executed inside its own `SAVEPOINT`. A
//! failing statement rolls back only that migration; migrations already
//! recorded in `schema_migrations` are skipped on the next start.

use rusqlite::Connection;

use crate::error::SqliteStoreError;

/// One registered migration: a monotonic version and the DDL it applies.
struct Migration {
    version: i64,
    sql: &'static str,
}

/// Registered migrations, in the order they must run.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: "
            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                retention_deadline INTEGER,
                legal_hold INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS trace_events (
                session_id TEXT NOT NULL,
                event_id INTEGER NOT NULL,
                tenant_id TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                kind TEXT NOT NULL,
                tool_name TEXT,
                decision TEXT,
                reason TEXT NOT NULL,
                policy_version TEXT,
                rate_limit_json TEXT,
                payload_json TEXT,
                integrity_hash TEXT NOT NULL,
                PRIMARY KEY (session_id, event_id)
            );
        ",
    },
    Migration {
        version: 2,
        sql: "
            CREATE TABLE IF NOT EXISTS incidents (
                incident_id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                state TEXT NOT NULL,
                opened_by TEXT NOT NULL,
                reason TEXT NOT NULL,
                opened_at INTEGER NOT NULL,
                timeline_json TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS incidents_one_active_per_session
                ON incidents(session_id)
                WHERE state IN ('open', 'quarantined');
        ",
    },
    Migration {
        version: 3,
        sql: "
            CREATE TABLE IF NOT EXISTS policy_packages (
                tenant_id TEXT NOT NULL,
                version TEXT NOT NULL,
                bundle_hash TEXT NOT NULL,
                signer TEXT NOT NULL,
                signature TEXT NOT NULL,
                bundle_json TEXT NOT NULL,
                PRIMARY KEY (tenant_id, version)
            );
            CREATE TABLE IF NOT EXISTS rollouts (
                rollout_id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                target_version TEXT NOT NULL,
                previous_version TEXT NOT NULL,
                state TEXT NOT NULL,
                canary_fraction_bp INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                UNIQUE (tenant_id, target_version)
            );
        ",
    },
    Migration {
        version: 4,
        sql: "
            CREATE TABLE IF NOT EXISTS evidence_archives (
                session_id TEXT NOT NULL,
                format TEXT NOT NULL,
                integrity_hash TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                first_event_id INTEGER NOT NULL,
                event_count INTEGER NOT NULL,
                merkle_root TEXT NOT NULL,
                generated_at INTEGER NOT NULL,
                anchored_checkpoint TEXT,
                PRIMARY KEY (session_id, format, integrity_hash)
            );
            CREATE TRIGGER IF NOT EXISTS evidence_archives_no_update
                BEFORE UPDATE ON evidence_archives
                BEGIN SELECT RAISE(ABORT, 'evidence_archives rows are write-once'); END;
            CREATE TRIGGER IF NOT EXISTS evidence_archives_no_delete
                BEFORE DELETE ON evidence_archives
                BEGIN SELECT RAISE(ABORT, 'evidence_archives rows are write-once'); END;

            CREATE TABLE IF NOT EXISTS transparency_checkpoints (
                session_id TEXT NOT NULL,
                root_hash TEXT NOT NULL,
                anchor_source TEXT NOT NULL,
                sequence INTEGER NOT NULL,
                tree_size INTEGER NOT NULL,
                computed_at INTEGER NOT NULL,
                anchor_ref TEXT,
                PRIMARY KEY (session_id, root_hash, anchor_source)
            );
            CREATE TRIGGER IF NOT EXISTS transparency_checkpoints_no_update
                BEFORE UPDATE ON transparency_checkpoints
                BEGIN SELECT RAISE(ABORT, 'transparency_checkpoints rows are write-once'); END;
            CREATE TRIGGER IF NOT EXISTS transparency_checkpoints_no_delete
                BEFORE DELETE ON transparency_checkpoints
                BEGIN SELECT RAISE(ABORT, 'transparency_checkpoints rows are write-once'); END;
        ",
    },
];

/// Applies every registered migration not yet recorded in
/// `schema_migrations`, in registration order, each inside its own savepoint.
///
/// # Errors
///
/// Returns [`SqliteStoreError`] when a migration's DDL fails; the savepoint
/// is rolled back automatically and no later migration runs.
pub(crate) fn run(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    connection.execute_batch("CREATE TABLE IF NOT EXISTS schema_migrations (version INTEGER PRIMARY KEY, applied_at INTEGER NOT NULL);")?;

    for migration in MIGRATIONS {
        let already_applied: bool = connection.query_row(
            "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE version = ?1)",
            rusqlite::params![migration.version],
            |row| row.get(0),
        )?;
        if already_applied {
            continue;
        }

        let savepoint = connection.savepoint()?;
        savepoint.execute_batch(migration.sql)?;
        savepoint.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![migration.version, now_unix_millis()],
        )?;
        savepoint.commit()?;
    }
    Ok(())
}

fn now_unix_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::run;
    use rusqlite::Connection;

    #[test]
    fn migrations_are_idempotent_across_repeated_runs() {
        let mut connection = Connection::open_in_memory().expect("open");
        run(&mut connection).expect("first run");
        run(&mut connection).expect("second run is a no-op");
        let applied: i64 = connection
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .expect("count");
        assert_eq!(applied, 4);
    }

    #[test]
    fn partial_active_incident_index_rejects_a_second_open_incident() {
        let mut connection = Connection::open_in_memory().expect("open");
        run(&mut connection).expect("migrate");
        connection
            .execute(
                "INSERT INTO incidents (incident_id, session_id, tenant_id, state, opened_by, reason, opened_at, timeline_json)
                 VALUES ('i1', 's1', '1', 'open', 'x', 'r', 0, '[]')",
                [],
            )
            .expect("first insert");
        let result = connection.execute(
            "INSERT INTO incidents (incident_id, session_id, tenant_id, state, opened_by, reason, opened_at, timeline_json)
             VALUES ('i2', 's1', '1', 'quarantined', 'x', 'r', 0, '[]')",
            [],
        );
        assert!(result.is_err());
    }
}
