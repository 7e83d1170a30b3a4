// crates/agentgate-store-postgres/src/migrations.rs
// ============================================================================
// Module: Postgres Schema Migrations
// Description: Forward-only, idempotent schema migrations for the networked
//              Trace Store backend.
// Purpose: Mirror agentgate-store-sqlite's table shapes exactly, translated
//          to Postgres DDL (partial unique indexes, plpgsql write-once
//          triggers in place of SQLite's RAISE(ABORT, ...) trigger bodies).
// Dependencies: postgres
// ============================================================================

//! Each [`Migration`] runs inside its own savepoint; a migration that has
//! already been recorded in `schema_migrations` is skipped. Running
//! [`run`] against an up-to-date database is a no-op.

use postgres::Client;

use crate::error::PostgresStoreError;

/// One forward-only schema migration.
struct Migration {
    /// Monotonically increasing migration version.
    version: i64,
    /// DDL executed verbatim inside a savepoint.
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: "
            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                created_at BIGINT NOT NULL,
                retention_deadline BIGINT,
                legal_hold BOOLEAN NOT NULL DEFAULT FALSE
            );
            CREATE TABLE IF NOT EXISTS trace_events (
                session_id TEXT NOT NULL REFERENCES sessions(session_id),
                event_id BIGINT NOT NULL,
                tenant_id TEXT NOT NULL,
                timestamp BIGINT NOT NULL,
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
                session_id TEXT NOT NULL REFERENCES sessions(session_id),
                tenant_id TEXT NOT NULL,
                state TEXT NOT NULL,
                opened_by TEXT NOT NULL,
                reason TEXT NOT NULL,
                opened_at BIGINT NOT NULL,
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
                previous_version TEXT,
                state TEXT NOT NULL,
                canary_fraction_bp INTEGER NOT NULL,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL,
                UNIQUE (tenant_id, target_version)
            );
        ",
    },
    Migration {
        version: 4,
        sql: "
            CREATE TABLE IF NOT EXISTS evidence_archives (
                session_id TEXT NOT NULL REFERENCES sessions(session_id),
                tenant_id TEXT NOT NULL,
                format TEXT NOT NULL,
                integrity_hash TEXT NOT NULL,
                first_event_id BIGINT NOT NULL,
                event_count BIGINT NOT NULL,
                merkle_root TEXT NOT NULL,
                generated_at BIGINT NOT NULL,
                anchored_checkpoint TEXT,
                PRIMARY KEY (session_id, format, integrity_hash)
            );
            CREATE OR REPLACE FUNCTION evidence_archives_write_once()
            RETURNS trigger AS $$
            BEGIN
                RAISE EXCEPTION 'evidence_archives rows are insert-only';
            END;
            $$ LANGUAGE plpgsql;
            DROP TRIGGER IF EXISTS evidence_archives_no_update ON evidence_archives;
            CREATE TRIGGER evidence_archives_no_update
                BEFORE UPDATE OR DELETE ON evidence_archives
                FOR EACH ROW EXECUTE FUNCTION evidence_archives_write_once();

            CREATE TABLE IF NOT EXISTS transparency_checkpoints (
                session_id TEXT NOT NULL REFERENCES sessions(session_id),
                sequence BIGINT NOT NULL,
                root_hash TEXT NOT NULL,
                anchor_source TEXT NOT NULL,
                tree_size BIGINT NOT NULL,
                computed_at BIGINT NOT NULL,
                anchor_ref TEXT,
                PRIMARY KEY (session_id, root_hash, anchor_source)
            );
            CREATE OR REPLACE FUNCTION transparency_checkpoints_write_once()
            RETURNS trigger AS $$
            BEGIN
                RAISE EXCEPTION 'transparency_checkpoints rows are insert-only';
            END;
            $$ LANGUAGE plpgsql;
            DROP TRIGGER IF EXISTS transparency_checkpoints_no_update ON transparency_checkpoints;
            CREATE TRIGGER transparency_checkpoints_no_update
                BEFORE UPDATE OR DELETE ON transparency_checkpoints
                FOR EACH ROW EXECUTE FUNCTION transparency_checkpoints_write_once();
        ",
    },
];

/// Applies every migration in [`MIGRATIONS`] not yet recorded in
/// `schema_migrations`, each inside its own savepoint.
///
/// # Errors
///
/// Returns [`PostgresStoreError`] if any migration's DDL fails; the
/// enclosing savepoint is rolled back and no later migration runs.
pub fn run(client: &mut Client) -> Result<(), PostgresStoreError> {
    client.batch_execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version BIGINT PRIMARY KEY,
            applied_at BIGINT NOT NULL
        );",
    )?;

    for migration in MIGRATIONS {
        let already_applied: bool = client
            .query_one(
                "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE version = $1)",
                &[&migration.version],
            )?
            .get(0);
        if already_applied {
            continue;
        }

        let mut transaction = client.transaction()?;
        transaction.batch_execute(migration.sql)?;
        transaction.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES ($1, 0)",
            &[&migration.version],
        )?;
        transaction.commit()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    // Exercised only under the `postgres-integration` feature against a
    // reachable server; see agentgate-store-sqlite's migrations tests for
    // the equivalent embedded-backend coverage run on every build.
}
