// crates/agentgate-store-sqlite/src/error.rs
// ============================================================================
// Module: SQLite Store Errors
// Description: Backend-local error type, mapped onto agentgate_core::StoreError
//              at the trait boundary.
// Purpose: Keep rusqlite and JSON decode failures out of the shared StoreError
//          taxonomy until the call site knows which StoreError variant they
//          represent.
// Dependencies: rusqlite, serde_json, agentgate-store-common, agentgate-core
// ============================================================================

//! Internal error type for this crate. [`StoreError`](agentgate_core::StoreError)
//! is a small, backend-agnostic taxonomy; most failures here fold into its
//! `Io` variant, since rusqlite and JSON decode failures are not actionable
//! distinctly by callers above the Trace Store trait.

use agentgate_core::StoreError;
use agentgate_store_common::NormalizeError;

/// Errors raised internally by this crate's SQLite-backed implementations.
#[derive(Debug, thiserror::Error)]
pub enum SqliteStoreError {
    /// The underlying SQLite connection or statement failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A column's JSON payload could not be decoded.
    #[error("json decode error: {0}")]
    Json(#[from] serde_json::Error),
    /// A column value did not decode to the identifier or digest shape it is expected to carry.
    #[error("column normalization error: {0}")]
    Normalize(#[from] NormalizeError),
    /// A canonical hash could not be computed or verified.
    #[error("hash error: {0}")]
    Hash(#[from] agentgate_core::hashing::HashError),
    /// A session bind attempted to rebind an already-bound session to a
    /// different tenant.
    #[error("session already bound to a different tenant")]
    TenantConflict,
}

impl From<SqliteStoreError> for StoreError {
    fn from(err: SqliteStoreError) -> Self {
        match err {
            SqliteStoreError::TenantConflict => StoreError::TenantConflict,
            SqliteStoreError::Sqlite(inner) if is_constraint_violation(&inner) => StoreError::Constraint(inner.to_string()),
            other => StoreError::Io(other.to_string()),
        }
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(sqlite_error, _)
            if sqlite_error.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
