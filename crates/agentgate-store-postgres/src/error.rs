// crates/agentgate-store-postgres/src/error.rs
// ============================================================================
// Module: Postgres Store Errors
// Description: Backend-local error type, mapped onto agentgate_core::StoreError
//              at the trait boundary.
// Purpose: Keep postgres and JSON decode failures out of the shared StoreError
//          taxonomy until the call site knows which StoreError variant they
//          represent.
// Dependencies: postgres, serde_json, agentgate-store-common, agentgate-core
// ============================================================================

//! Internal error type for this crate, mirroring
//! `agentgate-store-sqlite`'s `SqliteStoreError`: most failures fold into
//! [`StoreError::Io`], since the underlying driver error is not actionable
//! distinctly by callers above the Trace Store trait.

use agentgate_core::StoreError;
use agentgate_store_common::NormalizeError;

/// Errors raised internally by this crate's Postgres-backed implementations.
#[derive(Debug, thiserror::Error)]
pub enum PostgresStoreError {
    /// The underlying Postgres connection or statement failed.
    #[error("postgres error: {0}")]
    Postgres(#[from] postgres::Error),
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

impl From<PostgresStoreError> for StoreError {
    fn from(err: PostgresStoreError) -> Self {
        match err {
            PostgresStoreError::TenantConflict => StoreError::TenantConflict,
            PostgresStoreError::Postgres(inner) if is_constraint_violation(&inner) => {
                StoreError::Constraint(inner.to_string())
            }
            other => StoreError::Io(other.to_string()),
        }
    }
}

/// SQLSTATE class `23` is the integrity-constraint-violation class.
fn is_constraint_violation(err: &postgres::Error) -> bool {
    err.code().is_some_and(|code| code.code().starts_with("23"))
}
