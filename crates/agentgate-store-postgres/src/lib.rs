// crates/agentgate-store-postgres/src/lib.rs
// ============================================================================
// Module: agentgate-store-postgres
// Description: Networked, multi-replica TraceStore backend.
// Purpose: Give production deployments a Trace Store whose column shapes and
//          normalization exactly match the embedded (SQLite) backend.
// Dependencies: postgres, agentgate-core, agentgate-store-common, serde_json
// ============================================================================

//! Postgres-backed [`agentgate_core::TraceStore`].
//!
//! [`PostgresTraceStore`] holds a single `postgres::Client` behind a mutex;
//! see [`store`] for the trait implementation and [`extra`] for the
//! admin-surface methods the trait itself does not cover.

#![deny(missing_docs)]

mod error;
mod extra;
mod migrations;
mod store;

pub use error::PostgresStoreError;
pub use store::PostgresTraceStore;
