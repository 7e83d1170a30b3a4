// crates/agentgate-store-sqlite/src/lib.rs
// ============================================================================
// Module: agentgate-store-sqlite
// Description: Embedded, single-process TraceStore backend.
// Purpose: Give single-node deployments and tests a durable store with no
//          external service dependency.
// Dependencies: rusqlite, agentgate-core, agentgate-store-common, serde_json
// ============================================================================

//! SQLite-backed [`agentgate_core::TraceStore`].
//!
//! [`SqliteTraceStore`] opens a single `rusqlite::Connection` in WAL mode and
//! serializes all access behind a mutex; see [`store`] for the trait
//! implementation and [`extra`] for the admin-surface methods the trait
//! itself does not cover.

#![deny(missing_docs)]

mod error;
mod extra;
mod migrations;
mod store;

pub use error::SqliteStoreError;
pub use store::SqliteTraceStore;
