// crates/agentgate-store-common/src/lib.rs
// ============================================================================
// Crate: agentgate-store-common
// Description: Shared normalization layer for the Trace Store backends.
// Purpose: Keep redaction, integrity hashing, and identifier encoding
//          identical across every backend so no query depends on
//          backend-specific behavior beyond what this layer guarantees.
// Dependencies: agentgate-core, agentgate-config, hmac, sha2, serde_json
// ============================================================================

//! ## Overview
//! `agentgate-store-sqlite` and `agentgate-store-postgres` both implement
//! [`agentgate_core::TraceStore`] against their own SQL dialect, but neither
//! is allowed to invent its own answer to "what does a redacted payload look
//! like" or "how is a trace event's integrity hash computed". Those
//! decisions live here once, so the two backends can only ever diverge on
//! connection handling and SQL syntax, never on the shape of the data they
//! persist.

#![deny(missing_docs)]

mod digest;
mod ids;
mod integrity;
mod redact;

pub use digest::hash_digest_from_sql;
pub use digest::hash_digest_to_sql;
pub use ids::NormalizeError;
pub use ids::event_id_from_sql;
pub use ids::event_id_to_sql;
pub use ids::tenant_id_from_sql;
pub use ids::tenant_id_to_sql;
pub use integrity::compute_event_integrity_hash;
pub use integrity::verify_event_integrity_hash;
pub use redact::redact_value;
