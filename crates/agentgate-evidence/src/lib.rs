// crates/agentgate-evidence/src/lib.rs
// ============================================================================
// Crate: agentgate-evidence
// Description: Evidence Exporter and Transparency Log: signed,
//              Merkle-proved audit artifacts and anchored checkpoints.
// Dependencies: agentgate-core, ed25519-dalek, hmac, sha2, subtle, base64
// ============================================================================

//! ## Overview
//! Two independent products over the same Merkle construction:
//! [`exporter::EvidenceExporter`] renders and signs a one-shot artifact for a
//! session in any of three formats, while [`transparency::TransparencyLog`]
//! periodically publishes a checkpoint root over a session's growing event
//! history, optionally anchored externally. Both read through
//! [`backend::EvidenceBackend`], which extends `agentgate_core::TraceStore`
//! with the archive/checkpoint persistence neither the gateway pipeline nor
//! the trace store crates need on their own. Signing is pluggable between
//! [`signing_hmac::HmacSigningScheme`] and [`signing_ed25519::Ed25519SigningScheme`],
//! selected once at startup per `agentgate_config::SigningConfig`.

#![deny(missing_docs)]

mod backend;
mod exporter;
mod signing_ed25519;
mod signing_hmac;
mod transparency;

pub use backend::EvidenceBackend;
pub use backend::EvidenceStoreError;
pub use exporter::EvidenceExportError;
pub use exporter::EvidenceExporter;
pub use exporter::ExportedEvidence;
pub use exporter::SignatureBlock;
pub use signing_ed25519::Ed25519SigningBuildError;
pub use signing_ed25519::Ed25519SigningScheme;
pub use signing_hmac::HmacSigningBuildError;
pub use signing_hmac::HmacSigningScheme;
pub use transparency::CheckpointedRoot;
pub use transparency::TransparencyError;
pub use transparency::TransparencyLog;
