// crates/agentgate-core/src/lib.rs
// ============================================================================
// Module: AgentGate Core Library
// Description: Public API surface for the AgentGate containment core.
// Purpose: Expose the data model, collaborator interfaces, and runtime
//          orchestration shared by every AgentGate crate.
// Dependencies: crate::{hashing, identifiers, interfaces, model, runtime,
//               taxonomy, time}
// ============================================================================

//! ## Overview
//! AgentGate core provides the Gateway pipeline, the Quarantine Coordinator,
//! the Rate Limiter, the SLO Monitor, the Merkle tree used by the
//! Transparency Log, and the data model and collaborator interfaces all of
//! these depend on. It is backend-agnostic: storage, policy transport,
//! credential issuance, tool invocation, and signing are all expressed as
//! traits in [`interfaces`] and implemented by dedicated crates
//! (`agentgate-store-sqlite`, `agentgate-store-postgres`,
//! `agentgate-policy-client`, `agentgate-credential-broker`,
//! `agentgate-evidence`).

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod hashing;
pub mod identifiers;
pub mod interfaces;
pub mod model;
pub mod runtime;
pub mod taxonomy;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use hashing::DEFAULT_HASH_ALGORITHM;
pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use hashing::HashError;

pub use identifiers::CredentialId;
pub use identifiers::EventId;
pub use identifiers::IncidentId;
pub use identifiers::PolicyVersion;
pub use identifiers::PrincipalId;
pub use identifiers::RolloutId;
pub use identifiers::RuleId;
pub use identifiers::SessionId;
pub use identifiers::TenantId;
pub use identifiers::ToolName;
pub use identifiers::TraceId;

pub use interfaces::BrokerError;
pub use interfaces::CredentialBroker;
pub use interfaces::IssuedCredential;
pub use interfaces::KillSwitchStore;
pub use interfaces::KillSwitchStoreError;
pub use interfaces::PolicyEngineClient;
pub use interfaces::PolicyQuery;
pub use interfaces::PolicyTransportError;
pub use interfaces::PolicyVerdict;
pub use interfaces::RateLimitStore;
pub use interfaces::RateLimitStoreError;
pub use interfaces::SigningError;
pub use interfaces::SigningScheme;
pub use interfaces::StoreError;
pub use interfaces::ToolInvocationError;
pub use interfaces::ToolInvocationResult;
pub use interfaces::ToolInvoker;
pub use interfaces::TraceStore;

pub use model::Decision;
pub use model::EvidenceArchive;
pub use model::EvidenceFormat;
pub use model::Incident;
pub use model::IncidentState;
pub use model::IncidentTimelineEntry;
pub use model::IncidentTimelineStep;
pub use model::KillSwitchRow;
pub use model::KillSwitchScope;
pub use model::PolicyPackage;
pub use model::RateLimitSnapshot;
pub use model::RetentionPolicy;
pub use model::Rollout;
pub use model::RolloutState;
pub use model::RolloutVerdict;
pub use model::Session;
pub use model::TraceEvent;
pub use model::TraceEventKind;
pub use model::TransparencyCheckpoint;

pub use runtime::GatewayConfig;
pub use runtime::GatewayPipeline;
pub use runtime::GatewayRequest;
pub use runtime::GatewayResponse;
pub use runtime::InclusionProof;
pub use runtime::MerkleTree;
pub use runtime::PipelineError;
pub use runtime::QuarantineCoordinator;
pub use runtime::QuarantineError;
pub use runtime::RateLimitVerdict;
pub use runtime::RateLimiter;
pub use runtime::RiskSignal;
pub use runtime::RolloutController;
pub use runtime::SloMonitor;
pub use runtime::SloSample;
pub use runtime::SloSignal;

pub use taxonomy::ErrorEnvelope;
pub use taxonomy::FailureKind;

pub use time::Clock;
pub use time::SystemClock;
pub use time::Timestamp;
