// crates/agentgate-gateway/src/server.rs
// ============================================================================
// Module: Gateway Runtime Wiring
// Description: Assembles every collaborator crate into one running process —
//              pipeline, quarantine coordinator, evidence exporter,
//              transparency log, rollout controller, SLO monitor, admin
//              store handle — and drives the HTTP listener loop over them.
// Purpose: Give `main.rs` a single `GatewayState::build` entry point and keep
//          the risk-signal hand-off between the pipeline and the quarantine
//          coordinator on a bounded channel rather than a direct call.
// Dependencies: agentgate-core, agentgate-config, agentgate-killswitch,
//               agentgate-policy-client, agentgate-credential-broker,
//               agentgate-evidence, rand, reqwest, hmac, sha2, tiny_http,
//               tracing
// ============================================================================

//! ## Overview
//! [`GatewayState`] owns every collaborator the HTTP handlers need and is
//! shared across worker threads behind an `Arc`. Three independent
//! [`RedisKillSwitchStore`] handles are opened — one for the gateway
//! pipeline, one for the quarantine coordinator, one for admin writes — each
//! a plain TCP client over the same Redis deployment, so no collaborator
//! needs to share a connection across an orphan-rule boundary.
//!
//! The pipeline never calls the quarantine coordinator directly. Instead it
//! reports a [`ContainmentSignal`] over a bounded `mpsc` channel; a
//! dedicated background thread drains the channel and drives containment,
//! matching the rule that the gateway, quarantine coordinator, broker, and
//! trace store must not form a call cycle.

use std::fs;
use std::num::NonZeroU64;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::thread;

use hmac::Hmac;
use hmac::Mac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use thiserror::Error;
use tracing::error;
use tracing::info;
use tracing::warn;

use agentgate_config::AgentGateConfig;
use agentgate_config::config::PiiMode;
use agentgate_core::Clock;
use agentgate_core::GatewayConfig;
use agentgate_core::GatewayPipeline;
use agentgate_core::IncidentId;
use agentgate_core::QuarantineCoordinator;
use agentgate_core::RolloutController;
use agentgate_core::SessionId;
use agentgate_core::SloMonitor;
use agentgate_core::SystemClock;
use agentgate_core::TenantId;
use agentgate_core::Timestamp;
use agentgate_core::TraceId;

use agentgate_evidence::EvidenceExporter;
use agentgate_evidence::TransparencyLog;

use agentgate_killswitch::RedisKillSwitchStore;
use agentgate_killswitch::RedisRateLimitStore;

use agentgate_policy_client::ActivePolicyStore;
use agentgate_policy_client::HttpPolicyClientConfig;
use agentgate_policy_client::HttpPolicyEngineClient;
use agentgate_policy_client::MtlsMaterial;
use agentgate_policy_client::PolicyPackageVerifier;

use crate::admin_auth::AdminAuth;
use crate::broker_handle::CredentialBrokerHandle;
use crate::settings::GatewaySettings;
use crate::signing_handle::SigningSchemeHandle;
use crate::store_handle::TraceStoreHandle;
use crate::tool_invoker::HttpToolInvoker;

/// Maximum number of pending [`ContainmentSignal`]s the risk channel buffers
/// before the reporting thread blocks; containment is expected to drain
/// far faster than signals are produced.
const RISK_CHANNEL_CAPACITY: usize = 256;

/// Number of samples retained by the [`SloMonitor`]'s rolling window.
const SLO_WINDOW_CAPACITY: usize = 200;

/// Concrete pipeline type this deployment wires together.
pub type Pipeline = GatewayPipeline<
    HttpPolicyEngineClient,
    RedisKillSwitchStore,
    Arc<CredentialBrokerHandle>,
    Arc<TraceStoreHandle>,
    HttpToolInvoker,
    RedisRateLimitStore,
>;

/// Concrete quarantine coordinator type this deployment wires together.
pub type Quarantine = QuarantineCoordinator<Arc<TraceStoreHandle>, RedisKillSwitchStore, Arc<CredentialBrokerHandle>>;

/// Concrete evidence exporter type this deployment wires together.
pub type Exporter = EvidenceExporter<Arc<TraceStoreHandle>, SigningSchemeHandle>;

/// Concrete transparency log type this deployment wires together.
pub type Transparency = TransparencyLog<Arc<TraceStoreHandle>>;

// ============================================================================
// SECTION: Boot-Scoped Identifier Generator
// ============================================================================

/// Issues opaque, collision-resistant identifiers without a central
/// allocator: a random 64-bit value chosen once at process start, combined
/// with a monotonically increasing in-process counter.
///
/// Mirrors the correlation-id scheme used elsewhere in this codebase for
/// per-call identifiers that only need to be unique, not ordered across
/// process restarts.
pub struct BootScopedIdGenerator {
    /// Fixed tag distinguishing which kind of identifier this generator mints.
    prefix: &'static str,
    /// Random value chosen once when the generator is constructed.
    boot_id: u64,
    /// Monotonically increasing per-process sequence number.
    counter: AtomicU64,
}

impl BootScopedIdGenerator {
    /// Creates a generator that prefixes every issued id with `prefix`.
    #[must_use]
    pub fn new(prefix: &'static str) -> Self {
        let mut seed = [0_u8; 8];
        OsRng.fill_bytes(&mut seed);
        Self { prefix, boot_id: u64::from_le_bytes(seed), counter: AtomicU64::new(0) }
    }

    /// Issues the next identifier as `"{prefix}-{boot_id:016x}-{seq:016x}"`.
    pub fn issue(&self) -> String {
        let sequence = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{:016x}-{:016x}", self.prefix, self.boot_id, sequence)
    }
}

// ============================================================================
// SECTION: Containment Signal Channel
// ============================================================================

/// A gateway-observed signal that a session's behavior warrants containment.
///
/// Unlike [`agentgate_core::RiskSignal`], which carries only a hashed
/// session identifier and a score, this carries everything the quarantine
/// coordinator needs to open an incident without looking anything up —
/// it is the message that actually crosses the gateway/quarantine boundary.
pub struct ContainmentSignal {
    /// Tenant the session belongs to.
    pub tenant_id: TenantId,
    /// Session under consideration.
    pub session_id: SessionId,
    /// Rolling risk score that crossed the configured threshold.
    pub score: f64,
    /// Human-readable reason recorded on the opened incident.
    pub reason: String,
}

/// Runs on a dedicated background thread, draining `receiver` and driving
/// containment for every signal whose score has already been judged to
/// cross the configured threshold by the caller that sent it.
///
/// This is the only path by which quarantine containment is triggered; the
/// gateway pipeline never calls the coordinator directly.
fn run_quarantine_listener(
    receiver: mpsc::Receiver<ContainmentSignal>,
    quarantine: Arc<Quarantine>,
    incident_ids: Arc<BootScopedIdGenerator>,
    clock: Arc<dyn Clock>,
    webhook: Arc<WebhookSink>,
) {
    for signal in receiver {
        let incident_id = IncidentId::new(incident_ids.issue());
        let now = clock.now();
        let outcome = quarantine.contain(
            signal.tenant_id,
            &signal.session_id,
            incident_id.clone(),
            &signal.reason,
            "quarantine-listener",
            now,
        );
        match outcome {
            Ok(incident) => {
                info!(incident_id = %incident.incident_id, session_id = %signal.session_id, score = signal.score, "session contained");
                webhook.notify("quarantine.contained", &format!("session {} incident {}", signal.session_id, incident_id));
            }
            Err(err) => {
                error!(session_id = %signal.session_id, error = %err, "containment attempt failed");
                webhook.notify("quarantine.failed", &format!("session {} error {}", signal.session_id, err));
            }
        }
    }
}

// ============================================================================
// SECTION: Webhook Alert Sink
// ============================================================================

/// Best-effort alert sink for SLO breaches and containment events.
///
/// Delivery is fire-and-forget: a failed POST is logged and otherwise
/// ignored, since an alerting outage must never block the request path it
/// is reporting on.
pub struct WebhookSink {
    /// Blocking HTTP client reused across notifications.
    client: reqwest::blocking::Client,
    /// Destination URL; `None` disables the sink entirely.
    url: Option<String>,
    /// Shared secret used to sign the outbound payload, when configured.
    secret: Option<String>,
}

impl WebhookSink {
    /// Builds a sink from the configured webhook URL and secret.
    #[must_use]
    pub fn new(url: Option<String>, secret: Option<String>) -> Self {
        Self { client: reqwest::blocking::Client::new(), url, secret }
    }

    /// Sends `{event, detail}` to the configured webhook, signing the body
    /// with `X-AgentGate-Signature` when a secret is configured. Does
    /// nothing when no URL is configured.
    pub fn notify(&self, event: &str, detail: &str) {
        let Some(url) = &self.url else { return };
        let body = serde_json::json!({ "event": event, "detail": detail }).to_string();
        let mut request = self.client.post(url).header("content-type", "application/json");
        if let Some(secret) = &self.secret {
            if let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
                mac.update(body.as_bytes());
                let signature = hex_encode(&mac.finalize().into_bytes());
                request = request.header("x-agentgate-signature", signature);
            }
        }
        if let Err(err) = request.body(body).send() {
            warn!(error = %err, event, "webhook delivery failed");
        }
    }
}

/// Renders `bytes` as lowercase hex, used for the webhook signature header.
fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

// ============================================================================
// SECTION: Build Errors
// ============================================================================

/// Everything that can go wrong assembling a [`GatewayState`].
#[derive(Debug, Error)]
pub enum GatewayBuildError {
    /// The trace store DSN could not be opened.
    #[error("trace store: {0}")]
    Store(#[from] crate::store_handle::StoreHandleError),
    /// The credential broker selection could not be constructed.
    #[error("credential broker: {0}")]
    Broker(#[from] crate::broker_handle::BrokerHandleError),
    /// The signing scheme could not be constructed.
    #[error("signing scheme: {0}")]
    Signing(#[from] crate::signing_handle::SigningHandleError),
    /// The policy engine HTTP client could not be constructed.
    #[error("policy client: {0}")]
    PolicyClient(#[from] agentgate_policy_client::PolicyClientBuildError),
    /// The policy package verifier's signer keys were malformed.
    #[error("policy package verifier: {0}")]
    PolicyVerifier(#[from] agentgate_policy_client::PolicyPackageError),
    /// A kill-switch Redis connection could not be established.
    #[error("kill switch store: {0}")]
    KillSwitch(#[from] agentgate_core::KillSwitchStoreError),
    /// A rate-limit Redis connection could not be established.
    #[error("rate limit store: {0}")]
    RateLimit(#[from] agentgate_core::RateLimitStoreError),
    /// The downstream tool invoker HTTP client could not be constructed.
    #[error("tool invoker: {0}")]
    ToolInvoker(#[from] crate::tool_invoker::ToolInvokerBuildError),
    /// An mTLS material file could not be read.
    #[error("mtls material at {path}: {source}")]
    MtlsFile {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// `POLICY_PACKAGE_SECRET` was present but not a valid
    /// `signer=base64key[,signer=base64key...]` list.
    #[error("POLICY_PACKAGE_SECRET entry '{0}' is not of the form signer=base64key")]
    MalformedSignerList(String),
}

/// Reads `path` into a `Vec<u8>`, wrapping any I/O error with its path.
fn read_material(path: &Path) -> Result<Vec<u8>, GatewayBuildError> {
    fs::read(path).map_err(|source| GatewayBuildError::MtlsFile { path: path.display().to_string(), source })
}

/// Parses a comma-separated `signer=base64key` list into the map
/// [`PolicyPackageVerifier::new`] expects. Empty or absent input yields an
/// empty map, under which every package verification fails closed.
fn parse_signer_keys(raw: Option<&str>) -> Result<std::collections::HashMap<String, String>, GatewayBuildError> {
    let mut signer_keys = std::collections::HashMap::new();
    let Some(raw) = raw else { return Ok(signer_keys) };
    for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let (signer, key) =
            entry.split_once('=').ok_or_else(|| GatewayBuildError::MalformedSignerList(entry.to_string()))?;
        signer_keys.insert(signer.to_string(), key.to_string());
    }
    Ok(signer_keys)
}

// ============================================================================
// SECTION: Gateway State
// ============================================================================

/// Every collaborator the HTTP handlers dispatch against, assembled once at
/// startup and shared across worker threads behind an `Arc`.
pub struct GatewayState {
    /// Full tool-call admission/containment/decision pipeline.
    pub pipeline: Pipeline,
    /// Kill-switch store dedicated to admin-initiated pause/resume/tool-kill writes.
    pub admin_kill_switch: RedisKillSwitchStore,
    /// Quarantine coordinator, driven only from the containment-signal listener thread.
    pub quarantine: Arc<Quarantine>,
    /// Stateless rollout state-machine driver.
    pub rollout: RolloutController,
    /// Rolling SLO monitor; `observe` takes `&mut self` so access is serialized.
    pub slo: Mutex<SloMonitor>,
    /// Evidence export pipeline (Merkle proof + render + sign).
    pub evidence: Exporter,
    /// Transparency log checkpoint pipeline.
    pub transparency: Transparency,
    /// Shared trace store handle, used directly for admin session/incident/policy/rollout reads and writes.
    pub store: Arc<TraceStoreHandle>,
    /// Verifies and holds the currently active signed policy package per tenant.
    pub policy_packages: ActivePolicyStore,
    /// Admin bearer-token authenticator.
    pub admin_auth: AdminAuth,
    /// Wall-clock source shared by every collaborator that needs one.
    pub clock: Arc<dyn Clock>,
    /// Binding/version/rate-limit settings the handlers need directly.
    pub settings: GatewaySettings,
    /// Configured PII redaction mode and salt, applied at tool-call ingress.
    pub pii_mode: PiiMode,
    /// Salt mixed into tokenized PII values.
    pub pii_token_salt: Option<String>,
    /// Issues trace identifiers for every inbound tool call.
    pub trace_ids: BootScopedIdGenerator,
    /// Issues rollout identifiers for admin-initiated rollouts.
    pub rollout_ids: BootScopedIdGenerator,
    /// Sending half of the containment-signal channel the pipeline reports into.
    pub risk_signals: mpsc::SyncSender<ContainmentSignal>,
    /// Best-effort alert sink for SLO and containment notifications.
    pub webhook: Arc<WebhookSink>,
}

impl GatewayState {
    /// Assembles every collaborator from `config` and `settings`, opens the
    /// kill-switch/rate-limit/trace-store connections, and spawns the
    /// background containment-signal listener thread.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayBuildError`] when any collaborator fails to
    /// construct — a malformed DSN, unreachable Redis, unreadable key
    /// material, or an invalid signer-key list.
    pub fn build(config: &AgentGateConfig, settings: GatewaySettings) -> Result<Self, GatewayBuildError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let store = Arc::new(TraceStoreHandle::open(&config.store.trace_db)?);
        let pipeline_kill_switch = RedisKillSwitchStore::new(&config.store.redis_url)?;
        let quarantine_kill_switch = RedisKillSwitchStore::new(&config.store.redis_url)?;
        let admin_kill_switch = RedisKillSwitchStore::new(&config.store.redis_url)?;
        let rate_limit_store = RedisRateLimitStore::new(&config.store.redis_url)?;

        let broker = Arc::new(CredentialBrokerHandle::build(settings.broker.clone(), clock.clone())?);

        let mtls = if config.mtls.is_complete() {
            let cert = config.mtls.cert.as_deref().unwrap_or_else(|| Path::new(""));
            let key = config.mtls.key.as_deref().unwrap_or_else(|| Path::new(""));
            let ca = config.mtls.ca.as_deref().unwrap_or_else(|| Path::new(""));
            Some(MtlsMaterial { cert_pem: read_material(cert)?, key_pem: read_material(key)?, ca_pem: read_material(ca)? })
        } else {
            None
        };
        let policy_client = HttpPolicyEngineClient::new(HttpPolicyClientConfig {
            base_url: config.policy.opa_url.clone(),
            timeout_millis: settings.tool_invoker_timeout_millis,
            mtls,
        })?;

        let invoker = HttpToolInvoker::new(&settings.tool_invoker_url, settings.tool_invoker_timeout_millis, clock.clone())?;

        let gateway_config = GatewayConfig {
            supported_versions: settings.supported_versions.clone(),
            require_tenant: settings.require_tenant,
            credential_ttl_millis: settings.credential_ttl_millis,
            rate_limit_window_millis: settings.rate_limit_window_millis,
            rate_limit_budget: settings.rate_limit_budget,
            credentialed_tools: settings.credentialed_tools.clone(),
            approval_required_tools: settings.approval_required_tools.clone(),
        };
        let pipeline = GatewayPipeline::new(
            policy_client,
            pipeline_kill_switch,
            broker.clone(),
            store.clone(),
            invoker,
            rate_limit_store,
            gateway_config,
        );

        let quarantine =
            Arc::new(QuarantineCoordinator::new(store.clone(), quarantine_kill_switch, broker.clone()));

        let signing = SigningSchemeHandle::build(&config.signing)?;
        let evidence = EvidenceExporter::new(store.clone(), signing, clock.clone());
        let transparency = TransparencyLog::new(store.clone(), config.transparency.anchor_schemes.clone(), clock.clone());

        let signer_keys = parse_signer_keys(config.policy.package_secret.as_deref())?;
        let verifier = PolicyPackageVerifier::new(&signer_keys)?;
        let policy_packages = ActivePolicyStore::new(verifier);

        let admin_auth = AdminAuth::new(config.admin.clone());
        let slo = Mutex::new(SloMonitor::new(SLO_WINDOW_CAPACITY, config.slo.availability_target, config.slo.latency_p95_millis));

        let webhook = Arc::new(WebhookSink::new(config.webhook.url.clone(), config.webhook.secret.clone()));

        let (risk_tx, risk_rx) = mpsc::sync_channel(RISK_CHANNEL_CAPACITY);
        let incident_ids = Arc::new(BootScopedIdGenerator::new("inc"));
        let listener_quarantine = quarantine.clone();
        let listener_clock = clock.clone();
        let listener_webhook = webhook.clone();
        thread::spawn(move || run_quarantine_listener(risk_rx, listener_quarantine, incident_ids, listener_clock, listener_webhook));

        Ok(Self {
            pipeline,
            admin_kill_switch,
            quarantine,
            rollout: RolloutController,
            slo,
            evidence,
            transparency,
            store,
            policy_packages,
            admin_auth,
            clock,
            pii_mode: config.pii.mode,
            pii_token_salt: config.pii.token_salt.clone(),
            trace_ids: BootScopedIdGenerator::new("tr"),
            rollout_ids: BootScopedIdGenerator::new("ro"),
            risk_signals: risk_tx,
            webhook,
            settings,
        })
    }

    /// Issues the next trace identifier for an inbound request.
    pub fn next_trace_id(&self) -> TraceId {
        TraceId::new(self.trace_ids.issue())
    }

    /// Current wall-clock timestamp.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }
}

// ============================================================================
// SECTION: HTTP Listener
// ============================================================================

/// Number of worker threads pulled from the shared `tiny_http` listener.
const WORKER_THREADS: usize = 8;

/// Errors raised starting the HTTP listener itself.
#[derive(Debug, Error)]
pub enum ListenError {
    /// The listener could not bind the configured port.
    #[error("failed to bind 0.0.0.0:{port}: {source}")]
    Bind {
        /// Port that failed to bind.
        port: u16,
        /// Underlying `tiny_http` error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Binds the gateway's HTTP listener and blocks the calling thread serving
/// requests across a fixed pool of worker threads, each dispatching through
/// [`crate::handlers::dispatch`].
///
/// # Errors
///
/// Returns [`ListenError`] if the configured port cannot be bound.
pub fn serve(state: Arc<GatewayState>) -> Result<(), ListenError> {
    let port = state.settings.port;
    let server = tiny_http::Server::http(("0.0.0.0", port))
        .map_err(|source| ListenError::Bind { port, source })?;
    let server = Arc::new(server);

    info!(port, "agentgate-gateway listening");

    let mut workers = Vec::with_capacity(WORKER_THREADS);
    for _ in 0..WORKER_THREADS {
        let server = server.clone();
        let state = state.clone();
        workers.push(thread::spawn(move || {
            for request in server.incoming_requests() {
                crate::handlers::dispatch(&state, request);
            }
        }));
    }
    for worker in workers {
        if worker.join().is_err() {
            error!("a gateway worker thread panicked");
        }
    }
    Ok(())
}

/// Helper constructing a [`TenantId`] from a raw `u64` header value, used by
/// handlers that need to reject `0` as never a valid tenant identifier.
#[must_use]
pub fn tenant_id_from_raw(raw: u64) -> Option<TenantId> {
    NonZeroU64::new(raw).map(TenantId::new)
}
