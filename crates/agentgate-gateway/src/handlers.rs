// crates/agentgate-gateway/src/handlers.rs
// ============================================================================
// Module: HTTP Request Handlers
// Description: Routes every inbound `tiny_http::Request` to its endpoint
//              handler and writes back a JSON response.
// Purpose: Translate the wire contract (tenant headers, JSON bodies, query
//          parameters) into calls against `GatewayState`'s collaborators and
//          back into an `ErrorEnvelope` or success body.
// Dependencies: agentgate-core, agentgate-evidence, agentgate-policy-client,
//               tiny_http, serde_json, base64
// ============================================================================

//! ## Overview
//! [`dispatch`] is the single entry point `server::serve` calls per
//! connection. Routing is a match over `(Method, path segments)`; every
//! branch returns a `(u16, serde_json::Value)` status/body pair that
//! [`dispatch`] writes out uniformly. None of [`agentgate_core::GatewayRequest`],
//! [`agentgate_core::GatewayResponse`], [`agentgate_core::InclusionProof`], or
//! the evidence crate's export types implement `Serialize`, so the bodies
//! that embed them are built field-by-field here instead of going through
//! `serde_json::to_value` directly.
//!
//! Tenant identification outside `/tools/call`'s JSON body is carried in the
//! `X-AgentGate-Tenant` header as a raw, non-zero `u64`; a requested API
//! version is carried in `X-AgentGate-Requested-Version`. Both are this
//! binary's own wire convention, not a collaborator's. Every response, success
//! or failure, carries `X-AgentGate-API-Version` and
//! `X-AgentGate-Supported-Versions`, attached once in [`dispatch`] rather than
//! by each handler. A `204` status is always written with an empty body.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tiny_http::Header;
use tiny_http::Method;
use tiny_http::Request;
use tiny_http::Response;

use agentgate_core::Decision;
use agentgate_core::ErrorEnvelope;
use agentgate_core::EvidenceFormat;
use agentgate_core::FailureKind;
use agentgate_core::GatewayRequest;
use agentgate_core::Incident;
use agentgate_core::IncidentId;
use agentgate_core::KillSwitchRow;
use agentgate_core::KillSwitchScope;
use agentgate_core::KillSwitchStore;
use agentgate_core::PolicyPackage;
use agentgate_core::PolicyVersion;
use agentgate_core::RolloutId;
use agentgate_core::SessionId;
use agentgate_core::SloSample;
use agentgate_core::SloSignal;
use agentgate_core::TenantId;
use agentgate_core::Timestamp;
use agentgate_core::ToolName;
use agentgate_core::TraceStore;

use crate::pii::redact_arguments;
use crate::server::ContainmentSignal;
use crate::server::GatewayState;
use crate::server::tenant_id_from_raw;

/// Header carrying the caller's tenant as a raw, non-zero `u64`, used by
/// every endpoint other than `/tools/call` (which carries `tenant_id` in its
/// JSON body so the pipeline can reject a missing tenant the same way for
/// every transport, not just HTTP).
const TENANT_HEADER: &str = "X-AgentGate-Tenant";
/// Header carrying the API version the caller built its request against.
const VERSION_HEADER: &str = "X-AgentGate-Requested-Version";
/// Policy version attached to a request when a tenant has no active rollout.
const DEFAULT_POLICY_VERSION: &str = "unversioned";
/// Reported `X-AgentGate-API-Version` when a deployment configures no
/// supported versions at all (the settings layer defaults to `["v1"]`, so
/// this only applies to a deliberately empty override).
const FALLBACK_API_VERSION: &str = "unknown";
/// Principal recorded on admin-initiated incident releases and kill rows
/// when the caller presents only a bearer token, carrying no separate
/// identity claim this deployment's admin authentication validates.
const ADMIN_PRINCIPAL: &str = "admin-api";
/// Session slot every admin-surface trace event not owned by one session
/// (tool/global kill, policy reload, rollout) is recorded under. Trace
/// events are modeled as strictly per-session, so these administrative
/// mutations need a fixed session id to anchor to rather than leaving
/// `kind ∈ {kill, reload, rollout}` unrecorded.
const SYSTEM_SESSION_ID: &str = "system";
/// Tenant every administrative trace event with no real tenant in scope
/// (a global or tool-wide kill-switch write) is recorded under. A tenant
/// allocator handing out sequential ids will never reach `u64::MAX`.
const SYSTEM_TENANT_ID: TenantId = TenantId::new(std::num::NonZeroU64::MAX);

// ============================================================================
// SECTION: Dispatch
// ============================================================================

/// Reads one `tiny_http::Request`, routes it, and writes back the response.
///
/// Errors writing the response are logged and otherwise swallowed; a client
/// that vanished mid-response cannot be made to do anything else.
pub fn dispatch(state: &Arc<GatewayState>, mut request: Request) {
    let method = request.method().clone();
    let url = request.url().to_string();
    let headers = request.headers().to_vec();
    let mut body = Vec::new();
    if matches!(method, Method::Post | Method::Put | Method::Patch) {
        if let Err(err) = request.as_reader().read_to_end(&mut body) {
            tracing::warn!(error = %err, "failed to read request body");
        }
    }

    let (path, query) = split_url(&url);
    let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();

    let (status, value) = route(state, method, &segments, query, &headers, &body);
    let rendered = if status == 204 { String::new() } else { value.to_string() };
    let mut response = Response::from_string(rendered).with_status_code(status);
    if let Some(header) = content_type_header() {
        response = response.with_header(header);
    }
    for header in api_version_headers(&state.settings) {
        response = response.with_header(header);
    }
    if let Err(err) = request.respond(response) {
        tracing::warn!(error = %err, "failed to write response");
    }
}

/// Builds the `X-AgentGate-API-Version`/`X-AgentGate-Supported-Versions`
/// headers every response carries, per this deployment's configured
/// supported-version list.
fn api_version_headers(settings: &crate::settings::GatewaySettings) -> Vec<Header> {
    let current = settings.supported_versions.first().map_or(FALLBACK_API_VERSION, String::as_str);
    let supported = settings.supported_versions.join(", ");
    [
        Header::from_bytes(&b"X-AgentGate-API-Version"[..], current.as_bytes()),
        Header::from_bytes(&b"X-AgentGate-Supported-Versions"[..], supported.as_bytes()),
    ]
    .into_iter()
    .filter_map(Result::ok)
    .collect()
}

/// Splits a raw request target into its path and query string.
fn split_url(url: &str) -> (&str, &str) {
    match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url, ""),
    }
}

/// Builds the `Content-Type: application/json` response header, or `None` in
/// the unreachable case that the static literal fails ASCII validation.
fn content_type_header() -> Option<Header> {
    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).ok()
}

/// Routes one request to its handler by HTTP method and path segments.
fn route(
    state: &Arc<GatewayState>,
    method: Method,
    segments: &[&str],
    query: &str,
    headers: &[Header],
    body: &[u8],
) -> (u16, serde_json::Value) {
    match (method, segments) {
        (Method::Post, ["tools", "call"]) => handle_tool_call(state, headers, body),
        (Method::Get, ["tools", "list"]) => handle_tools_list(state, headers),
        (Method::Get, ["sessions"]) => handle_list_sessions(state, headers),
        (Method::Post, ["sessions", session_id, "kill"]) => handle_session_kill(state, headers, session_id),
        (Method::Get, ["sessions", session_id, "evidence"]) => export_evidence(state, headers, session_id, query),
        (Method::Get, ["sessions", session_id, "transparency"]) => handle_session_transparency(state, headers, session_id, query),
        (Method::Post, ["tools", tool_name, "kill"]) => handle_tool_kill(state, headers, tool_name),
        (Method::Post, ["system", "pause"]) => handle_system_pause(state, headers),
        (Method::Post, ["system", "resume"]) => handle_system_resume(state, headers),
        (Method::Get, ["health"]) => handle_health(state),
        (Method::Get, ["metrics"]) => handle_metrics(state),
        (Method::Post, ["admin", "policies", "reload"]) => handle_policy_reload(state, headers, body),
        (Method::Post, ["admin", "incidents", incident_id, "release"]) => handle_incident_release(state, headers, incident_id),
        (Method::Post, ["admin", "tenants", tenant_raw, "rollouts"]) => handle_start_rollout(state, headers, tenant_raw, body),
        (Method::Post, ["admin", "tenants", tenant_raw, "rollouts", rollout_id, "rollback"]) => {
            handle_rollback_rollout(state, headers, tenant_raw, rollout_id)
        }
        (Method::Post, ["admin", "sessions", session_id, "retention"]) => handle_set_retention(state, headers, session_id, body),
        (Method::Delete, ["admin", "sessions", session_id]) => handle_delete_session(state, headers, session_id),
        _ => error_response(FailureKind::Validation, "no route matches this method and path", None),
    }
}

// ============================================================================
// SECTION: Shared Helpers
// ============================================================================

/// Looks up a header by case-insensitive name.
fn header_value<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers.iter().find(|header| header.field.as_str().as_str().eq_ignore_ascii_case(name)).map(|header| header.value.as_str())
}

/// Reads one `key=value` pair out of a raw query string.
fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query.split('&').find_map(|pair| {
        let (candidate, value) = pair.split_once('=')?;
        if candidate == key { Some(value) } else { None }
    })
}

/// Builds an `(status, body)` pair from an [`ErrorEnvelope`].
fn error_response(kind: FailureKind, message: impl Into<String>, hint: Option<&str>) -> (u16, serde_json::Value) {
    let mut envelope = ErrorEnvelope::new(kind, message.into());
    if let Some(hint) = hint {
        envelope = envelope.with_hint(hint.to_string());
    }
    (kind.http_status(), serde_json::to_value(&envelope).unwrap_or(serde_json::Value::Null))
}

/// Resolves the caller's tenant from [`TENANT_HEADER`].
///
/// # Errors
///
/// Returns an error body when the header is absent or not a valid non-zero
/// `u64`.
fn resolve_tenant(headers: &[Header]) -> Result<TenantId, (u16, serde_json::Value)> {
    let raw = header_value(headers, TENANT_HEADER)
        .ok_or_else(|| error_response(FailureKind::Validation, format!("missing {TENANT_HEADER} header"), None))?;
    let parsed: u64 = raw
        .parse()
        .map_err(|_| error_response(FailureKind::Validation, format!("{TENANT_HEADER} must be a positive integer"), None))?;
    tenant_id_from_raw(parsed).ok_or_else(|| error_response(FailureKind::Validation, format!("{TENANT_HEADER} must be non-zero"), None))
}

/// Authenticates an admin request, mapping a failure to its error body.
fn authenticate_admin(state: &GatewayState, headers: &[Header]) -> Result<(), (u16, serde_json::Value)> {
    let authorization = header_value(headers, "Authorization");
    let now_seconds = state.now().as_unix_millis() / 1000;
    state
        .admin_auth
        .authenticate(authorization, now_seconds)
        .map_err(|err| error_response(FailureKind::Unauthenticated, err.to_string(), None))
}

/// Resolves the active policy version for `tenant_id`, falling back to
/// [`DEFAULT_POLICY_VERSION`] when the tenant has no active rollout.
fn resolve_policy_version(state: &GatewayState, tenant_id: TenantId) -> PolicyVersion {
    match state.store.active_rollout(tenant_id) {
        Ok(Some(rollout)) => rollout.target_version,
        _ => PolicyVersion::new(DEFAULT_POLICY_VERSION),
    }
}

/// Maps an [`agentgate_core::StoreError`] to its failure kind.
fn store_error_kind(error: &agentgate_core::StoreError) -> FailureKind {
    match error {
        agentgate_core::StoreError::LegalHoldSet => FailureKind::LegalHoldSet,
        agentgate_core::StoreError::TenantConflict => FailureKind::TenantConflict,
        agentgate_core::StoreError::Constraint(_) | agentgate_core::StoreError::Io(_) => FailureKind::Unavailable,
    }
}

/// Appends one admin-surface trace event (kill, reload, rollout), the same
/// append-only record `GatewayPipeline` writes for every request-path
/// decision. Logged and swallowed on failure: an admin mutation has already
/// taken effect on the store it actually owns (kill-switch, policy store,
/// rollout row) by the time this runs, and the fail-closed rule that makes a
/// decision-event write fatal to a request does not extend to a
/// best-effort audit trail for a mutation that already succeeded.
fn append_admin_trace_event(
    state: &GatewayState,
    tenant_id: TenantId,
    session_id: &str,
    kind: agentgate_core::TraceEventKind,
    reason: String,
) {
    let now = state.now();
    let integrity_hash = agentgate_core::hashing::hash_bytes(
        agentgate_core::DEFAULT_HASH_ALGORITHM,
        format!("{session_id}:{kind:?}:{reason}").as_bytes(),
    );
    let event = agentgate_core::TraceEvent {
        event_id: agentgate_core::EventId::FIRST,
        session_id: SessionId::new(session_id),
        tenant_id,
        timestamp: now,
        kind,
        tool_name: None,
        decision: None,
        reason,
        policy_version: None,
        rate_limit_snapshot: None,
        payload: None,
        integrity_hash,
    };
    if let Err(err) = state.store.append_event(&event) {
        tracing::warn!(error = %err, kind = ?kind, "failed to append admin trace event");
    }
}

// ============================================================================
// SECTION: Tool Call
// ============================================================================

/// Handles `POST /tools/call`: the sole entry point into the admission
/// pipeline.
fn handle_tool_call(state: &Arc<GatewayState>, headers: &[Header], body: &[u8]) -> (u16, serde_json::Value) {
    let parsed: serde_json::Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(err) => return error_response(FailureKind::Validation, format!("malformed JSON body: {err}"), None),
    };

    let Some(session_id) = parsed.get("session_id").and_then(serde_json::Value::as_str) else {
        return error_response(FailureKind::Validation, "session_id is required", None);
    };
    let Some(tool_name) = parsed.get("tool_name").and_then(serde_json::Value::as_str) else {
        return error_response(FailureKind::Validation, "tool_name is required", None);
    };
    let tenant_id = parsed.get("tenant_id").and_then(serde_json::Value::as_u64).and_then(tenant_id_from_raw);
    let approval_token = parsed.get("approval_token").and_then(serde_json::Value::as_str).map(str::to_string);
    let requested_version = header_value(headers, VERSION_HEADER).map(str::to_string);
    let arguments = parsed.get("arguments").cloned().unwrap_or(serde_json::Value::Null);
    let redacted = redact_arguments(state.pii_mode, state.pii_token_salt.as_deref(), &arguments);

    let now = state.now();
    let policy_version = match tenant_id {
        Some(tenant_id) => resolve_policy_version(state, tenant_id),
        None => PolicyVersion::new(DEFAULT_POLICY_VERSION),
    };

    let request = GatewayRequest {
        session_id: SessionId::new(session_id),
        tenant_id,
        tool_name: ToolName::new(tool_name),
        arguments: redacted,
        approval_token,
        requested_version,
        policy_version,
        now,
    };

    let trace_id = state.next_trace_id();
    let call_started_at = now;
    let outcome = state.pipeline.handle(&request, trace_id);
    let latency_millis = state.now().saturating_since(call_started_at);
    let succeeded = matches!(&outcome, Ok(response) if response.success);
    let sample = SloSample { at: state.now(), succeeded, latency_millis };
    let signal = state.slo.lock().unwrap_or_else(std::sync::PoisonError::into_inner).observe(sample);
    emit_slo_signal(state, signal);

    match outcome {
        Ok(response) => {
            if response.decision == Decision::Deny {
                report_risk_signal(state, tenant_id, &request.session_id, &response.reason);
            }
            let status = response.failure.map_or(200, FailureKind::http_status);
            (status, render_gateway_response(&response))
        }
        Err(err) => error_response(FailureKind::Unavailable, err.to_string(), None),
    }
}

/// Surfaces an SLO state transition on the configured webhook sink. Emission
/// is already idempotent per transition edge at the monitor itself, so a
/// repeated observation in the same state arrives here as `Unchanged` and is
/// never forwarded.
fn emit_slo_signal(state: &GatewayState, signal: SloSignal) {
    match signal {
        SloSignal::Breach => state.webhook.notify("slo.breach", "availability or latency target breached"),
        SloSignal::Recovered => state.webhook.notify("slo.recovered", "availability and latency back within target"),
        SloSignal::Unchanged => {}
    }
}

/// Best-effort containment signal for a denied call; the quarantine
/// coordinator itself decides whether the accumulated score crosses its
/// threshold, so a single denial here is advisory, not a direct trigger.
fn report_risk_signal(state: &GatewayState, tenant_id: Option<TenantId>, session_id: &SessionId, reason: &str) {
    let Some(tenant_id) = tenant_id else { return };
    let signal = ContainmentSignal { tenant_id, session_id: session_id.clone(), score: 1.0, reason: reason.to_string() };
    let _ = state.risk_signals.try_send(signal);
}

/// Hand-builds the `GatewayResponse` wire body; the type itself is not
/// `Serialize` since its `result` payload is opaque tool output.
fn render_gateway_response(response: &agentgate_core::GatewayResponse) -> serde_json::Value {
    serde_json::json!({
        "success": response.success,
        "result": response.result,
        "trace_id": response.trace_id.as_str(),
        "decision": serde_json::to_value(response.decision).unwrap_or(serde_json::Value::Null),
        "rate_limit": response.rate_limit.map(|snapshot| serde_json::to_value(snapshot).unwrap_or(serde_json::Value::Null)),
        "failure": response.failure.map(FailureKind::as_str),
        "reason": response.reason,
    })
}

// ============================================================================
// SECTION: Tool Catalog
// ============================================================================

/// Handles `GET /tools/list`: the union of every tool this deployment has an
/// opinion about, since no collaborator owns a standalone tool registry.
/// Reports `503` when the caller names a tenant with no loaded policy
/// package, since the visible tool set is meaningless without one.
fn handle_tools_list(state: &GatewayState, headers: &[Header]) -> (u16, serde_json::Value) {
    if header_value(headers, TENANT_HEADER).is_some() {
        let tenant_id = match resolve_tenant(headers) {
            Ok(tenant_id) => tenant_id,
            Err(response) => return response,
        };
        if state.policy_packages.active(&tenant_id.to_string()).is_none() {
            return error_response(FailureKind::PolicyUnavailable, format!("no active policy package for tenant {tenant_id}"), None);
        }
    }
    let mut tools: Vec<&str> =
        state.settings.credentialed_tools.iter().chain(state.settings.approval_required_tools.iter()).map(ToolName::as_str).collect();
    tools.sort_unstable();
    tools.dedup();
    (200, serde_json::json!({ "tools": tools }))
}

// ============================================================================
// SECTION: Sessions
// ============================================================================

/// Handles `GET /sessions`: every session bound to the caller's tenant.
fn handle_list_sessions(state: &GatewayState, headers: &[Header]) -> (u16, serde_json::Value) {
    let tenant_id = match resolve_tenant(headers) {
        Ok(tenant_id) => tenant_id,
        Err(response) => return response,
    };
    match state.store.list_sessions(tenant_id) {
        Ok(sessions) => (200, serde_json::json!({ "sessions": sessions })),
        Err(err) => error_response(FailureKind::Unavailable, err.to_string(), None),
    }
}

/// Handles `POST /sessions/{id}/kill`: an operator-initiated containment
/// request. Containment itself is driven only by the background quarantine
/// listener, so this only enqueues a maximum-score [`ContainmentSignal`] and
/// reports `204 No Content`; the caller polls `/sessions/{id}/evidence` or the
/// incident timeline for the outcome.
fn handle_session_kill(state: &Arc<GatewayState>, headers: &[Header], session_id: &str) -> (u16, serde_json::Value) {
    let tenant_id = match resolve_tenant(headers) {
        Ok(tenant_id) => tenant_id,
        Err(response) => return response,
    };
    if let Err(response) = authenticate_admin(state, headers) {
        return response;
    }
    let session_id = SessionId::new(session_id);
    let signal = ContainmentSignal { tenant_id, session_id: session_id.clone(), score: 1.0, reason: "operator-initiated kill".to_string() };
    match state.risk_signals.try_send(signal) {
        Ok(()) => (204, serde_json::Value::Null),
        Err(_) => error_response(FailureKind::Unavailable, "containment signal channel is full", None),
    }
}

/// Handles `GET /sessions/{id}/evidence`: exports a signed, Merkle-proved
/// evidence archive in the requested format (`json` default, `html`, or
/// `pdf`), recording the active PII mode alongside the archive per the
/// redaction module's own contract. `archive=true` additionally includes
/// every archive previously exported for the session, oldest first.
fn export_evidence(state: &GatewayState, headers: &[Header], session_id: &str, query: &str) -> (u16, serde_json::Value) {
    let tenant_id = match resolve_tenant(headers) {
        Ok(tenant_id) => tenant_id,
        Err(response) => return response,
    };
    let format = match query_param(query, "format") {
        Some("html") => EvidenceFormat::Rendered,
        Some("pdf") => EvidenceFormat::Printable,
        Some("json") | None => EvidenceFormat::Structured,
        Some(other) => return error_response(FailureKind::Validation, format!("unknown evidence format '{other}'"), None),
    };
    let include_history = query_param(query, "archive") == Some("true");
    let session_id = SessionId::new(session_id);
    match state.evidence.export(tenant_id, &session_id, format) {
        Ok(exported) => {
            let proofs: Vec<serde_json::Value> =
                exported.inclusion_proofs.iter().map(|(event_id, proof)| render_inclusion_proof(event_id.get(), proof)).collect();
            let history = if include_history {
                match state.evidence.history(&session_id) {
                    Ok(history) => serde_json::to_value(history).unwrap_or(serde_json::Value::Null),
                    Err(err) => return error_response(FailureKind::TraceWriteFailed, err.to_string(), None),
                }
            } else {
                serde_json::Value::Null
            };
            (
                200,
                serde_json::json!({
                    "archive": serde_json::to_value(&exported.archive).unwrap_or(serde_json::Value::Null),
                    "body": BASE64.encode(&exported.body),
                    "body_hash": serde_json::to_value(&exported.body_hash).unwrap_or(serde_json::Value::Null),
                    "signature": {
                        "algorithm_id": exported.signature.algorithm_id,
                        "signature": BASE64.encode(&exported.signature.signature),
                    },
                    "inclusion_proofs": proofs,
                    "pii_mode": pii_mode_as_str(state.pii_mode),
                    "history": history,
                }),
            )
        }
        Err(err) => error_response(FailureKind::TraceWriteFailed, err.to_string(), None),
    }
}

/// Handles `GET /sessions/{id}/transparency`: checkpoints and returns the
/// current Merkle root, optionally anchoring it externally via `anchor_url`.
fn handle_session_transparency(state: &GatewayState, headers: &[Header], session_id: &str, query: &str) -> (u16, serde_json::Value) {
    let tenant_id = match resolve_tenant(headers) {
        Ok(tenant_id) => tenant_id,
        Err(response) => return response,
    };
    let session_id = SessionId::new(session_id);
    let anchor_url = query_param(query, "anchor_url");
    match state.transparency.checkpoint(tenant_id, &session_id, anchor_url) {
        Ok(checkpointed) => {
            let proofs: Vec<serde_json::Value> =
                checkpointed.inclusion_proofs.iter().map(|(event_id, proof)| render_inclusion_proof(event_id.get(), proof)).collect();
            (
                200,
                serde_json::json!({
                    "checkpoint": serde_json::to_value(&checkpointed.checkpoint).unwrap_or(serde_json::Value::Null),
                    "inclusion_proofs": proofs,
                }),
            )
        }
        Err(err) => error_response(transparency_error_kind(&err), err.to_string(), None),
    }
}

/// Maps a [`agentgate_evidence::TransparencyError`] to its failure kind.
fn transparency_error_kind(error: &agentgate_evidence::TransparencyError) -> FailureKind {
    match error {
        agentgate_evidence::TransparencyError::DisallowedAnchorScheme(_)
        | agentgate_evidence::TransparencyError::MalformedAnchorUrl(_) => FailureKind::Validation,
        agentgate_evidence::TransparencyError::Store(_) | agentgate_evidence::TransparencyError::Hashing(_) => FailureKind::Unavailable,
    }
}

/// Hand-builds one `(event_id, proof)` pair's wire representation.
fn render_inclusion_proof(event_id: u64, proof: &agentgate_core::InclusionProof) -> serde_json::Value {
    let steps: Vec<serde_json::Value> = proof
        .steps
        .iter()
        .map(|step| {
            serde_json::json!({
                "sibling": serde_json::to_value(&step.sibling).unwrap_or(serde_json::Value::Null),
                "sibling_is_left": step.sibling_is_left,
            })
        })
        .collect();
    serde_json::json!({
        "event_id": event_id,
        "leaf_index": proof.leaf_index,
        "leaf_hash": serde_json::to_value(&proof.leaf_hash).unwrap_or(serde_json::Value::Null),
        "steps": steps,
    })
}

/// Renders a [`agentgate_config::config::PiiMode`] as its wire string.
fn pii_mode_as_str(mode: agentgate_config::config::PiiMode) -> &'static str {
    match mode {
        agentgate_config::config::PiiMode::Off => "off",
        agentgate_config::config::PiiMode::Redact => "redact",
        agentgate_config::config::PiiMode::Tokenize => "tokenize",
    }
}

// ============================================================================
// SECTION: Kill Switches
// ============================================================================

/// Writes an admin-owned kill-switch row, reporting `204 No Content` on
/// success. Records a `kind: kill` trace event alongside the write, per the
/// kill-switch controller's own "each mutation is recorded as a trace event
/// in addition to being written to the shared store" rule; a `Session`
/// scope is recorded under its own session id, `Tool`/`Global` scope under
/// [`SYSTEM_SESSION_ID`] since neither is bound to one session.
fn write_kill_switch(state: &GatewayState, scope: KillSwitchScope, active: bool, reason: &str) -> (u16, serde_json::Value) {
    let event_session_id = match &scope {
        KillSwitchScope::Session(session_id) => session_id.as_str().to_string(),
        KillSwitchScope::Tool(_) | KillSwitchScope::Global => SYSTEM_SESSION_ID.to_string(),
    };
    let scope_key = scope.store_key();
    let row = KillSwitchRow { scope, active, set_at: state.now(), set_by: ADMIN_PRINCIPAL.to_string(), reason: reason.to_string() };
    match state.admin_kill_switch.write(&row) {
        Ok(()) => {
            append_admin_trace_event(
                state,
                SYSTEM_TENANT_ID,
                &event_session_id,
                agentgate_core::TraceEventKind::Kill,
                format!("{reason} ({scope_key}, active={active})"),
            );
            (204, serde_json::Value::Null)
        }
        Err(err) => error_response(FailureKind::Unavailable, err.to_string(), None),
    }
}

/// Handles `POST /tools/{name}/kill`: disables one tool across every tenant
/// and session.
fn handle_tool_kill(state: &GatewayState, headers: &[Header], tool_name: &str) -> (u16, serde_json::Value) {
    if let Err(response) = authenticate_admin(state, headers) {
        return response;
    }
    write_kill_switch(state, KillSwitchScope::Tool(ToolName::new(tool_name)), true, "operator tool kill")
}

/// Handles `POST /system/pause`: the global kill switch.
fn handle_system_pause(state: &GatewayState, headers: &[Header]) -> (u16, serde_json::Value) {
    if let Err(response) = authenticate_admin(state, headers) {
        return response;
    }
    write_kill_switch(state, KillSwitchScope::Global, true, "operator system pause")
}

/// Handles `POST /system/resume`: clears the global kill switch.
fn handle_system_resume(state: &GatewayState, headers: &[Header]) -> (u16, serde_json::Value) {
    if let Err(response) = authenticate_admin(state, headers) {
        return response;
    }
    write_kill_switch(state, KillSwitchScope::Global, false, "operator system resume")
}

// ============================================================================
// SECTION: Health and Metrics
// ============================================================================

/// Handles `GET /health`: reports `503` when the kill-switch store this
/// process depends on for every pause/resume/tool-kill check is
/// unreachable, `200` otherwise.
fn handle_health(state: &GatewayState) -> (u16, serde_json::Value) {
    match state.admin_kill_switch.read(&KillSwitchScope::Global) {
        Ok(_) => (200, serde_json::json!({ "status": "ok", "now": state.now().as_unix_millis() })),
        Err(err) => (
            503,
            serde_json::json!({ "status": "unavailable", "now": state.now().as_unix_millis(), "reason": err.to_string() }),
        ),
    }
}

/// Handles `GET /metrics`: the rolling SLO estimate this process has
/// observed since boot.
fn handle_metrics(state: &GatewayState) -> (u16, serde_json::Value) {
    let monitor = state.slo.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    (
        200,
        serde_json::json!({
            "availability": monitor.availability(),
            "latency_p95_millis": monitor.latency_p95_millis(),
        }),
    )
}

// ============================================================================
// SECTION: Admin: Policies
// ============================================================================

/// Handles `POST /admin/policies/reload`: verifies and activates a signed
/// policy package, persisting it alongside the in-memory active store.
fn handle_policy_reload(state: &GatewayState, headers: &[Header], body: &[u8]) -> (u16, serde_json::Value) {
    if let Err(response) = authenticate_admin(state, headers) {
        return response;
    }
    let package: PolicyPackage = match serde_json::from_slice(body) {
        Ok(package) => package,
        Err(err) => return error_response(FailureKind::Validation, format!("malformed policy package: {err}"), None),
    };
    let tenant_key = package.tenant_id.to_string();
    match state.policy_packages.reload(&tenant_key, package.clone()) {
        Ok(()) => match state.store.put_policy_package(&package) {
            Ok(()) => {
                append_admin_trace_event(
                    state,
                    package.tenant_id,
                    SYSTEM_SESSION_ID,
                    agentgate_core::TraceEventKind::Reload,
                    format!("policy reloaded to {}", package.version.as_str()),
                );
                (200, serde_json::json!({ "tenant_id": tenant_key, "version": package.version.as_str(), "status": "active" }))
            }
            Err(err) => error_response(FailureKind::Unavailable, err.to_string(), None),
        },
        Err(err) => error_response(FailureKind::SignatureInvalid, err.to_string(), None),
    }
}

// ============================================================================
// SECTION: Admin: Incidents
// ============================================================================

/// Handles `POST /admin/incidents/{id}/release`: the one operator-invoked
/// quarantine transition the coordinator allows outside the containment
/// signal channel.
fn handle_incident_release(state: &GatewayState, headers: &[Header], incident_id: &str) -> (u16, serde_json::Value) {
    if let Err(response) = authenticate_admin(state, headers) {
        return response;
    }
    let incident_id = IncidentId::new(incident_id);
    let mut incident: Incident = match state.store.get_incident(&incident_id) {
        Ok(Some(incident)) => incident,
        Ok(None) => return error_response(FailureKind::Validation, format!("no incident {incident_id}"), None),
        Err(err) => return error_response(FailureKind::Unavailable, err.to_string(), None),
    };
    match state.quarantine.release(&mut incident, ADMIN_PRINCIPAL, state.now()) {
        Ok(()) => (200, serde_json::to_value(&incident).unwrap_or(serde_json::Value::Null)),
        Err(err) => error_response(FailureKind::Forbidden, err.to_string(), None),
    }
}

// ============================================================================
// SECTION: Admin: Rollouts
// ============================================================================

/// Parses a raw tenant path segment into a [`TenantId`].
fn parse_tenant_segment(raw: &str) -> Result<TenantId, (u16, serde_json::Value)> {
    raw.parse::<u64>()
        .ok()
        .and_then(tenant_id_from_raw)
        .ok_or_else(|| error_response(FailureKind::Validation, "tenant path segment must be a non-zero integer", None))
}

/// Handles `POST /admin/tenants/{t}/rollouts`: starts (or returns the
/// existing) rollout for a candidate policy package.
fn handle_start_rollout(state: &GatewayState, headers: &[Header], tenant_raw: &str, body: &[u8]) -> (u16, serde_json::Value) {
    if let Err(response) = authenticate_admin(state, headers) {
        return response;
    }
    let tenant_id = match parse_tenant_segment(tenant_raw) {
        Ok(tenant_id) => tenant_id,
        Err(response) => return response,
    };
    let parsed: serde_json::Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(err) => return error_response(FailureKind::Validation, format!("malformed JSON body: {err}"), None),
    };
    let candidate: PolicyPackage = match serde_json::from_value(parsed.get("candidate").cloned().unwrap_or(serde_json::Value::Null)) {
        Ok(candidate) => candidate,
        Err(err) => return error_response(FailureKind::Validation, format!("candidate is not a valid policy package: {err}"), None),
    };
    let rollout_id = match parsed.get("rollout_id").and_then(serde_json::Value::as_str) {
        Some(raw) => RolloutId::new(raw),
        None => RolloutId::new(state.rollout_ids.issue()),
    };
    let previous_version = match parsed.get("previous_version").and_then(serde_json::Value::as_str) {
        Some(raw) => PolicyVersion::new(raw),
        None => resolve_policy_version(state, tenant_id),
    };
    let canary_fraction_bp = parsed.get("canary_fraction_bp").and_then(serde_json::Value::as_u64).unwrap_or(500);
    let canary_fraction_bp = u16::try_from(canary_fraction_bp).unwrap_or(u16::MAX);

    let existing = match state.store.active_rollout(tenant_id) {
        Ok(existing) => existing,
        Err(err) => return error_response(FailureKind::Unavailable, err.to_string(), None),
    };
    let now = state.now();
    let created_status = if existing.is_none() { 201 } else { 200 };
    match state.rollout.start(tenant_id, rollout_id, &candidate, previous_version, canary_fraction_bp, existing, now) {
        Ok(rollout) => match state.store.put_rollout(&rollout) {
            Ok(()) => {
                append_admin_trace_event(
                    state,
                    rollout.tenant_id,
                    SYSTEM_SESSION_ID,
                    agentgate_core::TraceEventKind::Rollout,
                    format!("rollout {} started toward {}", rollout.rollout_id, rollout.target_version.as_str()),
                );
                (created_status, serde_json::to_value(&rollout).unwrap_or(serde_json::Value::Null))
            }
            Err(err) => error_response(FailureKind::Unavailable, err.to_string(), None),
        },
        Err(err) => error_response(FailureKind::Validation, err.to_string(), None),
    }
}

/// Handles `POST /admin/tenants/{t}/rollouts/{r}/rollback`: forces an
/// in-flight rollout back to its previous version regardless of stage.
fn handle_rollback_rollout(state: &GatewayState, headers: &[Header], tenant_raw: &str, rollout_id: &str) -> (u16, serde_json::Value) {
    if let Err(response) = authenticate_admin(state, headers) {
        return response;
    }
    if let Err(response) = parse_tenant_segment(tenant_raw) {
        return response;
    }
    let rollout_id = RolloutId::new(rollout_id);
    let rollout = match state.store.get_rollout(&rollout_id) {
        Ok(Some(rollout)) => rollout,
        Ok(None) => return error_response(FailureKind::Validation, format!("no rollout {rollout_id}"), None),
        Err(err) => return error_response(FailureKind::Unavailable, err.to_string(), None),
    };
    match state.rollout.force_rollback(rollout, state.now()) {
        Ok(rolled_back) => match state.store.put_rollout(&rolled_back) {
            Ok(()) => {
                append_admin_trace_event(
                    state,
                    rolled_back.tenant_id,
                    SYSTEM_SESSION_ID,
                    agentgate_core::TraceEventKind::Rollout,
                    format!("rollout {} forced back to {}", rolled_back.rollout_id, rolled_back.previous_version.as_str()),
                );
                (200, serde_json::to_value(&rolled_back).unwrap_or(serde_json::Value::Null))
            }
            Err(err) => error_response(FailureKind::Unavailable, err.to_string(), None),
        },
        Err(err) => error_response(FailureKind::Validation, err.to_string(), None),
    }
}

// ============================================================================
// SECTION: Admin: Session Retention
// ============================================================================

/// Handles `POST /admin/sessions/{id}/retention`: sets a session's retention
/// deadline and legal-hold flag.
fn handle_set_retention(state: &GatewayState, headers: &[Header], session_id: &str, body: &[u8]) -> (u16, serde_json::Value) {
    let tenant_id = match resolve_tenant(headers) {
        Ok(tenant_id) => tenant_id,
        Err(response) => return response,
    };
    if let Err(response) = authenticate_admin(state, headers) {
        return response;
    }
    let parsed: serde_json::Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(err) => return error_response(FailureKind::Validation, format!("malformed JSON body: {err}"), None),
    };
    let legal_hold = parsed.get("legal_hold").and_then(serde_json::Value::as_bool).unwrap_or(false);
    let deadline = parsed.get("deadline_unix_millis").and_then(serde_json::Value::as_i64).map(Timestamp::from_unix_millis);
    let retention = agentgate_core::RetentionPolicy { deadline, legal_hold };
    let session_id = SessionId::new(session_id);
    match state.store.set_retention(tenant_id, &session_id, retention) {
        Ok(()) => (200, serde_json::json!({ "session_id": session_id.as_str(), "legal_hold": legal_hold })),
        Err(err) => error_response(store_error_kind(&err), err.to_string(), None),
    }
}

/// Handles `DELETE /admin/sessions/{id}`: deletes a session and its trace
/// events, subject to legal hold.
fn handle_delete_session(state: &GatewayState, headers: &[Header], session_id: &str) -> (u16, serde_json::Value) {
    let tenant_id = match resolve_tenant(headers) {
        Ok(tenant_id) => tenant_id,
        Err(response) => return response,
    };
    if let Err(response) = authenticate_admin(state, headers) {
        return response;
    }
    let session_id = SessionId::new(session_id);
    match state.store.delete_session(tenant_id, &session_id) {
        Ok(()) => (204, serde_json::Value::Null),
        Err(err) => error_response(store_error_kind(&err), err.to_string(), None),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use agentgate_core::EventId;
    use agentgate_core::HashAlgorithm;
    use agentgate_core::HashDigest;
    use agentgate_core::InclusionProof;
    use agentgate_core::StoreError;
    use agentgate_evidence::TransparencyError;
    use tiny_http::Header;

    use super::error_response;
    use super::header_value;
    use super::parse_tenant_segment;
    use super::pii_mode_as_str;
    use super::query_param;
    use super::render_inclusion_proof;
    use super::resolve_tenant;
    use super::split_url;
    use super::store_error_kind;
    use super::transparency_error_kind;
    use super::FailureKind;

    fn header(name: &str, value: &str) -> Header {
        Header::from_bytes(name.as_bytes(), value.as_bytes()).expect("well-formed header")
    }

    #[test]
    fn split_url_separates_path_and_query() {
        assert_eq!(split_url("/sessions/abc/evidence?format=html"), ("/sessions/abc/evidence", "format=html"));
        assert_eq!(split_url("/health"), ("/health", ""));
    }

    #[test]
    fn query_param_finds_a_matching_key() {
        let query = "format=html&anchor_url=https://example.com/anchor";
        assert_eq!(query_param(query, "format"), Some("html"));
        assert_eq!(query_param(query, "anchor_url"), Some("https://example.com/anchor"));
        assert_eq!(query_param(query, "missing"), None);
    }

    #[test]
    fn header_value_matches_case_insensitively() {
        let headers = vec![header("X-AgentGate-Tenant", "42")];
        assert_eq!(header_value(&headers, "x-agentgate-tenant"), Some("42"));
        assert_eq!(header_value(&headers, "X-Other"), None);
    }

    #[test]
    fn resolve_tenant_accepts_a_valid_header() {
        let headers = vec![header("X-AgentGate-Tenant", "7")];
        let tenant_id = resolve_tenant(&headers).expect("tenant parses");
        assert_eq!(tenant_id.get(), 7);
    }

    #[test]
    fn resolve_tenant_rejects_a_missing_header() {
        let (status, _) = resolve_tenant(&[]).expect_err("no tenant header present");
        assert_eq!(status, FailureKind::Validation.http_status());
    }

    #[test]
    fn resolve_tenant_rejects_zero() {
        let headers = vec![header("X-AgentGate-Tenant", "0")];
        let (status, _) = resolve_tenant(&headers).expect_err("zero is not a valid tenant");
        assert_eq!(status, FailureKind::Validation.http_status());
    }

    #[test]
    fn parse_tenant_segment_rejects_non_numeric_input() {
        let result = parse_tenant_segment("not-a-number");
        assert!(result.is_err());
    }

    #[test]
    fn parse_tenant_segment_accepts_a_positive_integer() {
        let tenant_id = parse_tenant_segment("12").expect("tenant parses");
        assert_eq!(tenant_id.get(), 12);
    }

    #[test]
    fn error_response_carries_the_failure_kinds_status_and_hint() {
        let (status, body) = error_response(FailureKind::RateLimited, "too many calls", Some("retry later"));
        assert_eq!(status, 429);
        assert_eq!(body["kind"], serde_json::json!("rate_limited"));
        assert_eq!(body["message"], serde_json::json!("too many calls"));
        assert_eq!(body["hint"], serde_json::json!("retry later"));
    }

    #[test]
    fn store_error_kind_maps_legal_hold_and_tenant_conflict() {
        assert_eq!(store_error_kind(&StoreError::LegalHoldSet), FailureKind::LegalHoldSet);
        assert_eq!(store_error_kind(&StoreError::TenantConflict), FailureKind::TenantConflict);
        assert_eq!(store_error_kind(&StoreError::Io("disk full".to_string())), FailureKind::Unavailable);
    }

    #[test]
    fn transparency_error_kind_maps_validation_and_unavailable() {
        assert_eq!(transparency_error_kind(&TransparencyError::DisallowedAnchorScheme("ftp".to_string())), FailureKind::Validation);
        assert_eq!(transparency_error_kind(&TransparencyError::MalformedAnchorUrl("://bad".to_string())), FailureKind::Validation);
    }

    #[test]
    fn pii_mode_as_str_renders_every_mode() {
        assert_eq!(pii_mode_as_str(agentgate_config::config::PiiMode::Off), "off");
        assert_eq!(pii_mode_as_str(agentgate_config::config::PiiMode::Redact), "redact");
        assert_eq!(pii_mode_as_str(agentgate_config::config::PiiMode::Tokenize), "tokenize");
    }

    #[test]
    fn render_inclusion_proof_embeds_the_event_id_and_steps() {
        let leaf_hash = HashDigest::new(HashAlgorithm::Sha256, b"leaf");
        let sibling = HashDigest::new(HashAlgorithm::Sha256, b"sibling");
        let proof = InclusionProof {
            leaf_index: 3,
            leaf_hash,
            steps: vec![agentgate_core::runtime::ProofStep { sibling, sibling_is_left: true }],
        };
        let event_id = EventId::new(NonZeroU64::new(5).expect("non-zero"));
        let rendered = render_inclusion_proof(event_id.get(), &proof);
        assert_eq!(rendered["event_id"], serde_json::json!(5));
        assert_eq!(rendered["leaf_index"], serde_json::json!(3));
        assert_eq!(rendered["steps"][0]["sibling_is_left"], serde_json::json!(true));
    }

    #[test]
    fn archive_flag_only_triggers_on_the_literal_string_true() {
        assert_eq!(query_param("archive=true&format=html", "archive"), Some("true"));
        assert!(query_param("archive=true&format=html", "archive") == Some("true"));
        assert!(query_param("format=html", "archive") != Some("true"));
        assert!(query_param("archive=1", "archive") != Some("true"));
    }
}
