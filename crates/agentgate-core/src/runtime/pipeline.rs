// crates/agentgate-core/src/runtime/pipeline.rs
// ============================================================================
// Module: Gateway Pipeline
// Description: Single canonical execution path for a tool-call request.
// Purpose: Enforce the mandatory admission/containment/decision ordering,
//          so every external surface shares one enforcement path.
// Dependencies: crate::{identifiers, interfaces, model, runtime::ratelimit,
//               taxonomy, time}
// ============================================================================

//! ## Overview
//! `GatewayPipeline::handle` performs, in this strict order: (1) API version
//! check; (2) tenant-context binding; (3) global / tool / session kill-switch
//! check; (4) quarantine check; (5) rate-limit check; (6) policy evaluation;
//! (7) credential issuance; (8) tool invocation; (9) trace append; (10)
//! response. Kill-switch precedes quarantine; quarantine precedes rate
//! limit; rate limit precedes policy. This ordering is load-bearing: a
//! globally paused system must not leak rate-limit information, and a
//! quarantined session must not be granted rate budget. It is not
//! reorderable by a caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::identifiers::EventId;
use crate::identifiers::PolicyVersion;
use crate::identifiers::SessionId;
use crate::identifiers::TenantId;
use crate::identifiers::ToolName;
use crate::identifiers::TraceId;
use crate::interfaces::CredentialBroker;
use crate::interfaces::KillSwitchStore;
use crate::interfaces::PolicyEngineClient;
use crate::interfaces::PolicyQuery;
use crate::interfaces::RateLimitStore;
use crate::interfaces::StoreError;
use crate::interfaces::ToolInvoker;
use crate::interfaces::TraceStore;
use crate::model::Decision;
use crate::model::KillSwitchScope;
use crate::model::RateLimitSnapshot;
use crate::model::Session;
use crate::model::TraceEvent;
use crate::model::TraceEventKind;
use crate::runtime::ratelimit::RateLimitVerdict;
use crate::runtime::ratelimit::RateLimiter;
use crate::taxonomy::FailureKind;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration governing one gateway pipeline instance.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// API versions this deployment accepts in `X-AgentGate-Requested-Version`.
    pub supported_versions: Vec<String>,
    /// Whether `tenant_id` must be present on every request.
    pub require_tenant: bool,
    /// Per-tool-call credential TTL, used when the tool requires one.
    pub credential_ttl_millis: u64,
    /// Rate-limit window width.
    pub rate_limit_window_millis: u64,
    /// Default per-tuple rate-limit budget.
    pub rate_limit_budget: u32,
    /// Tools that require a credential to be issued before invocation.
    pub credentialed_tools: Vec<ToolName>,
    /// Tools that require an approval token before ALLOW, independent of the
    /// policy engine's own verdict (belt-and-suspenders for write tools).
    pub approval_required_tools: Vec<ToolName>,
}

// ============================================================================
// SECTION: Request / Response
// ============================================================================

/// One tool-call request entering the gateway, e.g. via `/tools/call`.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    /// Session making the call.
    pub session_id: SessionId,
    /// Tenant the caller asserts, required when `GatewayConfig::require_tenant`.
    pub tenant_id: Option<TenantId>,
    /// Tool being invoked.
    pub tool_name: ToolName,
    /// Call arguments, already redacted per the configured PII mode.
    pub arguments: serde_json::Value,
    /// Approval token presented by the caller, if any.
    pub approval_token: Option<String>,
    /// API version requested via `X-AgentGate-Requested-Version`, if sent.
    pub requested_version: Option<String>,
    /// Active policy version for the tenant, supplied by the caller's policy cache.
    pub policy_version: PolicyVersion,
    /// Request arrival time.
    pub now: Timestamp,
}

/// Outcome of one gateway pipeline invocation.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    /// Whether the call ultimately succeeded.
    pub success: bool,
    /// Tool result payload, present only when `success` is `true`.
    pub result: Option<serde_json::Value>,
    /// Correlation id for this request, echoed to the caller.
    pub trace_id: TraceId,
    /// The decision recorded for this request.
    pub decision: Decision,
    /// Rate-limit snapshot, present once the rate-limit stage has run.
    pub rate_limit: Option<RateLimitSnapshot>,
    /// Failure kind, present when `success` is `false`.
    pub failure: Option<FailureKind>,
    /// Human-readable reason for the decision.
    pub reason: String,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors that abort pipeline processing outright, as opposed to a policy
/// rejection rendered as a [`GatewayResponse`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The trace store could not be reached for session binding or event
    /// append. Per the fail-closed rule this is fatal to the request; the
    /// gateway must not have executed the tool.
    #[error("trace store error: {0}")]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Gateway Pipeline
// ============================================================================

/// Single canonical execution path for a tool-call request.
pub struct GatewayPipeline<Policy, Kill, Broker, Store, Invoker, Limit> {
    /// Policy engine client.
    policy: Policy,
    /// Kill-switch backing store.
    kill_switch: Kill,
    /// Credential broker.
    broker: Broker,
    /// Trace store.
    store: Store,
    /// Downstream tool invoker.
    invoker: Invoker,
    /// Rate limiter over a pluggable counter store.
    rate_limiter: RateLimiter<Limit>,
    /// Pipeline configuration.
    config: GatewayConfig,
}

impl<Policy, Kill, Broker, Store, Invoker, Limit> GatewayPipeline<Policy, Kill, Broker, Store, Invoker, Limit>
where
    Policy: PolicyEngineClient,
    Kill: KillSwitchStore,
    Broker: CredentialBroker,
    Store: TraceStore,
    Invoker: ToolInvoker,
    Limit: RateLimitStore,
{
    /// Creates a new gateway pipeline over the given collaborators.
    #[must_use]
    pub fn new(
        policy: Policy,
        kill_switch: Kill,
        broker: Broker,
        store: Store,
        invoker: Invoker,
        rate_limit_store: Limit,
        config: GatewayConfig,
    ) -> Self {
        let rate_limiter = RateLimiter::new(rate_limit_store, config.rate_limit_window_millis);
        Self { policy, kill_switch, broker, store, invoker, rate_limiter, config }
    }

    /// Handles one request through the full admission/containment/decision
    /// sequence and persists every observable event.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] only when the trace store itself cannot be
    /// reached; every other rejection is rendered as a [`GatewayResponse`]
    /// with `success = false` and the matching [`FailureKind`].
    pub fn handle(&self, request: &GatewayRequest, trace_id: TraceId) -> Result<GatewayResponse, PipelineError> {
        if let Some(deny) = self.check_version(request, &trace_id) {
            return Ok(deny);
        }

        let tenant_id = match self.bind_tenant(request, &trace_id) {
            Ok(tenant_id) => tenant_id,
            Err(response) => return Ok(response),
        };

        self.append_tool_call_event(request, tenant_id)?;

        if let Some(deny) = self.check_kill_switches(request, tenant_id, &trace_id)? {
            return Ok(deny);
        }

        if let Some(deny) = self.check_quarantine(request, tenant_id, &trace_id)? {
            return Ok(deny);
        }

        let rate_limit = match self.check_rate_limit(request, tenant_id, &trace_id)? {
            Ok(snapshot) => snapshot,
            Err(response) => return Ok(response),
        };

        let verdict = match self.evaluate_policy(request, tenant_id) {
            Ok(verdict) => verdict,
            Err(reason) => {
                return self.deny(request, tenant_id, &trace_id, FailureKind::PolicyUnavailable, reason, Some(rate_limit));
            }
        };

        let forced_approval = verdict.decision == Decision::Allow
            && request.approval_token.is_none()
            && self.config.approval_required_tools.contains(&request.tool_name);
        let effective_decision = if forced_approval { Decision::RequireApproval } else { verdict.decision };

        match effective_decision {
            Decision::Deny => self.deny(
                request,
                tenant_id,
                &trace_id,
                FailureKind::PolicyDenied,
                verdict.reason,
                Some(rate_limit),
            ),
            Decision::RequireApproval if request.approval_token.is_none() => self.approval_required(
                request,
                tenant_id,
                &trace_id,
                verdict.reason,
                rate_limit,
            ),
            Decision::RequireApproval | Decision::Allow => {
                self.allow(request, tenant_id, &trace_id, verdict.reason, rate_limit)
            }
        }
    }

    // ------------------------------------------------------------------
    // Step 1: API version check
    // ------------------------------------------------------------------

    /// Returns a rejection response if the caller requested an unsupported
    /// API version, or `None` to proceed.
    fn check_version(&self, request: &GatewayRequest, trace_id: &TraceId) -> Option<GatewayResponse> {
        let Some(requested) = &request.requested_version else { return None };
        if self.config.supported_versions.iter().any(|v| v == requested) {
            return None;
        }
        Some(GatewayResponse {
            success: false,
            result: None,
            trace_id: trace_id.clone(),
            decision: Decision::Deny,
            rate_limit: None,
            failure: Some(FailureKind::VersionUnsupported),
            reason: format!("unsupported api version: {requested}"),
        })
    }

    // ------------------------------------------------------------------
    // Step 2: tenant-context binding
    // ------------------------------------------------------------------

    /// Binds the session to its tenant, returning the resolved tenant id.
    fn bind_tenant(&self, request: &GatewayRequest, trace_id: &TraceId) -> Result<TenantId, GatewayResponse> {
        let Some(tenant_id) = request.tenant_id else {
            let reason = if self.config.require_tenant {
                "tenant_id is required by configuration"
            } else {
                "tenant_id could not be inferred for this session"
            };
            return Err(self.quick_deny(trace_id, FailureKind::Validation, reason));
        };

        match self.store.load_session(tenant_id, &request.session_id) {
            Ok(Some(session)) => {
                if session.check_tenant(tenant_id).is_err() {
                    return Err(self.quick_deny(trace_id, FailureKind::TenantConflict, "session bound to a different tenant"));
                }
                Ok(tenant_id)
            }
            Ok(None) => {
                let session = Session::new(request.session_id.clone(), tenant_id, request.now);
                match self.store.bind_session(&session) {
                    Ok(()) => Ok(tenant_id),
                    Err(StoreError::TenantConflict) => {
                        Err(self.quick_deny(trace_id, FailureKind::TenantConflict, "session bound to a different tenant"))
                    }
                    Err(_) => Err(self.quick_deny(trace_id, FailureKind::Unavailable, "trace store unavailable")),
                }
            }
            Err(_) => Err(self.quick_deny(trace_id, FailureKind::Unavailable, "trace store unavailable")),
        }
    }

    /// Builds a rejection response without a rate-limit snapshot, used for
    /// failures that occur before the rate-limit stage runs.
    fn quick_deny(&self, trace_id: &TraceId, failure: FailureKind, reason: &str) -> GatewayResponse {
        GatewayResponse {
            success: false,
            result: None,
            trace_id: trace_id.clone(),
            decision: Decision::Deny,
            rate_limit: None,
            failure: Some(failure),
            reason: reason.to_string(),
        }
    }

    // ------------------------------------------------------------------
    // Step 3: kill-switch checks (global, tool, session)
    // ------------------------------------------------------------------

    /// Checks the global, tool, and session kill-switch scopes in that order.
    fn check_kill_switches(
        &self,
        request: &GatewayRequest,
        tenant_id: TenantId,
        trace_id: &TraceId,
    ) -> Result<Option<GatewayResponse>, PipelineError> {
        let scopes = [
            KillSwitchScope::Global,
            KillSwitchScope::Tool(request.tool_name.clone()),
            KillSwitchScope::Session(request.session_id.clone()),
        ];
        for scope in scopes {
            match self.kill_switch.read(&scope) {
                Ok(Some(row)) if row.active => {
                    let response = self.quick_deny(trace_id, FailureKind::KillSwitchActive, "kill-switch active");
                    self.append_decision_event(request, tenant_id, trace_id, &response)?;
                    return Ok(Some(response));
                }
                Ok(_) => {}
                Err(_) => {
                    let response = self.quick_deny(trace_id, FailureKind::Unavailable, "kill-switch store unavailable");
                    self.append_decision_event(request, tenant_id, trace_id, &response)?;
                    return Ok(Some(response));
                }
            }
        }
        Ok(None)
    }

    // ------------------------------------------------------------------
    // Step 4: quarantine check
    // ------------------------------------------------------------------

    /// Checks whether the session has an active, non-released incident.
    fn check_quarantine(
        &self,
        request: &GatewayRequest,
        tenant_id: TenantId,
        trace_id: &TraceId,
    ) -> Result<Option<GatewayResponse>, PipelineError> {
        match self.store.active_incident(&request.session_id) {
            Ok(Some(_incident)) => {
                let response = self.quick_deny(trace_id, FailureKind::Quarantined, "session is quarantined");
                self.append_decision_event(request, tenant_id, trace_id, &response)?;
                Ok(Some(response))
            }
            Ok(None) => Ok(None),
            Err(err) => Err(PipelineError::Store(err)),
        }
    }

    // ------------------------------------------------------------------
    // Step 5: rate limit
    // ------------------------------------------------------------------

    /// Checks the sliding-window budget for `(tenant, session, tool)`.
    #[allow(clippy::type_complexity, reason = "inner Result distinguishes a rendered rejection from a hard pipeline error")]
    fn check_rate_limit(
        &self,
        request: &GatewayRequest,
        tenant_id: TenantId,
        trace_id: &TraceId,
    ) -> Result<Result<RateLimitSnapshot, GatewayResponse>, PipelineError> {
        match self.rate_limiter.check(
            tenant_id,
            &request.session_id,
            &request.tool_name,
            self.config.rate_limit_budget,
            request.now,
        ) {
            Ok(RateLimitVerdict::Allowed(snapshot)) => Ok(Ok(snapshot)),
            Ok(RateLimitVerdict::Exceeded(snapshot)) => {
                let response = GatewayResponse {
                    success: false,
                    result: None,
                    trace_id: trace_id.clone(),
                    decision: Decision::Deny,
                    rate_limit: Some(snapshot),
                    failure: Some(FailureKind::RateLimited),
                    reason: "rate limit exceeded".to_string(),
                };
                self.append_decision_event(request, tenant_id, trace_id, &response)?;
                Ok(Err(response))
            }
            Err(_) => {
                let response = self.quick_deny(trace_id, FailureKind::Unavailable, "rate limiter unavailable");
                self.append_decision_event(request, tenant_id, trace_id, &response)?;
                Ok(Err(response))
            }
        }
    }

    // ------------------------------------------------------------------
    // Step 6: policy evaluation
    // ------------------------------------------------------------------

    /// Evaluates policy, returning a human-readable reason on transport failure.
    fn evaluate_policy(
        &self,
        request: &GatewayRequest,
        tenant_id: TenantId,
    ) -> Result<crate::interfaces::PolicyVerdict, String> {
        let query = PolicyQuery {
            tenant_id,
            session_id: request.session_id.clone(),
            tool_name: request.tool_name.clone(),
            approval_presented: request.approval_token.is_some(),
            arguments: request.arguments.clone(),
            policy_version: request.policy_version.clone(),
        };
        self.policy.evaluate(&query).map_err(|err| err.to_string())
    }

    // ------------------------------------------------------------------
    // Steps 7-10: credential issuance, invocation, trace append, response
    // ------------------------------------------------------------------

    /// Issues a credential when required, invokes the tool, and appends the
    /// terminal decision event for an ALLOW outcome.
    fn allow(
        &self,
        request: &GatewayRequest,
        tenant_id: TenantId,
        trace_id: &TraceId,
        reason: String,
        rate_limit: RateLimitSnapshot,
    ) -> Result<GatewayResponse, PipelineError> {
        let credential = if self.config.credentialed_tools.contains(&request.tool_name) {
            match self.broker.issue(&request.session_id, &request.tool_name, self.config.credential_ttl_millis) {
                Ok(credential) => Some(credential),
                Err(err) => {
                    let response = GatewayResponse {
                        success: false,
                        result: None,
                        trace_id: trace_id.clone(),
                        decision: Decision::Deny,
                        rate_limit: Some(rate_limit),
                        failure: Some(FailureKind::BrokerFailed),
                        reason: err.to_string(),
                    };
                    self.append_decision_event(request, tenant_id, trace_id, &response)?;
                    return Ok(response);
                }
            }
        } else {
            None
        };

        let deadline = request.now;
        let invocation = self.invoker.invoke(&request.tool_name, &request.arguments, credential.as_ref(), deadline);
        let response = match invocation {
            Ok(result) => GatewayResponse {
                success: true,
                result: Some(result.result),
                trace_id: trace_id.clone(),
                decision: Decision::Allow,
                rate_limit: Some(rate_limit),
                failure: None,
                reason,
            },
            Err(err) => GatewayResponse {
                success: false,
                result: None,
                trace_id: trace_id.clone(),
                decision: Decision::Allow,
                rate_limit: Some(rate_limit),
                failure: Some(FailureKind::ToolFailure),
                reason: err.to_string(),
            },
        };
        self.append_decision_event(request, tenant_id, trace_id, &response)?;
        Ok(response)
    }

    /// Renders the 202 `approval_required` response without invoking the tool.
    fn approval_required(
        &self,
        request: &GatewayRequest,
        tenant_id: TenantId,
        trace_id: &TraceId,
        reason: String,
        rate_limit: RateLimitSnapshot,
    ) -> Result<GatewayResponse, PipelineError> {
        let response = GatewayResponse {
            success: false,
            result: None,
            trace_id: trace_id.clone(),
            decision: Decision::RequireApproval,
            rate_limit: Some(rate_limit),
            failure: Some(FailureKind::ApprovalRequired),
            reason,
        };
        self.append_decision_event(request, tenant_id, trace_id, &response)?;
        Ok(response)
    }

    /// Renders a DENY response (policy-denied or policy-unavailable) without
    /// invoking the tool.
    fn deny(
        &self,
        request: &GatewayRequest,
        tenant_id: TenantId,
        trace_id: &TraceId,
        failure: FailureKind,
        reason: String,
        rate_limit: Option<RateLimitSnapshot>,
    ) -> Result<GatewayResponse, PipelineError> {
        let response = GatewayResponse {
            success: false,
            result: None,
            trace_id: trace_id.clone(),
            decision: Decision::Deny,
            rate_limit,
            failure: Some(failure),
            reason,
        };
        self.append_decision_event(request, tenant_id, trace_id, &response)?;
        Ok(response)
    }

    /// Appends the observational `tool_call` event recorded for every request
    /// that reaches tenant binding, regardless of the eventual decision.
    ///
    /// Per the fail-closed rule this is a hard [`PipelineError`] on failure:
    /// a request whose own receipt cannot be durably recorded must not be
    /// allowed to proceed to containment or policy checks.
    fn append_tool_call_event(&self, request: &GatewayRequest, tenant_id: TenantId) -> Result<(), PipelineError> {
        let integrity_hash = crate::hashing::hash_bytes(
            crate::hashing::DEFAULT_HASH_ALGORITHM,
            format!("{}:{}:tool_call", request.session_id, request.tool_name).as_bytes(),
        );
        let event = TraceEvent {
            event_id: EventId::FIRST,
            session_id: request.session_id.clone(),
            tenant_id,
            timestamp: request.now,
            kind: TraceEventKind::ToolCall,
            tool_name: Some(request.tool_name.clone()),
            decision: None,
            reason: "tool call received".to_string(),
            policy_version: Some(request.policy_version.clone()),
            rate_limit_snapshot: None,
            payload: Some(request.arguments.clone()),
            integrity_hash,
        };
        self.store.append_event(&event)?;
        Ok(())
    }

    /// Appends the single terminal decision event required for this request.
    ///
    /// Per the fail-closed rule, a failure to append here is returned as a
    /// hard [`PipelineError`]: the gateway must not claim success, and a
    /// response that was never durably recorded must not reach the caller.
    fn append_decision_event(
        &self,
        request: &GatewayRequest,
        tenant_id: TenantId,
        trace_id: &TraceId,
        response: &GatewayResponse,
    ) -> Result<(), PipelineError> {
        let integrity_hash = crate::hashing::hash_bytes(
            crate::hashing::DEFAULT_HASH_ALGORITHM,
            format!("{trace_id}:{}", response.reason).as_bytes(),
        );
        let event = TraceEvent {
            event_id: EventId::FIRST,
            session_id: request.session_id.clone(),
            tenant_id,
            timestamp: request.now,
            kind: TraceEventKind::Decision,
            tool_name: Some(request.tool_name.clone()),
            decision: Some(response.decision),
            reason: response.reason.clone(),
            policy_version: Some(request.policy_version.clone()),
            rate_limit_snapshot: response.rate_limit,
            payload: Some(request.arguments.clone()),
            integrity_hash,
        };
        self.store.append_event(&event)?;
        Ok(())
    }
}
