// crates/agentgate-gateway/src/settings.rs
// ============================================================================
// Module: Gateway Wiring Settings
// Description: Environment-sourced settings specific to the gateway binary
//              (listener, tool invoker, credential broker selection) that
//              agentgate_config deliberately does not cover.
// Purpose: Keep agentgate_config scoped to the collaborators it already
//          validates, and give the binary its own fail-closed settings layer
//          for the fields only the binary itself needs.
// Dependencies: agentgate-config, agentgate-core
// ============================================================================

//! ## Overview
//! [`agentgate_config::AgentGateConfig`] validates everything every
//! collaborator crate needs; it has no opinion on how the gateway binds a
//! listener, which credential broker variant a deployment selected, or which
//! tools require a credential. [`GatewaySettings::load`] reads those
//! remaining variables through the same injectable [`EnvSource`] seam so
//! tests never touch the real process environment.

use std::path::PathBuf;

use agentgate_config::ConfigError;
use agentgate_config::config::EnvSource;
use agentgate_core::ToolName;

use agentgate_credential_broker::ClientCredentialsConfig;
use agentgate_credential_broker::HttpExchangeConfig;
use agentgate_credential_broker::ShortTermTokenConfig;

/// Default TCP port the gateway listens on.
const DEFAULT_PORT: u16 = 8443;
/// Default downstream tool-invocation timeout.
const DEFAULT_INVOKER_TIMEOUT_MILLIS: u64 = 10_000;
/// Default per-tool-call credential lifetime.
const DEFAULT_CREDENTIAL_TTL_MILLIS: u64 = 60_000;
/// Default rate-limit sliding-window width.
const DEFAULT_RATE_LIMIT_WINDOW_MILLIS: u64 = 60_000;
/// Default rate-limit budget per `(tenant, session, tool)` per window.
const DEFAULT_RATE_LIMIT_BUDGET: u32 = 120;

/// Builds a [`ConfigError::Invalid`] for one field; `ConfigError`'s own
/// `invalid` constructor is crate-private to `agentgate_config`.
fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.to_string(), reason: reason.into() }
}

/// Which [`agentgate_credential_broker`] variant a deployment selected.
#[derive(Debug, Clone)]
pub enum BrokerSelection {
    /// No credential authority configured; every issuance is denied.
    Inert,
    /// OAuth2 `client_credentials` grant.
    ClientCredentials(ClientCredentialsConfig),
    /// Generic issue/revoke HTTP contract.
    HttpExchange(HttpExchangeConfig),
    /// Single-purpose token-minting service.
    ShortTermToken(ShortTermTokenConfig),
}

/// Gateway-binary-specific wiring settings.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// TCP port the HTTP listener binds.
    pub port: u16,
    /// Base URL of the downstream tool server [`crate::tool_invoker::HttpToolInvoker`] forwards to.
    pub tool_invoker_url: String,
    /// Per-request timeout for the downstream tool invocation.
    pub tool_invoker_timeout_millis: u64,
    /// Selected credential broker variant and its own configuration.
    pub broker: BrokerSelection,
    /// API versions this deployment accepts.
    pub supported_versions: Vec<String>,
    /// Whether a bound tenant is required on every request.
    pub require_tenant: bool,
    /// Tools that require a credential to be issued before invocation.
    pub credentialed_tools: Vec<ToolName>,
    /// Tools that require an approval token before `Allow`, independent of
    /// the policy engine's own verdict.
    pub approval_required_tools: Vec<ToolName>,
    /// Per-tool-call credential TTL, used when the tool requires one.
    pub credential_ttl_millis: u64,
    /// Rate-limit sliding-window width.
    pub rate_limit_window_millis: u64,
    /// Default per-tuple rate-limit budget.
    pub rate_limit_budget: u32,
    /// Optional path to a file the gateway writes its PID to, for process supervision.
    pub pid_file: Option<PathBuf>,
}

impl GatewaySettings {
    /// Loads gateway wiring settings from the real process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required value is missing or malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(&agentgate_config::config::ProcessEnv)
    }

    /// Loads gateway wiring settings from any [`EnvSource`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required value is missing or malformed.
    pub fn load(source: &impl EnvSource) -> Result<Self, ConfigError> {
        let port = read_u16(source, "GATEWAY_PORT", DEFAULT_PORT)?;
        let tool_invoker_url = require_non_empty(source, "TOOL_INVOKER_URL")?;
        let tool_invoker_timeout_millis = read_u64(source, "TOOL_INVOKER_TIMEOUT_MS", DEFAULT_INVOKER_TIMEOUT_MILLIS)?;
        let broker = load_broker(source)?;
        let supported_versions = read_csv(source, "GATEWAY_API_VERSIONS", &["v1"]);
        let require_tenant = read_bool(source, "GATEWAY_REQUIRE_TENANT", true)?;
        let credentialed_tools = read_csv(source, "GATEWAY_CREDENTIALED_TOOLS", &[]).into_iter().map(ToolName::new).collect();
        let approval_required_tools =
            read_csv(source, "GATEWAY_APPROVAL_REQUIRED_TOOLS", &[]).into_iter().map(ToolName::new).collect();
        let credential_ttl_millis = read_u64(source, "GATEWAY_CREDENTIAL_TTL_MS", DEFAULT_CREDENTIAL_TTL_MILLIS)?;
        let rate_limit_window_millis = read_u64(source, "GATEWAY_RATE_LIMIT_WINDOW_MS", DEFAULT_RATE_LIMIT_WINDOW_MILLIS)?;
        let rate_limit_budget = read_u32(source, "GATEWAY_RATE_LIMIT_BUDGET", DEFAULT_RATE_LIMIT_BUDGET)?;
        let pid_file = source.get("GATEWAY_PID_FILE").map(PathBuf::from);

        Ok(Self {
            port,
            tool_invoker_url,
            tool_invoker_timeout_millis,
            broker,
            supported_versions,
            require_tenant,
            credentialed_tools,
            approval_required_tools,
            credential_ttl_millis,
            rate_limit_window_millis,
            rate_limit_budget,
            pid_file,
        })
    }
}

/// Selects and configures one [`BrokerSelection`] variant from
/// `CREDENTIAL_BROKER` (`inert` by default: a deployment must opt into a real
/// credential authority).
fn load_broker(source: &impl EnvSource) -> Result<BrokerSelection, ConfigError> {
    let kind = source.get("CREDENTIAL_BROKER").unwrap_or_else(|| "inert".to_string());
    match kind.as_str() {
        "inert" => Ok(BrokerSelection::Inert),
        "client_credentials" => Ok(BrokerSelection::ClientCredentials(ClientCredentialsConfig {
            token_url: require_non_empty(source, "BROKER_TOKEN_URL")?,
            client_id: require_non_empty(source, "BROKER_CLIENT_ID")?,
            client_secret: require_non_empty(source, "BROKER_CLIENT_SECRET")?,
            timeout_millis: read_u64(source, "BROKER_TIMEOUT_MS", DEFAULT_INVOKER_TIMEOUT_MILLIS)?,
        })),
        "http_exchange" => Ok(BrokerSelection::HttpExchange(HttpExchangeConfig {
            base_url: require_non_empty(source, "BROKER_BASE_URL")?,
            timeout_millis: read_u64(source, "BROKER_TIMEOUT_MS", DEFAULT_INVOKER_TIMEOUT_MILLIS)?,
        })),
        "short_term_token" => Ok(BrokerSelection::ShortTermToken(ShortTermTokenConfig {
            mint_url: require_non_empty(source, "BROKER_MINT_URL")?,
            timeout_millis: read_u64(source, "BROKER_TIMEOUT_MS", DEFAULT_INVOKER_TIMEOUT_MILLIS)?,
        })),
        other => Err(invalid(
            "CREDENTIAL_BROKER",
            format!("expected 'inert', 'client_credentials', 'http_exchange', or 'short_term_token', got '{other}'"),
        )),
    }
}

fn require_non_empty(source: &impl EnvSource, key: &str) -> Result<String, ConfigError> {
    match source.get(key) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(key.to_string())),
    }
}

fn read_bool(source: &impl EnvSource, key: &str, default: bool) -> Result<bool, ConfigError> {
    match source.get(key) {
        None => Ok(default),
        Some(value) => match value.as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(invalid(key, format!("expected a boolean, got '{other}'"))),
        },
    }
}

fn read_u16(source: &impl EnvSource, key: &str, default: u16) -> Result<u16, ConfigError> {
    match source.get(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| invalid(key, format!("expected a port number, got '{value}'"))),
    }
}

fn read_u32(source: &impl EnvSource, key: &str, default: u32) -> Result<u32, ConfigError> {
    match source.get(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| invalid(key, format!("expected an integer, got '{value}'"))),
    }
}

fn read_u64(source: &impl EnvSource, key: &str, default: u64) -> Result<u64, ConfigError> {
    match source.get(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| invalid(key, format!("expected an integer, got '{value}'"))),
    }
}

/// Reads a comma-separated list, trimming entries and dropping empties.
fn read_csv(source: &impl EnvSource, key: &str, default: &[&str]) -> Vec<String> {
    match source.get(key) {
        None => default.iter().map(|s| (*s).to_string()).collect(),
        Some(raw) => raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::BrokerSelection;
    use super::GatewaySettings;
    use agentgate_config::config::MapEnv;

    fn env(pairs: &[(&str, &str)]) -> MapEnv {
        let mut map = HashMap::new();
        for (key, value) in pairs {
            map.insert((*key).to_string(), (*value).to_string());
        }
        MapEnv(map)
    }

    #[test]
    fn defaults_to_inert_broker_and_one_api_version() {
        let settings = GatewaySettings::load(&env(&[("TOOL_INVOKER_URL", "https://tools.internal")])).expect("loads");
        assert!(matches!(settings.broker, BrokerSelection::Inert));
        assert_eq!(settings.supported_versions, vec!["v1".to_string()]);
        assert!(settings.require_tenant);
    }

    #[test]
    fn missing_tool_invoker_url_is_a_startup_error() {
        let result = GatewaySettings::load(&env(&[]));
        assert!(result.is_err());
    }

    #[test]
    fn http_exchange_broker_requires_its_own_fields() {
        let result = GatewaySettings::load(&env(&[
            ("TOOL_INVOKER_URL", "https://tools.internal"),
            ("CREDENTIAL_BROKER", "http_exchange"),
        ]));
        assert!(result.is_err());

        let settings = GatewaySettings::load(&env(&[
            ("TOOL_INVOKER_URL", "https://tools.internal"),
            ("CREDENTIAL_BROKER", "http_exchange"),
            ("BROKER_BASE_URL", "https://credentials.internal"),
        ]))
        .expect("loads");
        assert!(matches!(settings.broker, BrokerSelection::HttpExchange(_)));
    }

    #[test]
    fn credentialed_tools_parses_as_a_trimmed_list() {
        let settings = GatewaySettings::load(&env(&[
            ("TOOL_INVOKER_URL", "https://tools.internal"),
            ("GATEWAY_CREDENTIALED_TOOLS", "send_email, delete_file"),
        ]))
        .expect("loads");
        assert_eq!(settings.credentialed_tools.len(), 2);
    }
}
