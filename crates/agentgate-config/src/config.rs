// crates/agentgate-config/src/config.rs
// ============================================================================
// Module: AgentGate Configuration
// Description: Environment-sourced configuration loading and validation.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: agentgate-core, serde, thiserror
// ============================================================================

//! ## Overview
//! Configuration is loaded from the process environment. Every recognized
//! key is read once and validated eagerly; nothing is lazily
//! re-read mid-run. When `STRICT_SECRETS` is set, secret-bearing fields must
//! be present and may not be short, placeholder values such as `changeme`.
//! Security posture: environment input is operator-controlled but still
//! validated, since a misconfigured secret weakens containment guarantees
//! the same way a bug would.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Minimum acceptable length for a secret when `STRICT_SECRETS` is set.
pub(crate) const MIN_STRICT_SECRET_LENGTH: usize = 16;
/// Placeholder values rejected outright regardless of length.
pub(crate) const WEAK_SECRET_VALUES: &[&str] =
    &["changeme", "change-me", "password", "secret", "default", "test", ""];
/// Default trace store DSN when `TRACE_DB` is unset.
pub(crate) const DEFAULT_TRACE_DB: &str = "sqlite://agentgate.db";
/// Default kill-switch / rate-limit store URL when `REDIS_URL` is unset.
pub(crate) const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
/// Default SLO availability target (fraction of successful calls).
pub(crate) const DEFAULT_SLO_AVAILABILITY_TARGET: f64 = 0.995;
/// Default SLO p95 latency budget in milliseconds.
pub(crate) const DEFAULT_SLO_LATENCY_P95_MS: u64 = 2_000;
/// Default quarantine risk signal rolling window in milliseconds.
pub(crate) const DEFAULT_QUARANTINE_RISK_WINDOW_MS: u64 = 300_000;
/// Default quarantine risk threshold (0.0-1.0).
pub(crate) const DEFAULT_QUARANTINE_RISK_THRESHOLD: f64 = 0.8;
/// Anchor schemes recognized without further configuration.
pub(crate) const KNOWN_ANCHOR_SCHEMES: &[&str] = &["none", "http", "file"];

// ============================================================================
// SECTION: Environment Source
// ============================================================================

/// Source of environment key/value pairs, injectable for tests.
///
/// Mirrors `agentgate_core::Clock`: production reads the real process
/// environment, tests substitute a fixed map instead of mutating
/// `std::env` (which is process-global and not safe under parallel tests).
pub trait EnvSource {
    /// Returns the value bound to `key`, if any.
    fn get(&self, key: &str) -> Option<String>;
}

/// [`EnvSource`] backed by the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// [`EnvSource`] backed by a fixed map, for tests.
#[derive(Debug, Clone, Default)]
pub struct MapEnv(pub HashMap<String, String>);

impl EnvSource for MapEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

// ============================================================================
// SECTION: Config Error
// ============================================================================

/// Configuration loading or validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required value was absent.
    #[error("missing required configuration: {0}")]
    Missing(String),
    /// A value was present but malformed.
    #[error("invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },
    /// A secret failed the `STRICT_SECRETS` strength check.
    #[error("weak secret rejected under STRICT_SECRETS for {0}")]
    WeakSecret(String),
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Invalid { field: field.to_string(), reason: reason.into() }
    }
}

// ============================================================================
// SECTION: Signing Backend
// ============================================================================

/// Evidence signing backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningBackend {
    /// Symmetric HMAC-SHA256 signing with a shared key.
    Hmac,
    /// Asymmetric Ed25519 signing.
    Ed25519,
}

impl SigningBackend {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw {
            "hmac" => Ok(Self::Hmac),
            "ed25519" => Ok(Self::Ed25519),
            other => Err(ConfigError::invalid(
                "SIGNING_BACKEND",
                format!("expected 'hmac' or 'ed25519', got '{other}'"),
            )),
        }
    }
}

// ============================================================================
// SECTION: PII Mode
// ============================================================================

/// Trace payload redaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiMode {
    /// Payloads are recorded verbatim.
    Off,
    /// Payloads are redacted before storage.
    Redact,
    /// Payloads are replaced with salted tokens.
    Tokenize,
}

impl PiiMode {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw {
            "off" => Ok(Self::Off),
            "redact" => Ok(Self::Redact),
            "tokenize" => Ok(Self::Tokenize),
            other => Err(ConfigError::invalid(
                "PII_MODE",
                format!("expected 'off', 'redact', or 'tokenize', got '{other}'"),
            )),
        }
    }
}

// ============================================================================
// SECTION: Policy Configuration
// ============================================================================

/// Policy Decision Engine transport and provenance configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Directory of local rule bundles, when policy packages are loaded from disk.
    pub path: Option<PathBuf>,
    /// Strict provenance mode: reload refuses unsigned bundles when `true`.
    pub require_signed: bool,
    /// Shared or public key material used to verify bundle signatures.
    pub package_secret: Option<String>,
    /// Base URL of the external policy engine (e.g. an OPA deployment).
    pub opa_url: String,
}

// ============================================================================
// SECTION: mTLS Configuration
// ============================================================================

/// Mutual TLS material for the policy engine transport.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MtlsConfig {
    /// Path to the client certificate.
    pub cert: Option<PathBuf>,
    /// Path to the client private key.
    pub key: Option<PathBuf>,
    /// Path to the CA bundle used to verify the policy engine's certificate.
    pub ca: Option<PathBuf>,
}

impl MtlsConfig {
    /// Returns `true` if all three mTLS materials are configured together.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.cert.is_some() && self.key.is_some() && self.ca.is_some()
    }

    /// Returns `true` if none of the three mTLS materials are configured.
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        self.cert.is_none() && self.key.is_none() && self.ca.is_none()
    }
}

// ============================================================================
// SECTION: Store Configuration
// ============================================================================

/// Kill-switch / rate-limit store and trace store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Connection URL for the kill-switch and rate-limit shared store.
    pub redis_url: String,
    /// DSN for the trace store backend, embedded (`sqlite://`) or networked (`postgres://`).
    pub trace_db: String,
}

// ============================================================================
// SECTION: Admin Configuration
// ============================================================================

/// Administrative endpoint authentication configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdminConfig {
    /// Secret used to verify admin JWTs, when JWT auth is in use.
    pub jwt_secret: Option<String>,
    /// Whether a static API key is accepted as an alternative to JWT auth.
    pub allow_api_key: bool,
    /// The static API key accepted when `allow_api_key` is `true`.
    pub api_key: Option<String>,
}

// ============================================================================
// SECTION: Signing Configuration
// ============================================================================

/// Evidence Exporter signing configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningConfig {
    /// Inline key material, mutually exclusive with `key_file`.
    pub key: Option<String>,
    /// Selected signing backend.
    pub backend: SigningBackend,
    /// Path to a key file, mutually exclusive with `key`.
    pub key_file: Option<PathBuf>,
}

// ============================================================================
// SECTION: PII Configuration
// ============================================================================

/// Trace payload redaction configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiiConfig {
    /// Selected redaction mode.
    pub mode: PiiMode,
    /// Salt mixed into tokenized values; required when `mode` is `Tokenize`.
    pub token_salt: Option<String>,
}

// ============================================================================
// SECTION: SLO Configuration
// ============================================================================

/// SLO Monitor thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SloConfig {
    /// Minimum acceptable rolling availability, in `[0.0, 1.0]`.
    pub availability_target: f64,
    /// Maximum acceptable rolling p95 latency, in milliseconds.
    pub latency_p95_millis: u64,
}

// ============================================================================
// SECTION: Webhook Configuration
// ============================================================================

/// Alert sink configuration for SLO and kill-switch notifications.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WebhookConfig {
    /// Webhook endpoint URL, when alerting is enabled.
    pub url: Option<String>,
    /// Shared secret used to sign outbound webhook payloads.
    pub secret: Option<String>,
}

// ============================================================================
// SECTION: Quarantine Configuration
// ============================================================================

/// Quarantine Coordinator risk-signal thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuarantineConfig {
    /// Rolling window over which risk signals are aggregated, in milliseconds.
    pub risk_window_millis: u64,
    /// Risk score at or above which containment is triggered, in `[0.0, 1.0]`.
    pub risk_threshold: f64,
}

// ============================================================================
// SECTION: Transparency Configuration
// ============================================================================

/// Transparency Log anchoring configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransparencyConfig {
    /// Allowlisted external anchor schemes; an unrecognized scheme fails closed.
    pub anchor_schemes: Vec<String>,
}

// ============================================================================
// SECTION: AgentGate Configuration
// ============================================================================

/// Complete AgentGate process configuration, read once at startup.
///
/// # Invariants
/// - Every field is validated at load time; there is no lazy re-validation.
/// - When `strict_secrets` is `true`, every secret-bearing field listed in
///   every configured secret must be present and pass [`validate_secret`].
#[derive(Debug, Clone, PartialEq)]
pub struct AgentGateConfig {
    /// Production flag: rejects weak or default secrets at startup.
    pub strict_secrets: bool,
    /// Policy Decision Engine transport and provenance configuration.
    pub policy: PolicyConfig,
    /// Mutual TLS material for the policy engine transport.
    pub mtls: MtlsConfig,
    /// Kill-switch / rate-limit store and trace store configuration.
    pub store: StoreConfig,
    /// Administrative endpoint authentication configuration.
    pub admin: AdminConfig,
    /// Evidence Exporter signing configuration.
    pub signing: SigningConfig,
    /// Trace payload redaction configuration.
    pub pii: PiiConfig,
    /// SLO Monitor thresholds.
    pub slo: SloConfig,
    /// Alert sink configuration.
    pub webhook: WebhookConfig,
    /// Quarantine Coordinator risk-signal thresholds.
    pub quarantine: QuarantineConfig,
    /// Transparency Log anchoring configuration.
    pub transparency: TransparencyConfig,
}

impl AgentGateConfig {
    /// Loads and validates configuration from the real process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required value is missing or a value
    /// fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(&ProcessEnv)
    }

    /// Loads and validates configuration from any [`EnvSource`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a required value is missing or a value
    /// fails validation.
    pub fn load(source: &impl EnvSource) -> Result<Self, ConfigError> {
        let strict_secrets = read_bool(source, "STRICT_SECRETS", false)?;

        let policy = load_policy(source, strict_secrets)?;
        let mtls = load_mtls(source)?;
        let store = load_store(source)?;
        let admin = load_admin(source, strict_secrets)?;
        let signing = load_signing(source, strict_secrets)?;
        let pii = load_pii(source, strict_secrets)?;
        let slo = load_slo(source)?;
        let webhook = load_webhook(source, strict_secrets)?;
        let quarantine = load_quarantine(source)?;
        let transparency = load_transparency(source)?;

        if mtls.cert.is_some() || mtls.key.is_some() || mtls.ca.is_some() {
            if !mtls.is_complete() {
                return Err(ConfigError::invalid(
                    "MTLS_CERT/MTLS_KEY/MTLS_CA",
                    "mTLS requires cert, key, and ca to all be set, or none of them",
                ));
            }
        }

        Ok(Self {
            strict_secrets,
            policy,
            mtls,
            store,
            admin,
            signing,
            pii,
            slo,
            webhook,
            quarantine,
            transparency,
        })
    }
}

// ============================================================================
// SECTION: Section Loaders
// ============================================================================

fn load_policy(source: &impl EnvSource, strict: bool) -> Result<PolicyConfig, ConfigError> {
    let require_signed = read_bool(source, "POLICY_REQUIRE_SIGNED", false)?;
    if strict && !require_signed {
        return Err(ConfigError::invalid(
            "POLICY_REQUIRE_SIGNED",
            "production mode (STRICT_SECRETS) requires signed policy packages",
        ));
    }
    let package_secret = read_optional_secret(source, "POLICY_PACKAGE_SECRET", strict)?;
    if require_signed && package_secret.is_none() {
        return Err(ConfigError::Missing("POLICY_PACKAGE_SECRET".to_string()));
    }
    Ok(PolicyConfig {
        path: source.get("POLICY_PATH").map(PathBuf::from),
        require_signed,
        package_secret,
        opa_url: require_non_empty(source, "OPA_URL")?,
    })
}

fn load_mtls(source: &impl EnvSource) -> Result<MtlsConfig, ConfigError> {
    Ok(MtlsConfig {
        cert: source.get("MTLS_CERT").map(PathBuf::from),
        key: source.get("MTLS_KEY").map(PathBuf::from),
        ca: source.get("MTLS_CA").map(PathBuf::from),
    })
}

fn load_store(source: &impl EnvSource) -> Result<StoreConfig, ConfigError> {
    Ok(StoreConfig {
        redis_url: source.get("REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
        trace_db: source.get("TRACE_DB").unwrap_or_else(|| DEFAULT_TRACE_DB.to_string()),
    })
}

fn load_admin(source: &impl EnvSource, strict: bool) -> Result<AdminConfig, ConfigError> {
    let allow_api_key = read_bool(source, "ADMIN_ALLOW_API_KEY", false)?;
    let api_key = read_optional_secret(source, "ADMIN_API_KEY", strict && allow_api_key)?;
    if allow_api_key && api_key.is_none() {
        return Err(ConfigError::Missing("ADMIN_API_KEY".to_string()));
    }
    let jwt_secret = read_optional_secret(source, "ADMIN_JWT_SECRET", strict)?;
    if strict && jwt_secret.is_none() && !allow_api_key {
        return Err(ConfigError::Missing("ADMIN_JWT_SECRET".to_string()));
    }
    Ok(AdminConfig { jwt_secret, allow_api_key, api_key })
}

fn load_signing(source: &impl EnvSource, strict: bool) -> Result<SigningConfig, ConfigError> {
    let backend = source
        .get("SIGNING_BACKEND")
        .map_or(Ok(SigningBackend::Hmac), |raw| SigningBackend::parse(&raw))?;
    let key = read_optional_secret(source, "SIGNING_KEY", strict)?;
    let key_file = source.get("SIGNING_KEY_FILE").map(PathBuf::from);
    if key.is_some() && key_file.is_some() {
        return Err(ConfigError::invalid(
            "SIGNING_KEY/SIGNING_KEY_FILE",
            "set at most one of SIGNING_KEY or SIGNING_KEY_FILE",
        ));
    }
    if key.is_none() && key_file.is_none() {
        return Err(ConfigError::Missing("SIGNING_KEY or SIGNING_KEY_FILE".to_string()));
    }
    Ok(SigningConfig { key, backend, key_file })
}

fn load_pii(source: &impl EnvSource, strict: bool) -> Result<PiiConfig, ConfigError> {
    let mode = source.get("PII_MODE").map_or(Ok(PiiMode::Redact), |raw| PiiMode::parse(&raw))?;
    let token_salt = read_optional_secret(source, "PII_TOKEN_SALT", strict && mode == PiiMode::Tokenize)?;
    if mode == PiiMode::Tokenize && token_salt.is_none() {
        return Err(ConfigError::Missing("PII_TOKEN_SALT".to_string()));
    }
    Ok(PiiConfig { mode, token_salt })
}

fn load_slo(source: &impl EnvSource) -> Result<SloConfig, ConfigError> {
    let availability_target = read_f64(source, "SLO_AVAILABILITY_TARGET", DEFAULT_SLO_AVAILABILITY_TARGET)?;
    if !(0.0..=1.0).contains(&availability_target) {
        return Err(ConfigError::invalid("SLO_AVAILABILITY_TARGET", "must be within [0.0, 1.0]"));
    }
    let latency_p95_millis = read_u64(source, "SLO_LATENCY_P95_MS", DEFAULT_SLO_LATENCY_P95_MS)?;
    if latency_p95_millis == 0 {
        return Err(ConfigError::invalid("SLO_LATENCY_P95_MS", "must be greater than zero"));
    }
    Ok(SloConfig { availability_target, latency_p95_millis })
}

fn load_webhook(source: &impl EnvSource, strict: bool) -> Result<WebhookConfig, ConfigError> {
    let url = source.get("WEBHOOK_URL");
    let secret = read_optional_secret(source, "WEBHOOK_SECRET", strict && url.is_some())?;
    if url.is_some() && strict && secret.is_none() {
        return Err(ConfigError::Missing("WEBHOOK_SECRET".to_string()));
    }
    Ok(WebhookConfig { url, secret })
}

fn load_quarantine(source: &impl EnvSource) -> Result<QuarantineConfig, ConfigError> {
    let risk_window_millis = read_u64(source, "QUARANTINE_RISK_WINDOW", DEFAULT_QUARANTINE_RISK_WINDOW_MS)?;
    if risk_window_millis == 0 {
        return Err(ConfigError::invalid("QUARANTINE_RISK_WINDOW", "must be greater than zero"));
    }
    let risk_threshold = read_f64(source, "QUARANTINE_RISK_THRESHOLD", DEFAULT_QUARANTINE_RISK_THRESHOLD)?;
    if !(0.0..=1.0).contains(&risk_threshold) {
        return Err(ConfigError::invalid("QUARANTINE_RISK_THRESHOLD", "must be within [0.0, 1.0]"));
    }
    Ok(QuarantineConfig { risk_window_millis, risk_threshold })
}

fn load_transparency(source: &impl EnvSource) -> Result<TransparencyConfig, ConfigError> {
    let raw = source.get("TRANSPARENCY_ANCHOR_SCHEMES").unwrap_or_else(|| "none".to_string());
    let anchor_schemes: Vec<String> = raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();
    for scheme in &anchor_schemes {
        if !KNOWN_ANCHOR_SCHEMES.contains(&scheme.as_str()) {
            return Err(ConfigError::invalid(
                "TRANSPARENCY_ANCHOR_SCHEMES",
                format!("unrecognized anchor scheme '{scheme}'"),
            ));
        }
    }
    Ok(TransparencyConfig { anchor_schemes })
}

// ============================================================================
// SECTION: Primitive Readers
// ============================================================================

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
            other => Err(ConfigError::invalid(key, format!("expected a boolean, got '{other}'"))),
        },
    }
}

fn read_u64(source: &impl EnvSource, key: &str, default: u64) -> Result<u64, ConfigError> {
    match source.get(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::invalid(key, format!("expected an integer, got '{value}'"))),
    }
}

fn read_f64(source: &impl EnvSource, key: &str, default: f64) -> Result<f64, ConfigError> {
    match source.get(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::invalid(key, format!("expected a number, got '{value}'"))),
    }
}

/// Reads an optional secret, validating its strength when `strict` is `true`.
fn read_optional_secret(source: &impl EnvSource, key: &str, strict: bool) -> Result<Option<String>, ConfigError> {
    match source.get(key) {
        None => Ok(None),
        Some(value) => {
            validate_secret(key, &value, strict)?;
            Ok(Some(value))
        }
    }
}

/// Rejects empty, placeholder, or (under `strict`) short secret values.
fn validate_secret(key: &str, value: &str, strict: bool) -> Result<(), ConfigError> {
    let lowered = value.to_lowercase();
    if WEAK_SECRET_VALUES.contains(&lowered.as_str()) {
        return Err(ConfigError::WeakSecret(key.to_string()));
    }
    if strict && value.len() < MIN_STRICT_SECRET_LENGTH {
        return Err(ConfigError::WeakSecret(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::AgentGateConfig;
    use super::ConfigError;
    use super::MapEnv;
    use super::PiiMode;
    use super::SigningBackend;

    fn env(pairs: &[(&str, &str)]) -> MapEnv {
        let mut map = HashMap::new();
        for (key, value) in pairs {
            map.insert((*key).to_string(), (*value).to_string());
        }
        MapEnv(map)
    }

    fn minimal_pairs() -> Vec<(&'static str, &'static str)> {
        vec![("OPA_URL", "https://policy.internal:8181"), ("SIGNING_KEY", "dev-only-signing-key")]
    }

    #[test]
    fn loads_with_defaults_when_only_required_keys_are_set() {
        let config = AgentGateConfig::load(&env(&minimal_pairs())).expect("config loads");
        assert!(!config.strict_secrets);
        assert_eq!(config.signing.backend, SigningBackend::Hmac);
        assert_eq!(config.pii.mode, PiiMode::Redact);
        assert_eq!(config.store.trace_db, super::DEFAULT_TRACE_DB);
    }

    #[test]
    fn missing_opa_url_is_a_startup_error() {
        let result = AgentGateConfig::load(&env(&[("SIGNING_KEY", "dev-only-signing-key")]));
        assert_eq!(result, Err(ConfigError::Missing("OPA_URL".to_string())));
    }

    #[test]
    fn strict_secrets_rejects_short_signing_key() {
        let mut pairs = minimal_pairs();
        pairs.push(("SIGNING_KEY", "too-short"));
        pairs.push(("STRICT_SECRETS", "true"));
        pairs.push(("POLICY_REQUIRE_SIGNED", "true"));
        pairs.push(("POLICY_PACKAGE_SECRET", "a-sufficiently-long-shared-secret"));
        pairs.push(("ADMIN_JWT_SECRET", "a-sufficiently-long-jwt-secret"));
        let result = AgentGateConfig::load(&env(&pairs));
        assert_eq!(result, Err(ConfigError::WeakSecret("SIGNING_KEY".to_string())));
    }

    #[test]
    fn strict_secrets_requires_signed_policy_packages() {
        let result = AgentGateConfig::load(&env(&minimal_pairs())).map(|config| config.strict_secrets);
        assert_eq!(result, Ok(false));

        let mut pairs = minimal_pairs();
        pairs.push(("STRICT_SECRETS", "true"));
        let result = AgentGateConfig::load(&env(&pairs));
        assert_eq!(
            result,
            Err(ConfigError::Invalid {
                field: "POLICY_REQUIRE_SIGNED".to_string(),
                reason: "production mode (STRICT_SECRETS) requires signed policy packages".to_string(),
            })
        );
    }

    #[test]
    fn tokenize_mode_requires_a_token_salt() {
        let mut pairs = minimal_pairs();
        pairs.push(("PII_MODE", "tokenize"));
        let result = AgentGateConfig::load(&env(&pairs));
        assert_eq!(result, Err(ConfigError::Missing("PII_TOKEN_SALT".to_string())));
    }

    #[test]
    fn partial_mtls_material_is_rejected() {
        let mut pairs = minimal_pairs();
        pairs.push(("MTLS_CERT", "/etc/agentgate/client.crt"));
        let result = AgentGateConfig::load(&env(&pairs));
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field.contains("MTLS")));
    }

    #[test]
    fn unrecognized_anchor_scheme_fails_closed() {
        let mut pairs = minimal_pairs();
        pairs.push(("TRANSPARENCY_ANCHOR_SCHEMES", "none,s3"));
        let result = AgentGateConfig::load(&env(&pairs));
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "TRANSPARENCY_ANCHOR_SCHEMES"));
    }

    #[test]
    fn weak_placeholder_secret_rejected_even_outside_strict_mode() {
        let mut pairs = minimal_pairs();
        pairs.push(("ADMIN_JWT_SECRET", "changeme"));
        let result = AgentGateConfig::load(&env(&pairs));
        assert_eq!(result, Err(ConfigError::WeakSecret("ADMIN_JWT_SECRET".to_string())));
    }
}
