// crates/agentgate-config/src/docs.rs
// ============================================================================
// Module: Config Docs Generator
// Description: Markdown generator for the environment variable reference.
// Purpose: Keep the operator-facing configuration reference in sync with
//          the fields `config::AgentGateConfig::load` actually reads.
// Dependencies: std::fmt
// ============================================================================

//! ## Overview
//! AgentGate has no TOML schema to walk: it reads the environment directly.
//! This module owns a single table of `(key, description)` pairs and renders
//! it, so the reference doc and the loader can be reviewed side by side
//! without a generated schema in between.

// ============================================================================
// SECTION: Reference Table
// ============================================================================

/// One recognized environment variable and its effect.
struct EnvVarDoc {
    key: &'static str,
    description: &'static str,
}

const ENV_VAR_DOCS: &[EnvVarDoc] = &[
    EnvVarDoc { key: "POLICY_PATH", description: "Directory of local rule bundles, when policy packages are loaded from disk." },
    EnvVarDoc { key: "POLICY_REQUIRE_SIGNED", description: "Strict provenance mode; required when STRICT_SECRETS is set." },
    EnvVarDoc { key: "POLICY_PACKAGE_SECRET", description: "Shared or public key used to verify policy bundle signatures." },
    EnvVarDoc { key: "OPA_URL", description: "Base URL of the external Policy Decision Engine. Required." },
    EnvVarDoc { key: "MTLS_CERT", description: "Client certificate for the policy engine transport. All-or-nothing with MTLS_KEY and MTLS_CA." },
    EnvVarDoc { key: "MTLS_KEY", description: "Client private key for the policy engine transport." },
    EnvVarDoc { key: "MTLS_CA", description: "CA bundle used to verify the policy engine's certificate." },
    EnvVarDoc { key: "REDIS_URL", description: "Kill-switch and rate-limit shared store connection URL." },
    EnvVarDoc { key: "TRACE_DB", description: "Trace store DSN, embedded (sqlite://) or networked (postgres://)." },
    EnvVarDoc { key: "ADMIN_JWT_SECRET", description: "Secret used to verify admin JWTs." },
    EnvVarDoc { key: "ADMIN_ALLOW_API_KEY", description: "Accept a static API key as an alternative to JWT auth on admin endpoints." },
    EnvVarDoc { key: "ADMIN_API_KEY", description: "Static API key accepted when ADMIN_ALLOW_API_KEY is set." },
    EnvVarDoc { key: "SIGNING_KEY", description: "Inline evidence-signing key material. Mutually exclusive with SIGNING_KEY_FILE." },
    EnvVarDoc { key: "SIGNING_BACKEND", description: "Evidence signing backend: hmac or ed25519. Defaults to hmac." },
    EnvVarDoc { key: "SIGNING_KEY_FILE", description: "Path to evidence-signing key material. Mutually exclusive with SIGNING_KEY." },
    EnvVarDoc { key: "PII_MODE", description: "Trace payload redaction mode: off, redact, or tokenize. Defaults to redact." },
    EnvVarDoc { key: "PII_TOKEN_SALT", description: "Salt mixed into tokenized payload values. Required when PII_MODE=tokenize." },
    EnvVarDoc { key: "SLO_AVAILABILITY_TARGET", description: "Minimum rolling availability in [0.0, 1.0]. Defaults to 0.995." },
    EnvVarDoc { key: "SLO_LATENCY_P95_MS", description: "Maximum rolling p95 latency budget in milliseconds. Defaults to 2000." },
    EnvVarDoc { key: "WEBHOOK_URL", description: "Alert sink endpoint for SLO breach and kill-switch notifications." },
    EnvVarDoc { key: "WEBHOOK_SECRET", description: "Shared secret used to sign outbound webhook payloads." },
    EnvVarDoc { key: "STRICT_SECRETS", description: "Production flag; rejects weak, placeholder, or missing secrets at startup." },
    EnvVarDoc { key: "QUARANTINE_RISK_WINDOW", description: "Rolling window for the quarantine risk signal, in milliseconds. Defaults to 300000." },
    EnvVarDoc { key: "QUARANTINE_RISK_THRESHOLD", description: "Risk score in [0.0, 1.0] at or above which containment triggers. Defaults to 0.8." },
    EnvVarDoc { key: "TRANSPARENCY_ANCHOR_SCHEMES", description: "Comma-separated allowlist of external anchor schemes. Unrecognized schemes fail closed." },
];

// ============================================================================
// SECTION: Public API
// ============================================================================

/// Renders the environment variable reference as markdown.
#[must_use]
pub fn config_docs_markdown() -> String {
    let mut out = String::from("# AgentGate Configuration Reference\n\n");
    out.push_str("| Variable | Effect |\n");
    out.push_str("|---|---|\n");
    for entry in ENV_VAR_DOCS {
        out.push_str("| `");
        out.push_str(entry.key);
        out.push_str("` | ");
        out.push_str(entry.description);
        out.push_str(" |\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::config_docs_markdown;

    #[test]
    fn every_recognized_key_appears_in_the_table() {
        let markdown = config_docs_markdown();
        for key in [
            "POLICY_PATH",
            "OPA_URL",
            "REDIS_URL",
            "TRACE_DB",
            "SIGNING_BACKEND",
            "PII_MODE",
            "STRICT_SECRETS",
            "QUARANTINE_RISK_WINDOW",
            "TRANSPARENCY_ANCHOR_SCHEMES",
        ] {
            assert!(markdown.contains(key), "missing {key} in generated docs");
        }
    }
}
