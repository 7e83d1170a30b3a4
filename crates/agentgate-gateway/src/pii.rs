// crates/agentgate-gateway/src/pii.rs
// ============================================================================
// Module: PII Redaction
// Description: Applies the configured PII mode to tool-call arguments before
//              they enter the gateway pipeline.
// Purpose: Keep `GatewayRequest::arguments` already-redacted at ingress, so
//          every trace event the pipeline writes inherits the redaction for
//          free rather than needing its own scrubbing pass.
// Dependencies: agentgate-config, sha2
// ============================================================================

//! ## Overview
//! `agentgate_core::runtime::pipeline::GatewayRequest::arguments` documents
//! itself as "already redacted per the configured PII mode" — redaction is
//! therefore an ingress concern, applied once by [`redact_arguments`] before
//! a request is ever built, not a `TraceStore` decorator. `off` leaves the
//! value untouched; `redact` replaces every string leaf with a fixed marker;
//! `tokenize` replaces every string leaf with a deterministic salted hash,
//! preserving the argument shape for anyone auditing the call's structure.
//! Because the trace store only ever sees the redacted value, an evidence
//! export's rendered body inherits the same redaction automatically; export
//! time only needs to record which mode produced the archive it is handing
//! back (see `handlers::export_evidence`).

use agentgate_config::config::PiiMode;
use sha2::Digest;
use sha2::Sha256;

/// Marker substituted for every string leaf in `redact` mode.
const REDACTED_MARKER: &str = "[redacted]";

/// Applies `mode` to `value`, returning a new value with every string leaf
/// replaced per the mode's rule. Object keys and array/object shape are
/// preserved; only leaf values are affected.
#[must_use]
pub fn redact_arguments(mode: PiiMode, token_salt: Option<&str>, value: &serde_json::Value) -> serde_json::Value {
    match mode {
        PiiMode::Off => value.clone(),
        PiiMode::Redact => redact_leaves(value),
        PiiMode::Tokenize => tokenize_leaves(value, token_salt.unwrap_or("")),
    }
}

/// Recursively replaces every string leaf with [`REDACTED_MARKER`]; other
/// scalar leaves (numbers, booleans, null) are left as-is since they carry
/// no free-text identifier risk on their own.
fn redact_leaves(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::String(_) => serde_json::Value::String(REDACTED_MARKER.to_string()),
        serde_json::Value::Array(items) => serde_json::Value::Array(items.iter().map(redact_leaves).collect()),
        serde_json::Value::Object(fields) => {
            serde_json::Value::Object(fields.iter().map(|(key, inner)| (key.clone(), redact_leaves(inner))).collect())
        }
        other => other.clone(),
    }
}

/// Recursively replaces every string leaf with a deterministic token derived
/// from `salt` and the leaf's own bytes, so the same input value always
/// tokenizes to the same output within one deployment.
fn tokenize_leaves(value: &serde_json::Value, salt: &str) -> serde_json::Value {
    match value {
        serde_json::Value::String(text) => serde_json::Value::String(tokenize(salt, text)),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(|item| tokenize_leaves(item, salt)).collect())
        }
        serde_json::Value::Object(fields) => serde_json::Value::Object(
            fields.iter().map(|(key, inner)| (key.clone(), tokenize_leaves(inner, salt))).collect(),
        ),
        other => other.clone(),
    }
}

/// Computes `tok_<hex>`, the hex-encoded SHA-256 of `salt || text`.
fn tokenize(salt: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(4 + digest.len() * 2);
    hex.push_str("tok_");
    for byte in digest {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::redact_arguments;
    use agentgate_config::config::PiiMode;

    #[test]
    fn off_mode_leaves_the_value_unchanged() {
        let value = serde_json::json!({"email": "a@example.com"});
        assert_eq!(redact_arguments(PiiMode::Off, None, &value), value);
    }

    #[test]
    fn redact_mode_scrubs_every_string_leaf_but_keeps_shape() {
        let value = serde_json::json!({"email": "a@example.com", "count": 3, "tags": ["x", "y"]});
        let redacted = redact_arguments(PiiMode::Redact, None, &value);
        assert_eq!(redacted["email"], serde_json::json!("[redacted]"));
        assert_eq!(redacted["count"], serde_json::json!(3));
        assert_eq!(redacted["tags"], serde_json::json!(["[redacted]", "[redacted]"]));
    }

    #[test]
    fn tokenize_mode_is_deterministic_for_the_same_salt_and_input() {
        let value = serde_json::json!({"email": "a@example.com"});
        let first = redact_arguments(PiiMode::Tokenize, Some("pepper"), &value);
        let second = redact_arguments(PiiMode::Tokenize, Some("pepper"), &value);
        assert_eq!(first, second);
        assert_ne!(first["email"], value["email"]);
    }

    #[test]
    fn tokenize_mode_differs_across_salts() {
        let value = serde_json::json!({"email": "a@example.com"});
        let first = redact_arguments(PiiMode::Tokenize, Some("pepper-a"), &value);
        let second = redact_arguments(PiiMode::Tokenize, Some("pepper-b"), &value);
        assert_ne!(first, second);
    }
}
