// crates/agentgate-store-common/src/redact.rs
// ============================================================================
// Module: Trace Payload Redaction
// Description: Applies the configured PII mode to a trace payload before it
//              is written to a backend.
// Purpose: Give both backends one definition of what "redacted" and
//          "tokenized" mean, so a payload written by one backend and read by
//          the other (e.g. during a migration) looks identical.
// Dependencies: agentgate-core, agentgate-config, hmac, sha2
// ============================================================================

//! Trace payload redaction, applied once here rather than independently by
//! each Trace Store backend.

use agentgate_config::PiiMode;
use agentgate_core::HashAlgorithm;
use agentgate_core::HashDigest;
use hmac::Hmac;
use hmac::Mac;
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const REDACTED_PLACEHOLDER: &str = "[redacted]";

/// Applies `mode` to every string leaf of `value`, leaving structure and
/// non-string scalars untouched.
///
/// - [`PiiMode::Off`] returns `value` unchanged.
/// - [`PiiMode::Redact`] replaces every string leaf with a fixed placeholder.
/// - [`PiiMode::Tokenize`] replaces every string leaf with a salted,
///   deterministic token, so the same input always tokenizes identically.
#[must_use]
pub fn redact_value(mode: PiiMode, token_salt: Option<&str>, value: &Value) -> Value {
    match mode {
        PiiMode::Off => value.clone(),
        PiiMode::Redact => redact_leaves(value),
        PiiMode::Tokenize => tokenize_leaves(value, token_salt.unwrap_or("")),
    }
}

fn redact_leaves(value: &Value) -> Value {
    match value {
        Value::String(_) => Value::String(REDACTED_PLACEHOLDER.to_string()),
        Value::Array(items) => Value::Array(items.iter().map(redact_leaves).collect()),
        Value::Object(map) => {
            Value::Object(map.iter().map(|(key, val)| (key.clone(), redact_leaves(val))).collect())
        }
        other => other.clone(),
    }
}

fn tokenize_leaves(value: &Value, salt: &str) -> Value {
    match value {
        Value::String(text) => Value::String(tokenize_string(text, salt)),
        Value::Array(items) => Value::Array(items.iter().map(|item| tokenize_leaves(item, salt)).collect()),
        Value::Object(map) => {
            Value::Object(map.iter().map(|(key, val)| (key.clone(), tokenize_leaves(val, salt))).collect())
        }
        other => other.clone(),
    }
}

fn tokenize_string(value: &str, salt: &str) -> String {
    let digest = match HmacSha256::new_from_slice(salt.as_bytes()) {
        Ok(mut mac) => {
            mac.update(value.as_bytes());
            HashDigest::new(HashAlgorithm::Sha256, &mac.finalize().into_bytes())
        }
        Err(_) => HashDigest::new(HashAlgorithm::Sha256, value.as_bytes()),
    };
    format!("tok_{}", digest.value)
}

#[cfg(test)]
mod tests {
    use super::redact_value;
    use agentgate_config::PiiMode;
    use serde_json::json;

    #[test]
    fn off_mode_leaves_payload_untouched() {
        let payload = json!({"query": "alice@example.com"});
        assert_eq!(redact_value(PiiMode::Off, None, &payload), payload);
    }

    #[test]
    fn redact_mode_replaces_every_string_leaf() {
        let payload = json!({"query": "alice@example.com", "nested": {"note": "secret"}, "count": 3});
        let redacted = redact_value(PiiMode::Redact, None, &payload);
        assert_eq!(redacted["query"], "[redacted]");
        assert_eq!(redacted["nested"]["note"], "[redacted]");
        assert_eq!(redacted["count"], 3);
    }

    #[test]
    fn tokenize_mode_is_deterministic_for_the_same_salt() {
        let payload = json!({"query": "alice@example.com"});
        let first = redact_value(PiiMode::Tokenize, Some("pepper"), &payload);
        let second = redact_value(PiiMode::Tokenize, Some("pepper"), &payload);
        assert_eq!(first, second);
        assert_ne!(first["query"], payload["query"]);
        assert!(first["query"].as_str().expect("string").starts_with("tok_"));
    }

    #[test]
    fn tokenize_mode_differs_across_salts() {
        let payload = json!("alice@example.com");
        let first = redact_value(PiiMode::Tokenize, Some("pepper-a"), &payload);
        let second = redact_value(PiiMode::Tokenize, Some("pepper-b"), &payload);
        assert_ne!(first, second);
    }
}
