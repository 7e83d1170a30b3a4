// crates/agentgate-store-common/src/digest.rs
// ============================================================================
// Module: Hash Digest Column Encoding
// Description: Shared `"<algorithm>:<hex>"` text encoding for `HashDigest`
//              columns (trace event integrity hashes, bundle hashes, Merkle
//              roots, archive and checkpoint keys).
// Purpose: Give both backends one answer for how a `HashDigest` round-trips
//          through a single TEXT column.
// Dependencies: agentgate-core
// ============================================================================

//! Single-column text encoding for [`HashDigest`], shared by every Trace
//! Store backend so a digest written by one backend parses identically on
//! the other.

use agentgate_core::HashAlgorithm;
use agentgate_core::HashDigest;

use crate::NormalizeError;

/// Encodes a digest as `"<algorithm>:<hex>"` for storage in a single TEXT column.
#[must_use]
pub fn hash_digest_to_sql(digest: &HashDigest) -> String {
    format!("{}:{}", algorithm_label(digest.algorithm), digest.value)
}

/// Decodes a digest previously encoded by [`hash_digest_to_sql`].
///
/// # Errors
///
/// Returns [`NormalizeError::Malformed`] when `raw` does not contain the
/// `<algorithm>:<hex>` separator or names an unrecognized algorithm.
pub fn hash_digest_from_sql(raw: &str) -> Result<HashDigest, NormalizeError> {
    let (algorithm, value) = raw
        .split_once(':')
        .ok_or_else(|| NormalizeError::Malformed(format!("malformed hash digest column value: {raw}")))?;
    let algorithm = parse_algorithm(algorithm)?;
    Ok(HashDigest { algorithm, value: value.to_string() })
}

const fn algorithm_label(algorithm: HashAlgorithm) -> &'static str {
    match algorithm {
        HashAlgorithm::Sha256 => "sha256",
    }
}

fn parse_algorithm(label: &str) -> Result<HashAlgorithm, NormalizeError> {
    match label {
        "sha256" => Ok(HashAlgorithm::Sha256),
        other => Err(NormalizeError::Malformed(format!("unrecognized hash algorithm: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::hash_digest_from_sql;
    use super::hash_digest_to_sql;
    use agentgate_core::HashAlgorithm;
    use agentgate_core::HashDigest;

    #[test]
    fn digest_round_trips_through_its_sql_encoding() {
        let digest = HashDigest::new(HashAlgorithm::Sha256, b"payload");
        let encoded = hash_digest_to_sql(&digest);
        assert_eq!(hash_digest_from_sql(&encoded).expect("decode"), digest);
    }

    #[test]
    fn decode_rejects_missing_separator_and_unknown_algorithm() {
        assert!(hash_digest_from_sql("nocolon").is_err());
        assert!(hash_digest_from_sql("md5:deadbeef").is_err());
    }
}
