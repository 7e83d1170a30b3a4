// crates/agentgate-store-common/src/ids.rs
// ============================================================================
// Module: Identifier Column Encoding
// Description: Shared decimal-string / integer encodings for identifiers
//              stored as SQL columns.
// Purpose: Give both backends one answer for how a `TenantId` or `EventId`
//          round-trips through a column, so schema and query text can stay
//          simple text/integer columns without backend-specific identifier
//          formats.
// Dependencies: agentgate-core
// ============================================================================

//! Decimal-string and integer column encodings for [`TenantId`] and
//! [`EventId`], shared by every Trace Store backend.

use agentgate_core::EventId;
use agentgate_core::TenantId;

/// Errors raised decoding an identifier column value read back from a store.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    /// The column value could not be parsed as the expected identifier shape.
    #[error("malformed identifier column: {0}")]
    Malformed(String),
}

/// Encodes a tenant identifier as the decimal string stored in a `tenant_id` column.
#[must_use]
pub fn tenant_id_to_sql(tenant_id: TenantId) -> String {
    tenant_id.get().to_string()
}

/// Decodes a tenant identifier from a `tenant_id` column value.
///
/// # Errors
///
/// Returns [`NormalizeError::Malformed`] when `raw` is not a non-zero decimal integer.
pub fn tenant_id_from_sql(raw: &str) -> Result<TenantId, NormalizeError> {
    let value: u64 = raw
        .parse()
        .map_err(|_| NormalizeError::Malformed(format!("invalid tenant_id column value: {raw}")))?;
    TenantId::from_raw(value)
        .ok_or_else(|| NormalizeError::Malformed(format!("tenant_id column value must be non-zero: {raw}")))
}

/// Encodes an event identifier as the signed integer stored in an `event_id` column.
#[must_use]
pub fn event_id_to_sql(event_id: EventId) -> i64 {
    i64::try_from(event_id.get()).unwrap_or(i64::MAX)
}

/// Decodes an event identifier from an `event_id` column value.
///
/// # Errors
///
/// Returns [`NormalizeError::Malformed`] when `raw` is not a positive integer.
pub fn event_id_from_sql(raw: i64) -> Result<EventId, NormalizeError> {
    let value = u64::try_from(raw)
        .map_err(|_| NormalizeError::Malformed(format!("negative event_id column value: {raw}")))?;
    EventId::from_raw(value)
        .ok_or_else(|| NormalizeError::Malformed(format!("event_id column value must be non-zero: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::event_id_from_sql;
    use super::event_id_to_sql;
    use super::tenant_id_from_sql;
    use super::tenant_id_to_sql;
    use agentgate_core::EventId;
    use agentgate_core::TenantId;
    use std::num::NonZeroU64;

    #[test]
    fn tenant_id_round_trips_through_its_sql_encoding() {
        let tenant_id = TenantId::new(NonZeroU64::new(42).expect("non-zero"));
        let encoded = tenant_id_to_sql(tenant_id);
        assert_eq!(tenant_id_from_sql(&encoded).expect("decode"), tenant_id);
    }

    #[test]
    fn tenant_id_decode_rejects_zero_and_garbage() {
        assert!(tenant_id_from_sql("0").is_err());
        assert!(tenant_id_from_sql("not-a-number").is_err());
    }

    #[test]
    fn event_id_round_trips_through_its_sql_encoding() {
        let event_id = EventId::from_raw(7).expect("non-zero");
        let encoded = event_id_to_sql(event_id);
        assert_eq!(event_id_from_sql(encoded).expect("decode"), event_id);
    }

    #[test]
    fn event_id_decode_rejects_non_positive_values() {
        assert!(event_id_from_sql(0).is_err());
        assert!(event_id_from_sql(-1).is_err());
    }
}
