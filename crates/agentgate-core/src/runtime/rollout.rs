// crates/agentgate-core/src/runtime/rollout.rs
// ============================================================================
// Module: Rollout Controller
// Description: Stage-gated promotion of a candidate tenant policy package.
// Purpose: Drive queued -> canary -> promoting -> completed under SLO
//          observation, with automatic rollback on drift or error budget
//          exhaustion.
// Dependencies: crate::{identifiers, interfaces, model, time}
// ============================================================================

//! ## Overview
//! `StartRollout` is idempotent: an identical `(tenant, candidate_version)`
//! request returns the existing rollout. The controller never
//! calls back into the gateway or policy engine directly; it only persists
//! rollout state and leaves application of the promoted package to whatever
//! component reads the tenant's active `PolicyVersion` from the trace store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::identifiers::PolicyVersion;
use crate::identifiers::RolloutId;
use crate::identifiers::TenantId;
use crate::model::PolicyPackage;
use crate::model::Rollout;
use crate::model::RolloutState;
use crate::model::RolloutVerdict;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while starting or advancing a rollout.
#[derive(Debug, Error)]
pub enum RolloutControllerError {
    /// The candidate package's signature or bundle hash failed verification.
    #[error("candidate package failed verification: {0}")]
    PackageInvalid(String),
    /// The rollout is already in a terminal state and cannot be advanced.
    #[error("rollout {0} is already terminal")]
    AlreadyTerminal(RolloutId),
}

// ============================================================================
// SECTION: Rollout Controller
// ============================================================================

/// Stage-gated promotion controller. Holds no collaborator handles: callers
/// persist the returned [`Rollout`] through the trace store themselves,
/// matching the coordinator's single-writer discipline without introducing a
/// second store dependency here.
#[derive(Debug, Default, Clone, Copy)]
pub struct RolloutController;

impl RolloutController {
    /// Starts a rollout for `(tenant_id, candidate.version)`, or returns
    /// `existing` unchanged if one was already supplied (idempotent start).
    ///
    /// # Errors
    ///
    /// Returns [`RolloutControllerError::PackageInvalid`] when `candidate`'s
    /// bundle hash does not match its declared digest.
    pub fn start(
        &self,
        tenant_id: TenantId,
        rollout_id: RolloutId,
        candidate: &PolicyPackage,
        previous_version: PolicyVersion,
        canary_fraction_bp: u16,
        existing: Option<Rollout>,
        now: Timestamp,
    ) -> Result<Rollout, RolloutControllerError> {
        if let Some(existing) = existing {
            return Ok(existing);
        }
        let verified = candidate
            .verify_bundle_hash()
            .map_err(|err| RolloutControllerError::PackageInvalid(err.to_string()))?;
        if !verified {
            return Err(RolloutControllerError::PackageInvalid(
                "bundle_hash does not match candidate bundle".to_string(),
            ));
        }
        Ok(Rollout {
            rollout_id,
            tenant_id,
            target_version: candidate.version.clone(),
            previous_version,
            state: RolloutState::Queued,
            canary_fraction_bp,
            created_at: now,
            updated_at: now,
        })
    }

    /// Applies one SLO/drift verdict to an in-flight rollout, returning the
    /// updated rollout. On `Breach` the rollout transitions to
    /// `RolledBack` and the caller must restore `previous_version` as the
    /// tenant's active package atomically with persisting this state.
    ///
    /// # Errors
    ///
    /// Returns [`RolloutControllerError::AlreadyTerminal`] when `rollout` has
    /// already reached `Completed` or `RolledBack`.
    pub fn advance(
        &self,
        mut rollout: Rollout,
        verdict: RolloutVerdict,
        now: Timestamp,
    ) -> Result<Rollout, RolloutControllerError> {
        if rollout.state.is_terminal() {
            return Err(RolloutControllerError::AlreadyTerminal(rollout.rollout_id));
        }
        rollout.state = Rollout::apply_verdict(rollout.state, verdict);
        rollout.updated_at = now;
        Ok(rollout)
    }

    /// Forces an immediate rollback regardless of the current stage,
    /// matching the `/admin/.../rollback` operator endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`RolloutControllerError::AlreadyTerminal`] when `rollout` has
    /// already reached a terminal state.
    pub fn force_rollback(&self, mut rollout: Rollout, now: Timestamp) -> Result<Rollout, RolloutControllerError> {
        if rollout.state.is_terminal() {
            return Err(RolloutControllerError::AlreadyTerminal(rollout.rollout_id));
        }
        rollout.state = RolloutState::RolledBack;
        rollout.updated_at = now;
        Ok(rollout)
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use super::RolloutController;
    use crate::hashing::DEFAULT_HASH_ALGORITHM;
    use crate::hashing::hash_canonical_json;
    use crate::identifiers::PolicyVersion;
    use crate::identifiers::RolloutId;
    use crate::identifiers::TenantId;
    use crate::model::PolicyPackage;
    use crate::model::RolloutState;
    use crate::model::RolloutVerdict;
    use crate::time::Timestamp;

    fn package(version: &str) -> PolicyPackage {
        let bundle = serde_json::json!({"rules": []});
        let bundle_hash = hash_canonical_json(DEFAULT_HASH_ALGORITHM, &bundle).expect("hash");
        PolicyPackage {
            tenant_id: TenantId::new(NonZeroU64::new(1).expect("non-zero")),
            version: PolicyVersion::new(version),
            bundle_hash,
            signer: "key-1".to_string(),
            signature: "sig".to_string(),
            bundle,
        }
    }

    #[test]
    fn start_is_idempotent_given_an_existing_rollout() {
        let controller = RolloutController;
        let candidate = package("v2");
        let tenant = TenantId::new(NonZeroU64::new(1).expect("non-zero"));
        let first = controller
            .start(
                tenant,
                RolloutId::new("r1"),
                &candidate,
                PolicyVersion::new("v1"),
                500,
                None,
                Timestamp::from_unix_millis(0),
            )
            .expect("start");
        let second = controller
            .start(
                tenant,
                RolloutId::new("r1"),
                &candidate,
                PolicyVersion::new("v1"),
                500,
                Some(first.clone()),
                Timestamp::from_unix_millis(1_000),
            )
            .expect("start");
        assert_eq!(first, second);
    }

    #[test]
    fn breach_verdict_rolls_back_and_is_then_terminal() {
        let controller = RolloutController;
        let candidate = package("v2");
        let tenant = TenantId::new(NonZeroU64::new(1).expect("non-zero"));
        let rollout = controller
            .start(
                tenant,
                RolloutId::new("r1"),
                &candidate,
                PolicyVersion::new("v1"),
                500,
                None,
                Timestamp::from_unix_millis(0),
            )
            .expect("start");
        let rolled_back = controller
            .advance(rollout, RolloutVerdict::Breach, Timestamp::from_unix_millis(100))
            .expect("advance");
        assert_eq!(rolled_back.state, RolloutState::RolledBack);
        assert!(controller.advance(rolled_back, RolloutVerdict::Advance, Timestamp::from_unix_millis(200)).is_err());
    }
}
