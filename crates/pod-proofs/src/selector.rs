//! Picks the pod's validators out of a beacon state and sorts them into
//! exclusive buckets.

use crate::beacon_state::{Validator, VersionedBeaconState};
use crate::constants::FAR_FUTURE_EPOCH;
use crate::sources::{ValidatorInfo, ValidatorStatus};
use crate::types::{Address, ValidatorIndex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Where a pod validator stands relative to the EigenPod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorBucket {
    /// Not yet activated on the beacon chain
    AwaitingActivation,
    /// Activated, still unknown to the pod
    AwaitingCredentialProof,
    /// Active in the pod, not yet proven for the current checkpoint
    CheckpointEligible,
    /// Active in the pod, already proven for the current checkpoint
    CheckpointedAlready,
    Withdrawn,
    /// Exited before its credentials were ever proven
    ExitedUnproven,
}

impl ValidatorBucket {
    pub const ALL: [ValidatorBucket; 6] = [
        ValidatorBucket::AwaitingActivation,
        ValidatorBucket::AwaitingCredentialProof,
        ValidatorBucket::CheckpointEligible,
        ValidatorBucket::CheckpointedAlready,
        ValidatorBucket::Withdrawn,
        ValidatorBucket::ExitedUnproven,
    ];
}

impl fmt::Display for ValidatorBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValidatorBucket::AwaitingActivation => "awaiting_activation",
            ValidatorBucket::AwaitingCredentialProof => "awaiting_credential_proof",
            ValidatorBucket::CheckpointEligible => "checkpoint_eligible",
            ValidatorBucket::CheckpointedAlready => "checkpointed_already",
            ValidatorBucket::Withdrawn => "withdrawn",
            ValidatorBucket::ExitedUnproven => "exited_unproven",
        };
        f.write_str(name)
    }
}

/// Whether `validator` withdraws to `pod`: an 0x01 or 0x02 credential whose
/// last 20 bytes are the pod address.
#[must_use]
pub fn is_pod_validator(validator: &Validator, pod: &Address) -> bool {
    let credentials = &validator.withdrawal_credentials;
    matches!(credentials[0], 0x01 | 0x02) && credentials[12..] == pod[..]
}

/// Indices of every validator in `state` that belongs to `pod`, ascending.
#[must_use]
pub fn select_pod_validators(state: &VersionedBeaconState, pod: &Address) -> Vec<ValidatorIndex> {
    state
        .validators()
        .iter()
        .enumerate()
        .filter(|(_, validator)| is_pod_validator(validator, pod))
        .map(|(index, _)| index as ValidatorIndex)
        .collect()
}

/// Sort one pod validator into its bucket.
///
/// `checkpoint_timestamp` is the timestamp of the checkpoint in progress.
#[must_use]
pub fn classify(validator: &Validator, info: &ValidatorInfo, checkpoint_timestamp: u64) -> ValidatorBucket {
    if validator.activation_epoch == FAR_FUTURE_EPOCH {
        return ValidatorBucket::AwaitingActivation;
    }
    match info.status {
        ValidatorStatus::Inactive if validator.exit_epoch == FAR_FUTURE_EPOCH => {
            ValidatorBucket::AwaitingCredentialProof
        }
        ValidatorStatus::Inactive => ValidatorBucket::ExitedUnproven,
        ValidatorStatus::Active
            if info.last_checkpointed_at == 0 || info.last_checkpointed_at != checkpoint_timestamp =>
        {
            ValidatorBucket::CheckpointEligible
        }
        ValidatorStatus::Active => ValidatorBucket::CheckpointedAlready,
        ValidatorStatus::Withdrawn => ValidatorBucket::Withdrawn,
    }
}

/// Pod validators grouped by bucket. Each bucket keeps ascending index order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    buckets: BTreeMap<ValidatorBucket, Vec<ValidatorIndex>>,
}

impl Selection {
    /// Classify each `(index, info)` pair against the validators in `state`.
    ///
    /// Indices missing from the state are skipped.
    #[must_use]
    pub fn build(
        state: &VersionedBeaconState,
        infos: &[(ValidatorIndex, ValidatorInfo)],
        checkpoint_timestamp: u64,
    ) -> Self {
        let validators = state.validators();
        let mut selection = Self::default();
        for (index, info) in infos {
            let Some(validator) = validators.get(*index as usize) else {
                continue;
            };
            let bucket = classify(validator, info, checkpoint_timestamp);
            selection.buckets.entry(bucket).or_default().push(*index);
        }
        for indices in selection.buckets.values_mut() {
            indices.sort_unstable();
        }
        selection
    }

    #[must_use]
    pub fn get(&self, bucket: ValidatorBucket) -> &[ValidatorIndex] {
        self.buckets.get(&bucket).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn count(&self, bucket: ValidatorBucket) -> usize {
        self.get(bucket).len()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_roots::tests::{make_validator, sample_deneb_state};
    use proptest::prelude::*;

    const POD: Address = [0x42; 20];

    fn info(status: ValidatorStatus, last_checkpointed_at: u64) -> ValidatorInfo {
        ValidatorInfo {
            validator_index: 0,
            restaked_balance_gwei: 32_000_000_000,
            last_checkpointed_at,
            status,
        }
    }

    #[test]
    fn test_pod_membership_requires_prefix_and_address() {
        let mut validator = make_validator(1, POD);
        assert!(is_pod_validator(&validator, &POD));

        validator.withdrawal_credentials[0] = 0x02;
        assert!(is_pod_validator(&validator, &POD));

        validator.withdrawal_credentials[0] = 0x00;
        assert!(!is_pod_validator(&validator, &POD));

        let other = make_validator(2, [0x43; 20]);
        assert!(!is_pod_validator(&other, &POD));
    }

    #[test]
    fn test_select_pod_validators_in_index_order() {
        let mut state = sample_deneb_state(6);
        state.validators[2].withdrawal_credentials[12..].copy_from_slice(&[0x99; 20]);
        let state = VersionedBeaconState::from(state);
        assert_eq!(select_pod_validators(&state, &POD), vec![0, 1, 3, 4, 5]);
    }

    #[test]
    fn test_classification_order() {
        let mut pending = make_validator(0, POD);
        pending.activation_epoch = FAR_FUTURE_EPOCH;
        // Activation check wins even over an Active on-chain record.
        assert_eq!(
            classify(&pending, &info(ValidatorStatus::Active, 0), 10),
            ValidatorBucket::AwaitingActivation
        );

        let live = make_validator(1, POD);
        assert_eq!(
            classify(&live, &info(ValidatorStatus::Inactive, 0), 10),
            ValidatorBucket::AwaitingCredentialProof
        );
        assert_eq!(
            classify(&live, &info(ValidatorStatus::Active, 0), 10),
            ValidatorBucket::CheckpointEligible
        );
        assert_eq!(
            classify(&live, &info(ValidatorStatus::Active, 9), 10),
            ValidatorBucket::CheckpointEligible
        );
        assert_eq!(
            classify(&live, &info(ValidatorStatus::Active, 10), 10),
            ValidatorBucket::CheckpointedAlready
        );
        assert_eq!(
            classify(&live, &info(ValidatorStatus::Withdrawn, 10), 10),
            ValidatorBucket::Withdrawn
        );

        let mut exited = make_validator(2, POD);
        exited.exit_epoch = 300_000;
        assert_eq!(
            classify(&exited, &info(ValidatorStatus::Inactive, 0), 10),
            ValidatorBucket::ExitedUnproven
        );
    }

    fn validator_strategy() -> impl Strategy<Value = (bool, bool)> {
        (any::<bool>(), any::<bool>())
    }

    fn status_strategy() -> impl Strategy<Value = ValidatorStatus> {
        prop_oneof![
            Just(ValidatorStatus::Inactive),
            Just(ValidatorStatus::Active),
            Just(ValidatorStatus::Withdrawn),
        ]
    }

    proptest! {
        #[test]
        fn prop_every_pod_validator_lands_in_one_bucket(
            flags in prop::collection::vec((validator_strategy(), status_strategy(), 0u64..3), 1..24),
            checkpoint_timestamp in 0u64..3,
        ) {
            let mut state = sample_deneb_state(flags.len() as u8);
            let mut infos = Vec::new();
            for (i, ((pending, exited), status, last)) in flags.iter().enumerate() {
                if *pending {
                    state.validators[i].activation_epoch = FAR_FUTURE_EPOCH;
                }
                if *exited {
                    state.validators[i].exit_epoch = 250_000;
                }
                infos.push((i as ValidatorIndex, ValidatorInfo {
                    validator_index: i as ValidatorIndex,
                    restaked_balance_gwei: 0,
                    last_checkpointed_at: *last,
                    status: *status,
                }));
            }
            let state = VersionedBeaconState::from(state);

            let selection = Selection::build(&state, &infos, checkpoint_timestamp);
            prop_assert_eq!(selection.total(), infos.len());

            let mut seen: Vec<ValidatorIndex> = ValidatorBucket::ALL
                .iter()
                .flat_map(|bucket| selection.get(*bucket).iter().copied())
                .collect();
            seen.sort_unstable();
            let expected: Vec<ValidatorIndex> = (0..infos.len() as u64).collect();
            prop_assert_eq!(seen, expected);
        }
    }
}
