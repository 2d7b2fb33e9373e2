//! Summary of a pod's validators against a beacon state.

use crate::beacon_state::VersionedBeaconState;
use crate::fork::slot_timestamp;
use crate::leaf::pubkey_hash;
use crate::orchestrator::{pod_validator_infos, upstream, ProverError, ValidatorInfoCache};
use crate::selector::{classify, ValidatorBucket};
use crate::sources::{
    BeaconHeaderSource, BeaconStateSource, BlockId, Checkpoint, GenesisSource,
    OnchainValidatorInfoProvider, PodCheckpointSource, StateId, ValidatorInfo, ValidatorStatus,
};
use crate::types::{Address, Gwei, Root, ValidatorIndex};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorRecord {
    pub index: ValidatorIndex,
    #[serde(with = "crate::types::hex_bytes32")]
    pub pubkey_hash: Root,
    pub status: ValidatorStatus,
    pub bucket: ValidatorBucket,
    pub slashed: bool,
    pub withdrawal_prefix: u8,
    pub effective_balance_gwei: Gwei,
    pub current_balance_gwei: Gwei,
    pub restaked_balance_gwei: Gwei,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodStatus {
    /// Slot of the state the status was computed from
    pub slot: u64,
    pub validators: Vec<ValidatorRecord>,
    pub counts: BTreeMap<ValidatorBucket, usize>,
    /// Sum of beacon balances of validators the pod considers active
    pub active_beacon_balance_gwei: Gwei,
    /// Sum of restaked balances the pod has recorded for those validators
    pub active_restaked_balance_gwei: Gwei,
    pub checkpoint: Option<Checkpoint>,
    pub checkpoint_slot: Option<u64>,
}

impl PodStatus {
    /// Classify `infos` against `state`.
    ///
    /// `checkpoint` is the pod's checkpoint, kept only if active.
    #[must_use]
    pub fn build(
        state: &VersionedBeaconState,
        infos: &[(ValidatorIndex, ValidatorInfo)],
        checkpoint: Checkpoint,
    ) -> Self {
        let checkpoint = checkpoint.is_active().then_some(checkpoint);
        let checkpoint_timestamp = checkpoint.map_or(0, |c| c.timestamp);
        let validators = state.validators();

        let records: Vec<ValidatorRecord> = infos
            .iter()
            .filter_map(|(index, info)| {
                let validator = validators.get(*index as usize)?;
                Some(ValidatorRecord {
                    index: *index,
                    pubkey_hash: pubkey_hash(&validator.pubkey_bytes()),
                    status: info.status,
                    bucket: classify(validator, info, checkpoint_timestamp),
                    slashed: validator.slashed,
                    withdrawal_prefix: validator.withdrawal_credentials[0],
                    effective_balance_gwei: validator.effective_balance,
                    current_balance_gwei: state.balance(*index).unwrap_or_default(),
                    restaked_balance_gwei: info.restaked_balance_gwei,
                })
            })
            .collect();

        let mut counts = BTreeMap::new();
        for record in &records {
            *counts.entry(record.bucket).or_insert(0) += 1;
        }

        let active = records
            .iter()
            .filter(|record| record.status == ValidatorStatus::Active);
        let (active_beacon_balance_gwei, active_restaked_balance_gwei) = active.fold(
            (0u64, 0u64),
            |(beacon, restaked), record| {
                (
                    beacon.saturating_add(record.current_balance_gwei),
                    restaked.saturating_add(record.restaked_balance_gwei),
                )
            },
        );

        Self {
            slot: state.slot(),
            validators: records,
            counts,
            active_beacon_balance_gwei,
            active_restaked_balance_gwei,
            checkpoint,
            checkpoint_slot: None,
        }
    }

    #[must_use]
    pub fn count(&self, bucket: ValidatorBucket) -> usize {
        self.counts.get(&bucket).copied().unwrap_or_default()
    }

    /// Change in beacon balance since the pod last recorded it.
    #[must_use]
    pub fn beacon_balance_delta_gwei(&self) -> i128 {
        i128::from(self.active_beacon_balance_gwei) - i128::from(self.active_restaked_balance_gwei)
    }
}

/// Slot whose timestamp is `timestamp`, if it is on a slot boundary after genesis.
#[must_use]
pub fn timestamp_slot(genesis_time: u64, timestamp: u64) -> Option<u64> {
    let elapsed = timestamp.checked_sub(genesis_time)?;
    let slot = elapsed / crate::constants::SECONDS_PER_SLOT;
    (slot_timestamp(genesis_time, slot) == timestamp).then_some(slot)
}

/// Status of `pod` at its active checkpoint's block, or at head if none is
/// active.
///
/// # Errors
/// Any upstream failure.
#[instrument(skip_all, fields(pod = %crate::types::to_hex(pod)))]
pub async fn fetch_pod_status(
    headers: &dyn BeaconHeaderSource,
    states: &dyn BeaconStateSource,
    validator_info: &dyn OnchainValidatorInfoProvider,
    checkpoints: &dyn PodCheckpointSource,
    genesis: &dyn GenesisSource,
    pod: &Address,
) -> Result<PodStatus, ProverError> {
    let checkpoint = checkpoints
        .current_checkpoint()
        .await
        .map_err(upstream("reading current checkpoint"))?;

    let state = if checkpoint.is_active() {
        let header = headers
            .get_header(BlockId::Root(checkpoint.beacon_block_root))
            .await
            .map_err(upstream("fetching checkpoint header"))?;
        states
            .get_state(StateId::Slot(header.slot))
            .await
            .map_err(upstream("fetching checkpoint state"))?
    } else {
        states
            .get_state(StateId::Head)
            .await
            .map_err(upstream("fetching head state"))?
    };

    let cache = ValidatorInfoCache::new();
    let infos = pod_validator_infos(&state, pod, validator_info, &cache).await?;
    let mut status = PodStatus::build(&state, &infos, checkpoint);

    if let Some(checkpoint) = status.checkpoint {
        let genesis_time = genesis
            .genesis_time()
            .await
            .map_err(upstream("reading genesis time"))?;
        status.checkpoint_slot = timestamp_slot(genesis_time, checkpoint.timestamp);
    }

    info!(
        slot = status.slot,
        validators = status.validators.len(),
        checkpoint_eligible = status.count(ValidatorBucket::CheckpointEligible),
        "Computed pod status"
    );
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_roots::tests::sample_deneb_state;

    fn info(index: u64, status: ValidatorStatus, last: u64) -> (ValidatorIndex, ValidatorInfo) {
        (
            index,
            ValidatorInfo {
                validator_index: index,
                restaked_balance_gwei: 32_000_000_000,
                last_checkpointed_at: last,
                status,
            },
        )
    }

    #[test]
    fn test_status_counts_and_sums() {
        let mut state = sample_deneb_state(4);
        state.validators[3].activation_epoch = u64::MAX;
        let state = VersionedBeaconState::from(state);

        let infos = vec![
            info(0, ValidatorStatus::Active, 0),
            info(1, ValidatorStatus::Active, 1_700_000_000),
            info(2, ValidatorStatus::Inactive, 0),
            info(3, ValidatorStatus::Inactive, 0),
        ];
        let checkpoint = Checkpoint {
            timestamp: 1_700_000_000,
            beacon_block_root: [9; 32],
            proofs_remaining: 1,
            ..Default::default()
        };
        let status = PodStatus::build(&state, &infos, checkpoint);

        assert_eq!(status.count(ValidatorBucket::CheckpointEligible), 1);
        assert_eq!(status.count(ValidatorBucket::CheckpointedAlready), 1);
        assert_eq!(status.count(ValidatorBucket::AwaitingCredentialProof), 1);
        assert_eq!(status.count(ValidatorBucket::AwaitingActivation), 1);
        // Balances are 32e9 + index in the fixture.
        assert_eq!(status.active_beacon_balance_gwei, 64_000_000_001);
        assert_eq!(status.beacon_balance_delta_gwei(), 1);
        assert_eq!(status.checkpoint, Some(checkpoint));
    }

    #[test]
    fn test_inactive_checkpoint_is_dropped() {
        let state = VersionedBeaconState::from(sample_deneb_state(1));
        let status = PodStatus::build(&state, &[info(0, ValidatorStatus::Active, 5)], Checkpoint::default());
        assert!(status.checkpoint.is_none());
        assert_eq!(status.count(ValidatorBucket::CheckpointEligible), 1);
    }

    #[test]
    fn test_timestamp_slot() {
        assert_eq!(timestamp_slot(1_606_824_023, 1_606_824_023 + 120), Some(10));
        assert_eq!(timestamp_slot(1_606_824_023, 1_606_824_023 + 121), None);
        assert_eq!(timestamp_slot(1_606_824_023, 5), None);
    }
}
