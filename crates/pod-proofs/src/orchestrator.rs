//! Fetch, select, prove.
//!
//! Each orchestrator performs its network reads sequentially, then hands the
//! state to a blocking task where proofs are built in parallel.

use crate::beacon_state::{BeaconBlockHeader, VersionedBeaconBlock, VersionedBeaconState};
use crate::fork::Network;
use crate::leaf::pubkey_hash;
use crate::proof::{
    ProofError, VerifyAndProcessWithdrawalCallParams, VerifyCheckpointProofsCallParams,
    VerifyStaleBalanceCallParams, VerifyWithdrawalCredentialsCallParams,
};
use crate::selector::{select_pod_validators, Selection, ValidatorBucket};
use crate::sources::{
    BeaconBlockSource, BeaconHeaderSource, BeaconStateSource, BlockId, Checkpoint,
    OnchainValidatorInfoProvider, OracleAnchor, PodCheckpointSource, StateId, ValidatorInfo,
};
use crate::state_prover::StateProver;
use crate::types::{to_hex, Address, Root, ValidatorIndex};
use crate::withdrawal::{prove_withdrawals, WithdrawalTarget};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Debug, Error)]
pub enum ProverError {
    #[error("{context}")]
    UpstreamUnavailable {
        context: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("no checkpoint active")]
    NoActiveCheckpoint,

    #[error("validator {0} is not slashed")]
    NotSlashed(ValidatorIndex),

    #[error(transparent)]
    Proof(#[from] ProofError),

    #[error("proof task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub(crate) fn upstream(context: impl Into<String>) -> impl FnOnce(anyhow::Error) -> ProverError {
    let context = context.into();
    move |source| ProverError::UpstreamUnavailable {
        context,
        source: source.into(),
    }
}

async fn run_blocking<T, F>(job: F) -> Result<T, ProverError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ProofError> + Send + 'static,
{
    Ok(tokio::task::spawn_blocking(job).await??)
}

/// On-chain validator records memoized for one run.
///
/// Create one per invocation; nothing is ever evicted.
#[derive(Debug, Default)]
pub struct ValidatorInfoCache {
    entries: DashMap<Root, ValidatorInfo>,
}

impl ValidatorInfoCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records for `pubkey_hashes`, in input order. Only hashes not seen
    /// before are sent to `provider`, in a single batch.
    ///
    /// # Errors
    /// Fails if the provider fails or returns the wrong number of records.
    pub async fn lookup(
        &self,
        provider: &dyn OnchainValidatorInfoProvider,
        pubkey_hashes: &[Root],
    ) -> Result<Vec<ValidatorInfo>, ProverError> {
        let mut missing: Vec<Root> = pubkey_hashes
            .iter()
            .filter(|hash| !self.entries.contains_key(*hash))
            .copied()
            .collect();
        missing.sort_unstable();
        missing.dedup();

        if !missing.is_empty() {
            debug!(requested = missing.len(), cached = self.entries.len(), "Looking up validator info");
            let infos = provider
                .batch_lookup(&missing)
                .await
                .map_err(upstream("validator info lookup"))?;
            if infos.len() != missing.len() {
                return Err(upstream("validator info lookup")(anyhow::anyhow!(
                    "expected {} records, got {}",
                    missing.len(),
                    infos.len()
                )));
            }
            for (hash, info) in missing.into_iter().zip(infos) {
                self.entries.insert(hash, info);
            }
        }

        pubkey_hashes
            .iter()
            .map(|hash| {
                self.entries.get(hash).map(|entry| *entry).ok_or_else(|| {
                    upstream("validator info lookup")(anyhow::anyhow!("no record for {}", to_hex(hash)))
                })
            })
            .collect()
    }
}

/// Every validator of `pod` in `state` with its on-chain record.
///
/// # Errors
/// Fails if the on-chain lookup fails.
pub async fn pod_validator_infos(
    state: &VersionedBeaconState,
    pod: &Address,
    provider: &dyn OnchainValidatorInfoProvider,
    cache: &ValidatorInfoCache,
) -> Result<Vec<(ValidatorIndex, ValidatorInfo)>, ProverError> {
    let indices = select_pod_validators(state, pod);
    let validators = state.validators();
    let hashes: Vec<Root> = indices
        .iter()
        .map(|&index| pubkey_hash(&validators[index as usize].pubkey_bytes()))
        .collect();
    let infos = cache.lookup(provider, &hashes).await?;
    Ok(indices.into_iter().zip(infos).collect())
}

async fn fetch_header_and_state(
    headers: &dyn BeaconHeaderSource,
    states: &dyn BeaconStateSource,
    block: BlockId,
) -> Result<(BeaconBlockHeader, VersionedBeaconState), ProverError> {
    let header = headers
        .get_header(block)
        .await
        .map_err(upstream(format!("fetching header {block}")))?;
    let state = states
        .get_state(StateId::Slot(header.slot))
        .await
        .map_err(upstream(format!("fetching state at slot {}", header.slot)))?;
    Ok((header, state))
}

/// Checkpoint proofs together with the checkpoint they answer.
#[derive(Debug, Clone)]
pub struct CheckpointProofs {
    pub checkpoint: Checkpoint,
    pub slot: u64,
    pub params: VerifyCheckpointProofsCallParams,
}

/// Proves the balances of every checkpoint-eligible pod validator against
/// the anchor block of the pod's active checkpoint.
pub struct CheckpointProofOrchestrator<'a> {
    headers: &'a dyn BeaconHeaderSource,
    states: &'a dyn BeaconStateSource,
    validator_info: &'a dyn OnchainValidatorInfoProvider,
    checkpoints: &'a dyn PodCheckpointSource,
    pod: Address,
    cache: ValidatorInfoCache,
}

impl<'a> CheckpointProofOrchestrator<'a> {
    pub fn new(
        headers: &'a dyn BeaconHeaderSource,
        states: &'a dyn BeaconStateSource,
        validator_info: &'a dyn OnchainValidatorInfoProvider,
        checkpoints: &'a dyn PodCheckpointSource,
        pod: Address,
    ) -> Self {
        Self {
            headers,
            states,
            validator_info,
            checkpoints,
            pod,
            cache: ValidatorInfoCache::new(),
        }
    }

    /// # Errors
    /// [`ProverError::NoActiveCheckpoint`] if the pod has no checkpoint in
    /// progress; otherwise any upstream or proof failure.
    #[instrument(skip(self), fields(pod = %to_hex(&self.pod)))]
    pub async fn prove(&self) -> Result<CheckpointProofs, ProverError> {
        let checkpoint = self
            .checkpoints
            .current_checkpoint()
            .await
            .map_err(upstream("reading current checkpoint"))?;
        if !checkpoint.is_active() {
            return Err(ProverError::NoActiveCheckpoint);
        }

        let (header, state) = fetch_header_and_state(
            self.headers,
            self.states,
            BlockId::Root(checkpoint.beacon_block_root),
        )
        .await?;

        let infos = pod_validator_infos(&state, &self.pod, self.validator_info, &self.cache).await?;
        let selection = Selection::build(&state, &infos, checkpoint.timestamp);
        let eligible = selection.get(ValidatorBucket::CheckpointEligible).to_vec();

        info!(
            slot = header.slot,
            checkpoint_timestamp = checkpoint.timestamp,
            proofs_remaining = checkpoint.proofs_remaining,
            pod_validators = infos.len(),
            eligible = eligible.len(),
            "Proving checkpoint"
        );

        let slot = header.slot;
        let state = Arc::new(state);
        let params = run_blocking(move || {
            StateProver::new(state)?.prove_checkpoint_proofs(&header, &eligible)
        })
        .await?;

        Ok(CheckpointProofs {
            checkpoint,
            slot,
            params,
        })
    }
}

/// Credential proofs together with the oracle anchor they were built for.
#[derive(Debug, Clone)]
pub struct CredentialProofs {
    pub anchor: OracleAnchor,
    pub slot: u64,
    pub params: VerifyWithdrawalCredentialsCallParams,
}

/// Proves withdrawal credentials of pod validators against the block whose
/// root the EIP-4788 oracle returns for the anchor timestamp.
pub struct CredentialProofOrchestrator<'a> {
    headers: &'a dyn BeaconHeaderSource,
    states: &'a dyn BeaconStateSource,
    validator_info: &'a dyn OnchainValidatorInfoProvider,
    checkpoints: &'a dyn PodCheckpointSource,
    pod: Address,
    cache: ValidatorInfoCache,
}

impl<'a> CredentialProofOrchestrator<'a> {
    pub fn new(
        headers: &'a dyn BeaconHeaderSource,
        states: &'a dyn BeaconStateSource,
        validator_info: &'a dyn OnchainValidatorInfoProvider,
        checkpoints: &'a dyn PodCheckpointSource,
        pod: Address,
    ) -> Self {
        Self {
            headers,
            states,
            validator_info,
            checkpoints,
            pod,
            cache: ValidatorInfoCache::new(),
        }
    }

    /// Prove `only` if given, else every validator awaiting a credential proof.
    ///
    /// # Errors
    /// Any upstream or proof failure.
    #[instrument(skip(self), fields(pod = %to_hex(&self.pod)))]
    pub async fn prove(&self, only: Option<ValidatorIndex>) -> Result<CredentialProofs, ProverError> {
        let anchor = self
            .checkpoints
            .oracle_anchor()
            .await
            .map_err(upstream("reading oracle anchor"))?;

        let (header, state) =
            fetch_header_and_state(self.headers, self.states, BlockId::Root(anchor.parent_block_root))
                .await?;

        let indices = if let Some(index) = only {
            vec![index]
        } else {
            let infos =
                pod_validator_infos(&state, &self.pod, self.validator_info, &self.cache).await?;
            Selection::build(&state, &infos, 0)
                .get(ValidatorBucket::AwaitingCredentialProof)
                .to_vec()
        };

        info!(
            slot = header.slot,
            beacon_timestamp = anchor.timestamp,
            validators = indices.len(),
            "Proving withdrawal credentials"
        );

        let slot = header.slot;
        let beacon_timestamp = anchor.timestamp;
        let state = Arc::new(state);
        let params = run_blocking(move || {
            StateProver::new(state)?.prove_validator_containers(&header, &indices, beacon_timestamp)
        })
        .await?;

        Ok(CredentialProofs {
            anchor,
            slot,
            params,
        })
    }
}

/// Stale balance proof together with the oracle anchor it was built for.
#[derive(Debug, Clone)]
pub struct StaleBalanceProofs {
    pub anchor: OracleAnchor,
    pub slot: u64,
    pub params: VerifyStaleBalanceCallParams,
}

impl CredentialProofOrchestrator<'_> {
    /// Prove that `validator_index` has been slashed, so the pod can be
    /// forced into a checkpoint.
    ///
    /// # Errors
    /// [`ProverError::NotSlashed`] if the validator is not slashed at the
    /// anchor block; otherwise any upstream or proof failure.
    #[instrument(skip(self), fields(pod = %to_hex(&self.pod)))]
    pub async fn prove_stale_balance(
        &self,
        validator_index: ValidatorIndex,
    ) -> Result<StaleBalanceProofs, ProverError> {
        let anchor = self
            .checkpoints
            .oracle_anchor()
            .await
            .map_err(upstream("reading oracle anchor"))?;

        let (header, state) =
            fetch_header_and_state(self.headers, self.states, BlockId::Root(anchor.parent_block_root))
                .await?;

        let validator = usize::try_from(validator_index)
            .ok()
            .and_then(|i| state.validators().get(i))
            .ok_or(ProofError::IndexOutOfRange {
                what: "validator",
                index: validator_index,
                len: state.validators().len() as u64,
            })?;
        if !validator.slashed {
            return Err(ProverError::NotSlashed(validator_index));
        }

        info!(
            slot = header.slot,
            beacon_timestamp = anchor.timestamp,
            validator_index,
            "Proving stale balance"
        );

        let slot = header.slot;
        let beacon_timestamp = anchor.timestamp;
        let state = Arc::new(state);
        let params = run_blocking(move || {
            StateProver::new(state)?.prove_stale_balance(&header, validator_index, beacon_timestamp)
        })
        .await?;

        Ok(StaleBalanceProofs {
            anchor,
            slot,
            params,
        })
    }
}

/// A withdrawal to prove: the validator and the slot of the block that paid it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawalRequest {
    pub validator_index: ValidatorIndex,
    pub slot: u64,
}

/// Proves historical withdrawals against a recent oracle block.
pub struct WithdrawalProofOrchestrator<'a> {
    headers: &'a dyn BeaconHeaderSource,
    states: &'a dyn BeaconStateSource,
    blocks: &'a dyn BeaconBlockSource,
    network: Network,
}

impl<'a> WithdrawalProofOrchestrator<'a> {
    pub fn new(
        headers: &'a dyn BeaconHeaderSource,
        states: &'a dyn BeaconStateSource,
        blocks: &'a dyn BeaconBlockSource,
        network: Network,
    ) -> Self {
        Self {
            headers,
            states,
            blocks,
            network,
        }
    }

    /// # Errors
    /// Any upstream or proof failure, including withdrawals too recent to
    /// be archived in the oracle state.
    #[instrument(skip(self, requests), fields(requests = requests.len()))]
    pub async fn prove(
        &self,
        oracle: BlockId,
        requests: &[WithdrawalRequest],
    ) -> Result<VerifyAndProcessWithdrawalCallParams, ProverError> {
        let (oracle_header, oracle_state) =
            fetch_header_and_state(self.headers, self.states, oracle).await?;

        let mut blocks: Vec<VersionedBeaconBlock> = Vec::with_capacity(requests.len());
        let mut archived: HashMap<u64, Vec<Root>> = HashMap::new();
        let mut archive_slots = Vec::with_capacity(requests.len());
        for request in requests {
            let block = self
                .blocks
                .get_block(BlockId::Slot(request.slot))
                .await
                .map_err(upstream(format!("fetching block at slot {}", request.slot)))?;
            blocks.push(block);

            let archive_slot = self.network.historical_summary_state_slot(request.slot)?;
            if !archived.contains_key(&archive_slot) {
                let state = self
                    .states
                    .get_state(StateId::Slot(archive_slot))
                    .await
                    .map_err(upstream(format!("fetching archived state at slot {archive_slot}")))?;
                archived.insert(archive_slot, state.block_roots().to_vec());
            }
            archive_slots.push(archive_slot);
        }

        info!(
            oracle_slot = oracle_header.slot,
            withdrawals = requests.len(),
            archived_periods = archived.len(),
            "Proving withdrawals"
        );

        let network = self.network;
        let requests = requests.to_vec();
        let oracle_state = Arc::new(oracle_state);
        run_blocking(move || {
            let prover = StateProver::new(oracle_state)?;
            let targets: Vec<WithdrawalTarget<'_>> = requests
                .iter()
                .zip(&blocks)
                .zip(&archive_slots)
                .map(|((request, block), archive_slot)| WithdrawalTarget {
                    block,
                    historical_block_roots: archived
                        .get(archive_slot)
                        .map_or(&[][..], Vec::as_slice),
                    validator_index: request.validator_index,
                })
                .collect();
            prove_withdrawals(&prover, &oracle_header, network, &targets)
        })
        .await
    }
}
