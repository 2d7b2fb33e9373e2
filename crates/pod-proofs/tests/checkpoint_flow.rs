//! End-to-end checkpoint and credential proving against an in-memory chain.

use async_trait::async_trait;
use pod_proofs::beacon_state::{BeaconBlockHeader, BeaconStateDeneb, Validator};
use pod_proofs::containers::header_field_roots;
use pod_proofs::merkle::{merkleize, verify};
use pod_proofs::{
    BeaconHeaderSource, BeaconStateSource, BlockId, Checkpoint, CheckpointProofOrchestrator,
    CredentialProofOrchestrator, GindexCalculator, OnchainValidatorInfoProvider, OracleAnchor,
    PodCall, PodCheckpointSource, ProverError, Root, StateId, TransactionSubmitter, TxHandle,
    ValidatorInfo, ValidatorStatus, VersionedBeaconState,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const POD: [u8; 20] = [0x42; 20];
const OTHER_POD: [u8; 20] = [0x24; 20];
const CHECKPOINT_TIMESTAMP: u64 = 1_718_000_000;
const FAR_FUTURE: u64 = u64::MAX;

fn validator(index: u8, pod: [u8; 20]) -> Validator {
    let mut validator = Validator {
        effective_balance: 32_000_000_000,
        activation_eligibility_epoch: 1,
        activation_epoch: 2,
        exit_epoch: FAR_FUTURE,
        withdrawable_epoch: FAR_FUTURE,
        ..Default::default()
    };
    validator.pubkey[0] = index;
    validator.pubkey[1] = 0x99;
    validator.withdrawal_credentials[0] = 0x01;
    validator.withdrawal_credentials[12..].copy_from_slice(&pod);
    validator
}

struct FakeChain {
    header: BeaconBlockHeader,
    block_root: Root,
    state: VersionedBeaconState,
    checkpoint: Checkpoint,
    infos: HashMap<Root, ValidatorInfo>,
    lookups: AtomicUsize,
    submitted: Mutex<Vec<PodCall>>,
}

impl FakeChain {
    /// Validators 0..=6. Validators 2 and 5 belong to another pod.
    ///
    /// Pod records: 0 active, 1 active and already checkpointed, 3 inactive
    /// (awaiting credentials), 4 active and slashed, 6 withdrawn.
    fn new(checkpoint_active: bool) -> Self {
        let mut state = BeaconStateDeneb {
            genesis_time: 1_606_824_023,
            slot: 9_400_000,
            ..Default::default()
        };
        for i in 0..7u8 {
            let pod = if i == 2 || i == 5 { OTHER_POD } else { POD };
            let mut validator = validator(i, pod);
            validator.slashed = i == 4;
            state.validators.push(validator);
            state.balances.push(32_000_000_000 + u64::from(i) * 1_000);
        }
        state.latest_block_header.slot = 9_400_000;
        let state = VersionedBeaconState::from(state);

        let header = BeaconBlockHeader {
            slot: 9_400_000,
            proposer_index: 17,
            parent_root: [0x0a; 32],
            state_root: state.hash_tree_root().unwrap(),
            body_root: [0x0b; 32],
        };
        let block_root = merkleize(&header_field_roots(&header), 3).unwrap();

        let statuses = [
            (0, ValidatorStatus::Active, 0),
            (1, ValidatorStatus::Active, CHECKPOINT_TIMESTAMP),
            (3, ValidatorStatus::Inactive, 0),
            (4, ValidatorStatus::Active, CHECKPOINT_TIMESTAMP - 12),
            (6, ValidatorStatus::Withdrawn, 0),
        ];
        let infos = statuses
            .into_iter()
            .map(|(index, status, last)| {
                let hash = pod_proofs::leaf::pubkey_hash(&state.validators()[index].pubkey_bytes());
                (
                    hash,
                    ValidatorInfo {
                        validator_index: index as u64,
                        restaked_balance_gwei: 32_000_000_000,
                        last_checkpointed_at: last,
                        status,
                    },
                )
            })
            .collect();

        let checkpoint = if checkpoint_active {
            Checkpoint {
                timestamp: CHECKPOINT_TIMESTAMP,
                beacon_block_root: block_root,
                proofs_remaining: 2,
                ..Default::default()
            }
        } else {
            Checkpoint::default()
        };

        Self {
            header,
            block_root,
            state,
            checkpoint,
            infos,
            lookups: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl BeaconHeaderSource for FakeChain {
    async fn get_header(&self, id: BlockId) -> anyhow::Result<BeaconBlockHeader> {
        match id {
            BlockId::Root(root) if root == self.block_root => Ok(self.header.clone()),
            other => anyhow::bail!("unknown block {other}"),
        }
    }
}

#[async_trait]
impl BeaconStateSource for FakeChain {
    async fn get_state(&self, id: StateId) -> anyhow::Result<VersionedBeaconState> {
        match id {
            StateId::Slot(slot) if slot == self.state.slot() => Ok(self.state.clone()),
            other => anyhow::bail!("unknown state {other}"),
        }
    }
}

#[async_trait]
impl OnchainValidatorInfoProvider for FakeChain {
    async fn batch_lookup(&self, pubkey_hashes: &[Root]) -> anyhow::Result<Vec<ValidatorInfo>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(pubkey_hashes
            .iter()
            .map(|hash| {
                self.infos.get(hash).copied().unwrap_or(ValidatorInfo {
                    validator_index: 0,
                    restaked_balance_gwei: 0,
                    last_checkpointed_at: 0,
                    status: ValidatorStatus::Inactive,
                })
            })
            .collect())
    }
}

#[async_trait]
impl PodCheckpointSource for FakeChain {
    async fn current_checkpoint(&self) -> anyhow::Result<Checkpoint> {
        Ok(self.checkpoint)
    }

    async fn oracle_anchor(&self) -> anyhow::Result<OracleAnchor> {
        Ok(OracleAnchor {
            timestamp: 1_719_000_000,
            parent_block_root: self.block_root,
        })
    }
}

#[async_trait]
impl TransactionSubmitter for FakeChain {
    async fn submit(&self, call: PodCall) -> anyhow::Result<TxHandle> {
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(call);
        Ok(TxHandle([submitted.len() as u8; 32]))
    }
}

fn checkpoint_orchestrator(chain: &FakeChain) -> CheckpointProofOrchestrator<'_> {
    CheckpointProofOrchestrator::new(chain, chain, chain, chain, POD)
}

#[tokio::test]
async fn no_active_checkpoint_is_reported() {
    let chain = FakeChain::new(false);
    let err = checkpoint_orchestrator(&chain).prove().await.unwrap_err();
    assert!(matches!(err, ProverError::NoActiveCheckpoint));
}

#[tokio::test]
async fn checkpoint_proves_only_eligible_pod_validators() {
    let chain = FakeChain::new(true);
    let proofs = checkpoint_orchestrator(&chain).prove().await.unwrap();

    assert_eq!(proofs.slot, 9_400_000);
    assert_eq!(proofs.checkpoint.timestamp, CHECKPOINT_TIMESTAMP);
    assert_eq!(chain.lookups.load(Ordering::SeqCst), 1);

    let params = &proofs.params;
    let container = &params.validator_balances_root_proof;
    assert_eq!(container.proof.len(), 8);
    assert!(verify(
        container.balances_root,
        &container.proof,
        GindexCalculator::balance_container(),
        chain.block_root,
    ));

    // Validators 0 and 4: active and not yet proven for this checkpoint.
    let expected: Vec<Root> = [0usize, 4]
        .iter()
        .map(|&i| pod_proofs::leaf::pubkey_hash(&chain.state.validators()[i].pubkey_bytes()))
        .collect();
    let proven: Vec<Root> = params.balance_proofs.iter().map(|p| p.pubkey_hash).collect();
    assert_eq!(proven, expected);

    for (balance_proof, index) in params.balance_proofs.iter().zip([0u64, 4]) {
        assert_eq!(balance_proof.proof.len(), 39);
        assert!(verify(
            balance_proof.balance_root,
            &balance_proof.proof,
            GindexCalculator::balance_chunk(index),
            container.balances_root,
        ));
    }
}

#[tokio::test]
async fn checkpoint_proofs_submit_in_batches() {
    let chain = FakeChain::new(true);
    let proofs = checkpoint_orchestrator(&chain).prove().await.unwrap();

    let submission = pod_proofs::submit_checkpoint_proofs(&chain, &proofs.params, 1)
        .await
        .unwrap();
    assert!(submission.is_complete());
    assert_eq!(submission.sent.len(), 2);
    assert_eq!(chain.submitted.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn credentials_prove_validators_awaiting_proof() {
    let chain = FakeChain::new(true);
    let orchestrator = CredentialProofOrchestrator::new(&chain, &chain, &chain, &chain, POD);
    let proofs = orchestrator.prove(None).await.unwrap();

    let params = &proofs.params;
    assert_eq!(params.beacon_timestamp, 1_719_000_000);
    assert_eq!(params.validator_indices, vec![3]);
    assert_eq!(params.validator_fields.len(), 1);
    assert_eq!(params.validator_fields_proofs[0].len(), 46);

    let state_root = params.state_root_proof.beacon_state_root;
    assert!(verify(
        state_root,
        &params.state_root_proof.proof,
        GindexCalculator::state_root_in_header(),
        chain.block_root,
    ));
    let container_root = merkleize(&params.validator_fields[0], 3).unwrap();
    assert!(verify(
        container_root,
        &params.validator_fields_proofs[0],
        GindexCalculator::validator_container(3),
        state_root,
    ));
}

#[tokio::test]
async fn credentials_for_an_explicit_validator_skip_lookup() {
    let chain = FakeChain::new(false);
    let orchestrator = CredentialProofOrchestrator::new(&chain, &chain, &chain, &chain, POD);
    let proofs = orchestrator.prove(Some(5)).await.unwrap();

    assert_eq!(proofs.params.validator_indices, vec![5]);
    assert_eq!(chain.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn credentials_for_a_missing_validator_fail() {
    let chain = FakeChain::new(false);
    let orchestrator = CredentialProofOrchestrator::new(&chain, &chain, &chain, &chain, POD);
    let err = orchestrator.prove(Some(100)).await.unwrap_err();
    assert!(matches!(err, ProverError::Proof(_)));
}

#[tokio::test]
async fn stale_balance_proves_a_slashed_validator() {
    let chain = FakeChain::new(false);
    let orchestrator = CredentialProofOrchestrator::new(&chain, &chain, &chain, &chain, POD);
    let proofs = orchestrator.prove_stale_balance(4).await.unwrap();

    let params = &proofs.params;
    assert_eq!(proofs.slot, 9_400_000);
    assert_eq!(params.beacon_timestamp, 1_719_000_000);
    assert_eq!(params.validator_index, 4);
    assert_eq!(params.validator_proof.proof.len(), 46);

    let state_root = params.state_root_proof.beacon_state_root;
    assert!(verify(
        state_root,
        &params.state_root_proof.proof,
        GindexCalculator::state_root_in_header(),
        chain.block_root,
    ));
    let container_root = merkleize(&params.validator_proof.validator_fields, 3).unwrap();
    assert!(verify(
        container_root,
        &params.validator_proof.proof,
        GindexCalculator::validator_container(4),
        state_root,
    ));
    // The slashed flag is the fourth field.
    assert_eq!(params.validator_proof.validator_fields[3][0], 1);
}

#[tokio::test]
async fn stale_balance_rejects_an_unslashed_validator() {
    let chain = FakeChain::new(false);
    let orchestrator = CredentialProofOrchestrator::new(&chain, &chain, &chain, &chain, POD);
    let err = orchestrator.prove_stale_balance(0).await.unwrap_err();
    assert!(matches!(err, ProverError::NotSlashed(0)));

    let err = orchestrator.prove_stale_balance(100).await.unwrap_err();
    assert!(matches!(err, ProverError::Proof(_)));
}
