//! Capella and Deneb BeaconState / BeaconBlock SSZ Types
//!
//! Complete containers at mainnet preset limits. Roots computed from these
//! types are the roots the chain commits to, so every field must be present
//! in protocol order even when no proof touches it.
//!
//! `ssz_rs` merkleizes list limits virtually, so a `List<Validator, 2^40>`
//! costs memory proportional to its length, not its limit.

use crate::constants::{
    BYTES_PER_LOGS_BLOOM, DEPOSIT_CONTRACT_TREE_DEPTH_PLUS_ONE, EPOCHS_PER_HISTORICAL_VECTOR,
    EPOCHS_PER_SLASHINGS_VECTOR, ETH1_DATA_VOTES_LIMIT, HISTORICAL_ROOTS_LIMIT,
    MAX_ATTESTATIONS, MAX_ATTESTER_SLASHINGS, MAX_BLOB_COMMITMENTS_PER_BLOCK,
    MAX_BLS_TO_EXECUTION_CHANGES, MAX_BYTES_PER_TRANSACTION, MAX_DEPOSITS, MAX_EXTRA_DATA_BYTES,
    MAX_PROPOSER_SLASHINGS, MAX_TRANSACTIONS_PER_PAYLOAD, MAX_VALIDATORS_PER_COMMITTEE,
    MAX_VOLUNTARY_EXITS, MAX_WITHDRAWALS_PER_PAYLOAD, SYNC_COMMITTEE_SIZE,
    VALIDATOR_REGISTRY_LIMIT,
};
use crate::fork::Fork as ForkName;
use crate::proof::ProofError;
use crate::types::Root;
use ssz_rs::prelude::*;

const SLOTS_PER_HISTORICAL_ROOT: usize = 8192;

pub type BlsPubkey = Vector<u8, 48>;
pub type BlsSignature = Vector<u8, 96>;
pub type Transaction = List<u8, MAX_BYTES_PER_TRANSACTION>;

/// Checkpoint for fork choice
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct Checkpoint {
    pub epoch: u64,
    pub root: [u8; 32],
}

/// Fork versions recorded in the state
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct Fork {
    pub previous_version: [u8; 4],
    pub current_version: [u8; 4],
    pub epoch: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct Eth1Data {
    pub deposit_root: [u8; 32],
    pub deposit_count: u64,
    pub block_hash: [u8; 32],
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct BeaconBlockHeader {
    pub slot: u64,
    pub proposer_index: u64,
    pub parent_root: [u8; 32],
    pub state_root: [u8; 32],
    pub body_root: [u8; 32],
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct SignedBeaconBlockHeader {
    pub message: BeaconBlockHeader,
    pub signature: BlsSignature,
}

/// Validator record
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct Validator {
    pub pubkey: BlsPubkey,
    pub withdrawal_credentials: [u8; 32],
    pub effective_balance: u64,
    pub slashed: bool,
    pub activation_eligibility_epoch: u64,
    pub activation_epoch: u64,
    pub exit_epoch: u64,
    pub withdrawable_epoch: u64,
}

impl Validator {
    /// The 48-byte public key as an array.
    #[must_use]
    pub fn pubkey_bytes(&self) -> [u8; 48] {
        let mut out = [0u8; 48];
        out.copy_from_slice(&self.pubkey);
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct HistoricalSummary {
    pub block_summary_root: [u8; 32],
    pub state_summary_root: [u8; 32],
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct SyncCommittee {
    pub pubkeys: Vector<BlsPubkey, SYNC_COMMITTEE_SIZE>,
    pub aggregate_pubkey: BlsPubkey,
}

/// Execution-layer withdrawal included in a payload
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct Withdrawal {
    pub index: u64,
    pub validator_index: u64,
    pub address: [u8; 20],
    pub amount: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct ExecutionPayloadHeaderCapella {
    pub parent_hash: [u8; 32],
    pub fee_recipient: [u8; 20],
    pub state_root: [u8; 32],
    pub receipts_root: [u8; 32],
    pub logs_bloom: Vector<u8, BYTES_PER_LOGS_BLOOM>,
    pub prev_randao: [u8; 32],
    pub block_number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra_data: List<u8, MAX_EXTRA_DATA_BYTES>,
    pub base_fee_per_gas: U256,
    pub block_hash: [u8; 32],
    pub transactions_root: [u8; 32],
    pub withdrawals_root: [u8; 32],
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct ExecutionPayloadHeaderDeneb {
    pub parent_hash: [u8; 32],
    pub fee_recipient: [u8; 20],
    pub state_root: [u8; 32],
    pub receipts_root: [u8; 32],
    pub logs_bloom: Vector<u8, BYTES_PER_LOGS_BLOOM>,
    pub prev_randao: [u8; 32],
    pub block_number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra_data: List<u8, MAX_EXTRA_DATA_BYTES>,
    pub base_fee_per_gas: U256,
    pub block_hash: [u8; 32],
    pub transactions_root: [u8; 32],
    pub withdrawals_root: [u8; 32],
    pub blob_gas_used: u64,
    pub excess_blob_gas: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct ExecutionPayloadCapella {
    pub parent_hash: [u8; 32],
    pub fee_recipient: [u8; 20],
    pub state_root: [u8; 32],
    pub receipts_root: [u8; 32],
    pub logs_bloom: Vector<u8, BYTES_PER_LOGS_BLOOM>,
    pub prev_randao: [u8; 32],
    pub block_number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra_data: List<u8, MAX_EXTRA_DATA_BYTES>,
    pub base_fee_per_gas: U256,
    pub block_hash: [u8; 32],
    pub transactions: List<Transaction, MAX_TRANSACTIONS_PER_PAYLOAD>,
    pub withdrawals: List<Withdrawal, MAX_WITHDRAWALS_PER_PAYLOAD>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct ExecutionPayloadDeneb {
    pub parent_hash: [u8; 32],
    pub fee_recipient: [u8; 20],
    pub state_root: [u8; 32],
    pub receipts_root: [u8; 32],
    pub logs_bloom: Vector<u8, BYTES_PER_LOGS_BLOOM>,
    pub prev_randao: [u8; 32],
    pub block_number: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra_data: List<u8, MAX_EXTRA_DATA_BYTES>,
    pub base_fee_per_gas: U256,
    pub block_hash: [u8; 32],
    pub transactions: List<Transaction, MAX_TRANSACTIONS_PER_PAYLOAD>,
    pub withdrawals: List<Withdrawal, MAX_WITHDRAWALS_PER_PAYLOAD>,
    pub blob_gas_used: u64,
    pub excess_blob_gas: u64,
}

// ============================================================================
// Block body operations
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct AttestationData {
    pub slot: u64,
    pub index: u64,
    pub beacon_block_root: [u8; 32],
    pub source: Checkpoint,
    pub target: Checkpoint,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct IndexedAttestation {
    pub attesting_indices: List<u64, MAX_VALIDATORS_PER_COMMITTEE>,
    pub data: AttestationData,
    pub signature: BlsSignature,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct Attestation {
    pub aggregation_bits: Bitlist<MAX_VALIDATORS_PER_COMMITTEE>,
    pub data: AttestationData,
    pub signature: BlsSignature,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct ProposerSlashing {
    pub signed_header_1: SignedBeaconBlockHeader,
    pub signed_header_2: SignedBeaconBlockHeader,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct AttesterSlashing {
    pub attestation_1: IndexedAttestation,
    pub attestation_2: IndexedAttestation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct DepositData {
    pub pubkey: BlsPubkey,
    pub withdrawal_credentials: [u8; 32],
    pub amount: u64,
    pub signature: BlsSignature,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct Deposit {
    pub proof: Vector<[u8; 32], DEPOSIT_CONTRACT_TREE_DEPTH_PLUS_ONE>,
    pub data: DepositData,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct VoluntaryExit {
    pub epoch: u64,
    pub validator_index: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct SignedVoluntaryExit {
    pub message: VoluntaryExit,
    pub signature: BlsSignature,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct SyncAggregate {
    pub sync_committee_bits: Bitvector<SYNC_COMMITTEE_SIZE>,
    pub sync_committee_signature: BlsSignature,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct BlsToExecutionChange {
    pub validator_index: u64,
    pub from_bls_pubkey: BlsPubkey,
    pub to_execution_address: [u8; 20],
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct SignedBlsToExecutionChange {
    pub message: BlsToExecutionChange,
    pub signature: BlsSignature,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct BeaconBlockBodyCapella {
    pub randao_reveal: BlsSignature,
    pub eth1_data: Eth1Data,
    pub graffiti: [u8; 32],
    pub proposer_slashings: List<ProposerSlashing, MAX_PROPOSER_SLASHINGS>,
    pub attester_slashings: List<AttesterSlashing, MAX_ATTESTER_SLASHINGS>,
    pub attestations: List<Attestation, MAX_ATTESTATIONS>,
    pub deposits: List<Deposit, MAX_DEPOSITS>,
    pub voluntary_exits: List<SignedVoluntaryExit, MAX_VOLUNTARY_EXITS>,
    pub sync_aggregate: SyncAggregate,
    pub execution_payload: ExecutionPayloadCapella,
    pub bls_to_execution_changes: List<SignedBlsToExecutionChange, MAX_BLS_TO_EXECUTION_CHANGES>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct BeaconBlockBodyDeneb {
    pub randao_reveal: BlsSignature,
    pub eth1_data: Eth1Data,
    pub graffiti: [u8; 32],
    pub proposer_slashings: List<ProposerSlashing, MAX_PROPOSER_SLASHINGS>,
    pub attester_slashings: List<AttesterSlashing, MAX_ATTESTER_SLASHINGS>,
    pub attestations: List<Attestation, MAX_ATTESTATIONS>,
    pub deposits: List<Deposit, MAX_DEPOSITS>,
    pub voluntary_exits: List<SignedVoluntaryExit, MAX_VOLUNTARY_EXITS>,
    pub sync_aggregate: SyncAggregate,
    pub execution_payload: ExecutionPayloadDeneb,
    pub bls_to_execution_changes: List<SignedBlsToExecutionChange, MAX_BLS_TO_EXECUTION_CHANGES>,
    pub blob_kzg_commitments: List<Vector<u8, 48>, MAX_BLOB_COMMITMENTS_PER_BLOCK>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct BeaconBlockCapella {
    pub slot: u64,
    pub proposer_index: u64,
    pub parent_root: [u8; 32],
    pub state_root: [u8; 32],
    pub body: BeaconBlockBodyCapella,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct BeaconBlockDeneb {
    pub slot: u64,
    pub proposer_index: u64,
    pub parent_root: [u8; 32],
    pub state_root: [u8; 32],
    pub body: BeaconBlockBodyDeneb,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct SignedBeaconBlockCapella {
    pub message: BeaconBlockCapella,
    pub signature: BlsSignature,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct SignedBeaconBlockDeneb {
    pub message: BeaconBlockDeneb,
    pub signature: BlsSignature,
}

// ============================================================================
// BeaconState
// ============================================================================

/// Capella BeaconState (28 fields)
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct BeaconStateCapella {
    // Field 0
    pub genesis_time: u64,
    pub genesis_validators_root: [u8; 32],
    pub slot: u64,
    pub fork: Fork,
    pub latest_block_header: BeaconBlockHeader,
    // Field 5
    pub block_roots: Vector<[u8; 32], SLOTS_PER_HISTORICAL_ROOT>,
    pub state_roots: Vector<[u8; 32], SLOTS_PER_HISTORICAL_ROOT>,
    pub historical_roots: List<[u8; 32], HISTORICAL_ROOTS_LIMIT>,
    pub eth1_data: Eth1Data,
    pub eth1_data_votes: List<Eth1Data, ETH1_DATA_VOTES_LIMIT>,
    // Field 10
    pub eth1_deposit_index: u64,
    pub validators: List<Validator, VALIDATOR_REGISTRY_LIMIT>,
    pub balances: List<u64, VALIDATOR_REGISTRY_LIMIT>,
    pub randao_mixes: Vector<[u8; 32], EPOCHS_PER_HISTORICAL_VECTOR>,
    pub slashings: Vector<u64, EPOCHS_PER_SLASHINGS_VECTOR>,
    // Field 15
    pub previous_epoch_participation: List<u8, VALIDATOR_REGISTRY_LIMIT>,
    pub current_epoch_participation: List<u8, VALIDATOR_REGISTRY_LIMIT>,
    pub justification_bits: Bitvector<4>,
    pub previous_justified_checkpoint: Checkpoint,
    pub current_justified_checkpoint: Checkpoint,
    // Field 20
    pub finalized_checkpoint: Checkpoint,
    pub inactivity_scores: List<u64, VALIDATOR_REGISTRY_LIMIT>,
    pub current_sync_committee: SyncCommittee,
    pub next_sync_committee: SyncCommittee,
    pub latest_execution_payload_header: ExecutionPayloadHeaderCapella,
    // Field 25
    pub next_withdrawal_index: u64,
    pub next_withdrawal_validator_index: u64,
    pub historical_summaries: List<HistoricalSummary, HISTORICAL_ROOTS_LIMIT>,
}

/// Deneb BeaconState (28 fields; only the payload header layout differs)
#[derive(Debug, Clone, Default, PartialEq, Eq, SimpleSerialize)]
pub struct BeaconStateDeneb {
    // Field 0
    pub genesis_time: u64,
    pub genesis_validators_root: [u8; 32],
    pub slot: u64,
    pub fork: Fork,
    pub latest_block_header: BeaconBlockHeader,
    // Field 5
    pub block_roots: Vector<[u8; 32], SLOTS_PER_HISTORICAL_ROOT>,
    pub state_roots: Vector<[u8; 32], SLOTS_PER_HISTORICAL_ROOT>,
    pub historical_roots: List<[u8; 32], HISTORICAL_ROOTS_LIMIT>,
    pub eth1_data: Eth1Data,
    pub eth1_data_votes: List<Eth1Data, ETH1_DATA_VOTES_LIMIT>,
    // Field 10
    pub eth1_deposit_index: u64,
    pub validators: List<Validator, VALIDATOR_REGISTRY_LIMIT>,
    pub balances: List<u64, VALIDATOR_REGISTRY_LIMIT>,
    pub randao_mixes: Vector<[u8; 32], EPOCHS_PER_HISTORICAL_VECTOR>,
    pub slashings: Vector<u64, EPOCHS_PER_SLASHINGS_VECTOR>,
    // Field 15
    pub previous_epoch_participation: List<u8, VALIDATOR_REGISTRY_LIMIT>,
    pub current_epoch_participation: List<u8, VALIDATOR_REGISTRY_LIMIT>,
    pub justification_bits: Bitvector<4>,
    pub previous_justified_checkpoint: Checkpoint,
    pub current_justified_checkpoint: Checkpoint,
    // Field 20
    pub finalized_checkpoint: Checkpoint,
    pub inactivity_scores: List<u64, VALIDATOR_REGISTRY_LIMIT>,
    pub current_sync_committee: SyncCommittee,
    pub next_sync_committee: SyncCommittee,
    pub latest_execution_payload_header: ExecutionPayloadHeaderDeneb,
    // Field 25
    pub next_withdrawal_index: u64,
    pub next_withdrawal_validator_index: u64,
    pub historical_summaries: List<HistoricalSummary, HISTORICAL_ROOTS_LIMIT>,
}

fn malformed(err: impl std::fmt::Display) -> ProofError {
    ProofError::MalformedState(err.to_string())
}

/// Apply `$body` to whichever fork variant `$value` holds.
macro_rules! with_fork {
    ($ty:ident, $value:expr, |$inner:ident| $body:expr) => {
        match $value {
            $ty::Capella($inner) => $body,
            $ty::Deneb($inner) => $body,
        }
    };
}
pub(crate) use with_fork;

/// A beacon state of either supported fork.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionedBeaconState {
    Capella(Box<BeaconStateCapella>),
    Deneb(Box<BeaconStateDeneb>),
}

impl VersionedBeaconState {
    /// Decode an SSZ-encoded state of the given fork.
    ///
    /// # Errors
    /// Returns [`ProofError::MalformedState`] if the bytes do not decode.
    pub fn from_ssz(fork: ForkName, bytes: &[u8]) -> Result<Self, ProofError> {
        Ok(match fork {
            ForkName::Capella => Self::Capella(Box::new(ssz_rs::deserialize(bytes).map_err(malformed)?)),
            ForkName::Deneb => Self::Deneb(Box::new(ssz_rs::deserialize(bytes).map_err(malformed)?)),
        })
    }

    /// SSZ encoding of the inner state.
    ///
    /// # Errors
    /// Propagates `ssz_rs` serialization failures as [`ProofError::MalformedState`].
    pub fn to_ssz(&self) -> Result<Vec<u8>, ProofError> {
        with_fork!(Self, self, |state| ssz_rs::serialize(&**state)).map_err(malformed)
    }

    #[must_use]
    pub fn fork(&self) -> ForkName {
        match self {
            Self::Capella(_) => ForkName::Capella,
            Self::Deneb(_) => ForkName::Deneb,
        }
    }

    #[must_use]
    pub fn slot(&self) -> u64 {
        with_fork!(Self, self, |state| state.slot)
    }

    #[must_use]
    pub fn genesis_time(&self) -> u64 {
        with_fork!(Self, self, |state| state.genesis_time)
    }

    #[must_use]
    pub fn latest_block_header(&self) -> &BeaconBlockHeader {
        with_fork!(Self, self, |state| &state.latest_block_header)
    }

    #[must_use]
    pub fn validators(&self) -> &[Validator] {
        with_fork!(Self, self, |state| &state.validators)
    }

    #[must_use]
    pub fn balances(&self) -> &[u64] {
        with_fork!(Self, self, |state| &state.balances)
    }

    #[must_use]
    pub fn block_roots(&self) -> &[[u8; 32]] {
        with_fork!(Self, self, |state| &state.block_roots)
    }

    #[must_use]
    pub fn historical_summaries(&self) -> &[HistoricalSummary] {
        with_fork!(Self, self, |state| &state.historical_summaries)
    }

    /// Balance of `validator_index`, if it exists.
    #[must_use]
    pub fn balance(&self, validator_index: u64) -> Option<u64> {
        usize::try_from(validator_index)
            .ok()
            .and_then(|i| self.balances().get(i))
            .copied()
    }

    /// Full hash tree root through `ssz_rs`. Slow on large states; proof
    /// building uses [`crate::state_roots::BeaconStateTopLevelRoots`].
    ///
    /// # Errors
    /// Propagates merkleization failures.
    pub fn hash_tree_root(&self) -> Result<Root, ProofError> {
        let node = with_fork!(Self, self, |state| state.hash_tree_root())?;
        Ok(node.into())
    }
}

impl From<BeaconStateCapella> for VersionedBeaconState {
    fn from(state: BeaconStateCapella) -> Self {
        Self::Capella(Box::new(state))
    }
}

impl From<BeaconStateDeneb> for VersionedBeaconState {
    fn from(state: BeaconStateDeneb) -> Self {
        Self::Deneb(Box::new(state))
    }
}

/// A beacon block of either supported fork.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionedBeaconBlock {
    Capella(Box<BeaconBlockCapella>),
    Deneb(Box<BeaconBlockDeneb>),
}

impl VersionedBeaconBlock {
    /// Decode an SSZ-encoded (unsigned) block of the given fork.
    ///
    /// # Errors
    /// Returns [`ProofError::MalformedState`] if the bytes do not decode.
    pub fn from_ssz(fork: ForkName, bytes: &[u8]) -> Result<Self, ProofError> {
        Ok(match fork {
            ForkName::Capella => Self::Capella(Box::new(ssz_rs::deserialize(bytes).map_err(malformed)?)),
            ForkName::Deneb => Self::Deneb(Box::new(ssz_rs::deserialize(bytes).map_err(malformed)?)),
        })
    }

    /// Decode an SSZ-encoded signed block, as served by the beacon API,
    /// dropping the signature.
    ///
    /// # Errors
    /// Returns [`ProofError::MalformedState`] if the bytes do not decode.
    pub fn from_signed_ssz(fork: ForkName, bytes: &[u8]) -> Result<Self, ProofError> {
        Ok(match fork {
            ForkName::Capella => {
                let signed: SignedBeaconBlockCapella = ssz_rs::deserialize(bytes).map_err(malformed)?;
                Self::Capella(Box::new(signed.message))
            }
            ForkName::Deneb => {
                let signed: SignedBeaconBlockDeneb = ssz_rs::deserialize(bytes).map_err(malformed)?;
                Self::Deneb(Box::new(signed.message))
            }
        })
    }

    #[must_use]
    pub fn fork(&self) -> ForkName {
        match self {
            Self::Capella(_) => ForkName::Capella,
            Self::Deneb(_) => ForkName::Deneb,
        }
    }

    #[must_use]
    pub fn slot(&self) -> u64 {
        with_fork!(Self, self, |block| block.slot)
    }

    #[must_use]
    pub fn withdrawals(&self) -> &[Withdrawal] {
        with_fork!(Self, self, |block| &block.body.execution_payload.withdrawals)
    }

    #[must_use]
    pub fn timestamp(&self) -> u64 {
        with_fork!(Self, self, |block| block.body.execution_payload.timestamp)
    }

    /// Header committing to this block, with the body root computed.
    ///
    /// # Errors
    /// Propagates merkleization failures.
    pub fn header(&self) -> Result<BeaconBlockHeader, ProofError> {
        let (slot, proposer_index, parent_root, state_root, body_root) =
            with_fork!(Self, self, |block| (
                block.slot,
                block.proposer_index,
                block.parent_root,
                block.state_root,
                block.body.hash_tree_root()?
            ));
        Ok(BeaconBlockHeader {
            slot,
            proposer_index,
            parent_root,
            state_root,
            body_root: body_root.into(),
        })
    }
}

impl From<BeaconBlockCapella> for VersionedBeaconBlock {
    fn from(block: BeaconBlockCapella) -> Self {
        Self::Capella(Box::new(block))
    }
}

impl From<BeaconBlockDeneb> for VersionedBeaconBlock {
    fn from(block: BeaconBlockDeneb) -> Self {
        Self::Deneb(Box::new(block))
    }
}
