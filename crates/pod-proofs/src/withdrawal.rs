//! Withdrawal proofs against an oracle state.
//!
//! A withdrawal is proven in four hops: the withdrawal into its execution
//! payload, the payload into its block, the block root into the archived
//! `block_roots` of a historical summary, and the summary into the oracle
//! state. The slot and timestamp of the withdrawal block are proven
//! alongside so the verifier can place it in time.

use crate::beacon_state::{BeaconBlockHeader, VersionedBeaconBlock};
use crate::constants::{
    BEACON_BLOCK_BODY_ROOT_INDEX, BLOCK_BODY_DEPTH, EXECUTION_PAYLOAD_INDEX, SLOT_INDEX,
    TIMESTAMP_INDEX, WITHDRAWALS_INDEX, WITHDRAWAL_LIST_DEPTH,
};
use crate::containers::{withdrawal_field_roots, BlockFieldRoots};
use crate::fork::{block_root_index, is_provable_withdrawal, slot_timestamp, Network};
use crate::gindex::GindexCalculator;
use crate::leaf::hash_u64;
use crate::merkle::{merkleize, prove_list_element, SparseMerkleTree};
use crate::proof::{
    ensure_length, ProofError, VerifyAndProcessWithdrawalCallParams, WithdrawalProof,
    WithdrawalStateRootProof,
};
use crate::state_prover::{prove_header_field, StateProver};
use crate::types::{Root, ValidatorIndex};
use rayon::prelude::*;
use ssz_rs::prelude::*;
use tracing::{info, instrument};

/// One withdrawal to prove.
#[derive(Debug, Clone, Copy)]
pub struct WithdrawalTarget<'a> {
    /// Block whose execution payload contains the withdrawal
    pub block: &'a VersionedBeaconBlock,
    /// `block_roots` of the state at the end of the block's summary period
    pub historical_block_roots: &'a [Root],
    pub validator_index: ValidatorIndex,
}

/// Prove the first withdrawal for `target.validator_index` in `target.block`.
///
/// # Errors
/// Fails if the block holds no withdrawal for the validator, the block is
/// not yet archived relative to the oracle state, the block is of the
/// wrong fork for `network`, or `historical_block_roots` does not contain
/// the block.
pub fn prove_withdrawal(
    oracle: &StateProver,
    network: Network,
    target: &WithdrawalTarget<'_>,
) -> Result<WithdrawalProof, ProofError> {
    prove_withdrawal_with_fields(oracle, network, target).map(|(proof, _)| proof)
}

/// [`prove_withdrawal`] together with the proven withdrawal's field roots.
fn prove_withdrawal_with_fields(
    oracle: &StateProver,
    network: Network,
    target: &WithdrawalTarget<'_>,
) -> Result<(WithdrawalProof, Vec<Root>), ProofError> {
    let block = target.block;
    let slot = block.slot();
    let oracle_slot = oracle.state().slot();

    if !is_provable_withdrawal(oracle_slot, slot) {
        return Err(ProofError::NotProvable {
            withdrawal_slot: slot,
            oracle_slot,
        });
    }

    let fork = network.fork_at(slot)?;
    if fork != block.fork() {
        return Err(ProofError::MalformedState(format!(
            "block at slot {slot} is {} but {network:?} runs {fork} there",
            block.fork()
        )));
    }

    let withdrawals = block.withdrawals();
    let (withdrawal_index, withdrawal) = withdrawals
        .iter()
        .enumerate()
        .find(|(_, w)| w.validator_index == target.validator_index)
        .ok_or(ProofError::WithdrawalNotFound {
            validator_index: target.validator_index,
            slot,
        })?;
    let withdrawal_fields = withdrawal_field_roots(withdrawal);

    let field_roots = BlockFieldRoots::compute(block)?;
    let header = block.header()?;
    let block_root: Root = header.hash_tree_root()?.into();

    let summary_index = network.historical_summary_index(slot)?;
    let root_index = block_root_index(slot);
    let archived = usize::try_from(root_index)
        .ok()
        .and_then(|i| target.historical_block_roots.get(i))
        .copied();
    if archived != Some(block_root) {
        return Err(ProofError::MalformedState(format!(
            "historical block roots do not contain block at slot {slot}"
        )));
    }

    // withdrawal -> withdrawals list -> execution payload
    let withdrawal_leaves = withdrawals
        .iter()
        .map(|w| merkleize(&withdrawal_field_roots(w), 2))
        .collect::<Result<Vec<_>, _>>()?;
    let (mut withdrawal_proof, _) = prove_list_element(
        &withdrawal_leaves,
        withdrawal_index as u64,
        WITHDRAWAL_LIST_DEPTH,
        withdrawals.len(),
    )?;
    let payload_tree =
        SparseMerkleTree::new(field_roots.execution_payload, fork.execution_payload_depth())?;
    withdrawal_proof.extend(payload_tree.prove(WITHDRAWALS_INDEX as u64)?);
    ensure_length(
        "withdrawal",
        &withdrawal_proof,
        GindexCalculator::withdrawal_proof_length(fork),
    )?;

    // execution payload -> body -> header
    let body_tree = SparseMerkleTree::new(field_roots.body, BLOCK_BODY_DEPTH)?;
    let mut execution_payload_proof = body_tree.prove(EXECUTION_PAYLOAD_INDEX as u64)?;
    execution_payload_proof.extend(prove_header_field(&header, BEACON_BLOCK_BODY_ROOT_INDEX)?);
    ensure_length(
        "execution payload",
        &execution_payload_proof,
        GindexCalculator::execution_payload_proof_length(),
    )?;

    let slot_proof = prove_header_field(&header, SLOT_INDEX)?;
    ensure_length("slot", &slot_proof, GindexCalculator::slot_proof_length())?;
    let timestamp_proof = payload_tree.prove(TIMESTAMP_INDEX as u64)?;
    ensure_length(
        "timestamp",
        &timestamp_proof,
        GindexCalculator::timestamp_proof_length(fork),
    )?;

    let historical_summary_block_root_proof = oracle.prove_historical_block_root(
        summary_index,
        target.historical_block_roots,
        root_index,
    )?;

    let proof = WithdrawalProof {
        withdrawal_proof,
        slot_proof,
        execution_payload_proof,
        timestamp_proof,
        historical_summary_block_root_proof,
        block_root_index: root_index,
        historical_summary_index: summary_index,
        withdrawal_index: withdrawal_index as u64,
        block_root,
        slot_root: hash_u64(slot),
        timestamp_root: hash_u64(block.timestamp()),
        execution_payload_root: payload_tree.root(),
        fork,
    };
    Ok((proof, withdrawal_fields))
}

/// Build `verifyAndProcessWithdrawals` parameters for `targets` against the
/// oracle state committed to by `oracle_header`.
///
/// # Errors
/// Fails if the header does not commit to the oracle state or any single
/// withdrawal cannot be proven.
#[instrument(skip_all, fields(withdrawals = targets.len(), oracle_slot = oracle_header.slot))]
pub fn prove_withdrawals(
    oracle: &StateProver,
    oracle_header: &BeaconBlockHeader,
    network: Network,
    targets: &[WithdrawalTarget<'_>],
) -> Result<VerifyAndProcessWithdrawalCallParams, ProofError> {
    let state_root_proof = oracle.prove_state_root(oracle_header)?;
    let slot_root_proof = prove_header_field(oracle_header, SLOT_INDEX)?;

    let proven = targets
        .par_iter()
        .map(|target| {
            let (withdrawal, withdrawal_fields) =
                prove_withdrawal_with_fields(oracle, network, target)?;
            let validator = oracle.prove_validator_fields(target.validator_index)?;
            Ok((withdrawal, withdrawal_fields, validator))
        })
        .collect::<Result<Vec<_>, ProofError>>()?;

    let mut params = VerifyAndProcessWithdrawalCallParams {
        oracle_timestamp: slot_timestamp(oracle.state().genesis_time(), oracle_header.slot),
        state_root_proof: WithdrawalStateRootProof {
            beacon_state_root: state_root_proof.beacon_state_root,
            state_root_proof: state_root_proof.proof,
            slot: oracle_header.slot,
            slot_root_proof,
        },
        withdrawal_proofs: Vec::with_capacity(proven.len()),
        validator_fields_proofs: Vec::with_capacity(proven.len()),
        validator_fields: Vec::with_capacity(proven.len()),
        withdrawal_fields: Vec::with_capacity(proven.len()),
    };
    for (withdrawal, withdrawal_fields, validator) in proven {
        params.withdrawal_proofs.push(withdrawal);
        params.withdrawal_fields.push(withdrawal_fields);
        params.validator_fields_proofs.push(validator.proof);
        params.validator_fields.push(validator.fields);
    }

    info!(
        withdrawals = params.withdrawal_proofs.len(),
        "Built withdrawal proofs"
    );
    Ok(params)
}
