//! Ordered field roots for the containers that proofs pass through.
//!
//! A container's root is the merkleization of these lists, padded to the
//! container depth. Proofs into a container are sibling paths over the same
//! list.

use crate::beacon_state::{
    BeaconBlockBodyCapella, BeaconBlockBodyDeneb, BeaconBlockHeader, ExecutionPayloadCapella,
    ExecutionPayloadDeneb, HistoricalSummary, Validator, VersionedBeaconBlock, Withdrawal,
};
use crate::leaf::{hash_address, hash_bool, hash_bytes, hash_root, hash_u64, pubkey_hash};
use crate::proof::ProofError;
use crate::types::Root;
use ssz_rs::prelude::*;

fn root_of<T: SimpleSerialize>(value: &T) -> Result<Root, ProofError> {
    Ok(value.hash_tree_root()?.into())
}

/// `[slot, proposer_index, parent_root, state_root, body_root]`
#[must_use]
pub fn header_field_roots(header: &BeaconBlockHeader) -> Vec<Root> {
    vec![
        hash_u64(header.slot),
        hash_u64(header.proposer_index),
        hash_root(header.parent_root),
        hash_root(header.state_root),
        hash_root(header.body_root),
    ]
}

/// The eight validator field roots. This list is exactly the
/// `validatorFields` argument the EigenPod takes.
#[must_use]
pub fn validator_field_roots(validator: &Validator) -> Vec<Root> {
    vec![
        pubkey_hash(&validator.pubkey_bytes()),
        hash_root(validator.withdrawal_credentials),
        hash_u64(validator.effective_balance),
        hash_bool(validator.slashed),
        hash_u64(validator.activation_eligibility_epoch),
        hash_u64(validator.activation_epoch),
        hash_u64(validator.exit_epoch),
        hash_u64(validator.withdrawable_epoch),
    ]
}

/// `[index, validator_index, address, amount]`, the on-chain `withdrawalFields`.
#[must_use]
pub fn withdrawal_field_roots(withdrawal: &Withdrawal) -> Vec<Root> {
    vec![
        hash_u64(withdrawal.index),
        hash_u64(withdrawal.validator_index),
        hash_address(&withdrawal.address),
        hash_u64(withdrawal.amount),
    ]
}

#[must_use]
pub fn historical_summary_field_roots(summary: &HistoricalSummary) -> Vec<Root> {
    vec![
        hash_root(summary.block_summary_root),
        hash_root(summary.state_summary_root),
    ]
}

// Capella and Deneb payloads share their first 15 fields.
macro_rules! payload_common_roots {
    ($payload:expr) => {
        vec![
            hash_root($payload.parent_hash),
            hash_address(&$payload.fee_recipient),
            hash_root($payload.state_root),
            hash_root($payload.receipts_root),
            hash_bytes(&$payload.logs_bloom),
            hash_root($payload.prev_randao),
            hash_u64($payload.block_number),
            hash_u64($payload.gas_limit),
            hash_u64($payload.gas_used),
            hash_u64($payload.timestamp),
            root_of(&$payload.extra_data)?,
            root_of(&$payload.base_fee_per_gas)?,
            hash_root($payload.block_hash),
            root_of(&$payload.transactions)?,
            root_of(&$payload.withdrawals)?,
        ]
    };
}

/// The 15 Capella execution payload field roots.
///
/// # Errors
/// Propagates merkleization failures of the list fields.
pub fn execution_payload_field_roots_capella(
    payload: &ExecutionPayloadCapella,
) -> Result<Vec<Root>, ProofError> {
    Ok(payload_common_roots!(payload))
}

/// The 17 Deneb execution payload field roots.
///
/// # Errors
/// Propagates merkleization failures of the list fields.
pub fn execution_payload_field_roots_deneb(
    payload: &ExecutionPayloadDeneb,
) -> Result<Vec<Root>, ProofError> {
    let mut roots = payload_common_roots!(payload);
    roots.push(hash_u64(payload.blob_gas_used));
    roots.push(hash_u64(payload.excess_blob_gas));
    Ok(roots)
}

macro_rules! body_common_roots {
    ($body:expr, $payload_root:expr) => {
        vec![
            root_of(&$body.randao_reveal)?,
            root_of(&$body.eth1_data)?,
            hash_root($body.graffiti),
            root_of(&$body.proposer_slashings)?,
            root_of(&$body.attester_slashings)?,
            root_of(&$body.attestations)?,
            root_of(&$body.deposits)?,
            root_of(&$body.voluntary_exits)?,
            root_of(&$body.sync_aggregate)?,
            $payload_root,
            root_of(&$body.bls_to_execution_changes)?,
        ]
    };
}

/// The 11 Capella block body field roots.
///
/// # Errors
/// Propagates merkleization failures.
pub fn block_body_field_roots_capella(body: &BeaconBlockBodyCapella) -> Result<Vec<Root>, ProofError> {
    Ok(body_common_roots!(body, root_of(&body.execution_payload)?))
}

/// The 12 Deneb block body field roots.
///
/// # Errors
/// Propagates merkleization failures.
pub fn block_body_field_roots_deneb(body: &BeaconBlockBodyDeneb) -> Result<Vec<Root>, ProofError> {
    let mut roots = body_common_roots!(body, root_of(&body.execution_payload)?);
    roots.push(root_of(&body.blob_kzg_commitments)?);
    Ok(roots)
}

/// Field roots of a block's body and of its execution payload.
#[derive(Debug, Clone)]
pub struct BlockFieldRoots {
    pub body: Vec<Root>,
    pub execution_payload: Vec<Root>,
}

impl BlockFieldRoots {
    /// # Errors
    /// Propagates merkleization failures.
    pub fn compute(block: &VersionedBeaconBlock) -> Result<Self, ProofError> {
        match block {
            VersionedBeaconBlock::Capella(block) => Ok(Self {
                body: block_body_field_roots_capella(&block.body)?,
                execution_payload: execution_payload_field_roots_capella(
                    &block.body.execution_payload,
                )?,
            }),
            VersionedBeaconBlock::Deneb(block) => Ok(Self {
                body: block_body_field_roots_deneb(&block.body)?,
                execution_payload: execution_payload_field_roots_deneb(
                    &block.body.execution_payload,
                )?,
            }),
        }
    }
}
