//! Generalized Index Computation
//!
//! Computes generalized indices (gindices) for the EigenPod proofs. These
//! must match the gindices the EigenPod verifier hardcodes. Proof lengths are
//! derived from the gindices rather than restated, so a wrong depth shows up
//! as a length mismatch in [`crate::state_prover`].

use crate::constants::{
    BALANCE_LIST_DEPTH, BALANCE_LIST_INDEX, BALANCES_PER_CHUNK, BEACON_BLOCK_BODY_ROOT_INDEX,
    BEACON_STATE_DEPTH, BLOCK_BODY_DEPTH, BLOCK_HEADER_DEPTH, BLOCK_ROOTS_DEPTH,
    BLOCK_SUMMARY_ROOT_INDEX, EXECUTION_PAYLOAD_INDEX, HISTORICAL_SUMMARY_DEPTH,
    HISTORICAL_SUMMARY_LIST_DEPTH, HISTORICAL_SUMMARY_LIST_INDEX, SLOT_INDEX, STATE_ROOT_INDEX,
    TIMESTAMP_INDEX, VALIDATOR_LIST_DEPTH, VALIDATOR_LIST_INDEX, WITHDRAWALS_INDEX,
    WITHDRAWAL_LIST_DEPTH,
};
use crate::fork::Fork;

/// Calculator for generalized indices in the beacon block and state trees
#[derive(Debug, Clone, Copy)]
pub struct GindexCalculator;

impl GindexCalculator {
    /// Data root of a list (the left child; the right child is the length).
    const LIST_DATA_ROOT: u64 = 2;

    const fn field(depth: u32, index: usize) -> u64 {
        (1_u64 << depth) + index as u64
    }

    /// `state_root` inside a block header
    #[must_use]
    pub const fn state_root_in_header() -> u64 {
        Self::field(BLOCK_HEADER_DEPTH, STATE_ROOT_INDEX)
    }

    /// `slot` inside a block header
    #[must_use]
    pub const fn slot_in_header() -> u64 {
        Self::field(BLOCK_HEADER_DEPTH, SLOT_INDEX)
    }

    /// `validators[i]` container root, from the state root
    #[must_use]
    pub fn validator_container(validator_index: u64) -> u64 {
        Self::concat_gindices(&[
            Self::field(BEACON_STATE_DEPTH, VALIDATOR_LIST_INDEX),
            Self::LIST_DATA_ROOT,
            (1_u64 << VALIDATOR_LIST_DEPTH) + validator_index,
        ])
    }

    /// `balances` list root, from the block root
    #[must_use]
    pub fn balance_container() -> u64 {
        Self::concat_gindices(&[
            Self::state_root_in_header(),
            Self::field(BEACON_STATE_DEPTH, BALANCE_LIST_INDEX),
        ])
    }

    /// Chunk holding `balances[i]`, from the balances list root
    #[must_use]
    pub fn balance_chunk(validator_index: u64) -> u64 {
        Self::concat_gindices(&[
            Self::LIST_DATA_ROOT,
            (1_u64 << BALANCE_LIST_DEPTH) + validator_index / BALANCES_PER_CHUNK,
        ])
    }

    /// `historical_summaries[s].block_summary_root[b]`, from the state root
    #[must_use]
    pub fn historical_block_root(summary_index: u64, block_root_index: u64) -> u64 {
        Self::concat_gindices(&[
            Self::field(BEACON_STATE_DEPTH, HISTORICAL_SUMMARY_LIST_INDEX),
            Self::LIST_DATA_ROOT,
            (1_u64 << HISTORICAL_SUMMARY_LIST_DEPTH) + summary_index,
            Self::field(HISTORICAL_SUMMARY_DEPTH, BLOCK_SUMMARY_ROOT_INDEX),
            (1_u64 << BLOCK_ROOTS_DEPTH) + block_root_index,
        ])
    }

    /// `withdrawals[i]`, from the execution payload root
    #[must_use]
    pub fn withdrawal(fork: Fork, withdrawal_index: u64) -> u64 {
        Self::concat_gindices(&[
            Self::field(fork.execution_payload_depth(), WITHDRAWALS_INDEX),
            Self::LIST_DATA_ROOT,
            (1_u64 << WITHDRAWAL_LIST_DEPTH) + withdrawal_index,
        ])
    }

    /// `timestamp`, from the execution payload root
    #[must_use]
    pub const fn timestamp_in_payload(fork: Fork) -> u64 {
        Self::field(fork.execution_payload_depth(), TIMESTAMP_INDEX)
    }

    /// `body.execution_payload`, from the block root
    #[must_use]
    pub fn execution_payload_in_header() -> u64 {
        Self::concat_gindices(&[
            Self::field(BLOCK_HEADER_DEPTH, BEACON_BLOCK_BODY_ROOT_INDEX),
            Self::field(BLOCK_BODY_DEPTH, EXECUTION_PAYLOAD_INDEX),
        ])
    }

    /// Concatenate generalized indices along a path
    ///
    /// Given a sequence of gindices representing a path through nested structures,
    /// compute the final gindex from the outermost root.
    #[must_use]
    pub fn concat_gindices(gindices: &[u64]) -> u64 {
        let mut result = 1_u64;

        for &gindex in gindices {
            let depth = Self::gindex_depth(gindex);
            result = (result << depth) | (gindex ^ (1_u64 << depth));
        }

        result
    }

    /// Compute the depth (number of proof elements) for a given gindex
    #[must_use]
    pub const fn gindex_depth(gindex: u64) -> u32 {
        63 - gindex.leading_zeros()
    }

    /// Leaf index of a gindex within its own depth (the path bits).
    #[must_use]
    pub const fn leaf_index(gindex: u64) -> u64 {
        gindex ^ (1_u64 << Self::gindex_depth(gindex))
    }

    /// Validator container proof: 40 + length + state fields
    #[must_use]
    pub fn validator_proof_length() -> usize {
        Self::gindex_depth(Self::validator_container(0)) as usize
    }

    /// Balance container proof: state fields + header fields
    #[must_use]
    pub fn balance_container_proof_length() -> usize {
        Self::gindex_depth(Self::balance_container()) as usize
    }

    /// Balance chunk proof: 38 + length
    #[must_use]
    pub fn balance_proof_length() -> usize {
        Self::gindex_depth(Self::balance_chunk(0)) as usize
    }

    #[must_use]
    pub fn historical_block_root_proof_length() -> usize {
        Self::gindex_depth(Self::historical_block_root(0, 0)) as usize
    }

    #[must_use]
    pub fn withdrawal_proof_length(fork: Fork) -> usize {
        Self::gindex_depth(Self::withdrawal(fork, 0)) as usize
    }

    #[must_use]
    pub const fn slot_proof_length() -> usize {
        Self::gindex_depth(Self::slot_in_header()) as usize
    }

    /// Timestamp proof: one level per execution payload depth
    #[must_use]
    pub const fn timestamp_proof_length(fork: Fork) -> usize {
        Self::gindex_depth(Self::timestamp_in_payload(fork)) as usize
    }

    #[must_use]
    pub fn execution_payload_proof_length() -> usize {
        Self::gindex_depth(Self::execution_payload_in_header()) as usize
    }
}
