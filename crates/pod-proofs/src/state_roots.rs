//! Top-level BeaconState field roots, computed once per state.
//!
//! Hashing a mainnet state is dominated by the validator and balance lists.
//! Both leaf sets are built here once, kept as [`SparseMerkleTree`]s and
//! reused by every per-validator proof taken against the same state.

use crate::beacon_state::{with_fork, Validator, VersionedBeaconState};
use crate::constants::{
    BALANCES_PER_CHUNK, BALANCE_LIST_DEPTH, BALANCE_LIST_INDEX, BEACON_STATE_DEPTH,
    BEACON_STATE_FIELD_COUNT, HISTORICAL_SUMMARY_DEPTH, HISTORICAL_SUMMARY_LIST_DEPTH,
    HISTORICAL_SUMMARY_LIST_INDEX, VALIDATOR_DEPTH, VALIDATOR_LIST_DEPTH, VALIDATOR_LIST_INDEX,
};
use crate::containers::{historical_summary_field_roots, validator_field_roots};
use crate::fork::Fork;
use crate::leaf::{hash_root, hash_u64};
use crate::merkle::{length_chunk, merkleize, mix_in_length, SparseMerkleTree};
use crate::proof::ProofError;
use crate::types::Root;
use rayon::prelude::*;
use ssz_rs::prelude::*;
use std::time::Instant;
use tracing::debug;

/// Root of one validator container.
///
/// # Errors
/// Never fails for an eight-field container; the error is kept for
/// uniformity with [`merkleize`].
pub fn validator_root(validator: &Validator) -> Result<Root, ProofError> {
    merkleize(&validator_field_roots(validator), VALIDATOR_DEPTH)
}

/// Pack `uint64` balances four to a chunk, little-endian.
#[must_use]
pub fn balance_chunks(balances: &[u64]) -> Vec<Root> {
    balances
        .chunks(BALANCES_PER_CHUNK as usize)
        .map(|group| {
            let mut chunk = [0u8; 32];
            for (i, balance) in group.iter().enumerate() {
                chunk[i * 8..(i + 1) * 8].copy_from_slice(&balance.to_le_bytes());
            }
            chunk
        })
        .collect()
}

fn root_of<T: SimpleSerialize>(value: &T) -> Result<Root, ProofError> {
    Ok(value.hash_tree_root()?.into())
}

/// The 28 top-level field roots of a beacon state plus the occupied layers
/// of its validator, balance and historical-summary lists.
#[derive(Debug, Clone)]
pub struct BeaconStateTopLevelRoots {
    fork: Fork,
    slot: u64,
    field_roots: Vec<Root>,
    state_root: Root,
    validators: SparseMerkleTree,
    balances: SparseMerkleTree,
    balance_count: usize,
    historical_summaries: SparseMerkleTree,
}

impl BeaconStateTopLevelRoots {
    /// Hash every top-level field of `state`.
    ///
    /// # Errors
    /// Fails if any field cannot be merkleized or a list exceeds its limit.
    pub fn compute(state: &VersionedBeaconState) -> Result<Self, ProofError> {
        let started = Instant::now();

        let validator_leaves = state
            .validators()
            .par_iter()
            .map(validator_root)
            .collect::<Result<Vec<_>, _>>()?;
        let validators = SparseMerkleTree::new(validator_leaves, VALIDATOR_LIST_DEPTH)?;
        let validators_root = mix_in_length(validators.root(), validators.leaf_count());

        let balance_count = state.balances().len();
        let balances = SparseMerkleTree::new(balance_chunks(state.balances()), BALANCE_LIST_DEPTH)?;
        let balances_root = mix_in_length(balances.root(), balance_count);

        let summary_leaves = state
            .historical_summaries()
            .iter()
            .map(|summary| merkleize(&historical_summary_field_roots(summary), HISTORICAL_SUMMARY_DEPTH))
            .collect::<Result<Vec<_>, _>>()?;
        let historical_summaries =
            SparseMerkleTree::new(summary_leaves, HISTORICAL_SUMMARY_LIST_DEPTH)?;
        let historical_summaries_root =
            mix_in_length(historical_summaries.root(), historical_summaries.leaf_count());

        let field_roots: Vec<Root> = with_fork!(VersionedBeaconState, state, |s| vec![
            hash_u64(s.genesis_time),
            hash_root(s.genesis_validators_root),
            hash_u64(s.slot),
            root_of(&s.fork)?,
            root_of(&s.latest_block_header)?,
            root_of(&s.block_roots)?,
            root_of(&s.state_roots)?,
            root_of(&s.historical_roots)?,
            root_of(&s.eth1_data)?,
            root_of(&s.eth1_data_votes)?,
            hash_u64(s.eth1_deposit_index),
            validators_root,
            balances_root,
            root_of(&s.randao_mixes)?,
            root_of(&s.slashings)?,
            root_of(&s.previous_epoch_participation)?,
            root_of(&s.current_epoch_participation)?,
            root_of(&s.justification_bits)?,
            root_of(&s.previous_justified_checkpoint)?,
            root_of(&s.current_justified_checkpoint)?,
            root_of(&s.finalized_checkpoint)?,
            root_of(&s.inactivity_scores)?,
            root_of(&s.current_sync_committee)?,
            root_of(&s.next_sync_committee)?,
            root_of(&s.latest_execution_payload_header)?,
            hash_u64(s.next_withdrawal_index),
            hash_u64(s.next_withdrawal_validator_index),
            historical_summaries_root,
        ]);
        debug_assert_eq!(field_roots.len(), BEACON_STATE_FIELD_COUNT);

        let state_root = merkleize(&field_roots, BEACON_STATE_DEPTH)?;

        debug!(
            slot = state.slot(),
            validators = validators.leaf_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Computed top-level state roots"
        );

        Ok(Self {
            fork: state.fork(),
            slot: state.slot(),
            field_roots,
            state_root,
            validators,
            balances,
            balance_count,
            historical_summaries,
        })
    }

    #[must_use]
    pub fn fork(&self) -> Fork {
        self.fork
    }

    #[must_use]
    pub fn slot(&self) -> u64 {
        self.slot
    }

    /// Hash tree root of the whole state.
    #[must_use]
    pub fn state_root(&self) -> Root {
        self.state_root
    }

    #[must_use]
    pub fn field_roots(&self) -> &[Root] {
        &self.field_roots
    }

    /// Root of top-level field `index`.
    ///
    /// # Errors
    /// Fails for an index past the last field.
    pub fn field_root(&self, index: usize) -> Result<Root, ProofError> {
        self.field_roots
            .get(index)
            .copied()
            .ok_or(ProofError::IndexOutOfRange {
                what: "state field",
                index: index as u64,
                len: self.field_roots.len() as u64,
            })
    }

    /// Sibling path from top-level field `index` to the state root.
    ///
    /// # Errors
    /// Fails for an index past the last field.
    pub fn prove_field(&self, index: usize) -> Result<Vec<Root>, ProofError> {
        self.field_root(index)?;
        let tree = SparseMerkleTree::new(self.field_roots.clone(), BEACON_STATE_DEPTH)?;
        tree.prove(index as u64)
    }

    /// `balances` field root (data root mixed with the length).
    #[must_use]
    pub fn balances_root(&self) -> Root {
        self.field_roots[BALANCE_LIST_INDEX]
    }

    #[must_use]
    pub fn validators_root(&self) -> Root {
        self.field_roots[VALIDATOR_LIST_INDEX]
    }

    #[must_use]
    pub fn historical_summaries_root(&self) -> Root {
        self.field_roots[HISTORICAL_SUMMARY_LIST_INDEX]
    }

    /// Validator container root at `validator_index`.
    ///
    /// # Errors
    /// Fails if the validator does not exist.
    pub fn validator_leaf(&self, validator_index: u64) -> Result<Root, ProofError> {
        self.check_validator(validator_index)?;
        Ok(self.validators.leaf(validator_index))
    }

    /// `validators[i]` up to the validators list root: 40 siblings then the
    /// length chunk.
    ///
    /// # Errors
    /// Fails if the validator does not exist.
    pub fn prove_validator_in_list(&self, validator_index: u64) -> Result<Vec<Root>, ProofError> {
        self.check_validator(validator_index)?;
        let mut proof = self.validators.prove(validator_index)?;
        proof.push(length_chunk(self.validators.leaf_count()));
        Ok(proof)
    }

    /// The chunk packing `balances[i]` with its three neighbours.
    ///
    /// # Errors
    /// Fails if the index has no balance.
    pub fn balance_chunk(&self, validator_index: u64) -> Result<Root, ProofError> {
        self.check_balance(validator_index)?;
        Ok(self.balances.leaf(validator_index / BALANCES_PER_CHUNK))
    }

    /// Balance chunk up to the balances list root: 38 siblings then the
    /// length chunk.
    ///
    /// # Errors
    /// Fails if the index has no balance.
    pub fn prove_balance_chunk(&self, validator_index: u64) -> Result<Vec<Root>, ProofError> {
        self.check_balance(validator_index)?;
        let mut proof = self.balances.prove(validator_index / BALANCES_PER_CHUNK)?;
        proof.push(length_chunk(self.balance_count));
        Ok(proof)
    }

    /// `historical_summaries[i]` up to the list root: 24 siblings then the
    /// length chunk.
    ///
    /// # Errors
    /// Fails if the summary does not exist.
    pub fn prove_historical_summary(&self, summary_index: u64) -> Result<Vec<Root>, ProofError> {
        let len = self.historical_summaries.leaf_count() as u64;
        if summary_index >= len {
            return Err(ProofError::IndexOutOfRange {
                what: "historical summary",
                index: summary_index,
                len,
            });
        }
        let mut proof = self.historical_summaries.prove(summary_index)?;
        proof.push(length_chunk(self.historical_summaries.leaf_count()));
        Ok(proof)
    }

    fn check_validator(&self, validator_index: u64) -> Result<(), ProofError> {
        let len = self.validators.leaf_count() as u64;
        if validator_index >= len {
            return Err(ProofError::IndexOutOfRange {
                what: "validator",
                index: validator_index,
                len,
            });
        }
        Ok(())
    }

    fn check_balance(&self, validator_index: u64) -> Result<(), ProofError> {
        let len = self.balance_count as u64;
        if validator_index >= len {
            return Err(ProofError::IndexOutOfRange {
                what: "balance",
                index: validator_index,
                len,
            });
        }
        Ok(())
    }
}
