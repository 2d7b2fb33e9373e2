//! Composite proof generation against one beacon state.
//!
//! Every proof here is a concatenation of sibling paths, innermost first:
//! element in list, length chunk, list field in state, and (for proofs
//! rooted at a block) state root in header. The top-level roots and the
//! list layers are computed once in [`BeaconStateTopLevelRoots`]; each
//! per-validator proof is then a constant number of layer lookups.

use crate::beacon_state::{BeaconBlockHeader, VersionedBeaconState};
use crate::constants::{
    BALANCE_LIST_INDEX, BLOCK_HEADER_DEPTH, BLOCK_ROOTS_DEPTH, HISTORICAL_SUMMARY_LIST_INDEX,
    STATE_ROOT_INDEX, VALIDATOR_LIST_INDEX,
};
use crate::containers::{header_field_roots, validator_field_roots};
use crate::gindex::GindexCalculator;
use crate::leaf::pubkey_hash;
use crate::merkle::SparseMerkleTree;
use crate::proof::{
    ensure_length, BalanceProof, ProofError, StateRootProof, ValidatorBalancesRootProof,
    ValidatorProof, VerifyCheckpointProofsCallParams, VerifyStaleBalanceCallParams,
    VerifyWithdrawalCredentialsCallParams,
};
use crate::state_roots::BeaconStateTopLevelRoots;
use crate::types::{Root, ValidatorIndex};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument};

/// Proof of one validator container against the state root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorFieldsProof {
    pub validator_index: ValidatorIndex,
    /// The eight field roots, in container order
    pub fields: Vec<Root>,
    pub proof: Vec<Root>,
}

/// Sibling path for `field_index` of a block header.
///
/// # Errors
/// Fails if the field index is outside the header.
pub fn prove_header_field(header: &BeaconBlockHeader, field_index: usize) -> Result<Vec<Root>, ProofError> {
    let tree = SparseMerkleTree::new(header_field_roots(header), BLOCK_HEADER_DEPTH)?;
    tree.prove(field_index as u64)
}

/// Proof generator bound to a single beacon state.
///
/// Cheap to clone; the state and its roots are shared.
#[derive(Debug, Clone)]
pub struct StateProver {
    state: Arc<VersionedBeaconState>,
    roots: Arc<BeaconStateTopLevelRoots>,
}

impl StateProver {
    /// Hash `state` and prepare it for proving.
    ///
    /// # Errors
    /// Fails if the state cannot be merkleized.
    pub fn new(state: Arc<VersionedBeaconState>) -> Result<Self, ProofError> {
        let roots = Arc::new(BeaconStateTopLevelRoots::compute(&state)?);
        Ok(Self { state, roots })
    }

    #[must_use]
    pub fn state(&self) -> &VersionedBeaconState {
        &self.state
    }

    #[must_use]
    pub fn roots(&self) -> &BeaconStateTopLevelRoots {
        &self.roots
    }

    /// The header must commit to this state.
    fn check_header(&self, header: &BeaconBlockHeader) -> Result<(), ProofError> {
        if header.state_root == self.roots.state_root() {
            Ok(())
        } else {
            Err(ProofError::MalformedState(format!(
                "header at slot {} commits to state root {}, state hashes to {}",
                header.slot,
                crate::types::to_hex(&header.state_root),
                crate::types::to_hex(&self.roots.state_root()),
            )))
        }
    }

    /// `state_root` (header field 3) against the block root.
    ///
    /// # Errors
    /// Fails if `header` does not commit to this state.
    pub fn prove_state_root(&self, header: &BeaconBlockHeader) -> Result<StateRootProof, ProofError> {
        self.check_header(header)?;
        let proof = prove_header_field(header, STATE_ROOT_INDEX)?;
        ensure_length("state root", &proof, BLOCK_HEADER_DEPTH as usize)?;
        Ok(StateRootProof {
            beacon_state_root: self.roots.state_root(),
            proof,
        })
    }

    /// `validators[i]` against the state root, with the validator's fields.
    ///
    /// # Errors
    /// Fails if the validator does not exist.
    pub fn prove_validator_fields(
        &self,
        validator_index: ValidatorIndex,
    ) -> Result<ValidatorFieldsProof, ProofError> {
        let validator = usize::try_from(validator_index)
            .ok()
            .and_then(|i| self.state.validators().get(i))
            .ok_or(ProofError::IndexOutOfRange {
                what: "validator",
                index: validator_index,
                len: self.state.validators().len() as u64,
            })?;

        let mut proof = self.roots.prove_validator_in_list(validator_index)?;
        proof.extend(self.roots.prove_field(VALIDATOR_LIST_INDEX)?);
        ensure_length("validator fields", &proof, GindexCalculator::validator_proof_length())?;

        Ok(ValidatorFieldsProof {
            validator_index,
            fields: validator_field_roots(validator),
            proof,
        })
    }

    /// `balances` list root against the block root.
    ///
    /// # Errors
    /// Fails if `header` does not commit to this state.
    pub fn prove_balance_container(
        &self,
        header: &BeaconBlockHeader,
    ) -> Result<ValidatorBalancesRootProof, ProofError> {
        self.check_header(header)?;
        let mut proof = self.roots.prove_field(BALANCE_LIST_INDEX)?;
        proof.extend(prove_header_field(header, STATE_ROOT_INDEX)?);
        ensure_length(
            "balance container",
            &proof,
            GindexCalculator::balance_container_proof_length(),
        )?;
        Ok(ValidatorBalancesRootProof {
            balances_root: self.roots.balances_root(),
            proof,
        })
    }

    /// Balance chunk holding `balances[i]` against the balances list root.
    ///
    /// # Errors
    /// Fails if the validator has no balance.
    pub fn prove_balance(&self, validator_index: ValidatorIndex) -> Result<BalanceProof, ProofError> {
        let validator = usize::try_from(validator_index)
            .ok()
            .and_then(|i| self.state.validators().get(i))
            .ok_or(ProofError::IndexOutOfRange {
                what: "validator",
                index: validator_index,
                len: self.state.validators().len() as u64,
            })?;

        let proof = self.roots.prove_balance_chunk(validator_index)?;
        ensure_length("balance", &proof, GindexCalculator::balance_proof_length())?;

        Ok(BalanceProof {
            pubkey_hash: pubkey_hash(&validator.pubkey_bytes()),
            balance_root: self.roots.balance_chunk(validator_index)?,
            proof,
        })
    }

    /// `historical_summaries[s].block_summary_root[b]` against this state's root.
    ///
    /// `block_roots` is the archived `block_roots` vector of the state at the
    /// end of the summarized period; it must hash to the summary's
    /// `block_summary_root`.
    ///
    /// # Errors
    /// Fails if the summary does not exist, `block_roots` is not the
    /// archived vector, or an index is out of range.
    pub fn prove_historical_block_root(
        &self,
        summary_index: u64,
        block_roots: &[Root],
        block_root_index: u64,
    ) -> Result<Vec<Root>, ProofError> {
        let summaries = self.state.historical_summaries();
        let summary = usize::try_from(summary_index)
            .ok()
            .and_then(|i| summaries.get(i))
            .ok_or(ProofError::IndexOutOfRange {
                what: "historical summary",
                index: summary_index,
                len: summaries.len() as u64,
            })?;

        let block_roots_tree = SparseMerkleTree::new(block_roots.to_vec(), BLOCK_ROOTS_DEPTH)?;
        if block_roots_tree.root() != summary.block_summary_root {
            return Err(ProofError::MalformedState(format!(
                "block roots do not match historical summary {summary_index}"
            )));
        }
        if block_root_index >= block_roots.len() as u64 {
            return Err(ProofError::IndexOutOfRange {
                what: "block root",
                index: block_root_index,
                len: block_roots.len() as u64,
            });
        }

        let mut proof = block_roots_tree.prove(block_root_index)?;
        proof.push(summary.state_summary_root);
        proof.extend(self.roots.prove_historical_summary(summary_index)?);
        proof.extend(self.roots.prove_field(HISTORICAL_SUMMARY_LIST_INDEX)?);
        ensure_length(
            "historical block root",
            &proof,
            GindexCalculator::historical_block_root_proof_length(),
        )?;
        Ok(proof)
    }

    /// Build `verifyWithdrawalCredentials` parameters for `validator_indices`.
    ///
    /// Proofs are built in parallel; output position `i` always belongs to
    /// `validator_indices[i]`. The first failure aborts the batch.
    ///
    /// # Errors
    /// Fails if the header does not commit to this state or any validator
    /// cannot be proven.
    #[instrument(skip(self, header, validator_indices), fields(validators = validator_indices.len()))]
    pub fn prove_validator_containers(
        &self,
        header: &BeaconBlockHeader,
        validator_indices: &[ValidatorIndex],
        beacon_timestamp: u64,
    ) -> Result<VerifyWithdrawalCredentialsCallParams, ProofError> {
        let started = Instant::now();
        let state_root_proof = self.prove_state_root(header)?;

        let proofs = validator_indices
            .par_iter()
            .map(|&index| self.prove_validator_fields(index))
            .collect::<Result<Vec<_>, _>>()?;

        let (validator_fields_proofs, validator_fields): (Vec<_>, Vec<_>) =
            proofs.into_iter().map(|p| (p.proof, p.fields)).unzip();

        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Built validator container proofs"
        );

        Ok(VerifyWithdrawalCredentialsCallParams {
            beacon_timestamp,
            state_root_proof,
            validator_indices: validator_indices.to_vec(),
            validator_fields_proofs,
            validator_fields,
        })
    }

    /// Build `verifyStaleBalance` parameters for one validator.
    ///
    /// # Errors
    /// Fails if the header does not commit to this state or the validator
    /// is out of range.
    pub fn prove_stale_balance(
        &self,
        header: &BeaconBlockHeader,
        validator_index: ValidatorIndex,
        beacon_timestamp: u64,
    ) -> Result<VerifyStaleBalanceCallParams, ProofError> {
        let state_root_proof = self.prove_state_root(header)?;
        let validator = self.prove_validator_fields(validator_index)?;
        Ok(VerifyStaleBalanceCallParams {
            beacon_timestamp,
            state_root_proof,
            validator_index,
            validator_proof: ValidatorProof {
                validator_fields: validator.fields,
                proof: validator.proof,
            },
        })
    }

    /// Build `verifyCheckpointProofs` parameters for `validator_indices`.
    ///
    /// # Errors
    /// Fails if the header does not commit to this state or any validator
    /// cannot be proven.
    #[instrument(skip(self, header, validator_indices), fields(validators = validator_indices.len()))]
    pub fn prove_checkpoint_proofs(
        &self,
        header: &BeaconBlockHeader,
        validator_indices: &[ValidatorIndex],
    ) -> Result<VerifyCheckpointProofsCallParams, ProofError> {
        let started = Instant::now();
        let validator_balances_root_proof = self.prove_balance_container(header)?;

        let balance_proofs = validator_indices
            .par_iter()
            .map(|&index| self.prove_balance(index))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Built balance proofs"
        );

        Ok(VerifyCheckpointProofsCallParams {
            validator_balances_root_proof,
            balance_proofs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon_state::HistoricalSummary;
    use crate::merkle::{compute_root, merkleize};
    use crate::state_roots::tests::sample_deneb_state;
    use ssz_rs::prelude::*;

    fn node(root: &Root) -> Node {
        Node::try_from(root.as_slice()).unwrap()
    }

    fn assert_branch(leaf: Root, proof: &[Root], gindex: u64, root: Root) {
        let branch: Vec<Node> = proof.iter().map(node).collect();
        ssz_rs::proofs::is_valid_merkle_branch_for_generalized_index(
            node(&leaf),
            &branch,
            gindex as usize,
            node(&root),
        )
        .expect("proof should verify");
    }

    fn prover_and_header(validators: u8) -> (StateProver, BeaconBlockHeader) {
        let state = Arc::new(VersionedBeaconState::from(sample_deneb_state(validators)));
        let prover = StateProver::new(state).unwrap();
        let header = BeaconBlockHeader {
            slot: 9_000_000,
            proposer_index: 12,
            parent_root: [0x0a; 32],
            state_root: prover.roots().state_root(),
            body_root: [0x0b; 32],
        };
        (prover, header)
    }

    fn block_root(header: &BeaconBlockHeader) -> Root {
        header.hash_tree_root().unwrap().into()
    }

    #[test]
    fn test_state_root_proof_verifies_against_block_root() {
        let (prover, header) = prover_and_header(4);
        let proof = prover.prove_state_root(&header).unwrap();
        assert_eq!(proof.proof.len(), 3);
        assert_branch(
            proof.beacon_state_root,
            &proof.proof,
            GindexCalculator::state_root_in_header(),
            block_root(&header),
        );
    }

    #[test]
    fn test_header_for_other_state_is_rejected() {
        let (prover, mut header) = prover_and_header(4);
        header.state_root = [0xff; 32];
        assert!(matches!(
            prover.prove_state_root(&header),
            Err(ProofError::MalformedState(_))
        ));
        assert!(prover.prove_balance_container(&header).is_err());
    }

    #[test]
    fn test_validator_fields_proof_verifies_against_state_root() {
        let (prover, _) = prover_and_header(7);
        let proof = prover.prove_validator_fields(3).unwrap();

        assert_eq!(proof.proof.len(), 46);
        assert_eq!(proof.fields.len(), 8);

        let state = prover.state();
        let validator_root: Root = state.validators()[3].hash_tree_root().unwrap().into();
        assert_eq!(merkleize(&proof.fields, 3).unwrap(), validator_root);
        assert_branch(
            validator_root,
            &proof.proof,
            GindexCalculator::validator_container(3),
            state.hash_tree_root().unwrap(),
        );
    }

    #[test]
    fn test_validator_out_of_range() {
        let (prover, _) = prover_and_header(2);
        assert!(matches!(
            prover.prove_validator_fields(2),
            Err(ProofError::IndexOutOfRange { index: 2, len: 2, .. })
        ));
        assert!(prover.prove_balance(9).is_err());
    }

    #[test]
    fn test_balance_proofs_verify_against_block_root() {
        let (prover, header) = prover_and_header(9);
        let container = prover.prove_balance_container(&header).unwrap();
        assert_eq!(container.proof.len(), 8);
        assert_branch(
            container.balances_root,
            &container.proof,
            GindexCalculator::balance_container(),
            block_root(&header),
        );

        for index in [0u64, 3, 4, 8] {
            let balance = prover.prove_balance(index).unwrap();
            assert_eq!(balance.proof.len(), 39);
            assert_branch(
                balance.balance_root,
                &balance.proof,
                GindexCalculator::balance_chunk(index),
                container.balances_root,
            );
            let offset = (index % 4) as usize * 8;
            let packed = u64::from_le_bytes(balance.balance_root[offset..offset + 8].try_into().unwrap());
            assert_eq!(packed, 32_000_000_000 + index);
        }
    }

    #[test]
    fn test_historical_block_root_proof() {
        let mut block_roots = vec![[0u8; 32]; 8192];
        block_roots[100] = [0xbe; 32];
        block_roots[8191] = [0xef; 32];
        let block_summary_root = merkleize(&block_roots, 13).unwrap();

        let mut state = sample_deneb_state(2);
        state.historical_summaries.push(HistoricalSummary {
            block_summary_root,
            state_summary_root: [0x55; 32],
        });
        let state = Arc::new(VersionedBeaconState::from(state));
        let prover = StateProver::new(state.clone()).unwrap();

        let proof = prover.prove_historical_block_root(3, &block_roots, 100).unwrap();
        assert_eq!(proof.len(), 44);
        assert_eq!(proof[13], [0x55; 32]);
        assert_branch(
            [0xbe; 32],
            &proof,
            GindexCalculator::historical_block_root(3, 100),
            state.hash_tree_root().unwrap(),
        );
        assert_eq!(
            compute_root(
                [0xbe; 32],
                &proof,
                GindexCalculator::leaf_index(GindexCalculator::historical_block_root(3, 100))
            ),
            prover.roots().state_root()
        );
    }

    #[test]
    fn test_historical_block_root_rejects_wrong_vector() {
        let (prover, _) = prover_and_header(2);
        let block_roots = vec![[0x01; 32]; 8192];
        assert!(matches!(
            prover.prove_historical_block_root(0, &block_roots, 0),
            Err(ProofError::MalformedState(_))
        ));
        assert!(matches!(
            prover.prove_historical_block_root(10, &block_roots, 0),
            Err(ProofError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_batch_outputs_align_with_indices() {
        let (prover, header) = prover_and_header(12);
        let indices = vec![11, 0, 7, 3];
        let params = prover.prove_validator_containers(&header, &indices, 1_700_000_000).unwrap();

        assert_eq!(params.validator_indices, indices);
        assert_eq!(params.beacon_timestamp, 1_700_000_000);
        for (i, index) in indices.iter().enumerate() {
            let single = prover.prove_validator_fields(*index).unwrap();
            assert_eq!(params.validator_fields_proofs[i], single.proof);
            assert_eq!(params.validator_fields[i], single.fields);
        }

        let checkpoint = prover.prove_checkpoint_proofs(&header, &indices).unwrap();
        for (i, index) in indices.iter().enumerate() {
            assert_eq!(checkpoint.balance_proofs[i], prover.prove_balance(*index).unwrap());
        }
    }

    #[test]
    fn test_stale_balance_params_verify_against_block_root() {
        let (prover, header) = prover_and_header(6);
        let params = prover.prove_stale_balance(&header, 4, 1_700_000_012).unwrap();

        assert_eq!(params.beacon_timestamp, 1_700_000_012);
        assert_eq!(params.validator_index, 4);
        assert_eq!(params.state_root_proof, prover.prove_state_root(&header).unwrap());

        let validator_root = merkleize(&params.validator_proof.validator_fields, 3).unwrap();
        assert_branch(
            validator_root,
            &params.validator_proof.proof,
            GindexCalculator::validator_container(4),
            params.state_root_proof.beacon_state_root,
        );
        assert!(prover.prove_stale_balance(&header, 6, 0).is_err());
    }

    #[test]
    fn test_proving_is_idempotent() {
        let (prover, header) = prover_and_header(5);
        let first = prover.prove_checkpoint_proofs(&header, &[1, 4]).unwrap();
        let second = prover.prove_checkpoint_proofs(&header, &[1, 4]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_batch_fails_on_any_bad_index() {
        let (prover, header) = prover_and_header(3);
        assert!(prover.prove_validator_containers(&header, &[0, 99, 1], 0).is_err());
    }
}
