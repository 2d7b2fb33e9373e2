//! Proof bundles handed to the EigenPod contract.
//!
//! These structures are the wire contract with the on-chain verifier: field
//! order, proof order and proof lengths must not change.
//! 1. `verifyWithdrawalCredentials`: state root proof plus per-validator field proofs
//! 2. `verifyCheckpointProofs`: balance container proof plus per-validator balance proofs
//! 3. `verifyAndProcessWithdrawals`: withdrawal proofs against historical summaries
//! 4. `verifyStaleBalance`: state root proof plus one slashed validator's field proof

use crate::fork::Fork;
use crate::types::{hex_bytes32, nested_proof_vec_serde, proof_vec_serde, Root, ValidatorIndex};
use serde::{Deserialize, Serialize};
use ssz_rs::prelude::MerkleizationError;
use thiserror::Error;

/// Errors that can occur during proof generation.
#[derive(Error, Debug)]
pub enum ProofError {
    #[error("Malformed beacon state: {0}")]
    MalformedState(String),

    #[error("{what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: u64,
        len: u64,
    },

    #[error("Unsupported fork for chain {chain_id} at slot {slot}")]
    UnsupportedFork { chain_id: u64, slot: u64 },

    #[error("{what} proof has {actual} elements, expected {expected}")]
    ProofLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Chunk size must be at least 1")]
    InvalidChunkSize,

    #[error("Validator {validator_index} has no withdrawal in block at slot {slot}")]
    WithdrawalNotFound { validator_index: u64, slot: u64 },

    #[error("Withdrawal at slot {withdrawal_slot} is not provable against oracle slot {oracle_slot}")]
    NotProvable { withdrawal_slot: u64, oracle_slot: u64 },

    #[error("SSZ merkleization error: {0}")]
    Merkleization(#[from] MerkleizationError),
}

/// Reject `proof` unless it has exactly `expected` elements.
///
/// # Errors
/// Returns [`ProofError::ProofLength`] on mismatch.
pub fn ensure_length(what: &'static str, proof: &[Root], expected: usize) -> Result<(), ProofError> {
    if proof.len() == expected {
        Ok(())
    } else {
        Err(ProofError::ProofLength {
            what,
            expected,
            actual: proof.len(),
        })
    }
}

/// Concatenate proof elements into the `bytes` form the contract takes.
#[must_use]
pub fn proof_to_bytes(proof: &[Root]) -> Vec<u8> {
    proof.iter().flat_map(|node| node.iter().copied()).collect()
}

/// Proof of a beacon state root against its block header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRootProof {
    #[serde(with = "hex_bytes32")]
    pub beacon_state_root: Root,

    #[serde(with = "proof_vec_serde")]
    pub proof: Vec<Root>,
}

/// Parameters for `EigenPod.verifyWithdrawalCredentials`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyWithdrawalCredentialsCallParams {
    /// Timestamp whose EIP-4788 parent root is the proven block
    pub beacon_timestamp: u64,

    pub state_root_proof: StateRootProof,

    pub validator_indices: Vec<ValidatorIndex>,

    /// `validator_fields_proofs[i]` proves `validator_fields[i]` for `validator_indices[i]`
    #[serde(with = "nested_proof_vec_serde")]
    pub validator_fields_proofs: Vec<Vec<Root>>,

    #[serde(with = "nested_proof_vec_serde")]
    pub validator_fields: Vec<Vec<Root>>,
}

/// One validator's fields with their proof against the state root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorProof {
    #[serde(with = "proof_vec_serde")]
    pub validator_fields: Vec<Root>,

    #[serde(with = "proof_vec_serde")]
    pub proof: Vec<Root>,
}

/// Parameters for `EigenPod.verifyStaleBalance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyStaleBalanceCallParams {
    pub beacon_timestamp: u64,
    pub state_root_proof: StateRootProof,
    pub validator_index: ValidatorIndex,
    pub validator_proof: ValidatorProof,
}

/// Balance container root with its proof against the block root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorBalancesRootProof {
    #[serde(with = "hex_bytes32")]
    pub balances_root: Root,

    #[serde(with = "proof_vec_serde")]
    pub proof: Vec<Root>,
}

/// One validator's balance chunk with its proof against the balance container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceProof {
    #[serde(with = "hex_bytes32")]
    pub pubkey_hash: Root,

    /// The 32-byte chunk that packs this validator's balance with three neighbours
    #[serde(with = "hex_bytes32")]
    pub balance_root: Root,

    #[serde(with = "proof_vec_serde")]
    pub proof: Vec<Root>,
}

/// Parameters for `EigenPod.verifyCheckpointProofs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCheckpointProofsCallParams {
    pub validator_balances_root_proof: ValidatorBalancesRootProof,
    pub balance_proofs: Vec<BalanceProof>,
}

/// Oracle state root proof used by withdrawal proofs, with the oracle slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalStateRootProof {
    #[serde(with = "hex_bytes32")]
    pub beacon_state_root: Root,

    #[serde(with = "proof_vec_serde")]
    pub state_root_proof: Vec<Root>,

    pub slot: u64,

    #[serde(with = "proof_vec_serde")]
    pub slot_root_proof: Vec<Root>,
}

/// Proof of a single withdrawal against the oracle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalProof {
    #[serde(with = "proof_vec_serde")]
    pub withdrawal_proof: Vec<Root>,

    #[serde(with = "proof_vec_serde")]
    pub slot_proof: Vec<Root>,

    #[serde(with = "proof_vec_serde")]
    pub execution_payload_proof: Vec<Root>,

    #[serde(with = "proof_vec_serde")]
    pub timestamp_proof: Vec<Root>,

    #[serde(with = "proof_vec_serde")]
    pub historical_summary_block_root_proof: Vec<Root>,

    pub block_root_index: u64,
    pub historical_summary_index: u64,
    pub withdrawal_index: u64,

    #[serde(with = "hex_bytes32")]
    pub block_root: Root,

    #[serde(with = "hex_bytes32")]
    pub slot_root: Root,

    #[serde(with = "hex_bytes32")]
    pub timestamp_root: Root,

    #[serde(with = "hex_bytes32")]
    pub execution_payload_root: Root,

    /// Layout used for the withdrawal block's execution payload
    pub fork: Fork,
}

/// Parameters for `EigenPod.verifyAndProcessWithdrawals`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyAndProcessWithdrawalCallParams {
    pub oracle_timestamp: u64,
    pub state_root_proof: WithdrawalStateRootProof,
    pub withdrawal_proofs: Vec<WithdrawalProof>,

    #[serde(with = "nested_proof_vec_serde")]
    pub validator_fields_proofs: Vec<Vec<Root>>,

    #[serde(with = "nested_proof_vec_serde")]
    pub validator_fields: Vec<Vec<Root>>,

    #[serde(with = "nested_proof_vec_serde")]
    pub withdrawal_fields: Vec<Vec<Root>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proof_to_bytes_concatenates_in_order() {
        let bytes = proof_to_bytes(&[[0xaa; 32], [0xbb; 32]]);
        assert_eq!(bytes.len(), 64);
        assert_eq!(bytes[0], 0xaa);
        assert_eq!(bytes[32], 0xbb);
    }

    #[test]
    fn test_ensure_length() {
        assert!(ensure_length("state root", &[[0u8; 32]; 3], 3).is_ok());
        let err = ensure_length("state root", &[[0u8; 32]; 2], 3).unwrap_err();
        assert!(matches!(
            err,
            ProofError::ProofLength {
                expected: 3,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_checkpoint_params_json_uses_hex_and_camel_case() {
        let params = VerifyCheckpointProofsCallParams {
            validator_balances_root_proof: ValidatorBalancesRootProof {
                balances_root: [0x11; 32],
                proof: vec![[0x22; 32]],
            },
            balance_proofs: vec![BalanceProof {
                pubkey_hash: [0x33; 32],
                balance_root: [0x44; 32],
                proof: vec![[0x55; 32], [0x66; 32]],
            }],
        };

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(
            json["validatorBalancesRootProof"]["balancesRoot"],
            format!("0x{}", "11".repeat(32))
        );
        assert_eq!(json["balanceProofs"][0]["proof"][1], format!("0x{}", "66".repeat(32)));

        let decoded: VerifyCheckpointProofsCallParams = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, params);
    }

    #[test]
    fn test_credential_params_reject_short_hex() {
        let json = serde_json::json!({
            "beaconTimestamp": 1,
            "stateRootProof": { "beaconStateRoot": "0x01", "proof": [] },
            "validatorIndices": [],
            "validatorFieldsProofs": [],
            "validatorFields": []
        });
        assert!(serde_json::from_value::<VerifyWithdrawalCredentialsCallParams>(json).is_err());
    }
}
