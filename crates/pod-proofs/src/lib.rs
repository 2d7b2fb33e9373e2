//! # EigenPod Proof Generation Library
//!
//! Builds SSZ Merkle proofs that let an EigenPod verify beacon chain facts:
//! - withdrawal credentials of pod validators (`verifyWithdrawalCredentials`)
//! - validator balances during a checkpoint (`verifyCheckpointProofs`)
//! - historical withdrawals (`verifyAndProcessWithdrawals`)
//!
//! Proofs are computed against per-state precomputed trees
//! ([`state_roots::BeaconStateTopLevelRoots`]), so each proof costs only its
//! depth in hashes. Network access goes through the traits in [`sources`].

pub mod batch;
pub mod beacon_client;
pub mod beacon_state;
pub mod cache;
pub mod constants;
pub mod containers;
pub mod fork;
pub mod gindex;
pub mod leaf;
pub mod merkle;
pub mod orchestrator;
pub mod proof;
pub mod selector;
pub mod sources;
pub mod state_prover;
pub mod state_roots;
pub mod status;
pub mod types;
pub mod withdrawal;

pub use batch::{chunk, submit_checkpoint_proofs, submit_credential_proofs, Submission};
pub use beacon_client::{BeaconClient, BeaconClientError};
pub use beacon_state::{VersionedBeaconBlock, VersionedBeaconState};
pub use cache::{CachedStateSource, StateCache};
pub use fork::{Fork, Network};
pub use gindex::GindexCalculator;
pub use orchestrator::{
    CheckpointProofOrchestrator, CheckpointProofs, CredentialProofOrchestrator, CredentialProofs,
    ProverError, StaleBalanceProofs, ValidatorInfoCache, WithdrawalProofOrchestrator,
    WithdrawalRequest,
};
pub use proof::{
    ProofError, VerifyAndProcessWithdrawalCallParams, VerifyCheckpointProofsCallParams,
    VerifyStaleBalanceCallParams, VerifyWithdrawalCredentialsCallParams,
};
pub use selector::{Selection, ValidatorBucket};
pub use sources::*;
pub use state_prover::StateProver;
pub use status::{fetch_pod_status, PodStatus};
pub use types::*;
