//! Collaborator interfaces.
//!
//! Each capability is its own trait so a client that cannot provide one
//! fails to compile where it is needed, rather than at first use. All
//! methods return `anyhow::Result`; the orchestrators wrap failures in
//! [`crate::orchestrator::ProverError::UpstreamUnavailable`].

use crate::beacon_state::{BeaconBlockHeader, VersionedBeaconBlock, VersionedBeaconState};
use crate::proof::{
    VerifyCheckpointProofsCallParams, VerifyStaleBalanceCallParams, VerifyWithdrawalCredentialsCallParams,
};
use crate::types::{to_hex, Gwei, Root, ValidatorIndex};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Beacon API state identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateId {
    Head,
    Finalized,
    Slot(u64),
    Root(Root),
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateId::Head => write!(f, "head"),
            StateId::Finalized => write!(f, "finalized"),
            StateId::Slot(slot) => write!(f, "{slot}"),
            StateId::Root(root) => write!(f, "{}", to_hex(root)),
        }
    }
}

/// Beacon API block identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockId {
    Head,
    Finalized,
    Slot(u64),
    Root(Root),
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockId::Head => write!(f, "head"),
            BlockId::Finalized => write!(f, "finalized"),
            BlockId::Slot(slot) => write!(f, "{slot}"),
            BlockId::Root(root) => write!(f, "{}", to_hex(root)),
        }
    }
}

/// On-chain validator status in the EigenPod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidatorStatus {
    Inactive = 0,
    Active = 1,
    Withdrawn = 2,
}

impl TryFrom<u8> for ValidatorStatus {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ValidatorStatus::Inactive),
            1 => Ok(ValidatorStatus::Active),
            2 => Ok(ValidatorStatus::Withdrawn),
            other => Err(other),
        }
    }
}

/// The EigenPod's record of one validator, keyed by pubkey hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorInfo {
    pub validator_index: ValidatorIndex,
    pub restaked_balance_gwei: Gwei,
    pub last_checkpointed_at: u64,
    pub status: ValidatorStatus,
}

/// The pod's checkpoint in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Zero when no checkpoint is active
    pub timestamp: u64,
    #[serde(with = "crate::types::hex_bytes32")]
    pub beacon_block_root: Root,
    pub proofs_remaining: u64,
    pub pod_balance_gwei: Gwei,
    pub balance_deltas_gwei: i64,
    pub prev_beacon_balance_gwei: Gwei,
}

impl Checkpoint {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.timestamp != 0 && self.beacon_block_root != [0u8; 32]
    }
}

/// EIP-4788 anchor for credential proofs: a recent execution timestamp and
/// the parent beacon block root the beacon-roots contract holds for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleAnchor {
    pub timestamp: u64,
    pub parent_block_root: Root,
}

/// A state-changing EigenPod call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodCall {
    VerifyWithdrawalCredentials(VerifyWithdrawalCredentialsCallParams),
    VerifyCheckpointProofs(VerifyCheckpointProofsCallParams),
    VerifyStaleBalance(VerifyStaleBalanceCallParams),
    StartCheckpoint { revert_if_no_balance: bool },
}

impl PodCall {
    /// Contract function name, for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            PodCall::VerifyWithdrawalCredentials(_) => "verifyWithdrawalCredentials",
            PodCall::VerifyCheckpointProofs(_) => "verifyCheckpointProofs",
            PodCall::VerifyStaleBalance(_) => "verifyStaleBalance",
            PodCall::StartCheckpoint { .. } => "startCheckpoint",
        }
    }
}

/// Hash of a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHandle(pub Root);

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_hex(&self.0))
    }
}

#[async_trait]
pub trait BeaconStateSource: Send + Sync {
    async fn get_state(&self, id: StateId) -> anyhow::Result<VersionedBeaconState>;
}

#[async_trait]
pub trait BeaconHeaderSource: Send + Sync {
    async fn get_header(&self, id: BlockId) -> anyhow::Result<BeaconBlockHeader>;
}

#[async_trait]
pub trait BeaconBlockSource: Send + Sync {
    async fn get_block(&self, id: BlockId) -> anyhow::Result<VersionedBeaconBlock>;
}

#[async_trait]
pub trait GenesisSource: Send + Sync {
    async fn genesis_time(&self) -> anyhow::Result<u64>;
}

/// Batched reads of the pod's per-validator records.
#[async_trait]
pub trait OnchainValidatorInfoProvider: Send + Sync {
    /// One record per hash, in input order.
    async fn batch_lookup(&self, pubkey_hashes: &[Root]) -> anyhow::Result<Vec<ValidatorInfo>>;
}

#[async_trait]
pub trait PodCheckpointSource: Send + Sync {
    async fn current_checkpoint(&self) -> anyhow::Result<Checkpoint>;

    async fn oracle_anchor(&self) -> anyhow::Result<OracleAnchor>;
}

/// Signs and broadcasts pod calls. Returns once the transaction is sent.
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    async fn submit(&self, call: PodCall) -> anyhow::Result<TxHandle>;
}
