//! EigenPod contract adapter
//!
//! Reads checkpoint and validator state from the pod and submits proof
//! transactions through alloy.

use alloy::{
    eips::BlockNumberOrTag,
    network::EthereumWallet,
    primitives::{aliases::U40, Address, Bytes, FixedBytes, U256},
    providers::{Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
    sol,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{stream, Future, StreamExt, TryStreamExt};
use pod_proofs::proof::{
    proof_to_bytes, BalanceProof, StateRootProof, ValidatorBalancesRootProof, ValidatorProof,
    VerifyCheckpointProofsCallParams, VerifyWithdrawalCredentialsCallParams,
};
use pod_proofs::{
    Checkpoint, OnchainValidatorInfoProvider, OracleAnchor, PodCall, PodCheckpointSource, Root,
    TransactionSubmitter, TxHandle, ValidatorInfo, ValidatorStatus,
};
use tracing::{debug, info, instrument};

/// In-flight `validatorPubkeyHashToInfo` reads per lookup
const INFO_LOOKUP_CONCURRENCY: usize = 16;

sol! {
    #[sol(rpc)]
    contract EigenPod {
        struct Checkpoint {
            bytes32 beaconBlockRoot;
            uint24 proofsRemaining;
            uint64 podBalanceGwei;
            int64 balanceDeltasGwei;
            uint64 prevBeaconBalanceGwei;
        }

        struct ValidatorInfo {
            uint64 validatorIndex;
            uint64 restakedBalanceGwei;
            uint64 lastCheckpointedAt;
            uint8 status;
        }

        struct StateRootProof {
            bytes32 beaconStateRoot;
            bytes proof;
        }

        struct BalanceContainerProof {
            bytes32 balanceContainerRoot;
            bytes proof;
        }

        struct BalanceProof {
            bytes32 pubkeyHash;
            bytes32 balanceRoot;
            bytes proof;
        }

        struct ValidatorProof {
            bytes32[] validatorFields;
            bytes proof;
        }

        function currentCheckpoint() external view returns (Checkpoint memory);
        function currentCheckpointTimestamp() external view returns (uint64);
        function validatorPubkeyHashToInfo(bytes32 validatorPubkeyHash) external view returns (ValidatorInfo memory);
        function getParentBlockRoot(uint64 timestamp) external view returns (bytes32);

        function startCheckpoint(bool revertIfNoBalance) external;
        function verifyWithdrawalCredentials(
            uint64 beaconTimestamp,
            StateRootProof calldata stateRootProof,
            uint40[] calldata validatorIndices,
            bytes[] calldata validatorFieldsProofs,
            bytes32[][] calldata validatorFields
        ) external;
        function verifyCheckpointProofs(
            BalanceContainerProof calldata balanceContainerProof,
            BalanceProof[] calldata proofs
        ) external;
        function verifyStaleBalance(
            uint64 beaconTimestamp,
            StateRootProof calldata stateRootProof,
            ValidatorProof calldata proof
        ) external;
    }
}

/// Pod client configuration
#[derive(Debug, Clone)]
pub struct EigenPodConfig {
    /// Execution RPC URL
    pub rpc_url: String,
    /// EigenPod address
    pub pod_address: String,
    /// Private key for signing transactions (hex, `0x` optional)
    pub sender_key: Option<String>,
    /// Max gas price in Gwei
    pub max_gas_price_gwei: u64,
    /// Wait for confirmations (0 = don't wait)
    pub confirmations: u64,
}

/// Reads and writes one EigenPod.
pub struct EigenPodClient {
    config: EigenPodConfig,
    rpc_url: reqwest::Url,
    pod_address: Address,
    signer: Option<PrivateKeySigner>,
}

impl EigenPodClient {
    /// Create a read-only client, or a signing one if a key is configured.
    ///
    /// # Errors
    /// Returns an error if the RPC URL, pod address or key do not parse.
    pub fn new(config: EigenPodConfig) -> Result<Self> {
        let pod_address: Address = config.pod_address.parse().context("Invalid pod address")?;
        let rpc_url: reqwest::Url = config.rpc_url.parse().context("Invalid RPC URL")?;

        let signer = match &config.sender_key {
            Some(key) => {
                let key = key.strip_prefix("0x").unwrap_or(key);
                let signer: PrivateKeySigner = key.parse().context("Invalid private key")?;
                info!(address = %signer.address(), "Pod client initialized with signer");
                Some(signer)
            }
            None => None,
        };

        Ok(Self {
            config,
            rpc_url,
            pod_address,
            signer,
        })
    }

    pub fn pod_address(&self) -> [u8; 20] {
        self.pod_address.into()
    }

    pub fn signer_address(&self) -> Option<Address> {
        self.signer.as_ref().map(PrivateKeySigner::address)
    }

    /// Chain id reported by the RPC node
    pub async fn chain_id(&self) -> Result<u64> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.clone());
        Ok(provider.get_chain_id().await?)
    }

    /// Submit `call` and wait until it is mined, even when the configured
    /// confirmation count is 0.
    ///
    /// # Errors
    /// As [`TransactionSubmitter::submit`].
    pub async fn submit_confirmed(&self, call: PodCall) -> Result<TxHandle> {
        self.send(call, confirmations_to_wait(self.config.confirmations, true))
            .await
    }

    #[instrument(skip(self, call), fields(call = call.name()))]
    async fn send(&self, call: PodCall, confirmations: u64) -> Result<TxHandle> {
        let signer = self
            .signer
            .as_ref()
            .context("Pod client not configured with signer")?;

        let wallet = EthereumWallet::from(signer.clone());
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(self.rpc_url.clone());

        let gas_price = provider.get_gas_price().await?;
        let max_gas_price_wei = U256::from(self.config.max_gas_price_gwei) * U256::from(1_000_000_000);
        if U256::from(gas_price) > max_gas_price_wei {
            anyhow::bail!(
                "Gas price {} gwei exceeds maximum {} gwei",
                gas_price / 1_000_000_000,
                self.config.max_gas_price_gwei
            );
        }

        let contract = EigenPod::new(self.pod_address, &provider);
        let pending_tx = match &call {
            PodCall::StartCheckpoint {
                revert_if_no_balance,
            } => contract.startCheckpoint(*revert_if_no_balance).send().await,
            PodCall::VerifyWithdrawalCredentials(params) => {
                let args = credential_args(params)?;
                info!(
                    validators = args.validator_indices.len(),
                    beacon_timestamp = params.beacon_timestamp,
                    "Submitting credential proofs"
                );
                contract
                    .verifyWithdrawalCredentials(
                        params.beacon_timestamp,
                        args.state_root_proof,
                        args.validator_indices,
                        args.validator_fields_proofs,
                        args.validator_fields,
                    )
                    .send()
                    .await
            }
            PodCall::VerifyCheckpointProofs(VerifyCheckpointProofsCallParams {
                validator_balances_root_proof,
                balance_proofs,
            }) => {
                info!(proofs = balance_proofs.len(), "Submitting checkpoint proofs");
                contract
                    .verifyCheckpointProofs(
                        balance_container_proof(validator_balances_root_proof),
                        balance_proofs.iter().map(balance_proof).collect(),
                    )
                    .send()
                    .await
            }
            PodCall::VerifyStaleBalance(params) => {
                info!(
                    validator_index = params.validator_index,
                    beacon_timestamp = params.beacon_timestamp,
                    "Submitting stale balance proof"
                );
                contract
                    .verifyStaleBalance(
                        params.beacon_timestamp,
                        state_root_proof(&params.state_root_proof),
                        validator_proof(&params.validator_proof),
                    )
                    .send()
                    .await
            }
        }
        .context("Failed to send transaction")?;
        let tx_hash = *pending_tx.tx_hash();

        info!(tx_hash = %tx_hash, "Transaction submitted");

        if confirmations > 0 {
            debug!(confirmations, "Waiting for confirmations");
            let receipt = pending_tx
                .with_required_confirmations(confirmations)
                .get_receipt()
                .await
                .context("Failed to get transaction receipt")?;

            if !receipt.status() {
                anyhow::bail!("Transaction reverted: {}", tx_hash);
            }

            info!(
                tx_hash = %tx_hash,
                gas_used = receipt.gas_used,
                "Transaction confirmed"
            );
        }

        Ok(TxHandle(tx_hash.0))
    }
}

/// Confirmations to wait for; a call whose effect the next step reads
/// must be mined first.
fn confirmations_to_wait(configured: u64, must_be_mined: bool) -> u64 {
    if must_be_mined {
        configured.max(1)
    } else {
        configured
    }
}

/// Submits through [`EigenPodClient::submit_confirmed`].
pub struct Confirmed<'a>(pub &'a EigenPodClient);

#[async_trait]
impl TransactionSubmitter for Confirmed<'_> {
    async fn submit(&self, call: PodCall) -> Result<TxHandle> {
        self.0.submit_confirmed(call).await
    }
}

fn pod_status(raw: u8) -> Result<ValidatorStatus> {
    ValidatorStatus::try_from(raw).map_err(|status| anyhow::anyhow!("Unknown validator status {status}"))
}

fn state_root_proof(proof: &StateRootProof) -> EigenPod::StateRootProof {
    EigenPod::StateRootProof {
        beaconStateRoot: FixedBytes::from(proof.beacon_state_root),
        proof: Bytes::from(proof_to_bytes(&proof.proof)),
    }
}

fn balance_container_proof(proof: &ValidatorBalancesRootProof) -> EigenPod::BalanceContainerProof {
    EigenPod::BalanceContainerProof {
        balanceContainerRoot: FixedBytes::from(proof.balances_root),
        proof: Bytes::from(proof_to_bytes(&proof.proof)),
    }
}

fn balance_proof(proof: &BalanceProof) -> EigenPod::BalanceProof {
    EigenPod::BalanceProof {
        pubkeyHash: FixedBytes::from(proof.pubkey_hash),
        balanceRoot: FixedBytes::from(proof.balance_root),
        proof: Bytes::from(proof_to_bytes(&proof.proof)),
    }
}

fn validator_proof(proof: &ValidatorProof) -> EigenPod::ValidatorProof {
    EigenPod::ValidatorProof {
        validatorFields: proof
            .validator_fields
            .iter()
            .copied()
            .map(FixedBytes::from)
            .collect(),
        proof: Bytes::from(proof_to_bytes(&proof.proof)),
    }
}

struct CredentialArgs {
    state_root_proof: EigenPod::StateRootProof,
    validator_indices: Vec<U40>,
    validator_fields_proofs: Vec<Bytes>,
    validator_fields: Vec<Vec<FixedBytes<32>>>,
}

fn credential_args(params: &VerifyWithdrawalCredentialsCallParams) -> Result<CredentialArgs> {
    let validator_indices = params
        .validator_indices
        .iter()
        .map(|&index| {
            anyhow::ensure!(index < 1 << 40, "Validator index {index} exceeds uint40");
            Ok(U40::from(index))
        })
        .collect::<Result<_>>()?;
    Ok(CredentialArgs {
        state_root_proof: state_root_proof(&params.state_root_proof),
        validator_indices,
        validator_fields_proofs: params
            .validator_fields_proofs
            .iter()
            .map(|proof| Bytes::from(proof_to_bytes(proof)))
            .collect(),
        validator_fields: params
            .validator_fields
            .iter()
            .map(|fields| fields.iter().copied().map(FixedBytes::from).collect())
            .collect(),
    })
}

/// Run `lookup` for every hash, several at a time, keeping input order.
async fn lookup_in_order<F, Fut>(pubkey_hashes: &[Root], lookup: F) -> Result<Vec<ValidatorInfo>>
where
    F: Fn(Root) -> Fut,
    Fut: Future<Output = Result<ValidatorInfo>>,
{
    stream::iter(pubkey_hashes.iter().copied())
        .map(lookup)
        .buffered(INFO_LOOKUP_CONCURRENCY)
        .try_collect()
        .await
}

#[async_trait]
impl OnchainValidatorInfoProvider for EigenPodClient {
    #[instrument(skip_all, fields(count = pubkey_hashes.len()))]
    async fn batch_lookup(&self, pubkey_hashes: &[Root]) -> Result<Vec<ValidatorInfo>> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.clone());
        let contract = &EigenPod::new(self.pod_address, &provider);

        let infos = lookup_in_order(pubkey_hashes, |hash| async move {
            let info = contract
                .validatorPubkeyHashToInfo(FixedBytes::from(hash))
                .call()
                .await
                .context("Failed to read validator info")?;
            Ok::<_, anyhow::Error>(ValidatorInfo {
                validator_index: info.validatorIndex,
                restaked_balance_gwei: info.restakedBalanceGwei,
                last_checkpointed_at: info.lastCheckpointedAt,
                status: pod_status(info.status)?,
            })
        })
        .await?;
        debug!(count = infos.len(), "Read validator info");
        Ok(infos)
    }
}

#[async_trait]
impl PodCheckpointSource for EigenPodClient {
    #[instrument(skip(self))]
    async fn current_checkpoint(&self) -> Result<Checkpoint> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.clone());
        let contract = EigenPod::new(self.pod_address, &provider);

        let timestamp: u64 = contract.currentCheckpointTimestamp().call().await?;
        let checkpoint = contract.currentCheckpoint().call().await?;

        Ok(Checkpoint {
            timestamp,
            beacon_block_root: checkpoint.beaconBlockRoot.0,
            proofs_remaining: checkpoint.proofsRemaining.to::<u64>(),
            pod_balance_gwei: checkpoint.podBalanceGwei,
            balance_deltas_gwei: checkpoint.balanceDeltasGwei,
            prev_beacon_balance_gwei: checkpoint.prevBeaconBalanceGwei,
        })
    }

    /// The latest block's timestamp with the parent beacon root the pod
    /// reads for it.
    #[instrument(skip(self))]
    async fn oracle_anchor(&self) -> Result<OracleAnchor> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.clone());
        let block = provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await?
            .context("Latest block not available")?;
        let timestamp = block.header.timestamp;

        let contract = EigenPod::new(self.pod_address, &provider);
        let root = contract.getParentBlockRoot(timestamp).call().await?;

        debug!(timestamp, root = %root, "Read oracle anchor");
        Ok(OracleAnchor {
            timestamp,
            parent_block_root: root.0,
        })
    }
}

#[async_trait]
impl TransactionSubmitter for EigenPodClient {
    /// # Errors
    /// Returns an error if:
    /// - Client not configured with signer
    /// - Gas price exceeds configured maximum
    /// - Transaction fails or reverts
    async fn submit(&self, call: PodCall) -> Result<TxHandle> {
        self.send(call, self.config.confirmations).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(sender_key: Option<&str>) -> EigenPodConfig {
        EigenPodConfig {
            rpc_url: "http://localhost:8545".to_string(),
            pod_address: "0x0000000000000000000000000000000000000001".to_string(),
            sender_key: sender_key.map(str::to_string),
            max_gas_price_gwei: 100,
            confirmations: 1,
        }
    }

    #[test]
    fn test_client_creation_readonly() {
        let client = EigenPodClient::new(config(None)).unwrap();
        assert!(client.signer_address().is_none());
        assert_eq!(client.pod_address()[19], 1);
    }

    #[test]
    fn test_client_creation_with_signer() {
        // Anvil's first default private key
        let client = EigenPodClient::new(config(Some(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )))
        .unwrap();
        assert_eq!(
            client.signer_address().unwrap(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
                .parse::<Address>()
                .unwrap()
        );
    }

    #[test]
    fn test_client_rejects_bad_inputs() {
        assert!(EigenPodClient::new(config(Some("not_a_key"))).is_err());

        let mut bad_address = config(None);
        bad_address.pod_address = "not_an_address".to_string();
        assert!(EigenPodClient::new(bad_address).is_err());
    }

    #[test]
    fn test_pod_status_mapping() {
        assert_eq!(pod_status(2).unwrap(), ValidatorStatus::Withdrawn);
        assert!(pod_status(3).is_err());
    }

    #[test]
    fn test_credential_args_concatenate_proofs() {
        let params = VerifyWithdrawalCredentialsCallParams {
            beacon_timestamp: 1_719_000_000,
            state_root_proof: StateRootProof {
                beacon_state_root: [7; 32],
                proof: vec![[1; 32], [2; 32], [3; 32]],
            },
            validator_indices: vec![12, 13],
            validator_fields_proofs: vec![vec![[4; 32]; 46], vec![[5; 32]; 46]],
            validator_fields: vec![vec![[6; 32]; 8], vec![[8; 32]; 8]],
        };
        let args = credential_args(&params).unwrap();

        assert_eq!(args.state_root_proof.proof.len(), 96);
        assert_eq!(args.state_root_proof.proof[32], 2);
        assert_eq!(args.validator_indices, vec![U40::from(12u64), U40::from(13u64)]);
        assert_eq!(args.validator_fields_proofs[1].len(), 46 * 32);
        assert_eq!(args.validator_fields[1][0], FixedBytes::from([8; 32]));
    }

    #[test]
    fn test_validator_proof_concatenates_proof() {
        let proof = ValidatorProof {
            validator_fields: vec![[3; 32]; 8],
            proof: vec![[9; 32]; 46],
        };
        let encoded = validator_proof(&proof);
        assert_eq!(encoded.validatorFields.len(), 8);
        assert_eq!(encoded.validatorFields[7], FixedBytes::from([3; 32]));
        assert_eq!(encoded.proof.len(), 46 * 32);
    }

    #[test]
    fn test_mined_calls_wait_for_a_confirmation() {
        assert_eq!(confirmations_to_wait(0, true), 1);
        assert_eq!(confirmations_to_wait(3, true), 3);
        assert_eq!(confirmations_to_wait(0, false), 0);
    }

    fn info(index: u64) -> ValidatorInfo {
        ValidatorInfo {
            validator_index: index,
            restaked_balance_gwei: 32_000_000_000,
            last_checkpointed_at: 0,
            status: ValidatorStatus::Active,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookups_overlap_and_keep_order() {
        let hashes: Vec<Root> = (0..8u8).map(|i| [i; 32]).collect();
        let started = tokio::time::Instant::now();

        // Later hashes answer first.
        let infos = lookup_in_order(&hashes, |hash| async move {
            let delay = 100 - u64::from(hash[0]) * 10;
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
            Ok::<_, anyhow::Error>(info(u64::from(hash[0])))
        })
        .await
        .unwrap();

        let indices: Vec<u64> = infos.iter().map(|i| i.validator_index).collect();
        assert_eq!(indices, (0..8).collect::<Vec<_>>());
        assert!(started.elapsed() < std::time::Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_lookup_fails_on_any_error() {
        let hashes = [[1; 32], [2; 32], [3; 32]];
        let result = lookup_in_order(&hashes, |hash| async move {
            anyhow::ensure!(hash[0] != 2, "node unavailable");
            Ok::<_, anyhow::Error>(info(u64::from(hash[0])))
        })
        .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_credential_args_reject_wide_indices() {
        let params = VerifyWithdrawalCredentialsCallParams {
            beacon_timestamp: 0,
            state_root_proof: StateRootProof {
                beacon_state_root: [0; 32],
                proof: Vec::new(),
            },
            validator_indices: vec![1 << 40],
            validator_fields_proofs: vec![Vec::new()],
            validator_fields: vec![Vec::new()],
        };
        assert!(credential_args(&params).is_err());
    }
}
