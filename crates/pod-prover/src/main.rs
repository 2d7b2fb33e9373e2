//! EigenPod proof CLI
//!
//! Builds checkpoint, credential, stale balance and withdrawal proofs from a
//! beacon node and optionally submits them to the pod.

mod eigenpod;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eigenpod::{Confirmed, EigenPodClient, EigenPodConfig};
use pod_proofs::{
    fetch_pod_status, submit_checkpoint_proofs, submit_credential_proofs, BeaconClient,
    BeaconStateSource, BlockId, CachedStateSource, Checkpoint, CheckpointProofOrchestrator,
    CredentialProofOrchestrator, Network, PodCall, ProverError, StateCache, Submission,
    TransactionSubmitter, ValidatorBucket, ValidatorIndex, VerifyCheckpointProofsCallParams,
    VerifyStaleBalanceCallParams, VerifyWithdrawalCredentialsCallParams,
    WithdrawalProofOrchestrator, WithdrawalRequest,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "pod-prover")]
#[command(about = "Generate and submit EigenPod beacon chain proofs")]
struct Args {
    /// Beacon node URL
    #[arg(long, env = "BEACON_URL", default_value = "http://localhost:5052")]
    beacon_url: String,

    /// Execution RPC URL
    #[arg(long, env = "RPC_URL", default_value = "http://localhost:8545")]
    rpc_url: String,

    /// EigenPod address
    #[arg(long, env = "POD_ADDRESS")]
    pod_address: String,

    /// Private key for transaction signing (hex)
    #[arg(long, env = "SENDER_KEY", hide_env_values = true)]
    sender_key: Option<String>,

    /// Directory for cached beacon states
    #[arg(long, env = "STATE_CACHE_DIR")]
    state_cache_dir: Option<PathBuf>,

    /// Refuse to submit above this gas price
    #[arg(long, env = "MAX_GAS_PRICE_GWEI", default_value_t = 100)]
    max_gas_price_gwei: u64,

    /// Confirmations to wait for per transaction
    #[arg(long, env = "CONFIRMATIONS", default_value_t = 1)]
    confirmations: u64,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prove balances of validators pending in the active checkpoint
    Checkpoint {
        #[arg(long, env = "CHECKPOINT_BATCH_SIZE", default_value_t = 80)]
        batch_size: usize,

        /// Start a checkpoint first if none is active
        #[arg(long)]
        start: bool,

        /// Send the proofs to the pod
        #[arg(long)]
        submit: bool,

        /// Write proofs to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Prove withdrawal credentials of validators not yet known to the pod
    Credentials {
        /// Prove only this validator
        #[arg(long)]
        validator_index: Option<u64>,

        #[arg(long, env = "CREDENTIALS_BATCH_SIZE", default_value_t = 60)]
        batch_size: usize,

        #[arg(long)]
        submit: bool,

        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Prove a slashed validator's stale balance to force a checkpoint
    StaleBalance {
        #[arg(long)]
        validator_index: ValidatorIndex,

        /// Batch size for completing an active checkpoint first
        #[arg(long, env = "CHECKPOINT_BATCH_SIZE", default_value_t = 80)]
        batch_size: usize,

        #[arg(long)]
        submit: bool,

        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Summarize the pod's validators and checkpoint
    Status {
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Start a new checkpoint on the pod
    StartCheckpoint {
        /// Start even if the pod holds no new native ETH
        #[arg(long)]
        force: bool,
    },

    /// Prove historical withdrawals against a recent block
    Withdrawals {
        /// Withdrawal to prove, as VALIDATOR_INDEX:SLOT
        #[arg(long = "withdrawal", value_parser = parse_withdrawal, required = true)]
        withdrawals: Vec<WithdrawalRequest>,

        /// Slot of the block to prove against (defaults to head)
        #[arg(long)]
        oracle_slot: Option<u64>,

        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn parse_withdrawal(s: &str) -> Result<WithdrawalRequest, String> {
    let (index, slot) = s
        .split_once(':')
        .ok_or_else(|| format!("expected VALIDATOR_INDEX:SLOT, got {s}"))?;
    Ok(WithdrawalRequest {
        validator_index: index.parse().map_err(|e| format!("bad validator index: {e}"))?,
        slot: slot.parse().map_err(|e| format!("bad slot: {e}"))?,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckpointOutput<'a> {
    slot: u64,
    checkpoint: &'a Checkpoint,
    #[serde(flatten)]
    params: &'a VerifyCheckpointProofsCallParams,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialsOutput<'a> {
    slot: u64,
    #[serde(flatten)]
    params: &'a VerifyWithdrawalCredentialsCallParams,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StaleBalanceOutput<'a> {
    slot: u64,
    #[serde(flatten)]
    params: &'a VerifyStaleBalanceCallParams,
}

fn write_output<T: Serialize>(out: Option<&Path>, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Wrote output");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn report(submission: Submission) -> Result<()> {
    let batches = submission.batches;
    let sent = submission.into_result()?;
    for tx in &sent {
        info!(tx = %tx, "Submitted");
    }
    info!(batches, "All batches submitted");
    Ok(())
}

/// Shared clients for one invocation.
struct Clients {
    beacon: BeaconClient,
    states: Box<dyn BeaconStateSource>,
    pod: EigenPodClient,
}

impl Clients {
    async fn connect(args: &Args) -> Result<Self> {
        let beacon = BeaconClient::new(args.beacon_url.clone());
        let pod = EigenPodClient::new(EigenPodConfig {
            rpc_url: args.rpc_url.clone(),
            pod_address: args.pod_address.clone(),
            sender_key: args.sender_key.clone(),
            max_gas_price_gwei: args.max_gas_price_gwei,
            confirmations: args.confirmations,
        })?;

        let states: Box<dyn BeaconStateSource> = match &args.state_cache_dir {
            Some(dir) => {
                let chain_id = pod.chain_id().await.context("Failed to read chain id")?;
                info!(dir = %dir.display(), chain_id, "Caching beacon states");
                Box::new(CachedStateSource::new(
                    beacon.clone(),
                    StateCache::new(dir),
                    chain_id,
                ))
            }
            None => Box::new(beacon.clone()),
        };

        Ok(Self { beacon, states, pod })
    }

    fn require_signer(&self) -> Result<()> {
        anyhow::ensure!(
            self.pod.signer_address().is_some(),
            "Submitting requires SENDER_KEY"
        );
        Ok(())
    }
}

async fn run_checkpoint(
    clients: &Clients,
    batch_size: usize,
    start: bool,
    submit: bool,
    out: Option<&Path>,
) -> Result<()> {
    if submit || start {
        clients.require_signer()?;
    }
    let pod = &clients.pod;
    let orchestrator = CheckpointProofOrchestrator::new(
        &clients.beacon,
        clients.states.as_ref(),
        pod,
        pod,
        pod.pod_address(),
    );

    let proofs = match orchestrator.prove().await {
        Err(ProverError::NoActiveCheckpoint) if start => {
            info!("No active checkpoint, starting one");
            pod.submit_confirmed(PodCall::StartCheckpoint {
                revert_if_no_balance: true,
            })
            .await?;
            orchestrator.prove().await?
        }
        result => result?,
    };

    if proofs.params.balance_proofs.is_empty() {
        warn!(slot = proofs.slot, "No validators left to prove for this checkpoint");
    }
    write_output(
        out,
        &CheckpointOutput {
            slot: proofs.slot,
            checkpoint: &proofs.checkpoint,
            params: &proofs.params,
        },
    )?;

    if submit && !proofs.params.balance_proofs.is_empty() {
        report(submit_checkpoint_proofs(pod, &proofs.params, batch_size).await?)?;
    }
    Ok(())
}

async fn run_credentials(
    clients: &Clients,
    validator_index: Option<u64>,
    batch_size: usize,
    submit: bool,
    out: Option<&Path>,
) -> Result<()> {
    if submit {
        clients.require_signer()?;
    }
    let pod = &clients.pod;
    let orchestrator = CredentialProofOrchestrator::new(
        &clients.beacon,
        clients.states.as_ref(),
        pod,
        pod,
        pod.pod_address(),
    );
    let proofs = orchestrator.prove(validator_index).await?;

    if proofs.params.validator_indices.is_empty() {
        warn!(slot = proofs.slot, "No validators awaiting credential proofs");
    }
    write_output(
        out,
        &CredentialsOutput {
            slot: proofs.slot,
            params: &proofs.params,
        },
    )?;

    if submit && !proofs.params.validator_indices.is_empty() {
        report(submit_credential_proofs(pod, &proofs.params, batch_size).await?)?;
    }
    Ok(())
}

/// Prove and submit the pod's active checkpoint, if any, waiting for each
/// batch to be mined.
async fn complete_checkpoint(clients: &Clients, batch_size: usize) -> Result<()> {
    let pod = &clients.pod;
    let orchestrator = CheckpointProofOrchestrator::new(
        &clients.beacon,
        clients.states.as_ref(),
        pod,
        pod,
        pod.pod_address(),
    );
    let proofs = match orchestrator.prove().await {
        Err(ProverError::NoActiveCheckpoint) => return Ok(()),
        result => result?,
    };

    info!(
        checkpoint_timestamp = proofs.checkpoint.timestamp,
        proofs = proofs.params.balance_proofs.len(),
        "Completing active checkpoint first"
    );
    if proofs.params.balance_proofs.is_empty() {
        warn!(slot = proofs.slot, "Active checkpoint has no provable validators");
        return Ok(());
    }
    report(submit_checkpoint_proofs(&Confirmed(pod), &proofs.params, batch_size).await?)
}

async fn run_stale_balance(
    clients: &Clients,
    validator_index: ValidatorIndex,
    batch_size: usize,
    submit: bool,
    out: Option<&Path>,
) -> Result<()> {
    if submit {
        clients.require_signer()?;
        complete_checkpoint(clients, batch_size).await?;
    }

    let pod = &clients.pod;
    let orchestrator = CredentialProofOrchestrator::new(
        &clients.beacon,
        clients.states.as_ref(),
        pod,
        pod,
        pod.pod_address(),
    );
    let proofs = orchestrator.prove_stale_balance(validator_index).await?;
    write_output(
        out,
        &StaleBalanceOutput {
            slot: proofs.slot,
            params: &proofs.params,
        },
    )?;

    if submit {
        let tx = pod.submit(PodCall::VerifyStaleBalance(proofs.params)).await?;
        info!(tx = %tx, validator_index, "Stale balance proof submitted");
    }
    Ok(())
}

async fn run_status(clients: &Clients, out: Option<&Path>) -> Result<()> {
    let pod = &clients.pod;
    let status = fetch_pod_status(
        &clients.beacon,
        clients.states.as_ref(),
        pod,
        pod,
        &clients.beacon,
        &pod.pod_address(),
    )
    .await?;

    for bucket in ValidatorBucket::ALL {
        info!(bucket = %bucket, count = status.count(bucket), "Validators");
    }
    info!(
        delta_gwei = %status.beacon_balance_delta_gwei(),
        "Beacon balance change since last checkpoint"
    );
    write_output(out, &status)
}

async fn run_withdrawals(
    clients: &Clients,
    withdrawals: &[WithdrawalRequest],
    oracle_slot: Option<u64>,
    out: Option<&Path>,
) -> Result<()> {
    let chain_id = clients.pod.chain_id().await?;
    let network = Network::from_chain_id(chain_id)?;
    let orchestrator = WithdrawalProofOrchestrator::new(
        &clients.beacon,
        clients.states.as_ref(),
        &clients.beacon,
        network,
    );
    let oracle = oracle_slot.map_or(BlockId::Head, BlockId::Slot);
    let params = orchestrator.prove(oracle, withdrawals).await?;
    write_output(out, &params)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(args.log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!args.log_json).then(tracing_subscriber::fmt::layer))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let clients = Clients::connect(&args).await?;
    info!(
        beacon_url = %args.beacon_url,
        pod = %args.pod_address,
        "Connected"
    );

    match args.command {
        Command::Checkpoint {
            batch_size,
            start,
            submit,
            out,
        } => run_checkpoint(&clients, batch_size, start, submit, out.as_deref()).await,
        Command::Credentials {
            validator_index,
            batch_size,
            submit,
            out,
        } => run_credentials(&clients, validator_index, batch_size, submit, out.as_deref()).await,
        Command::StaleBalance {
            validator_index,
            batch_size,
            submit,
            out,
        } => run_stale_balance(&clients, validator_index, batch_size, submit, out.as_deref()).await,
        Command::Status { out } => run_status(&clients, out.as_deref()).await,
        Command::StartCheckpoint { force } => {
            clients.require_signer()?;
            let tx = clients
                .pod
                .submit(PodCall::StartCheckpoint {
                    revert_if_no_balance: !force,
                })
                .await?;
            info!(tx = %tx, "Checkpoint started");
            Ok(())
        }
        Command::Withdrawals {
            withdrawals,
            oracle_slot,
            out,
        } => run_withdrawals(&clients, &withdrawals, oracle_slot, out.as_deref()).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_withdrawal() {
        assert_eq!(
            parse_withdrawal("1234:9000000").unwrap(),
            WithdrawalRequest {
                validator_index: 1234,
                slot: 9_000_000,
            }
        );
        assert!(parse_withdrawal("1234").is_err());
        assert!(parse_withdrawal("x:1").is_err());
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from([
            "pod-prover",
            "--pod-address",
            "0x0000000000000000000000000000000000000001",
            "checkpoint",
        ])
        .unwrap();
        match args.command {
            Command::Checkpoint {
                batch_size, submit, ..
            } => {
                assert_eq!(batch_size, 80);
                assert!(!submit);
            }
            other => panic!("unexpected command {other:?}"),
        }

        let args = Args::try_parse_from([
            "pod-prover",
            "--pod-address",
            "0x01",
            "withdrawals",
            "--withdrawal",
            "7:100",
            "--withdrawal",
            "8:200",
        ])
        .unwrap();
        match args.command {
            Command::Withdrawals { withdrawals, .. } => assert_eq!(withdrawals.len(), 2),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_stale_balance_args() {
        let args = Args::try_parse_from([
            "pod-prover",
            "--pod-address",
            "0x01",
            "stale-balance",
            "--validator-index",
            "42",
            "--submit",
        ])
        .unwrap();
        match args.command {
            Command::StaleBalance {
                validator_index,
                batch_size,
                submit,
                ..
            } => {
                assert_eq!(validator_index, 42);
                assert_eq!(batch_size, 80);
                assert!(submit);
            }
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Args::try_parse_from(["pod-prover", "--pod-address", "0x01", "stale-balance"]).is_err());
    }

    #[test]
    fn test_write_output_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");
        write_output(Some(&path), &serde_json::json!({ "slot": 5 })).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["slot"], 5);
    }
}
