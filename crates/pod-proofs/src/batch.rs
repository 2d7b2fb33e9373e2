//! Splitting proofs into transaction-sized batches and submitting them.

use crate::proof::{ProofError, VerifyCheckpointProofsCallParams, VerifyWithdrawalCredentialsCallParams};
use crate::sources::{PodCall, TransactionSubmitter, TxHandle};
use tracing::{info, instrument, warn};

/// Split `items` into consecutive chunks of `size`; only the last may be
/// shorter, and none is empty.
///
/// # Errors
/// [`ProofError::InvalidChunkSize`] if `size` is zero.
pub fn chunk<T: Clone>(items: &[T], size: usize) -> Result<Vec<Vec<T>>, ProofError> {
    if size == 0 {
        return Err(ProofError::InvalidChunkSize);
    }
    Ok(items.chunks(size).map(<[T]>::to_vec).collect())
}

/// Split credential params into one call per `size` validators. Every batch
/// carries the same timestamp and state root proof.
///
/// # Errors
/// [`ProofError::InvalidChunkSize`] if `size` is zero.
pub fn chunk_credential_proofs(
    params: &VerifyWithdrawalCredentialsCallParams,
    size: usize,
) -> Result<Vec<VerifyWithdrawalCredentialsCallParams>, ProofError> {
    let indices = chunk(&params.validator_indices, size)?;
    let proofs = chunk(&params.validator_fields_proofs, size)?;
    let fields = chunk(&params.validator_fields, size)?;
    Ok(indices
        .into_iter()
        .zip(proofs)
        .zip(fields)
        .map(|((validator_indices, validator_fields_proofs), validator_fields)| {
            VerifyWithdrawalCredentialsCallParams {
                beacon_timestamp: params.beacon_timestamp,
                state_root_proof: params.state_root_proof.clone(),
                validator_indices,
                validator_fields_proofs,
                validator_fields,
            }
        })
        .collect())
}

/// Split checkpoint params into one call per `size` balance proofs, each
/// with the shared balance container proof.
///
/// # Errors
/// [`ProofError::InvalidChunkSize`] if `size` is zero.
pub fn chunk_checkpoint_proofs(
    params: &VerifyCheckpointProofsCallParams,
    size: usize,
) -> Result<Vec<VerifyCheckpointProofsCallParams>, ProofError> {
    Ok(chunk(&params.balance_proofs, size)?
        .into_iter()
        .map(|balance_proofs| VerifyCheckpointProofsCallParams {
            validator_balances_root_proof: params.validator_balances_root_proof.clone(),
            balance_proofs,
        })
        .collect())
}

/// Result of a sequential submission: handles of every transaction sent,
/// and the error that stopped it early, if any.
#[derive(Debug)]
pub struct Submission {
    pub sent: Vec<TxHandle>,
    pub batches: usize,
    pub error: Option<anyhow::Error>,
}

impl Submission {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.sent.len() == self.batches
    }

    /// The handles if every batch was sent, else the stopping error.
    ///
    /// # Errors
    /// The error that interrupted submission.
    pub fn into_result(self) -> anyhow::Result<Vec<TxHandle>> {
        match self.error {
            None => Ok(self.sent),
            Some(error) => Err(error.context(format!(
                "submitted {} of {} batches",
                self.sent.len(),
                self.batches
            ))),
        }
    }
}

async fn submit_sequentially(submitter: &dyn TransactionSubmitter, calls: Vec<PodCall>) -> Submission {
    let batches = calls.len();
    let mut sent = Vec::with_capacity(batches);
    for (batch, call) in calls.into_iter().enumerate() {
        let name = call.name();
        match submitter.submit(call).await {
            Ok(tx) => {
                info!(batch, batches, tx = %tx, call = name, "Submitted batch");
                sent.push(tx);
            }
            Err(error) => {
                warn!(batch, batches, call = name, error = %error, "Batch submission failed");
                return Submission {
                    sent,
                    batches,
                    error: Some(error),
                };
            }
        }
    }
    Submission {
        sent,
        batches,
        error: None,
    }
}

/// Submit checkpoint proofs in batches of `size`, in order, stopping at the
/// first failure.
///
/// # Errors
/// [`ProofError::InvalidChunkSize`] if `size` is zero. Submission failures
/// are reported in the returned [`Submission`].
#[instrument(skip(submitter, params), fields(proofs = params.balance_proofs.len()))]
pub async fn submit_checkpoint_proofs(
    submitter: &dyn TransactionSubmitter,
    params: &VerifyCheckpointProofsCallParams,
    size: usize,
) -> Result<Submission, ProofError> {
    let calls = chunk_checkpoint_proofs(params, size)?
        .into_iter()
        .map(PodCall::VerifyCheckpointProofs)
        .collect();
    Ok(submit_sequentially(submitter, calls).await)
}

/// Submit credential proofs in batches of `size`, in order, stopping at the
/// first failure.
///
/// # Errors
/// [`ProofError::InvalidChunkSize`] if `size` is zero. Submission failures
/// are reported in the returned [`Submission`].
#[instrument(skip(submitter, params), fields(validators = params.validator_indices.len()))]
pub async fn submit_credential_proofs(
    submitter: &dyn TransactionSubmitter,
    params: &VerifyWithdrawalCredentialsCallParams,
    size: usize,
) -> Result<Submission, ProofError> {
    let calls = chunk_credential_proofs(params, size)?
        .into_iter()
        .map(PodCall::VerifyWithdrawalCredentials)
        .collect();
    Ok(submit_sequentially(submitter, calls).await)
}
