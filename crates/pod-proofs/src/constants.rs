//! Beacon-chain layout constants.
//!
//! These must match the on-chain verifier exactly. Depths are fixed by the
//! protocol and are never derived from list occupancy.

/// Slots covered by one `block_roots` vector / historical summary.
pub const SLOTS_PER_HISTORICAL_ROOT: u64 = 8192;

/// Seconds per slot on every supported network.
pub const SECONDS_PER_SLOT: u64 = 12;

/// Epoch value meaning "not scheduled".
pub const FAR_FUTURE_EPOCH: u64 = u64::MAX;

/// Balances packed into one 32-byte chunk.
pub const BALANCES_PER_CHUNK: u64 = 4;

// BeaconState field indices
pub const SLOT_INDEX_IN_STATE: usize = 2;
pub const LATEST_BLOCK_HEADER_INDEX: usize = 4;
pub const VALIDATOR_LIST_INDEX: usize = 11;
pub const BALANCE_LIST_INDEX: usize = 12;
pub const HISTORICAL_SUMMARY_LIST_INDEX: usize = 27;

// BeaconBlockHeader field indices
pub const SLOT_INDEX: usize = 0;
pub const STATE_ROOT_INDEX: usize = 3;
pub const BEACON_BLOCK_BODY_ROOT_INDEX: usize = 4;

// BeaconBlockBody field indices
pub const EXECUTION_PAYLOAD_INDEX: usize = 9;

// ExecutionPayload field indices
pub const TIMESTAMP_INDEX: usize = 9;
pub const WITHDRAWALS_INDEX: usize = 14;

// HistoricalSummary field indices
pub const BLOCK_SUMMARY_ROOT_INDEX: usize = 0;

// Field counts
pub const BEACON_STATE_FIELD_COUNT: usize = 28;
pub const BLOCK_HEADER_FIELD_COUNT: usize = 5;
pub const VALIDATOR_FIELD_COUNT: usize = 8;
pub const WITHDRAWAL_FIELD_COUNT: usize = 4;

// Subtree depths
pub const BLOCK_HEADER_DEPTH: u32 = 3;
pub const BLOCK_BODY_DEPTH: u32 = 4;
pub const BEACON_STATE_DEPTH: u32 = 5;
pub const VALIDATOR_DEPTH: u32 = 3;
pub const VALIDATOR_LIST_DEPTH: u32 = 40;
/// `2^40` u64 balances packed 4 per chunk
pub const BALANCE_LIST_DEPTH: u32 = 38;
pub const HISTORICAL_SUMMARY_LIST_DEPTH: u32 = 24;
pub const WITHDRAWAL_LIST_DEPTH: u32 = 4;
pub const BLOCK_ROOTS_DEPTH: u32 = 13;
pub const HISTORICAL_SUMMARY_DEPTH: u32 = 1;

// SSZ list/vector limits (mainnet preset)
pub const VALIDATOR_REGISTRY_LIMIT: usize = 1 << 40;
pub const HISTORICAL_ROOTS_LIMIT: usize = 1 << 24;
pub const EPOCHS_PER_HISTORICAL_VECTOR: usize = 65_536;
pub const EPOCHS_PER_SLASHINGS_VECTOR: usize = 8192;
pub const ETH1_DATA_VOTES_LIMIT: usize = 2048;
pub const SYNC_COMMITTEE_SIZE: usize = 512;
pub const MAX_WITHDRAWALS_PER_PAYLOAD: usize = 16;
pub const MAX_TRANSACTIONS_PER_PAYLOAD: usize = 1 << 20;
pub const MAX_BYTES_PER_TRANSACTION: usize = 1 << 30;
pub const MAX_EXTRA_DATA_BYTES: usize = 32;
pub const BYTES_PER_LOGS_BLOOM: usize = 256;
pub const MAX_PROPOSER_SLASHINGS: usize = 16;
pub const MAX_ATTESTER_SLASHINGS: usize = 2;
pub const MAX_ATTESTATIONS: usize = 128;
pub const MAX_DEPOSITS: usize = 16;
pub const MAX_VOLUNTARY_EXITS: usize = 16;
pub const MAX_BLS_TO_EXECUTION_CHANGES: usize = 16;
pub const MAX_BLOB_COMMITMENTS_PER_BLOCK: usize = 4096;
pub const MAX_VALIDATORS_PER_COMMITTEE: usize = 2048;
pub const DEPOSIT_CONTRACT_TREE_DEPTH_PLUS_ONE: usize = 33;

/// Default proofs per `verifyWithdrawalCredentials` transaction.
pub const DEFAULT_CREDENTIALS_BATCH: usize = 60;

/// Default proofs per `verifyCheckpointProofs` transaction.
pub const DEFAULT_CHECKPOINT_BATCH: usize = 80;
