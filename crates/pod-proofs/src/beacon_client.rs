//! Beacon API HTTP Client
//!
//! Fetches states and blocks as SSZ and headers as JSON from a beacon node.
//! The fork of an SSZ response is read from its `Eth-Consensus-Version`
//! header.

use crate::beacon_state::{BeaconBlockHeader, VersionedBeaconBlock, VersionedBeaconState};
use crate::fork::Fork;
use crate::proof::ProofError;
use crate::sources::{BeaconBlockSource, BeaconHeaderSource, BeaconStateSource, BlockId, GenesisSource, StateId};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

const CONSENSUS_VERSION_HEADER: &str = "Eth-Consensus-Version";
const SSZ_CONTENT_TYPE: &str = "application/octet-stream";

/// Errors from beacon API operations
#[derive(Debug, Error)]
pub enum BeaconClientError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("State not found: {0}")]
    StateNotFound(String),

    #[error("Header not found: {0}")]
    HeaderNotFound(String),

    #[error("Block not found: {0}")]
    BlockNotFound(String),

    #[error("SSZ decoding failed: {0}")]
    Ssz(#[from] ProofError),
}

/// Client for interacting with the Beacon API
#[derive(Debug, Clone)]
pub struct BeaconClient {
    client: Client,
    base_url: String,
}

impl BeaconClient {
    /// Create a new beacon client
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the beacon node (e.g., `http://localhost:5052`)
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get_ssz(&self, path: &str) -> Result<Option<(Fork, Vec<u8>)>, BeaconClientError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Accept", SSZ_CONTENT_TYPE)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = ensure_success(response)?;

        let fork = response
            .headers()
            .get(CONSENSUS_VERSION_HEADER)
            .ok_or_else(|| {
                BeaconClientError::InvalidResponse(format!("missing {CONSENSUS_VERSION_HEADER} header"))
            })?
            .to_str()
            .map_err(|e| BeaconClientError::InvalidResponse(format!("Invalid consensus version: {e}")))?
            .parse::<Fork>()
            .map_err(BeaconClientError::InvalidResponse)?;

        let bytes = response.bytes().await?.to_vec();
        debug!(%fork, bytes = bytes.len(), "Fetched SSZ response");
        Ok(Some((fork, bytes)))
    }

    /// Fetch and decode a beacon state.
    ///
    /// # Errors
    /// Returns error if the request fails, the state is not found or the
    /// response does not decode.
    #[instrument(skip(self))]
    pub async fn get_state(&self, state_id: StateId) -> Result<VersionedBeaconState, BeaconClientError> {
        let (fork, bytes) = self
            .get_ssz(&format!("/eth/v2/debug/beacon/states/{state_id}"))
            .await?
            .ok_or_else(|| BeaconClientError::StateNotFound(state_id.to_string()))?;
        Ok(VersionedBeaconState::from_ssz(fork, &bytes)?)
    }

    /// Fetch and decode a beacon block, without its signature.
    ///
    /// # Errors
    /// Returns error if the request fails, the block is not found or the
    /// response does not decode.
    #[instrument(skip(self))]
    pub async fn get_block(&self, block_id: BlockId) -> Result<VersionedBeaconBlock, BeaconClientError> {
        let (fork, bytes) = self
            .get_ssz(&format!("/eth/v2/beacon/blocks/{block_id}"))
            .await?
            .ok_or_else(|| BeaconClientError::BlockNotFound(block_id.to_string()))?;
        Ok(VersionedBeaconBlock::from_signed_ssz(fork, &bytes)?)
    }

    /// Fetch beacon block header
    ///
    /// # Errors
    /// Returns error if the request fails or header is not found
    #[instrument(skip(self))]
    pub async fn get_header(&self, block_id: BlockId) -> Result<BeaconBlockHeader, BeaconClientError> {
        let url = format!("{}/eth/v1/beacon/headers/{block_id}", self.base_url);

        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(BeaconClientError::HeaderNotFound(block_id.to_string()));
        }
        let response = ensure_success(response)?;

        #[derive(Deserialize)]
        struct HeaderResponse {
            data: HeaderData,
        }

        #[derive(Deserialize)]
        struct HeaderData {
            header: HeaderMessage,
        }

        #[derive(Deserialize)]
        struct HeaderMessage {
            message: BeaconBlockHeaderJson,
        }

        #[derive(Deserialize)]
        struct BeaconBlockHeaderJson {
            slot: String,
            proposer_index: String,
            parent_root: String,
            state_root: String,
            body_root: String,
        }

        let header_resp: HeaderResponse = response.json().await?;
        let msg = header_resp.data.header.message;

        Ok(BeaconBlockHeader {
            slot: parse_u64("slot", &msg.slot)?,
            proposer_index: parse_u64("proposer_index", &msg.proposer_index)?,
            parent_root: parse_hex32(&msg.parent_root)?,
            state_root: parse_hex32(&msg.state_root)?,
            body_root: parse_hex32(&msg.body_root)?,
        })
    }

    /// Fetch the chain's genesis time
    ///
    /// # Errors
    /// Returns error if the request fails
    #[instrument(skip(self))]
    pub async fn get_genesis_time(&self) -> Result<u64, BeaconClientError> {
        let url = format!("{}/eth/v1/beacon/genesis", self.base_url);
        let response = ensure_success(self.client.get(&url).send().await?)?;

        #[derive(Deserialize)]
        struct GenesisResponse {
            data: GenesisData,
        }

        #[derive(Deserialize)]
        struct GenesisData {
            genesis_time: String,
        }

        let resp: GenesisResponse = response.json().await?;
        parse_u64("genesis_time", &resp.data.genesis_time)
    }
}

#[async_trait]
impl BeaconStateSource for BeaconClient {
    async fn get_state(&self, id: StateId) -> anyhow::Result<VersionedBeaconState> {
        Ok(BeaconClient::get_state(self, id).await?)
    }
}

#[async_trait]
impl BeaconHeaderSource for BeaconClient {
    async fn get_header(&self, id: BlockId) -> anyhow::Result<BeaconBlockHeader> {
        Ok(BeaconClient::get_header(self, id).await?)
    }
}

#[async_trait]
impl BeaconBlockSource for BeaconClient {
    async fn get_block(&self, id: BlockId) -> anyhow::Result<VersionedBeaconBlock> {
        Ok(BeaconClient::get_block(self, id).await?)
    }
}

#[async_trait]
impl GenesisSource for BeaconClient {
    async fn genesis_time(&self) -> anyhow::Result<u64> {
        Ok(self.get_genesis_time().await?)
    }
}

fn ensure_success(response: Response) -> Result<Response, BeaconClientError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(BeaconClientError::InvalidResponse(format!(
            "Unexpected status: {}",
            response.status()
        )))
    }
}

fn parse_u64(field: &str, s: &str) -> Result<u64, BeaconClientError> {
    s.parse()
        .map_err(|e| BeaconClientError::InvalidResponse(format!("Invalid {field}: {e}")))
}

fn parse_hex32(s: &str) -> Result<[u8; 32], BeaconClientError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s)
        .map_err(|e| BeaconClientError::InvalidResponse(format!("Invalid hex: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| BeaconClientError::InvalidResponse("Expected 32 bytes".to_string()))
}
