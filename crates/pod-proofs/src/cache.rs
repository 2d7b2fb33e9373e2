//! On-disk beacon state cache.
//!
//! Each entry is one file named `{chain_id}-{slot}.ssz`: a single fork tag
//! byte followed by the state's SSZ encoding. Entries never go stale; a
//! state at a given slot of a finalized chain does not change.

use crate::beacon_state::VersionedBeaconState;
use crate::fork::Fork;
use crate::sources::{BeaconStateSource, StateId};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct StateCache {
    dir: PathBuf,
}

impl StateCache {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn path(&self, chain_id: u64, slot: u64) -> PathBuf {
        self.dir.join(format!("{chain_id}-{slot}.ssz"))
    }

    /// The cached state, or `None` if there is no entry.
    ///
    /// # Errors
    /// Fails on I/O errors other than a missing file, or an undecodable entry.
    pub async fn load(&self, chain_id: u64, slot: u64) -> Result<Option<VersionedBeaconState>> {
        let path = self.path(chain_id, slot);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error).with_context(|| format!("reading {}", path.display())),
        };
        let (tag, ssz) = bytes
            .split_first()
            .ok_or_else(|| anyhow!("empty cache entry {}", path.display()))?;
        let fork = Fork::from_tag(*tag)
            .ok_or_else(|| anyhow!("unknown fork tag {tag} in {}", path.display()))?;
        let state = VersionedBeaconState::from_ssz(fork, ssz)
            .with_context(|| format!("decoding {}", path.display()))?;
        Ok(Some(state))
    }

    /// Write `state` under `(chain_id, state.slot())`, replacing any entry.
    ///
    /// # Errors
    /// Fails if the state cannot be encoded or the file cannot be written.
    pub async fn store(&self, chain_id: u64, state: &VersionedBeaconState) -> Result<PathBuf> {
        let path = self.path(chain_id, state.slot());
        let mut bytes = vec![state.fork().tag()];
        bytes.extend(state.to_ssz()?);

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating {}", self.dir.display()))?;
        // Write then rename so readers never see a partial entry.
        let partial = path.with_extension("ssz.partial");
        tokio::fs::write(&partial, &bytes)
            .await
            .with_context(|| format!("writing {}", partial.display()))?;
        tokio::fs::rename(&partial, &path)
            .await
            .with_context(|| format!("renaming {}", partial.display()))?;

        debug!(path = %path.display(), bytes = bytes.len(), "Cached beacon state");
        Ok(path)
    }
}

/// A [`BeaconStateSource`] that consults a [`StateCache`] for slot lookups
/// and fills it from the wrapped source on a miss.
pub struct CachedStateSource<S> {
    inner: S,
    cache: StateCache,
    chain_id: u64,
}

impl<S> CachedStateSource<S> {
    pub fn new(inner: S, cache: StateCache, chain_id: u64) -> Self {
        Self {
            inner,
            cache,
            chain_id,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: BeaconStateSource> BeaconStateSource for CachedStateSource<S> {
    #[instrument(skip(self), fields(chain_id = self.chain_id))]
    async fn get_state(&self, id: StateId) -> Result<VersionedBeaconState> {
        if let StateId::Slot(slot) = id {
            match self.cache.load(self.chain_id, slot).await {
                Ok(Some(state)) => {
                    debug!(slot, "State cache hit");
                    return Ok(state);
                }
                Ok(None) => {}
                Err(error) => {
                    return Err(error.context(format!("cached state at slot {slot} is unreadable")));
                }
            }
        }

        let state = self.inner.get_state(id).await?;
        match self.cache.store(self.chain_id, &state).await {
            Ok(path) => info!(slot = state.slot(), path = %path.display(), "Stored state in cache"),
            Err(error) => warn!(slot = state.slot(), error = %format!("{error:#}"), "Could not cache state"),
        }
        Ok(state)
    }
}
