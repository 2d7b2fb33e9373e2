//! Network and fork resolution.
//!
//! Every chain-specific constant lives in [`Network`]. Proof builders take a
//! resolved [`Fork`] and never compare slots against fork boundaries
//! themselves.

use crate::constants::{SECONDS_PER_SLOT, SLOTS_PER_HISTORICAL_ROOT};
use crate::proof::ProofError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Beacon-chain forks with a supported state and payload layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fork {
    Capella,
    Deneb,
}

impl Fork {
    /// Depth of the execution payload container.
    #[must_use]
    pub const fn execution_payload_depth(self) -> u32 {
        match self {
            // 15 fields
            Fork::Capella => 4,
            // 17 fields
            Fork::Deneb => 5,
        }
    }

    /// Tag byte used by the on-disk state cache.
    #[must_use]
    pub const fn tag(self) -> u8 {
        match self {
            Fork::Capella => 0,
            Fork::Deneb => 1,
        }
    }

    /// Inverse of [`Fork::tag`].
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Fork::Capella),
            1 => Some(Fork::Deneb),
            _ => None,
        }
    }
}

impl fmt::Display for Fork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fork::Capella => write!(f, "capella"),
            Fork::Deneb => write!(f, "deneb"),
        }
    }
}

impl FromStr for Fork {
    type Err = String;

    /// Parses the beacon API `Eth-Consensus-Version` / `version` value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "capella" => Ok(Fork::Capella),
            "deneb" => Ok(Fork::Deneb),
            other => Err(format!("unsupported consensus version: {other}")),
        }
    }
}

/// Networks with known fork boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Goerli,
    Holesky,
}

impl Network {
    /// Look up a network by execution-layer chain id.
    ///
    /// # Errors
    /// Unknown chain ids are [`ProofError::UnsupportedFork`].
    pub fn from_chain_id(chain_id: u64) -> Result<Self, ProofError> {
        match chain_id {
            1 => Ok(Network::Mainnet),
            5 => Ok(Network::Goerli),
            17000 => Ok(Network::Holesky),
            _ => Err(ProofError::UnsupportedFork { chain_id, slot: 0 }),
        }
    }

    #[must_use]
    pub const fn chain_id(self) -> u64 {
        match self {
            Network::Mainnet => 1,
            Network::Goerli => 5,
            Network::Holesky => 17000,
        }
    }

    /// First slot of the Capella fork.
    #[must_use]
    pub const fn first_capella_slot(self) -> u64 {
        match self {
            Network::Mainnet => 6_209_536,
            Network::Goerli => 5_193_728,
            Network::Holesky => 8_192,
        }
    }

    /// First slot of the Deneb fork.
    #[must_use]
    pub const fn first_deneb_slot(self) -> u64 {
        match self {
            Network::Mainnet => 8_626_176,
            Network::Goerli => 7_413_760,
            Network::Holesky => 950_272,
        }
    }

    /// Resolve the fork active at `slot`.
    ///
    /// # Errors
    /// Slots before Capella are [`ProofError::UnsupportedFork`].
    pub fn fork_at(self, slot: u64) -> Result<Fork, ProofError> {
        if slot >= self.first_deneb_slot() {
            Ok(Fork::Deneb)
        } else if slot >= self.first_capella_slot() {
            Ok(Fork::Capella)
        } else {
            Err(ProofError::UnsupportedFork {
                chain_id: self.chain_id(),
                slot,
            })
        }
    }

    /// Index into `historical_summaries` covering `slot`.
    ///
    /// # Errors
    /// Slots before Capella have no historical summary.
    pub fn historical_summary_index(self, slot: u64) -> Result<u64, ProofError> {
        let first = self.first_capella_slot();
        if slot < first {
            return Err(ProofError::UnsupportedFork {
                chain_id: self.chain_id(),
                slot,
            });
        }
        Ok((slot - first) / SLOTS_PER_HISTORICAL_ROOT)
    }

    /// Slot of the state whose `block_roots` were archived into the
    /// historical summary covering `withdrawal_slot`.
    ///
    /// # Errors
    /// Slots before Capella have no historical summary.
    pub fn historical_summary_state_slot(self, withdrawal_slot: u64) -> Result<u64, ProofError> {
        let index = self.historical_summary_index(withdrawal_slot)?;
        Ok(self.first_capella_slot() + (index + 1) * SLOTS_PER_HISTORICAL_ROOT)
    }
}

/// Index of `slot` inside a `block_roots` vector.
#[must_use]
pub const fn block_root_index(slot: u64) -> u64 {
    slot % SLOTS_PER_HISTORICAL_ROOT
}

/// A withdrawal is provable once its block root has been archived into a
/// historical summary visible from the oracle state.
#[must_use]
pub const fn is_provable_withdrawal(oracle_slot: u64, withdrawal_slot: u64) -> bool {
    oracle_slot > SLOTS_PER_HISTORICAL_ROOT + withdrawal_slot
}

/// Wall-clock timestamp of `slot`.
#[must_use]
pub const fn slot_timestamp(genesis_time: u64, slot: u64) -> u64 {
    genesis_time + slot * SECONDS_PER_SLOT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fork_dispatch_at_boundaries() {
        let mainnet = Network::Mainnet;
        assert_eq!(mainnet.fork_at(8_626_175).unwrap(), Fork::Capella);
        assert_eq!(mainnet.fork_at(8_626_176).unwrap(), Fork::Deneb);
        assert!(matches!(
            mainnet.fork_at(6_209_535),
            Err(ProofError::UnsupportedFork { chain_id: 1, .. })
        ));

        let holesky = Network::Holesky;
        assert_eq!(holesky.fork_at(950_271).unwrap(), Fork::Capella);
        assert_eq!(holesky.fork_at(950_272).unwrap(), Fork::Deneb);
    }

    #[test]
    fn test_unknown_chain_is_unsupported() {
        assert!(Network::from_chain_id(0).is_err());
        assert_eq!(Network::from_chain_id(17000).unwrap(), Network::Holesky);
        for network in [Network::Mainnet, Network::Goerli, Network::Holesky] {
            assert_eq!(Network::from_chain_id(network.chain_id()).unwrap(), network);
        }
    }

    #[test]
    fn test_payload_depth_per_fork() {
        assert_eq!(Fork::Capella.execution_payload_depth(), 4);
        assert_eq!(Fork::Deneb.execution_payload_depth(), 5);
    }

    #[test]
    fn test_historical_summary_math() {
        let network = Network::Mainnet;
        let slot = network.first_capella_slot() + 3 * 8192 + 17;
        assert_eq!(network.historical_summary_index(slot).unwrap(), 3);
        assert_eq!(
            network.historical_summary_state_slot(slot).unwrap(),
            network.first_capella_slot() + 4 * 8192
        );
        assert_eq!(block_root_index(slot), slot % 8192);
    }

    #[test]
    fn test_is_provable_withdrawal() {
        assert!(!is_provable_withdrawal(8192 + 100, 100));
        assert!(is_provable_withdrawal(8192 + 101, 100));
    }

    #[test]
    fn test_fork_parse_and_tag() {
        assert_eq!("DENEB".parse::<Fork>().unwrap(), Fork::Deneb);
        assert!("bellatrix".parse::<Fork>().is_err());
        for fork in [Fork::Capella, Fork::Deneb] {
            assert_eq!(Fork::from_tag(fork.tag()), Some(fork));
        }
    }

    #[test]
    fn test_slot_timestamp() {
        assert_eq!(slot_timestamp(1_606_824_023, 10), 1_606_824_023 + 120);
    }
}
