//! SSZ leaf hashing for the basic values that appear as container fields.
//!
//! Each function returns the 32-byte chunk a field contributes to its
//! parent container. Byte strings longer than one chunk are merkleized.

use crate::merkle::merkleize;
use crate::types::{Address, Root};
use sha2::{Digest, Sha256};

/// Little-endian u64 in the low 8 bytes of a zero chunk.
#[must_use]
pub fn hash_u64(value: u64) -> Root {
    let mut chunk = [0u8; 32];
    chunk[..8].copy_from_slice(&value.to_le_bytes());
    chunk
}

#[must_use]
pub fn hash_bool(value: bool) -> Root {
    let mut chunk = [0u8; 32];
    chunk[0] = u8::from(value);
    chunk
}

/// A 32-byte root is its own leaf.
#[must_use]
pub const fn hash_root(root: Root) -> Root {
    root
}

/// Address right-padded with zeros.
#[must_use]
pub fn hash_address(address: &Address) -> Root {
    let mut chunk = [0u8; 32];
    chunk[..20].copy_from_slice(address);
    chunk
}

/// Merkleize a fixed-size byte vector: pad to whole chunks and fold to a
/// power-of-two width.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> Root {
    let chunks: Vec<Root> = bytes
        .chunks(32)
        .map(|piece| {
            let mut chunk = [0u8; 32];
            chunk[..piece.len()].copy_from_slice(piece);
            chunk
        })
        .collect();
    match chunks.len() {
        0 => [0u8; 32],
        1 => chunks[0],
        n => {
            let depth = usize::BITS - (n - 1).leading_zeros();
            // `n` chunks always fit a tree of depth ceil(log2(n))
            merkleize(&chunks, depth).unwrap_or([0u8; 32])
        }
    }
}

/// Hash of a 48-byte BLS public key: `sha256(pubkey || 16 zero bytes)`.
///
/// Equal to the pubkey's SSZ hash tree root, and the key the EigenPod uses
/// to index its validators.
#[must_use]
pub fn pubkey_hash(pubkey: &[u8; 48]) -> Root {
    let mut hasher = Sha256::new();
    hasher.update(pubkey);
    hasher.update([0u8; 16]);
    hasher.finalize().into()
}
