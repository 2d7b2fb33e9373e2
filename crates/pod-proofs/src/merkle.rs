//! Sparse Merkle Proof Generation
//!
//! Generates SSZ Merkle proofs without allocating the padded tree. A list
//! such as `List<Validator, 2^40>` is proven by keeping only the layers that
//! hold real data and substituting precomputed "zero hashes" for every
//! absent subtree.
//!
//! # Approach
//! 1. Hash individual elements into 32-byte leaves
//! 2. Build each occupied layer by hashing adjacent pairs, padding an odd
//!    tail with the zero hash of that level
//! 3. Read sibling paths straight out of the layers
//!
//! Proofs are ordered from the leaf's sibling up to the child of the root.

use crate::proof::ProofError;
use crate::types::Root;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// Maximum supported tree depth
pub const MAX_DEPTH: u32 = 63;

/// `ZERO_HASHES[0]` is the zero chunk, `ZERO_HASHES[i] = hash(ZERO_HASHES[i-1], ZERO_HASHES[i-1])`.
static ZERO_HASHES: LazyLock<Vec<Root>> = LazyLock::new(|| {
    let mut hashes = vec![[0u8; 32]; MAX_DEPTH as usize + 1];
    let mut hasher = Sha256::new();
    for i in 1..=MAX_DEPTH as usize {
        hasher.update(hashes[i - 1]);
        hasher.update(hashes[i - 1]);
        hashes[i] = hasher.finalize_reset().into();
    }
    hashes
});

/// Root of an all-zero subtree of the given depth.
#[must_use]
pub fn zero_hash(depth: u32) -> Root {
    ZERO_HASHES[depth.min(MAX_DEPTH) as usize]
}

/// SHA-256 hash of two 32-byte nodes
#[must_use]
pub fn hash_pair(left: &Root, right: &Root) -> Root {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// The 32-byte chunk holding a list length, as mixed into list roots.
#[must_use]
pub fn length_chunk(length: usize) -> Root {
    let mut chunk = [0u8; 32];
    chunk[..8].copy_from_slice(&(length as u64).to_le_bytes());
    chunk
}

/// Mix in the length for a List's Merkle root.
/// `list_root = hash(data_root, length_as_le_bytes32)`
#[must_use]
pub fn mix_in_length(data_root: Root, length: usize) -> Root {
    hash_pair(&data_root, &length_chunk(length))
}

/// A Merkle tree of fixed depth that stores only occupied nodes.
///
/// `layers[0]` holds the leaves, `layers[depth]` holds the root. Any node
/// past the end of its layer is the zero hash for that level.
#[derive(Debug, Clone)]
pub struct SparseMerkleTree {
    layers: Vec<Vec<Root>>,
    depth: u32,
}

impl SparseMerkleTree {
    /// Build the occupied layers over `leaves` for a tree with `2^depth` slots.
    ///
    /// # Errors
    /// Fails if `depth` exceeds [`MAX_DEPTH`] or there are more leaves than slots.
    pub fn new(leaves: Vec<Root>, depth: u32) -> Result<Self, ProofError> {
        if depth > MAX_DEPTH {
            return Err(ProofError::MalformedState(format!(
                "tree depth {depth} exceeds maximum {MAX_DEPTH}"
            )));
        }
        let capacity = 1u64 << depth;
        if leaves.len() as u64 > capacity {
            return Err(ProofError::MalformedState(format!(
                "{} leaves do not fit a tree of depth {depth}",
                leaves.len()
            )));
        }

        let mut layers = Vec::with_capacity(depth as usize + 1);
        layers.push(leaves);
        for level in 0..depth {
            let zero = zero_hash(level);
            let next: Vec<Root> = layers[level as usize]
                .chunks(2)
                .map(|pair| hash_pair(&pair[0], pair.get(1).unwrap_or(&zero)))
                .collect();
            layers.push(next);
        }

        Ok(Self { layers, depth })
    }

    /// Tree depth (number of sibling hashes in a proof).
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Number of real leaves.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.layers[0].len()
    }

    /// Leaf at `index`, zero if unoccupied.
    #[must_use]
    pub fn leaf(&self, index: u64) -> Root {
        self.node(0, index)
    }

    fn node(&self, level: u32, position: u64) -> Root {
        usize::try_from(position)
            .ok()
            .and_then(|p| self.layers[level as usize].get(p))
            .copied()
            .unwrap_or_else(|| zero_hash(level))
    }

    /// Root of the tree.
    #[must_use]
    pub fn root(&self) -> Root {
        self.node(self.depth, 0)
    }

    /// Sibling path for `index`, leaf to root.
    ///
    /// # Errors
    /// Fails if `index` does not address a slot of this tree.
    pub fn prove(&self, index: u64) -> Result<Vec<Root>, ProofError> {
        if index >= 1u64 << self.depth {
            return Err(ProofError::IndexOutOfRange {
                what: "tree leaf",
                index,
                len: 1u64 << self.depth,
            });
        }
        let mut position = index;
        let mut proof = Vec::with_capacity(self.depth as usize);
        for level in 0..self.depth {
            proof.push(self.node(level, position ^ 1));
            position >>= 1;
        }
        Ok(proof)
    }
}

/// Generate a Merkle proof for `leaf_chunks[index]` in a tree of depth `depth`.
///
/// Leaves beyond `leaf_chunks.len()` are zero. Returns `(proof, root)`.
///
/// # Errors
/// Fails if the leaves do not fit the tree or `index >= 2^depth`.
pub fn prove_against_leaf_chunks(
    leaf_chunks: &[Root],
    index: u64,
    depth: u32,
) -> Result<(Vec<Root>, Root), ProofError> {
    let tree = SparseMerkleTree::new(leaf_chunks.to_vec(), depth)?;
    let proof = tree.prove(index)?;
    Ok((proof, tree.root()))
}

/// Root of `leaf_chunks` zero-padded to `2^depth` leaves.
///
/// # Errors
/// Fails if the leaves do not fit the tree.
pub fn merkleize(leaf_chunks: &[Root], depth: u32) -> Result<Root, ProofError> {
    Ok(SparseMerkleTree::new(leaf_chunks.to_vec(), depth)?.root())
}

/// Generate a Merkle proof for an element within a `List<T, N>`.
///
/// The proof walks the data tree (`list_limit_depth` siblings) and then
/// takes the length chunk as the final sibling. Returns
/// `(proof_from_leaf_to_list_root, list_root)`.
///
/// # Errors
/// Fails under the same conditions as [`prove_against_leaf_chunks`].
pub fn prove_list_element(
    element_hashes: &[Root],
    element_index: u64,
    list_limit_depth: u32,
    list_length: usize,
) -> Result<(Vec<Root>, Root), ProofError> {
    let (mut proof, data_root) =
        prove_against_leaf_chunks(element_hashes, element_index, list_limit_depth)?;
    proof.push(length_chunk(list_length));
    Ok((proof, mix_in_length(data_root, list_length)))
}

/// Fold `leaf` up through `proof`, using the bits of `index` to pick sides.
#[must_use]
pub fn compute_root(leaf: Root, proof: &[Root], index: u64) -> Root {
    proof.iter().enumerate().fold(leaf, |current, (level, sibling)| {
        if (index >> level) & 1 == 0 {
            hash_pair(&current, sibling)
        } else {
            hash_pair(sibling, &current)
        }
    })
}

/// Check that `proof` links `leaf` at `index` to `root`.
#[must_use]
pub fn verify(leaf: Root, proof: &[Root], index: u64, root: Root) -> bool {
    compute_root(leaf, proof, index) == root
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use ssz_rs::prelude::*;

    fn leaf(byte: u8) -> Root {
        [byte; 32]
    }

    #[test]
    fn test_zero_hashes() {
        assert_eq!(zero_hash(0), [0u8; 32]);
        assert_eq!(zero_hash(1), hash_pair(&[0u8; 32], &[0u8; 32]));
        assert_eq!(zero_hash(2), hash_pair(&zero_hash(1), &zero_hash(1)));
    }

    #[test]
    fn test_prove_depth_0() {
        let (proof, root) = prove_against_leaf_chunks(&[leaf(42)], 0, 0).unwrap();
        assert!(proof.is_empty());
        assert_eq!(root, leaf(42));
    }

    #[test]
    fn test_prove_single_leaf() {
        let (proof, root) = prove_against_leaf_chunks(&[leaf(1)], 0, 1).unwrap();
        assert_eq!(proof, vec![[0u8; 32]]);
        assert_eq!(root, hash_pair(&leaf(1), &[0u8; 32]));
    }

    #[test]
    fn test_four_leaf_tree_index_two() {
        let leaves = [leaf(1), leaf(2), leaf(3), leaf(4)];
        let (proof, root) = prove_against_leaf_chunks(&leaves, 2, 2).unwrap();

        let left = hash_pair(&leaves[0], &leaves[1]);
        let right = hash_pair(&leaves[2], &leaves[3]);
        assert_eq!(proof, vec![leaves[3], left]);
        assert_eq!(root, hash_pair(&left, &right));
        assert_eq!(compute_root(leaves[2], &proof, 2), root);
    }

    #[test]
    fn test_empty_leaves_use_zero_hashes() {
        let (proof, root) = prove_against_leaf_chunks(&[], 5, 6).unwrap();
        for (level, sibling) in proof.iter().enumerate() {
            assert_eq!(*sibling, zero_hash(level as u32));
        }
        assert_eq!(root, zero_hash(6));
    }

    #[test]
    fn test_virtual_padding() {
        let leaves = [leaf(1), leaf(2), leaf(3)];
        let (proof, root) = prove_against_leaf_chunks(&leaves, 0, 2).unwrap();
        assert_eq!(proof[0], leaf(2));
        assert_eq!(proof[1], hash_pair(&leaf(3), &zero_hash(0)));
        assert!(verify(leaf(1), &proof, 0, root));
    }

    #[test]
    fn test_depth_40_with_three_leaves() {
        let leaves = [leaf(0xAA), leaf(0xBB), leaf(0xCC)];
        let (proof, root) = prove_against_leaf_chunks(&leaves, 1, 40).unwrap();
        assert_eq!(proof.len(), 40);
        assert_eq!(proof[0], leaf(0xAA));
        assert_eq!(proof[1], hash_pair(&leaf(0xCC), &zero_hash(0)));
        for level in 2..40 {
            assert_eq!(proof[level], zero_hash(level as u32));
        }
        assert!(verify(leaf(0xBB), &proof, 1, root));
    }

    #[test]
    fn test_index_out_of_range() {
        let err = prove_against_leaf_chunks(&[leaf(1)], 4, 2).unwrap_err();
        assert!(matches!(err, ProofError::IndexOutOfRange { index: 4, .. }));
    }

    #[test]
    fn test_too_many_leaves() {
        let leaves = vec![leaf(1); 5];
        assert!(SparseMerkleTree::new(leaves, 2).is_err());
    }

    #[test]
    fn test_list_element_appends_length() {
        let elements = [leaf(0xAA), leaf(0xBB)];
        let (proof, list_root) = prove_list_element(&elements, 0, 2, 2).unwrap();
        assert_eq!(proof.len(), 3);
        assert_eq!(proof[2], length_chunk(2));
        let data_root = merkleize(&elements, 2).unwrap();
        assert_eq!(list_root, mix_in_length(data_root, 2));
        assert!(verify(elements[0], &proof, 0, list_root));
    }

    #[test]
    fn test_list_root_matches_ssz_rs() {
        let mut list = List::<u64, 64>::default();
        for value in [7u64, 11, 13, 17, 19] {
            list.push(value);
        }
        let expected: Root = list.hash_tree_root().unwrap().into();

        // 4 u64 values pack into one chunk; 64 values need 16 chunks (depth 4)
        let mut chunks = vec![[0u8; 32]; 2];
        for (i, value) in [7u64, 11, 13, 17, 19].iter().enumerate() {
            let offset = (i % 4) * 8;
            chunks[i / 4][offset..offset + 8].copy_from_slice(&value.to_le_bytes());
        }
        let root = mix_in_length(merkleize(&chunks, 4).unwrap(), 5);
        assert_eq!(root, expected);
    }

    #[test]
    fn test_verify_proof_with_ssz_rs() {
        let leaves = [leaf(1), leaf(2), leaf(3), leaf(4)];
        let (proof, root) = prove_against_leaf_chunks(&leaves, 2, 2).unwrap();

        let root_node = Node::try_from(root.as_slice()).unwrap();
        let leaf_node = Node::try_from(leaves[2].as_slice()).unwrap();
        let branch: Vec<Node> = proof
            .iter()
            .map(|b| Node::try_from(b.as_slice()).unwrap())
            .collect();

        // gindex for index 2 at depth 2 = 4 + 2 = 6
        ssz_rs::proofs::is_valid_merkle_branch_for_generalized_index(
            leaf_node, &branch, 6, root_node,
        )
        .expect("proof should be valid");
    }

    fn leaves_strategy() -> impl Strategy<Value = (Vec<Root>, u32)> {
        (1u32..=8).prop_flat_map(|depth| {
            let max = 1usize << depth;
            (prop::collection::vec(any::<[u8; 32]>(), 0..=max), Just(depth))
        })
    }

    proptest! {
        #[test]
        fn prop_folding_proof_reproduces_root((leaves, depth) in leaves_strategy(), pick in any::<u64>()) {
            let index = pick % (1u64 << depth);
            let (proof, root) = prove_against_leaf_chunks(&leaves, index, depth).unwrap();
            prop_assert_eq!(proof.len(), depth as usize);
            let leaf = leaves.get(index as usize).copied().unwrap_or([0u8; 32]);
            prop_assert_eq!(compute_root(leaf, &proof, index), root);
        }

        #[test]
        fn prop_zero_padding_matches_explicit_padding((leaves, depth) in leaves_strategy(), pick in any::<u64>()) {
            let index = pick % (1u64 << depth);
            let mut padded = leaves.clone();
            padded.resize(1usize << depth, [0u8; 32]);
            let sparse = prove_against_leaf_chunks(&leaves, index, depth).unwrap();
            let dense = prove_against_leaf_chunks(&padded, index, depth).unwrap();
            prop_assert_eq!(sparse, dense);
        }
    }
}
