//! Merkle tree implementation for the fraud proof system.
//!
//! Binary commitment over an ordered vector of 32-byte leaves. Internal
//! nodes are `keccak256(left || right)` with raw concatenation. Odd-sized
//! levels promote the unpaired last node unchanged to the next level, so
//! proofs on a promoted path come out shorter than the tree depth.

use alloy_primitives::{keccak256, B256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during Merkle tree operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MerkleError {
    /// A tree cannot be built over zero leaves.
    #[error("Merkle tree requires at least one leaf")]
    EmptyTree,

    /// The requested leaf index does not exist.
    #[error("Leaf index {index} out of bounds for {len} leaves")]
    IndexOutOfBounds {
        /// Requested index.
        index: usize,
        /// Number of leaves in the tree.
        len: usize,
    },
}

/// Inclusion proof for a single leaf.
///
/// `siblings` is ordered leaf-to-root and contains one entry per level at
/// which the proven node actually had a sibling. `index` is the path
/// index: its bit `k` gives the side of the proven node when combining
/// with `siblings[k]` (0 means the node is the left input). Levels where
/// the node was promoted contribute neither a sibling nor an index bit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Sibling hashes, leaf-to-root.
    pub siblings: Vec<B256>,

    /// Path index consumed one bit per sibling.
    pub index: u64,
}

/// Hash two sibling nodes into their parent.
pub fn hash_pair(left: &B256, right: &B256) -> B256 {
    let mut input = [0u8; 64];
    input[..32].copy_from_slice(left.as_slice());
    input[32..].copy_from_slice(right.as_slice());
    keccak256(input)
}

/// Merkle tree over an ordered, non-empty leaf vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    /// Leaves of the tree.
    leaves: Vec<B256>,

    /// Root of the tree.
    root: B256,
}

impl MerkleTree {
    /// Create a new Merkle tree from leaves. The leaf vector must be
    /// non-empty; a single leaf is its own root.
    pub fn new(leaves: Vec<B256>) -> Result<Self, MerkleError> {
        let root = compute_root(&leaves)?;
        Ok(Self { leaves, root })
    }

    /// Get the root of the tree.
    pub fn root(&self) -> B256 {
        self.root
    }

    /// Get the number of leaves in the tree.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// A constructed tree always holds at least one leaf.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Get the depth of the tree.
    pub fn depth(&self) -> u32 {
        tree_depth(self.leaves.len())
    }

    /// Get a leaf by index.
    pub fn leaf(&self, index: usize) -> Option<B256> {
        self.leaves.get(index).copied()
    }

    /// Generate an inclusion proof for the leaf at `index`.
    ///
    /// At each level the sibling at `position ^ 1` is appended when it
    /// exists; an unpaired last node is promoted and the level is skipped
    /// entirely, which is why the proof records its own path index rather
    /// than reusing the leaf position.
    pub fn generate_proof(&self, index: usize) -> Result<MerkleProof, MerkleError> {
        if index >= self.leaves.len() {
            return Err(MerkleError::IndexOutOfBounds {
                index,
                len: self.leaves.len(),
            });
        }

        let mut siblings = Vec::new();
        let mut path_index: u64 = 0;
        let mut bit = 0u32;
        let mut level = self.leaves.clone();
        let mut position = index;

        while level.len() > 1 {
            let sibling = position ^ 1;
            if sibling < level.len() {
                siblings.push(level[sibling]);
                path_index |= ((position & 1) as u64) << bit;
                bit += 1;
            }

            level = next_level(&level);
            position >>= 1;
        }

        Ok(MerkleProof {
            siblings,
            index: path_index,
        })
    }
}

/// Compute the root over `leaves` without retaining the tree.
///
/// Fails on an empty leaf vector; a single leaf is returned unchanged.
pub fn compute_root(leaves: &[B256]) -> Result<B256, MerkleError> {
    if leaves.is_empty() {
        return Err(MerkleError::EmptyTree);
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = next_level(&level);
    }

    Ok(level[0])
}

/// Number of levels above the leaves: 0 for at most one leaf, otherwise
/// the number of ceil-halvings required to reach a single node.
pub fn tree_depth(leaf_count: usize) -> u32 {
    if leaf_count <= 1 {
        return 0;
    }

    let mut depth = 0;
    let mut count = leaf_count;
    while count > 1 {
        count = count.div_ceil(2);
        depth += 1;
    }

    depth
}

/// Verify an inclusion proof against `root`.
///
/// Walks leaf-to-root, combining with each sibling on the side selected
/// by the current low bit of the path index. An empty proof with index 0
/// verifies exactly when the leaf is the root itself.
pub fn verify_proof(leaf: B256, root: B256, proof: &MerkleProof) -> bool {
    let mut hash = leaf;
    let mut index = proof.index;

    for sibling in &proof.siblings {
        hash = if index & 1 == 0 {
            hash_pair(&hash, sibling)
        } else {
            hash_pair(sibling, &hash)
        };
        index >>= 1;
    }

    hash == root
}

/// Reduce one level to the next, pairing adjacent nodes and promoting an
/// unpaired last node unchanged.
fn next_level(level: &[B256]) -> Vec<B256> {
    let mut next = Vec::with_capacity(level.len().div_ceil(2));

    let mut pairs = level.chunks_exact(2);
    for pair in &mut pairs {
        next.push(hash_pair(&pair[0], &pair[1]));
    }
    if let [unpaired] = pairs.remainder() {
        next.push(*unpaired);
    }

    next
}
