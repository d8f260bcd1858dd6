//! Merkle batch attestation
//!
//! Binary SHA-256 Merkle tree over transaction hashes. When a level has an
//! odd number of nodes the last node is paired with itself, matching
//! Bitcoin-style trees. The tree commits to a batch via its root; an
//! inclusion proof lets a verifier confirm membership without the batch.

use crate::transaction::Transaction;
use sha2::{Digest, Sha256};

/// Which side the sibling hash sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Sibling is the left input of the parent hash
    Left,
    /// Sibling is the right input of the parent hash
    Right,
}

/// Hash of an internal node: `SHA256(left ‖ right)`
fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Inclusion proof: sibling hashes from leaf level to just below the root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    /// Leaf hash being proven
    pub leaf_hash: [u8; 32],
    /// Per level, the sibling hash and which side it sits on
    pub siblings: Vec<(Direction, [u8; 32])>,
}

impl MerkleProof {
    /// Fold the proof and compare against `root`
    pub fn verify(&self, root: &[u8; 32]) -> bool {
        let mut current = self.leaf_hash;
        for (direction, sibling) in &self.siblings {
            current = match direction {
                Direction::Left => hash_pair(sibling, &current),
                Direction::Right => hash_pair(&current, sibling),
            };
        }
        &current == root
    }
}

/// Merkle tree over a batch of transaction hashes.
///
/// All levels are materialized at construction so proof generation is a
/// walk, not a rebuild.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// levels[0] is the leaf level; the last level holds the single root
    levels: Vec<Vec<[u8; 32]>>,
}

impl MerkleTree {
    /// Build from raw leaf hashes
    pub fn from_leaves(leaves: Vec<[u8; 32]>) -> Self {
        if leaves.is_empty() {
            return Self { levels: Vec::new() };
        }

        let mut levels = vec![leaves];
        while levels.last().map(Vec::len).unwrap_or(0) > 1 {
            let current = levels.last().expect("levels is non-empty");
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            for pair in current.chunks(2) {
                let left = &pair[0];
                // Odd node pairs with itself
                let right = pair.get(1).unwrap_or(left);
                next.push(hash_pair(left, right));
            }
            levels.push(next);
        }

        Self { levels }
    }

    /// Build from a transaction batch; leaves are signing-preimage hashes
    pub fn from_transactions(batch: &[Transaction]) -> Self {
        Self::from_leaves(batch.iter().map(Transaction::hash).collect())
    }

    /// Number of leaves
    pub fn len(&self) -> usize {
        self.levels.first().map(Vec::len).unwrap_or(0)
    }

    /// True for the empty batch
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Root commitment; all zeros for the empty batch
    pub fn root(&self) -> [u8; 32] {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or([0u8; 32])
    }

    /// Inclusion proof for the leaf at `index`
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        let leaves = self.levels.first()?;
        let leaf_hash = *leaves.get(index)?;

        let mut siblings = Vec::new();
        let mut position = index;
        for level in &self.levels[..self.levels.len() - 1] {
            let (direction, sibling_index) = if position % 2 == 0 {
                (Direction::Right, position + 1)
            } else {
                (Direction::Left, position - 1)
            };
            // Odd node: its sibling is itself
            let sibling = level.get(sibling_index).copied().unwrap_or(level[position]);
            siblings.push((direction, sibling));
            position /= 2;
        }

        Some(MerkleProof {
            leaf_hash,
            siblings,
        })
    }

    /// Inclusion proof for the first leaf matching `leaf_hash`; `None` when
    /// the hash is not in the batch
    pub fn proof_for(&self, leaf_hash: &[u8; 32]) -> Option<MerkleProof> {
        let index = self.levels.first()?.iter().position(|h| h == leaf_hash)?;
        self.proof(index)
    }
}
