use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::types::Hash32;

/// Upper bound on proof length. A proof longer than this cannot come from
/// any tree a peer could legitimately build and is treated as a verifier
/// error rather than a plain mismatch.
pub const MAX_PROOF_DEPTH: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ProofError {
    #[error("merkle proof depth {0} exceeds maximum of {MAX_PROOF_DEPTH}")]
    DepthExceeded(usize),
}

/// Keccak-256 digest of `data`.
pub fn keccak256(data: &[u8]) -> Hash32 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    Hash32(hasher.finalize().into())
}

/// Parent hash of two sibling nodes. Pairs are combined in byte-wise sorted
/// order, so the verifier never needs to know which side a sibling was on.
fn hash_pair(a: &Hash32, b: &Hash32) -> Hash32 {
    let mut hasher = Keccak256::new();
    if a.0 <= b.0 {
        hasher.update(a.0);
        hasher.update(b.0);
    } else {
        hasher.update(b.0);
        hasher.update(a.0);
    }
    Hash32(hasher.finalize().into())
}

/// Inclusion proof: the sibling hashes on the path from a leaf to the root.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub hashes: Vec<Hash32>,
}

/// Check that `leaf` (raw leaf bytes, hashed internally) is included under
/// `root`. Returns `Ok(false)` on a sound proof that simply does not match,
/// and `Err` when the proof itself is malformed.
pub fn verify_inclusion(
    root: &Hash32,
    leaf: &[u8],
    proof: &MerkleProof,
) -> Result<bool, ProofError> {
    if proof.hashes.len() > MAX_PROOF_DEPTH {
        return Err(ProofError::DepthExceeded(proof.hashes.len()));
    }

    let mut current = keccak256(leaf);
    for sibling in &proof.hashes {
        current = hash_pair(&current, sibling);
    }

    Ok(current == *root)
}

/// Keccak-256 merkle tree over raw leaf byte strings.
///
/// An odd node at any level is promoted to the next level unchanged, which
/// keeps proofs free of placeholder siblings.
#[derive(Debug)]
pub struct MerkleTree {
    levels: Vec<Vec<Hash32>>,
}

impl MerkleTree {
    pub fn build<L: AsRef<[u8]>>(leaves: &[L]) -> Self {
        let mut levels = Vec::new();
        let mut level: Vec<Hash32> = leaves
            .iter()
            .map(|leaf| keccak256(leaf.as_ref()))
            .collect();
        levels.push(level.clone());

        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            for pair in level.chunks(2) {
                match pair {
                    [a, b] => next.push(hash_pair(a, b)),
                    [a] => next.push(*a),
                    _ => unreachable!(),
                }
            }
            levels.push(next.clone());
            level = next;
        }

        MerkleTree { levels }
    }

    pub fn root(&self) -> Hash32 {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or(Hash32::ZERO)
    }

    /// Proof for the leaf at `index`, or `None` if the index is out of range.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        let leaf_count = self.levels.first().map(Vec::len).unwrap_or(0);
        if index >= leaf_count {
            return None;
        }

        let mut hashes = Vec::new();
        let mut position = index;
        for level in &self.levels[..self.levels.len().saturating_sub(1)] {
            let sibling = position ^ 1;
            if sibling < level.len() {
                hashes.push(level[sibling]);
            }
            position /= 2;
        }

        Some(MerkleProof { hashes })
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map(Vec::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| format!("leaf-{i}").into_bytes()).collect()
    }

    #[test]
    fn test_single_leaf_proof() {
        let data = leaves(1);
        let tree = MerkleTree::build(&data);
        let proof = tree.proof(0).unwrap();
        assert!(proof.hashes.is_empty());
        assert!(verify_inclusion(&tree.root(), &data[0], &proof).unwrap());
    }

    #[test]
    fn test_all_leaves_verify() {
        for n in [2, 3, 5, 8, 13] {
            let data = leaves(n);
            let tree = MerkleTree::build(&data);
            for (i, leaf) in data.iter().enumerate() {
                let proof = tree.proof(i).unwrap();
                assert!(
                    verify_inclusion(&tree.root(), leaf, &proof).unwrap(),
                    "leaf {i} of {n} failed to verify"
                );
            }
        }
    }

    #[test]
    fn test_tampered_proof_fails() {
        let data = leaves(4);
        let tree = MerkleTree::build(&data);
        let mut proof = tree.proof(2).unwrap();
        proof.hashes[0].0[0] ^= 0xff;
        assert!(!verify_inclusion(&tree.root(), &data[2], &proof).unwrap());
    }

    #[test]
    fn test_wrong_leaf_fails() {
        let data = leaves(4);
        let tree = MerkleTree::build(&data);
        let proof = tree.proof(1).unwrap();
        assert!(!verify_inclusion(&tree.root(), b"not-a-leaf", &proof).unwrap());
    }

    #[test]
    fn test_oversized_proof_is_an_error() {
        let proof = MerkleProof {
            hashes: vec![Hash32::ZERO; MAX_PROOF_DEPTH + 1],
        };
        assert!(matches!(
            verify_inclusion(&Hash32::ZERO, b"leaf", &proof),
            Err(ProofError::DepthExceeded(_))
        ));
    }

    #[test]
    fn test_proof_index_out_of_range() {
        let tree = MerkleTree::build(&leaves(3));
        assert!(tree.proof(3).is_none());
    }
}
