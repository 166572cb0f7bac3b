use serde::{Deserialize, Serialize};

use crate::merkle::{MerkleProof, MerkleTree};
use crate::transaction::Transaction;
use crate::types::Hash32;

/// Timestamp baked into the genesis block so every node derives the same
/// genesis hash.
pub const GENESIS_TIMESTAMP: u64 = 1_620_000_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub height: u64,
    pub hash: Hash32,
    pub last_hash: Hash32,
    pub last_hash_proof: MerkleProof,
    pub timestamp: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub data: Vec<Transaction>,
}

impl Block {
    /// Assemble a block over the given transactions.
    ///
    /// The header hash is the merkle root over the predecessor hash followed
    /// by the transaction content hashes, so both the predecessor linkage
    /// proof and every transaction inclusion proof verify against it.
    pub fn new(height: u64, last_hash: Hash32, timestamp: u64, mut data: Vec<Transaction>) -> Self {
        let mut leaves = Vec::with_capacity(data.len() + 1);
        leaves.push(last_hash.as_bytes().to_vec());
        leaves.extend(data.iter().map(|tx| tx.hash.as_bytes().to_vec()));

        let tree = MerkleTree::build(&leaves);
        let hash = tree.root();
        let last_hash_proof = tree
            .proof(0)
            .expect("tree always contains the predecessor leaf");
        for (i, tx) in data.iter_mut().enumerate() {
            tx.merkle_proof = tree.proof(i + 1);
        }

        Block {
            header: BlockHeader {
                height,
                hash,
                last_hash,
                last_hash_proof,
                timestamp,
            },
            data,
        }
    }

    /// The distinguished height-0 block. The only block permitted to exist
    /// without a validated predecessor.
    pub fn genesis() -> Self {
        Block::new(0, Hash32::ZERO, GENESIS_TIMESTAMP, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::verify_inclusion;

    #[test]
    fn test_genesis_is_deterministic() {
        let a = Block::genesis();
        let b = Block::genesis();
        assert_eq!(a, b);
        assert_eq!(a.header.height, 0);
        assert!(a.header.last_hash.is_zero());
        assert!(a.data.is_empty());
    }

    #[test]
    fn test_last_hash_proof_verifies() {
        let genesis = Block::genesis();
        let block = Block::new(1, genesis.header.hash, 100, Vec::new());
        assert!(
            verify_inclusion(
                &block.header.hash,
                genesis.header.hash.as_bytes(),
                &block.header.last_hash_proof,
            )
            .unwrap()
        );
    }

    #[test]
    fn test_transaction_proofs_verify() {
        let genesis = Block::genesis();
        let txs = vec![
            Transaction::new(1, b"a".to_vec()),
            Transaction::new(2, b"b".to_vec()),
            Transaction::new(3, b"c".to_vec()),
        ];
        let block = Block::new(1, genesis.header.hash, 100, txs);
        for tx in &block.data {
            let proof = tx.merkle_proof.as_ref().unwrap();
            assert!(verify_inclusion(&block.header.hash, tx.hash.as_bytes(), proof).unwrap());
        }
    }

    #[test]
    fn test_cbor_round_trip_is_byte_stable() {
        let block = Block::new(
            1,
            Block::genesis().header.hash,
            100,
            vec![Transaction::new(1, b"a".to_vec())],
        );
        let bytes = crate::to_cbor(&block).unwrap();
        let decoded: Block = crate::from_cbor(&bytes).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(crate::to_cbor(&decoded).unwrap(), bytes);
    }
}
