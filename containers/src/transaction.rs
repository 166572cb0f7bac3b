use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::merkle::MerkleProof;
use crate::types::Hash32;

/// A pending or block-included transaction.
///
/// The payload is opaque to the sync core; the hash commits to the timestamp
/// and payload. `merkle_proof` is only present once the transaction has been
/// placed in a block and proves inclusion under that block's header hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: Hash32,
    pub timestamp: u64,
    #[serde(with = "crate::serde_helpers::byte_vec")]
    pub data: Vec<u8>,
    pub merkle_proof: Option<MerkleProof>,
}

impl Transaction {
    pub fn new(timestamp: u64, data: Vec<u8>) -> Self {
        let hash = Self::content_hash(timestamp, &data);
        Transaction {
            hash,
            timestamp,
            data,
            merkle_proof: None,
        }
    }

    fn content_hash(timestamp: u64, data: &[u8]) -> Hash32 {
        let mut hasher = Keccak256::new();
        hasher.update(timestamp.to_be_bytes());
        hasher.update(data);
        Hash32(hasher.finalize().into())
    }

    /// True iff `hash` equals the recomputed content hash.
    pub fn validate_hash(&self) -> bool {
        self.hash == Self::content_hash(self.timestamp, &self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_transaction_validates() {
        let tx = Transaction::new(42, b"payload".to_vec());
        assert!(tx.validate_hash());
    }

    #[test]
    fn test_tampered_payload_fails_validation() {
        let mut tx = Transaction::new(42, b"payload".to_vec());
        tx.data.push(0);
        assert!(!tx.validate_hash());
    }

    #[test]
    fn test_tampered_hash_fails_validation() {
        let mut tx = Transaction::new(42, b"payload".to_vec());
        tx.hash.0[0] ^= 0x01;
        assert!(!tx.validate_hash());
    }

    #[test]
    fn test_cbor_round_trip() {
        let tx = Transaction::new(7, vec![1, 2, 3]);
        let bytes = crate::to_cbor(&tx).unwrap();
        let decoded: Transaction = crate::from_cbor(&bytes).unwrap();
        assert_eq!(decoded, tx);
        assert!(decoded.validate_hash());
    }
}
