pub mod block;
pub mod codec;
pub mod merkle;
pub mod serde_helpers;
pub mod transaction;
pub mod types;

pub use block::{Block, BlockHeader};
pub use codec::{CodecError, from_cbor, to_cbor};
pub use merkle::{MerkleProof, MerkleTree, ProofError, keccak256, verify_inclusion};
pub use transaction::Transaction;
pub use types::Hash32;
