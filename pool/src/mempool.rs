use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use containers::{Hash32, Transaction};

#[derive(Debug, thiserror::Error)]
pub enum MempoolError {
    #[error("transaction isn't found")]
    TxNotFound,
    #[error("transaction {0} failed hash validation")]
    InvalidHash(Hash32),
}

/// Keyed store for pending transactions.
///
/// Shared between the sync manager and the gossip path; a handle clone is a
/// cheap `Arc` copy. Re-storing a known transaction is a no-op, so repeated
/// gossip deliveries are harmless.
#[derive(Clone, Default)]
pub struct Mempool {
    inner: Arc<RwLock<HashMap<Hash32, Transaction>>>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a pending transaction. Idempotent: a duplicate store succeeds
    /// without replacing the existing entry.
    pub fn store_tx(&self, tx: &Transaction) -> Result<(), MempoolError> {
        if !tx.validate_hash() {
            return Err(MempoolError::InvalidHash(tx.hash));
        }
        self.inner
            .write()
            .entry(tx.hash)
            .or_insert_with(|| tx.clone());
        Ok(())
    }

    pub fn get_transaction(&self, hash: &Hash32) -> Result<Transaction, MempoolError> {
        self.inner
            .read()
            .get(hash)
            .cloned()
            .ok_or(MempoolError::TxNotFound)
    }

    pub fn contains(&self, hash: &Hash32) -> bool {
        self.inner.read().contains_key(hash)
    }

    /// All known transaction hashes.
    pub fn inventory(&self) -> Vec<Hash32> {
        self.inner.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
