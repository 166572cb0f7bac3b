use std::sync::Arc;

use libp2p_identity::PeerId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use containers::{Block, Hash32, ProofError, Transaction, from_cbor, verify_inclusion};
use pool::{BlockPool, BlockPoolError, Mempool, MempoolError};

use crate::client::{NetworkClient, RpcError};
use crate::gossipsub::topic::GossipsubKind;
use crate::pubsub::PubSubRouter;
use crate::sync::config::{MAX_BLOCK_COUNT_FOR_RETRIEVING, MAX_TRANSACTION_COUNT_FOR_RETRIEVING};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Pool(#[from] BlockPoolError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("bootstrap peer replied with error: {0}")]
    Remote(String),
}

/// Why a received block was refused admission to the pool.
#[derive(Debug, thiserror::Error)]
pub enum ProcessBlockError {
    #[error("failed to retrieve previous block {0}")]
    PredecessorMissing(u64),
    #[error("block header has invalid last block hash")]
    LastHashMismatch,
    #[error("header hash merkle tree doesn't contain hash of previous block")]
    LastHashProofInvalid,
    #[error("failed to verify merkle proof: {0}")]
    ProofVerification(#[from] ProofError),
    #[error("block transaction {0} hasn't merkle proof")]
    TxMissingProof(Hash32),
    #[error("transaction {0} doesn't present in header hash merkle tree")]
    TxProofInvalid(Hash32),
    #[error("transaction {0} hash is invalid")]
    TxHashInvalid(Hash32),
    #[error("failed to store block in pool: {0}")]
    Storage(#[from] BlockPoolError),
}

/// Drives initial catch-up against the bootstrap peer and owns the
/// steady-state gossip ingestion task.
///
/// Constructed with a `new_tx` subscription taken from the router, so the
/// router never holds a reference back into the manager. `start()` runs both
/// initial sync procedures on the caller's task and then spawns the
/// steady-state loop; `stop()` cancels and joins it.
pub struct SyncManager<C: NetworkClient> {
    block_pool: BlockPool,
    mempool: Mempool,
    client: Arc<C>,
    bootstrap_peer: PeerId,
    cancel: CancellationToken,
    sync_task: Option<JoinHandle<()>>,
    initial_sync_completed: bool,
    new_tx_subscription: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl<C: NetworkClient> SyncManager<C> {
    pub fn new(
        block_pool: BlockPool,
        mempool: Mempool,
        client: Arc<C>,
        bootstrap_peer: PeerId,
        router: &PubSubRouter,
    ) -> Self {
        let new_tx_subscription = router.subscribe(GossipsubKind::NewTx);

        Self {
            block_pool,
            mempool,
            client,
            bootstrap_peer,
            cancel: CancellationToken::new(),
            sync_task: None,
            initial_sync_completed: false,
            new_tx_subscription: Some(new_tx_subscription),
        }
    }

    /// Run the initial sync procedures, then launch the steady-state loop.
    ///
    /// Initial sync failures are logged and leave the node in a degraded
    /// state; they do not prevent steady-state gossip ingestion.
    pub async fn start(&mut self) {
        if let Err(err) = self.initial_block_pool_sync().await {
            error!(%err, "initial block pool sync failed");
        }
        if let Err(err) = self.initial_mempool_sync().await {
            error!(%err, "initial mempool sync failed");
        }
        self.initial_sync_completed = true;

        let new_tx = self
            .new_tx_subscription
            .take()
            .expect("start may only be called once");
        let mempool = self.mempool.clone();
        let cancel = self.cancel.clone();
        self.sync_task = Some(tokio::spawn(sync_loop(mempool, cancel, new_tx)));
    }

    /// Cancel the steady-state loop and wait for it to exit.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.sync_task.take() {
            if let Err(err) = task.await {
                warn!(%err, "sync loop task panicked");
            }
        }
    }

    pub fn initial_sync_completed(&self) -> bool {
        self.initial_sync_completed
    }

    /// Bring the local pool up to the bootstrap peer's tip.
    async fn initial_block_pool_sync(&self) -> Result<(), SyncError> {
        if self.initial_sync_completed {
            return Ok(());
        }

        let local_height = match self.block_pool.latest_block_height() {
            Ok(height) => height,
            Err(BlockPoolError::LatestHeightNil) => {
                self.block_pool.store_block(&Block::genesis())?;
                0
            }
            Err(err) => return Err(err.into()),
        };

        let reply = self.client.last_block_height(self.bootstrap_peer).await?;
        if let Some(err) = reply.error {
            return Err(SyncError::Remote(err));
        }

        if reply.height <= local_height {
            // TODO pick a better peer for syncing: the bootstrap peer's own
            // chain can be out of date.
            debug!(
                local_height,
                peer_height = reply.height,
                "local chain is at least as current as the bootstrap peer"
            );
            return Ok(());
        }

        let mut missing = reply.height - local_height;
        let mut to = local_height;
        let mut received_blocks = Vec::new();
        while missing > 0 {
            if self.cancel.is_cancelled() {
                info!("block pool sync cancelled, aborting remaining batches");
                return Ok(());
            }

            let from = to + 1;
            let batch = missing.min(MAX_BLOCK_COUNT_FOR_RETRIEVING);
            to += batch;
            missing -= batch;

            let reply = self
                .client
                .get_range_of_blocks(self.bootstrap_peer, from, to)
                .await?;
            if let Some(err) = reply.error {
                // the peer returns whatever blocks it could serve alongside
                // the error, so keep accumulating
                warn!(%err, from, to, "range reply carried an error");
            }
            received_blocks.extend(reply.blocks);
            if !reply.failed_block_heights.is_empty() {
                // FIXME retry these heights or fail the sync: the local
                // chain is left with gaps otherwise.
                warn!(
                    heights = ?reply.failed_block_heights,
                    "remote node is unable to retrieve block heights"
                );
            }
        }

        for block in received_blocks {
            let height = block.header.height;
            if let Err(err) = self.process_received_block(block) {
                warn!(height, %err, "unable to process block");
                continue;
            }
        }

        info!(
            height = self.block_pool.latest_block_height().unwrap_or(0),
            "block pool sync finished"
        );
        Ok(())
    }

    /// Validate a block received from the peer and admit it to the pool.
    pub fn process_received_block(&self, block: Block) -> Result<(), ProcessBlockError> {
        let header = &block.header;
        let prev_height = header
            .height
            .checked_sub(1)
            .ok_or(ProcessBlockError::PredecessorMissing(0))?;
        let previous_header = match self.block_pool.fetch_block_header_by_height(prev_height) {
            Ok(header) => header,
            Err(BlockPoolError::BlockNotFound) => {
                return Err(ProcessBlockError::PredecessorMissing(prev_height));
            }
            Err(err) => return Err(err.into()),
        };

        if header.last_hash != previous_header.hash {
            return Err(ProcessBlockError::LastHashMismatch);
        }
        match verify_inclusion(
            &header.hash,
            previous_header.hash.as_bytes(),
            &header.last_hash_proof,
        ) {
            Ok(true) => {}
            Ok(false) => return Err(ProcessBlockError::LastHashProofInvalid),
            Err(err) => return Err(err.into()),
        }

        for tx in &block.data {
            let proof = tx
                .merkle_proof
                .as_ref()
                .ok_or(ProcessBlockError::TxMissingProof(tx.hash))?;
            match verify_inclusion(&header.hash, tx.hash.as_bytes(), proof) {
                Ok(true) => {}
                Ok(false) => return Err(ProcessBlockError::TxProofInvalid(tx.hash)),
                Err(err) => return Err(err.into()),
            }
            if !tx.validate_hash() {
                return Err(ProcessBlockError::TxHashInvalid(tx.hash));
            }
        }

        self.block_pool.store_block(&block)?;

        Ok(())
    }

    /// Pull the transactions the bootstrap peer advertises that the local
    /// mempool is missing.
    async fn initial_mempool_sync(&self) -> Result<(), SyncError> {
        let reply = self.client.mempool_inventory(self.bootstrap_peer).await?;

        let mut txs_to_retrieve: Vec<Hash32> = reply
            .inventory
            .iter()
            .map(|item| item.hash)
            .filter(|hash| {
                matches!(
                    self.mempool.get_transaction(hash),
                    Err(MempoolError::TxNotFound)
                )
            })
            .collect();

        while !txs_to_retrieve.is_empty() {
            let split = txs_to_retrieve
                .len()
                .min(MAX_TRANSACTION_COUNT_FOR_RETRIEVING);
            let rest = txs_to_retrieve.split_off(split);
            let batch = std::mem::replace(&mut txs_to_retrieve, rest);

            let reply = self
                .client
                .get_mempool_txs(self.bootstrap_peer, batch)
                .await?;
            if let Some(err) = reply.error {
                return Err(SyncError::Remote(err));
            }
            for tx in reply.transactions {
                if let Err(err) = self.mempool.store_tx(&tx) {
                    warn!(hash = %tx.hash, %err, "failed to store synced transaction");
                }
            }
            // FIXME handle hashes the peer reported as unknown
        }

        info!(count = self.mempool.len(), "mempool sync finished");
        Ok(())
    }
}

/// Steady-state loop: lives until cancelled, feeding gossiped transactions
/// into the mempool. Also the extension point for periodic tip checks.
async fn sync_loop(
    mempool: Mempool,
    cancel: CancellationToken,
    mut new_tx: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            payload = new_tx.recv() => match payload {
                Some(payload) => on_new_transaction(&mempool, &payload),
                // router dropped; nothing left to ingest
                None => break,
            },
        }
    }
}

/// Handle a `new_tx` gossip payload. Fire-and-forget: failures are logged,
/// never surfaced to the router.
fn on_new_transaction(mempool: &Mempool, payload: &[u8]) {
    let tx: Transaction = match from_cbor(payload) {
        Ok(tx) => tx,
        Err(err) => {
            warn!(%err, "failed to decode payload to Transaction");
            return;
        }
    };

    if !tx.validate_hash() {
        warn!(hash = %tx.hash, "failed to validate tx hash, rejecting it");
        return;
    }

    if let Err(err) = mempool.store_tx(&tx) {
        warn!(hash = %tx.hash, %err, "failed to store incoming transaction in mempool");
    }
}

#[cfg(test)]
pub(crate) fn handle_new_transaction(mempool: &Mempool, payload: &[u8]) {
    on_new_transaction(mempool, payload)
}
