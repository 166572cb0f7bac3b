use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use libp2p_identity::PeerId;
use parking_lot::Mutex;
use tempfile::TempDir;

use containers::{Block, Hash32, Transaction};
use pool::{BlockPool, Mempool};

use crate::client::{NetworkClient, RpcError};
use crate::pubsub::PubSubRouter;
use crate::sync::SyncManager;
use crate::wire::{
    GetMempoolTxsReply, GetRangeOfBlocksReply, InvItem, InvMessage, LastBlockHeightReply,
};

/// In-process bootstrap peer backed by hash maps, recording every call so
/// tests can assert batching behavior.
#[derive(Default)]
pub struct MockNetworkClient {
    pub peer_height: u64,
    pub blocks: HashMap<u64, Block>,
    pub mempool_txs: HashMap<Hash32, Transaction>,
    pub inventory: Vec<Hash32>,
    /// Heights inside a requested range to withhold and report as failed.
    pub failed_heights: Vec<u64>,
    /// Error string attached to every range reply.
    pub range_error: Option<String>,
    pub range_calls: Mutex<Vec<(u64, u64)>>,
    pub mempool_batch_calls: Mutex<Vec<usize>>,
}

#[async_trait]
impl NetworkClient for MockNetworkClient {
    async fn last_block_height(&self, _peer: PeerId) -> Result<LastBlockHeightReply, RpcError> {
        Ok(LastBlockHeightReply {
            height: self.peer_height,
            error: None,
        })
    }

    async fn get_range_of_blocks(
        &self,
        _peer: PeerId,
        from: u64,
        to: u64,
    ) -> Result<GetRangeOfBlocksReply, RpcError> {
        self.range_calls.lock().push((from, to));

        let mut blocks = Vec::new();
        let mut failed_block_heights = Vec::new();
        for height in from..=to {
            if self.failed_heights.contains(&height) {
                failed_block_heights.push(height);
            } else if let Some(block) = self.blocks.get(&height) {
                blocks.push(block.clone());
            } else {
                failed_block_heights.push(height);
            }
        }

        Ok(GetRangeOfBlocksReply {
            blocks,
            failed_block_heights,
            error: self.range_error.clone(),
        })
    }

    async fn mempool_inventory(&self, _peer: PeerId) -> Result<InvMessage, RpcError> {
        Ok(InvMessage {
            inventory: self
                .inventory
                .iter()
                .map(|hash| InvItem { hash: *hash })
                .collect(),
        })
    }

    async fn get_mempool_txs(
        &self,
        _peer: PeerId,
        items: Vec<Hash32>,
    ) -> Result<GetMempoolTxsReply, RpcError> {
        self.mempool_batch_calls.lock().push(items.len());

        Ok(GetMempoolTxsReply {
            transactions: items
                .iter()
                .filter_map(|hash| self.mempool_txs.get(hash).cloned())
                .collect(),
            error: None,
        })
    }
}

/// Blocks 1..=len chained off the shared genesis, each carrying a couple of
/// transactions so inclusion proofs are non-trivial.
pub fn build_chain(len: u64) -> Vec<Block> {
    let mut last_hash = Block::genesis().header.hash;
    let mut blocks = Vec::with_capacity(len as usize);
    for height in 1..=len {
        let txs = vec![
            Transaction::new(height * 2, format!("tx-{height}-a").into_bytes()),
            Transaction::new(height * 2 + 1, format!("tx-{height}-b").into_bytes()),
        ];
        let block = Block::new(height, last_hash, 100 + height, txs);
        last_hash = block.header.hash;
        blocks.push(block);
    }
    blocks
}

pub fn mock_with_chain(blocks: &[Block]) -> MockNetworkClient {
    MockNetworkClient {
        peer_height: blocks.last().map(|b| b.header.height).unwrap_or(0),
        blocks: blocks
            .iter()
            .map(|block| (block.header.height, block.clone()))
            .collect(),
        ..Default::default()
    }
}

pub struct TestNode {
    pub manager: SyncManager<MockNetworkClient>,
    pub client: Arc<MockNetworkClient>,
    pub block_pool: BlockPool,
    pub mempool: Mempool,
    pub router: Arc<PubSubRouter>,
    _dir: TempDir,
}

pub fn test_node(client: MockNetworkClient) -> TestNode {
    let dir = TempDir::new().unwrap();
    let block_pool = BlockPool::open(dir.path()).unwrap();
    let mempool = Mempool::new();
    let client = Arc::new(client);
    let router = Arc::new(PubSubRouter::new());
    let manager = SyncManager::new(
        block_pool.clone(),
        mempool.clone(),
        client.clone(),
        PeerId::random(),
        &router,
    );

    TestNode {
        manager,
        client,
        block_pool,
        mempool,
        router,
        _dir: dir,
    }
}
