use async_trait::async_trait;
use libp2p_identity::PeerId;
use tokio::sync::{mpsc, oneshot};

use containers::{CodecError, Hash32};

use crate::types::OutboundP2pRequest;
use crate::wire::{
    GetMempoolTxsReply, GetRangeOfBlocksReply, InvMessage, LastBlockHeightReply, NetworkRequest,
    NetworkResponse,
};

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("rpc transport failure: {0}")]
    Transport(String),
    #[error("peer replied with error: {0}")]
    Remote(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("peer sent a {got} reply to a {expected} request")]
    UnexpectedResponse {
        expected: &'static str,
        got: &'static str,
    },
}

/// Client side of the peer RPC protocol.
///
/// Abstracts the network layer so the sync manager can be exercised against
/// an in-process mock.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    async fn last_block_height(&self, peer: PeerId) -> Result<LastBlockHeightReply, RpcError>;

    async fn get_range_of_blocks(
        &self,
        peer: PeerId,
        from: u64,
        to: u64,
    ) -> Result<GetRangeOfBlocksReply, RpcError>;

    async fn mempool_inventory(&self, peer: PeerId) -> Result<InvMessage, RpcError>;

    async fn get_mempool_txs(
        &self,
        peer: PeerId,
        items: Vec<Hash32>,
    ) -> Result<GetMempoolTxsReply, RpcError>;
}

fn response_name(response: &NetworkResponse) -> &'static str {
    match response {
        NetworkResponse::LastBlockHeight(_) => "LastBlockHeight",
        NetworkResponse::GetRangeOfBlocks(_) => "GetRangeOfBlocks",
        NetworkResponse::Mempool(_) => "Mempool",
        NetworkResponse::GetMempoolTxs(_) => "GetMempoolTxs",
    }
}

/// `NetworkClient` implementation that routes requests through the network
/// service command channel and waits on a per-request oneshot reply.
#[derive(Clone)]
pub struct ReqRespClient {
    commands: mpsc::UnboundedSender<OutboundP2pRequest>,
}

impl ReqRespClient {
    pub fn new(commands: mpsc::UnboundedSender<OutboundP2pRequest>) -> Self {
        Self { commands }
    }

    async fn call(
        &self,
        peer: PeerId,
        request: NetworkRequest,
    ) -> Result<NetworkResponse, RpcError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(OutboundP2pRequest::Rpc {
                peer,
                request,
                reply,
            })
            .map_err(|_| RpcError::Transport("network service is not running".into()))?;
        rx.await
            .map_err(|_| RpcError::Transport("reply channel closed".into()))?
    }
}

#[async_trait]
impl NetworkClient for ReqRespClient {
    async fn last_block_height(&self, peer: PeerId) -> Result<LastBlockHeightReply, RpcError> {
        match self.call(peer, NetworkRequest::LastBlockHeight).await? {
            NetworkResponse::LastBlockHeight(reply) => Ok(reply),
            other => Err(RpcError::UnexpectedResponse {
                expected: "LastBlockHeight",
                got: response_name(&other),
            }),
        }
    }

    async fn get_range_of_blocks(
        &self,
        peer: PeerId,
        from: u64,
        to: u64,
    ) -> Result<GetRangeOfBlocksReply, RpcError> {
        match self
            .call(peer, NetworkRequest::GetRangeOfBlocks { from, to })
            .await?
        {
            NetworkResponse::GetRangeOfBlocks(reply) => Ok(reply),
            other => Err(RpcError::UnexpectedResponse {
                expected: "GetRangeOfBlocks",
                got: response_name(&other),
            }),
        }
    }

    async fn mempool_inventory(&self, peer: PeerId) -> Result<InvMessage, RpcError> {
        match self.call(peer, NetworkRequest::Mempool).await? {
            NetworkResponse::Mempool(reply) => Ok(reply),
            other => Err(RpcError::UnexpectedResponse {
                expected: "Mempool",
                got: response_name(&other),
            }),
        }
    }

    async fn get_mempool_txs(
        &self,
        peer: PeerId,
        items: Vec<Hash32>,
    ) -> Result<GetMempoolTxsReply, RpcError> {
        match self.call(peer, NetworkRequest::GetMempoolTxs { items }).await? {
            NetworkResponse::GetMempoolTxs(reply) => Ok(reply),
            other => Err(RpcError::UnexpectedResponse {
                expected: "GetMempoolTxs",
                got: response_name(&other),
            }),
        }
    }
}
