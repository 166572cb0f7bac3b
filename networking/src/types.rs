use async_trait::async_trait;
use libp2p_identity::PeerId;
use tokio::sync::{mpsc, oneshot};

use containers::Transaction;

use crate::client::RpcError;
use crate::wire::{NetworkRequest, NetworkResponse};

/// 1-byte domain for gossip message-id isolation of valid snappy messages,
/// prepended to the message hash when decompression succeeds.
pub const MESSAGE_DOMAIN_VALID_SNAPPY: &[u8; 1] = &[0x01];

/// 1-byte domain for gossip message-id isolation of invalid snappy messages.
pub const MESSAGE_DOMAIN_INVALID_SNAPPY: &[u8; 1] = &[0x00];

/// Peer connection state machine.
///
/// DISCONNECTED -> CONNECTING -> CONNECTED -> DISCONNECTING -> DISCONNECTED
///
/// These states map directly to libp2p connection events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No active connection to this peer.
    Disconnected,
    /// Transport connection in progress.
    Connecting,
    /// Transport established, can exchange protocol messages.
    Connected,
    /// Graceful shutdown in progress.
    Disconnecting,
}

/// Commands the rest of the node sends to the network service.
#[derive(Debug)]
pub enum OutboundP2pRequest {
    /// Issue a peer RPC and resolve the oneshot with the decoded reply.
    Rpc {
        peer: PeerId,
        request: NetworkRequest,
        reply: oneshot::Sender<Result<NetworkResponse, RpcError>>,
    },
    /// Publish a transaction on the `new_tx` gossip topic.
    GossipTransaction(Transaction),
}

#[async_trait]
pub trait P2pRequestSource<T>: Send {
    async fn recv(&mut self) -> Option<T>;
}

#[async_trait]
impl<T: Send + 'static> P2pRequestSource<T> for mpsc::UnboundedReceiver<T> {
    async fn recv(&mut self) -> Option<T> {
        mpsc::UnboundedReceiver::recv(self).await
    }
}
