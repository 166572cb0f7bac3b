use std::{
    collections::HashMap,
    net::IpAddr,
    num::{NonZeroU8, NonZeroUsize},
    sync::Arc,
};

use anyhow::{Result, anyhow};
use futures::StreamExt;
use libp2p::{
    Multiaddr, SwarmBuilder,
    connection_limits::{self, ConnectionLimits},
    gossipsub::{Event as GossipsubEvent, IdentTopic, MessageAuthenticity},
    identify,
    multiaddr::Protocol,
    request_response::{Event as RequestResponseEvent, Message as RequestResponseMessage},
    swarm::{Config, NetworkBehaviour, Swarm, SwarmEvent},
};
use libp2p_identity::{Keypair, PeerId};
use parking_lot::Mutex;
use tokio::select;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use containers::to_cbor;

use crate::{
    client::RpcError,
    gossipsub::{
        self,
        config::GossipsubConfig,
        topic::{GossipsubKind, GossipsubTopic},
    },
    pubsub::PubSubRouter,
    req_resp::{self, RawRequest, ReqRespEvent},
    types::{ConnectionState, OutboundP2pRequest, P2pRequestSource},
    wire::NetworkResponse,
};

use libp2p::request_response::OutboundRequestId;

#[derive(Debug, Clone)]
pub struct NetworkServiceConfig {
    pub gossipsub_config: GossipsubConfig,
    pub socket_address: IpAddr,
    pub socket_port: u16,
    pub bootstrap_peers: Vec<Multiaddr>,
}

impl NetworkServiceConfig {
    pub fn new(
        gossipsub_config: GossipsubConfig,
        socket_address: IpAddr,
        socket_port: u16,
        bootstrap_peers: Vec<String>,
    ) -> Self {
        let bootstrap_peers = bootstrap_peers
            .iter()
            .filter_map(|addr_str| addr_str.parse().ok())
            .collect::<Vec<Multiaddr>>();

        NetworkServiceConfig {
            gossipsub_config,
            socket_address,
            socket_port,
            bootstrap_peers,
        }
    }
}

/// Everything the node speaks on the wire: the `new_tx` gossip mesh, the
/// peer RPC protocol, identity exchange, and connection limits.
#[derive(NetworkBehaviour)]
pub struct ChainNetworkBehaviour {
    pub gossipsub: gossipsub::GossipsubBehaviour,
    pub req_resp: req_resp::ReqResp,
    pub identify: identify::Behaviour,
    pub connection_limits: connection_limits::Behaviour,
}

/// Long-lived task driving the libp2p swarm.
///
/// Consumes outbound commands (peer RPCs, gossip publishes) from a channel
/// and feeds inbound gossip payloads into the [`PubSubRouter`]. Replies to
/// in-flight RPCs are routed back through per-request oneshot senders.
pub struct NetworkService<R>
where
    R: P2pRequestSource<OutboundP2pRequest> + Send + 'static,
{
    network_config: Arc<NetworkServiceConfig>,
    swarm: Swarm<ChainNetworkBehaviour>,
    peer_table: Arc<Mutex<HashMap<PeerId, ConnectionState>>>,
    outbound_p2p_requests: R,
    router: Arc<PubSubRouter>,
    pending_rpcs: HashMap<OutboundRequestId, oneshot::Sender<Result<NetworkResponse, RpcError>>>,
}

impl<R> NetworkService<R>
where
    R: P2pRequestSource<OutboundP2pRequest> + Send + 'static,
{
    pub async fn new(
        network_config: Arc<NetworkServiceConfig>,
        outbound_p2p_requests: R,
        router: Arc<PubSubRouter>,
    ) -> Result<Self> {
        let local_key = Keypair::generate_secp256k1();
        let behaviour = Self::build_behaviour(&local_key, &network_config)?;

        let config = Config::with_tokio_executor()
            .with_notify_handler_buffer_size(NonZeroUsize::new(7).unwrap())
            .with_per_connection_event_buffer_size(4)
            .with_dial_concurrency_factor(NonZeroU8::new(1).unwrap());

        let multiaddr = Self::multiaddr(&network_config);
        let swarm = SwarmBuilder::with_existing_identity(local_key.clone())
            .with_tokio()
            .with_quic()
            .with_behaviour(|_| behaviour)?
            .with_swarm_config(|_| config)
            .build();

        let mut service = Self {
            network_config,
            swarm,
            peer_table: Arc::new(Mutex::new(HashMap::new())),
            outbound_p2p_requests,
            router,
            pending_rpcs: HashMap::new(),
        };

        service.listen(&multiaddr)?;
        service.subscribe_to_topics()?;

        Ok(service)
    }

    pub async fn start(&mut self) -> Result<()> {
        self.connect_to_peers(self.network_config.bootstrap_peers.clone());
        loop {
            select! {
                request = self.outbound_p2p_requests.recv() => {
                    match request {
                        Some(request) => self.dispatch_outbound_request(request),
                        // all command senders dropped, the node is shutting down
                        None => return Ok(()),
                    }
                }
                event = self.swarm.select_next_some() => {
                    self.handle_swarm_event(event);
                }
            }
        }
    }

    fn handle_swarm_event(&mut self, event: SwarmEvent<ChainNetworkBehaviourEvent>) {
        match event {
            SwarmEvent::Behaviour(ChainNetworkBehaviourEvent::Gossipsub(event)) => {
                self.handle_gossipsub_event(event);
            }
            SwarmEvent::Behaviour(ChainNetworkBehaviourEvent::ReqResp(event)) => {
                self.handle_request_response_event(event);
            }
            SwarmEvent::Behaviour(ChainNetworkBehaviourEvent::Identify(event)) => {
                self.handle_identify_event(event);
            }
            SwarmEvent::Behaviour(_) => {
                // ConnectionLimits behaviour has no events
            }
            SwarmEvent::ConnectionEstablished { peer_id, .. } => {
                self.peer_table
                    .lock()
                    .insert(peer_id, ConnectionState::Connected);

                info!(peer = %peer_id, "Connected to peer");
            }
            SwarmEvent::ConnectionClosed { peer_id, .. } => {
                self.peer_table
                    .lock()
                    .insert(peer_id, ConnectionState::Disconnected);

                info!(peer = %peer_id, "Disconnected from peer");
            }
            SwarmEvent::IncomingConnection { local_addr, .. } => {
                debug!(?local_addr, "Incoming connection");
            }
            SwarmEvent::Dialing { peer_id, .. } => {
                debug!(?peer_id, "Dialing peer");
            }
            SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
                warn!(?peer_id, ?error, "Failed to connect to peer");
            }
            SwarmEvent::NewListenAddr { address, .. } => {
                info!(?address, "New listen address");
            }
            SwarmEvent::NewExternalAddrCandidate { address } => {
                self.swarm.add_external_address(address);
            }
            _ => {
                debug!(?event, "Unhandled swarm event");
            }
        }
    }

    fn handle_gossipsub_event(&mut self, event: GossipsubEvent) {
        match event {
            GossipsubEvent::Subscribed { peer_id, topic } => {
                info!(peer = %peer_id, topic = %topic, "A peer subscribed to topic");
            }
            GossipsubEvent::Unsubscribed { peer_id, topic } => {
                info!(peer = %peer_id, topic = %topic, "A peer unsubscribed from topic");
            }
            GossipsubEvent::Message { message, .. } => {
                match GossipsubTopic::decode(&message.topic) {
                    // payload decoding is the subscriber's concern
                    Ok(topic) => self.router.publish(topic.kind, &message.data),
                    Err(err) => warn!(%err, "gossip topic decode failed"),
                }
            }
            _ => {
                debug!(?event, "Unhandled gossipsub event");
            }
        }
    }

    fn handle_request_response_event(&mut self, event: ReqRespEvent) {
        match event {
            RequestResponseEvent::Message {
                message: RequestResponseMessage::Response { request_id, response },
                ..
            } => {
                if let Some(reply) = self.pending_rpcs.remove(&request_id) {
                    let decoded = containers::from_cbor::<NetworkResponse>(&response.0)
                        .map_err(RpcError::Codec);
                    // receiver may have given up; nothing to do then
                    let _ = reply.send(decoded);
                } else {
                    debug!(?request_id, "Response for unknown request");
                }
            }
            RequestResponseEvent::Message {
                message: RequestResponseMessage::Request { .. },
                peer,
                ..
            } => {
                // The core has no serving surface; dropping the channel
                // closes the substream on the requester's side.
                debug!(peer = %peer, "Ignoring inbound RPC request");
            }
            RequestResponseEvent::OutboundFailure {
                request_id, error, ..
            } => {
                if let Some(reply) = self.pending_rpcs.remove(&request_id) {
                    let _ = reply.send(Err(RpcError::Transport(error.to_string())));
                }
            }
            RequestResponseEvent::InboundFailure { peer, error, .. } => {
                debug!(peer = %peer, ?error, "Inbound request failure");
            }
            RequestResponseEvent::ResponseSent { .. } => {}
        }
    }

    fn handle_identify_event(&mut self, event: identify::Event) {
        match event {
            identify::Event::Received { peer_id, info, .. } => {
                info!(
                    peer = %peer_id,
                    agent_version = %info.agent_version,
                    protocol_version = %info.protocol_version,
                    "Received peer info"
                );
            }
            identify::Event::Error { peer_id, error, .. } => {
                warn!(peer = %peer_id, ?error, "Identify error");
            }
            _ => {}
        }
    }

    fn connect_to_peers(&mut self, peers: Vec<Multiaddr>) {
        info!(?peers, "Dialing bootstrap peers");
        for peer in peers {
            let peer_id = peer.iter().find_map(|protocol| match protocol {
                Protocol::P2p(peer_id) => Some(peer_id),
                _ => None,
            });
            let Some(peer_id) = peer_id else {
                warn!(addr = %peer, "Bootstrap address is missing a peer id");
                continue;
            };
            if peer_id == self.local_peer_id() {
                continue;
            }

            if let Err(err) = self.swarm.dial(peer.clone()) {
                warn!(?err, "Failed to dial peer");
                continue;
            }

            info!(peer = %peer_id, "Dialing peer");
            self.peer_table
                .lock()
                .insert(peer_id, ConnectionState::Connecting);
        }
    }

    fn dispatch_outbound_request(&mut self, request: OutboundP2pRequest) {
        match request {
            OutboundP2pRequest::Rpc {
                peer,
                request,
                reply,
            } => {
                let bytes = match to_cbor(&request) {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        let _ = reply.send(Err(RpcError::Codec(err)));
                        return;
                    }
                };
                let request_id = self
                    .swarm
                    .behaviour_mut()
                    .req_resp
                    .send_request(&peer, RawRequest(bytes));
                self.pending_rpcs.insert(request_id, reply);
            }
            OutboundP2pRequest::GossipTransaction(tx) => {
                let hash = tx.hash;
                match to_cbor(&tx) {
                    Ok(bytes) => {
                        if let Err(err) = self.publish_to_topic(GossipsubKind::NewTx, bytes) {
                            warn!(%hash, ?err, "Publish transaction failed");
                        } else {
                            debug!(%hash, "Broadcasted transaction");
                        }
                    }
                    Err(err) => {
                        warn!(%hash, %err, "Serialize transaction failed");
                    }
                }
            }
        }
    }

    fn publish_to_topic(&mut self, kind: GossipsubKind, data: Vec<u8>) -> Result<()> {
        let topic = self
            .network_config
            .gossipsub_config
            .topics
            .iter()
            .find(|topic| topic.kind == kind)
            .cloned()
            .ok_or_else(|| anyhow!("Missing gossipsub topic for kind {kind:?}"))?;

        self.swarm
            .behaviour_mut()
            .gossipsub
            .publish(IdentTopic::from(topic), data)
            .map(|_| ())
            .map_err(|err| anyhow!("publish failed: {err:?}"))
    }

    pub fn peer_table(&self) -> Arc<Mutex<HashMap<PeerId, ConnectionState>>> {
        self.peer_table.clone()
    }

    pub fn local_peer_id(&self) -> PeerId {
        *self.swarm.local_peer_id()
    }

    fn build_behaviour(
        local_key: &Keypair,
        cfg: &NetworkServiceConfig,
    ) -> Result<ChainNetworkBehaviour> {
        let identify = Self::build_identify(local_key);
        let gossipsub = gossipsub::GossipsubBehaviour::new_with_transform(
            MessageAuthenticity::Anonymous,
            cfg.gossipsub_config.config.clone(),
            gossipsub::compressor::Compressor::default(),
        )
        .map_err(|err| anyhow!("Failed to create gossipsub behaviour: {err:?}"))?;

        let req_resp = req_resp::build();

        let connection_limits = connection_limits::Behaviour::new(
            ConnectionLimits::default()
                .with_max_pending_incoming(Some(5))
                .with_max_pending_outgoing(Some(16))
                .with_max_established_per_peer(Some(2)),
        );

        Ok(ChainNetworkBehaviour {
            gossipsub,
            req_resp,
            identify,
            connection_limits,
        })
    }

    fn build_identify(local_key: &Keypair) -> identify::Behaviour {
        let local_public_key = local_key.public();
        let identify_config =
            identify::Config::new("chainsync/1.0.0".into(), local_public_key.clone())
                .with_agent_version("0.1.0".to_string())
                .with_cache_size(0);

        identify::Behaviour::new(identify_config)
    }

    fn multiaddr(cfg: &NetworkServiceConfig) -> Multiaddr {
        let mut addr: Multiaddr = cfg.socket_address.into();
        addr.push(Protocol::Udp(cfg.socket_port));
        addr.push(Protocol::QuicV1);
        addr
    }

    fn listen(&mut self, addr: &Multiaddr) -> Result<()> {
        self.swarm
            .listen_on(addr.clone())
            .map_err(|e| anyhow!("Failed to listen on {addr:?}: {e:?}"))?;
        info!(?addr, "Listening on");
        Ok(())
    }

    fn subscribe_to_topics(&mut self) -> Result<()> {
        for topic in &self.network_config.gossipsub_config.topics {
            self.swarm
                .behaviour_mut()
                .gossipsub
                .subscribe(&IdentTopic::from(topic.clone()))
                .map_err(|e| anyhow!("Subscribe failed for {topic:?}: {e:?}"))?;
            info!(topic = %topic, "Subscribed to topic");
        }
        Ok(())
    }
}
