use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use libp2p::Multiaddr;
use libp2p::multiaddr::Protocol;
use libp2p_identity::PeerId;
use tokio::{sync::mpsc, task};
use tracing::{error, info};

use networking::client::ReqRespClient;
use networking::gossipsub::config::GossipsubConfig;
use networking::gossipsub::topic::get_topics;
use networking::network::{NetworkService, NetworkServiceConfig};
use networking::pubsub::PubSubRouter;
use networking::sync::SyncManager;
use networking::types::OutboundP2pRequest;
use pool::{BlockPool, Mempool};

#[derive(Parser, Debug)]
struct Args {
    #[arg(short, long, default_value = "127.0.0.1")]
    address: IpAddr,

    #[arg(short, long, default_value_t = 8083)]
    port: u16,

    /// Multiaddr of the bootstrap peer, including its /p2p/ component.
    #[arg(short, long)]
    bootstrap_peer: Multiaddr,

    /// Directory holding the block pool database.
    #[arg(short, long, default_value = "./chaindata")]
    db_path: PathBuf,

    #[arg(long, default_value = "devnet0")]
    fork: String,
}

fn bootstrap_peer_id(addr: &Multiaddr) -> Result<PeerId> {
    addr.iter()
        .find_map(|protocol| match protocol {
            Protocol::P2p(peer_id) => Some(peer_id),
            _ => None,
        })
        .ok_or_else(|| anyhow!("bootstrap peer multiaddr must contain a /p2p/ component"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let bootstrap_peer = bootstrap_peer_id(&args.bootstrap_peer)?;

    let block_pool = BlockPool::open(&args.db_path).context("opening block pool")?;
    let mempool = Mempool::new();

    let (outbound_p2p_sender, outbound_p2p_receiver) =
        mpsc::unbounded_channel::<OutboundP2pRequest>();
    let router = Arc::new(PubSubRouter::new());

    let mut gossipsub_config = GossipsubConfig::new();
    gossipsub_config.set_topics(get_topics(args.fork.clone()));

    let network_service_config = Arc::new(NetworkServiceConfig::new(
        gossipsub_config,
        args.address,
        args.port,
        vec![args.bootstrap_peer.to_string()],
    ));
    let mut network_service = NetworkService::new(
        network_service_config,
        outbound_p2p_receiver,
        router.clone(),
    )
    .await
    .context("creating network service")?;

    let client = Arc::new(ReqRespClient::new(outbound_p2p_sender));
    let mut sync_manager = SyncManager::new(block_pool, mempool, client, bootstrap_peer, &router);

    let network_handle = task::spawn(async move {
        if let Err(err) = network_service.start().await {
            error!(%err, "network service exited with error");
        }
    });

    sync_manager.start().await;

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutting down");
    sync_manager.stop().await;
    network_handle.abort();

    Ok(())
}
