pub mod compressor;
pub mod config;
pub mod topic;

use libp2p::gossipsub::{AllowAllSubscriptionFilter, Behaviour};

use compressor::Compressor;

pub type GossipsubBehaviour = Behaviour<Compressor, AllowAllSubscriptionFilter>;

pub use config::{GossipsubConfig, compute_message_id};
pub use topic::{
    CBOR_SNAPPY_ENCODING_POSTFIX, GossipsubKind, GossipsubTopic, NEW_TX_TOPIC, TOPIC_PREFIX,
    get_topics,
};
