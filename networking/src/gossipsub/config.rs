use std::time::Duration;

use libp2p::gossipsub::{Config, ConfigBuilder, Message, MessageId, ValidationMode};
use sha2::{Digest, Sha256};

use crate::gossipsub::topic::GossipsubTopic;
use crate::types::MESSAGE_DOMAIN_VALID_SNAPPY;

#[derive(Debug, Clone)]
pub struct GossipsubConfig {
    pub config: Config,
    pub topics: Vec<GossipsubTopic>,
}

impl GossipsubConfig {
    pub fn new() -> Self {
        let config = ConfigBuilder::default()
            .heartbeat_interval(Duration::from_millis(700))
            .fanout_ttl(Duration::from_secs(60))
            .history_length(6)
            .history_gossip(3)
            // gossip delivery is best-effort with possible duplicates; the
            // seen-cache only needs to cover the propagation window
            .duplicate_cache_time(Duration::from_secs(60))
            .mesh_n(8)
            .mesh_n_low(6)
            .mesh_n_high(12)
            .gossip_lazy(6)
            .validation_mode(ValidationMode::Anonymous)
            .message_id_fn(compute_message_id)
            .build()
            .expect("Failed to build gossipsub config");

        GossipsubConfig {
            config,
            topics: Vec::new(),
        }
    }

    pub fn set_topics(&mut self, topics: Vec<GossipsubTopic>) {
        self.topics = topics;
    }
}

impl Default for GossipsubConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Message id: `SHA256(domain + uint64_le(len(topic)) + topic + data)[:20]`.
pub fn compute_message_id(message: &Message) -> MessageId {
    let topic_bytes = message.topic.as_str().as_bytes();
    let topic_len = topic_bytes.len() as u64;

    let mut digest_input = Vec::new();
    digest_input.extend_from_slice(MESSAGE_DOMAIN_VALID_SNAPPY);
    digest_input.extend_from_slice(&topic_len.to_le_bytes());
    digest_input.extend_from_slice(topic_bytes);
    digest_input.extend_from_slice(&message.data);

    let hash = Sha256::digest(&digest_input);

    MessageId::from(&hash[..20])
}
