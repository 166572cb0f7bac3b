use anyhow::{Result, bail};
use libp2p::gossipsub::{IdentTopic, TopicHash};

pub const TOPIC_PREFIX: &str = "chainsync";
pub const CBOR_SNAPPY_ENCODING_POSTFIX: &str = "cbor_snappy";

pub const NEW_TX_TOPIC: &str = "new_tx";

/// Typed gossip topic: `/chainsync/<fork>/<kind>/cbor_snappy`.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct GossipsubTopic {
    pub fork: String,
    pub kind: GossipsubKind,
}

#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq)]
pub enum GossipsubKind {
    NewTx,
}

pub fn get_topics(fork: String) -> Vec<GossipsubTopic> {
    vec![GossipsubTopic {
        fork,
        kind: GossipsubKind::NewTx,
    }]
}

impl GossipsubTopic {
    pub fn decode(topic: &TopicHash) -> Result<Self> {
        let parts: Vec<&str> = topic.as_str().trim_start_matches('/').split('/').collect();

        if parts.len() != 4 {
            bail!("invalid topic part count: {topic:?}");
        }
        if parts[0] != TOPIC_PREFIX || parts[3] != CBOR_SNAPPY_ENCODING_POSTFIX {
            bail!("invalid topic parts: {topic:?}");
        }

        let kind = match parts[2] {
            NEW_TX_TOPIC => GossipsubKind::NewTx,
            other => bail!("invalid topic kind: {other:?}"),
        };

        Ok(GossipsubTopic {
            fork: parts[1].to_string(),
            kind,
        })
    }
}

impl std::fmt::Display for GossipsubTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "/{}/{}/{}/{}",
            TOPIC_PREFIX, self.fork, self.kind, CBOR_SNAPPY_ENCODING_POSTFIX
        )
    }
}

impl std::fmt::Display for GossipsubKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GossipsubKind::NewTx => write!(f, "{NEW_TX_TOPIC}"),
        }
    }
}

impl From<GossipsubTopic> for IdentTopic {
    fn from(topic: GossipsubTopic) -> IdentTopic {
        IdentTopic::new(topic)
    }
}

impl From<GossipsubTopic> for String {
    fn from(topic: GossipsubTopic) -> Self {
        topic.to_string()
    }
}

impl From<GossipsubTopic> for TopicHash {
    fn from(topic: GossipsubTopic) -> Self {
        TopicHash::from_raw(topic.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_round_trip() {
        let topic = GossipsubTopic {
            fork: "devnet0".to_string(),
            kind: GossipsubKind::NewTx,
        };
        let hash = TopicHash::from(topic.clone());
        assert_eq!(hash.as_str(), "/chainsync/devnet0/new_tx/cbor_snappy");
        assert_eq!(GossipsubTopic::decode(&hash).unwrap(), topic);
    }

    #[test]
    fn test_decode_rejects_foreign_topic() {
        let hash = TopicHash::from_raw("/other/devnet0/new_tx/cbor_snappy");
        assert!(GossipsubTopic::decode(&hash).is_err());
        let hash = TopicHash::from_raw("/chainsync/devnet0/blocks/cbor_snappy");
        assert!(GossipsubTopic::decode(&hash).is_err());
    }
}
