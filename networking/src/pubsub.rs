use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::gossipsub::topic::GossipsubKind;

/// Fan-out point between the gossip layer and its consumers.
///
/// Consumers register a channel per topic kind; the network service pushes
/// every decompressed payload it receives into the matching channels. Holding
/// only channel senders keeps the router free of back-references into its
/// subscribers, so the sync manager can own the router handle without a
/// reference cycle.
#[derive(Default)]
pub struct PubSubRouter {
    subscribers: Mutex<HashMap<GossipsubKind, Vec<mpsc::UnboundedSender<Vec<u8>>>>>,
}

impl PubSubRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription on a topic kind. The returned receiver yields
    /// raw payload bytes; decoding is the subscriber's concern.
    pub fn subscribe(&self, kind: GossipsubKind) -> mpsc::UnboundedReceiver<Vec<u8>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().entry(kind).or_default().push(tx);
        rx
    }

    /// Deliver a payload to every live subscriber of a topic kind. Closed
    /// subscriptions are dropped on the way through.
    pub fn publish(&self, kind: GossipsubKind, payload: &[u8]) {
        let mut subscribers = self.subscribers.lock();
        if let Some(senders) = subscribers.get_mut(&kind) {
            senders.retain(|sender| sender.send(payload.to_vec()).is_ok());
        }
    }

    pub fn subscriber_count(&self, kind: GossipsubKind) -> usize {
        self.subscribers
            .lock()
            .get(&kind)
            .map(Vec::len)
            .unwrap_or(0)
    }
}
