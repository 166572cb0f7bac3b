use std::time::Duration;

use super::common::{MockNetworkClient, test_node};
use crate::gossipsub::topic::GossipsubKind;
use crate::sync::manager::handle_new_transaction;
use containers::{Transaction, to_cbor};
use pool::{Mempool, MempoolError};

#[test]
fn test_valid_gossip_transaction_is_stored() {
    let mempool = Mempool::new();
    let tx = Transaction::new(1, b"payload".to_vec());

    handle_new_transaction(&mempool, &to_cbor(&tx).unwrap());

    assert_eq!(mempool.get_transaction(&tx.hash).unwrap(), tx);
}

#[test]
fn test_invalid_hash_is_rejected_before_store() {
    let mempool = Mempool::new();
    let mut tx = Transaction::new(1, b"payload".to_vec());
    tx.hash.0[0] ^= 0x01;

    handle_new_transaction(&mempool, &to_cbor(&tx).unwrap());

    assert!(matches!(
        mempool.get_transaction(&tx.hash),
        Err(MempoolError::TxNotFound)
    ));
    assert!(mempool.is_empty());
}

#[test]
fn test_undecodable_payload_is_dropped() {
    let mempool = Mempool::new();

    handle_new_transaction(&mempool, b"\xff\xff not cbor");

    assert!(mempool.is_empty());
}

#[test]
fn test_duplicate_delivery_is_idempotent() {
    let mempool = Mempool::new();
    let tx = Transaction::new(1, b"payload".to_vec());
    let payload = to_cbor(&tx).unwrap();

    handle_new_transaction(&mempool, &payload);
    handle_new_transaction(&mempool, &payload);

    assert_eq!(mempool.len(), 1);
}

#[tokio::test]
async fn test_gossip_flows_through_router_into_mempool() {
    let mut node = test_node(MockNetworkClient::default());
    node.manager.start().await;

    let tx = Transaction::new(9, b"gossip".to_vec());
    node.router
        .publish(GossipsubKind::NewTx, &to_cbor(&tx).unwrap());

    let mut stored = false;
    for _ in 0..50 {
        if node.mempool.contains(&tx.hash) {
            stored = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(stored, "gossiped transaction never reached the mempool");

    node.manager.stop().await;
}

#[tokio::test]
async fn test_gossip_during_mempool_sync_stores_once() {
    let tx = Transaction::new(5, b"both-paths".to_vec());
    let mock = MockNetworkClient {
        inventory: vec![tx.hash],
        mempool_txs: [(tx.hash, tx.clone())].into_iter().collect(),
        ..Default::default()
    };
    let mut node = test_node(mock);

    // The gossiped copy lands before the inventory fetch completes.
    handle_new_transaction(&node.mempool, &to_cbor(&tx).unwrap());
    node.manager.start().await;

    assert_eq!(node.mempool.len(), 1);
    // The inventory filter saw the transaction locally, so no fetch happened.
    assert!(node.client.mempool_batch_calls.lock().is_empty());

    node.manager.stop().await;
}
