use super::common::{MockNetworkClient, test_node};
use containers::Transaction;

fn mock_with_mempool(txs: &[Transaction]) -> MockNetworkClient {
    MockNetworkClient {
        inventory: txs.iter().map(|tx| tx.hash).collect(),
        mempool_txs: txs.iter().map(|tx| (tx.hash, tx.clone())).collect(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_only_missing_transactions_are_fetched() {
    let txs: Vec<Transaction> = (0..3)
        .map(|i| Transaction::new(i, format!("tx-{i}").into_bytes()))
        .collect();
    let mut node = test_node(mock_with_mempool(&txs));

    // One inventory entry is already known locally.
    node.mempool.store_tx(&txs[0]).unwrap();

    node.manager.start().await;

    assert_eq!(node.client.mempool_batch_calls.lock().clone(), vec![2]);
    assert_eq!(node.mempool.len(), 3);
    for tx in &txs {
        assert_eq!(node.mempool.get_transaction(&tx.hash).unwrap(), *tx);
    }

    node.manager.stop().await;
}

#[tokio::test]
async fn test_retrieval_respects_batch_cap() {
    let txs: Vec<Transaction> = (0..1500)
        .map(|i| Transaction::new(i, format!("tx-{i}").into_bytes()))
        .collect();
    let mut node = test_node(mock_with_mempool(&txs));

    node.manager.start().await;

    assert_eq!(
        node.client.mempool_batch_calls.lock().clone(),
        vec![1000, 500]
    );
    assert_eq!(node.mempool.len(), 1500);

    node.manager.stop().await;
}

#[tokio::test]
async fn test_empty_inventory_issues_no_fetch() {
    let mut node = test_node(MockNetworkClient::default());

    node.manager.start().await;

    assert!(node.client.mempool_batch_calls.lock().is_empty());
    assert!(node.mempool.is_empty());

    node.manager.stop().await;
}

#[tokio::test]
async fn test_inventory_hashes_unknown_to_peer_are_skipped() {
    let known = Transaction::new(1, b"known".to_vec());
    let ghost = Transaction::new(2, b"ghost".to_vec());
    let mut mock = mock_with_mempool(std::slice::from_ref(&known));
    mock.inventory.push(ghost.hash);
    let mut node = test_node(mock);

    node.manager.start().await;

    // The peer only returned the transaction it actually has.
    assert_eq!(node.mempool.len(), 1);
    assert!(node.mempool.contains(&known.hash));
    assert!(!node.mempool.contains(&ghost.hash));

    node.manager.stop().await;
}
