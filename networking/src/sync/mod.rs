/// Initial synchronization against a bootstrap peer.
///
/// Brings the local block pool and mempool into agreement with a chosen
/// bootstrap peer, then keeps ingesting transactions announced over gossip:
///
/// 1. Block-pool catch-up: fetch the peer's tip height, pull the missing
///    range in capped batches, validate each block and persist it.
/// 2. Mempool catch-up: fetch the peer's transaction inventory and retrieve
///    the payloads the local mempool is missing, again in capped batches.
/// 3. Steady state: a background task drains the `new_tx` gossip
///    subscription; each announced transaction is validated before it is
///    admitted to the mempool.
pub mod config;
pub mod manager;

pub use config::{MAX_BLOCK_COUNT_FOR_RETRIEVING, MAX_TRANSACTION_COUNT_FOR_RETRIEVING};
pub use manager::{ProcessBlockError, SyncError, SyncManager};

#[cfg(test)]
mod tests;
