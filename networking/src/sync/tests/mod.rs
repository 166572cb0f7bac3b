mod common;

mod gossip_tests;
mod mempool_sync_tests;
