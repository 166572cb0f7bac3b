pub mod block_pool;
pub mod mempool;

pub use block_pool::{BlockPool, BlockPoolError};
pub use mempool::{Mempool, MempoolError};
