use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use containers::{Block, BlockHeader, CodecError, Hash32, from_cbor, to_cbor};

pub(crate) const CF_BLOCKS: &str = "blocks";
pub(crate) const CF_HEIGHTS: &str = "heights";

const BLOCK_KEY_PREFIX: &str = "block_";
const HEADER_KEY_PREFIX: &str = "header_";

#[derive(Debug, thiserror::Error)]
pub enum BlockPoolError {
    #[error("block pool storage error: {0}")]
    Storage(#[from] rocksdb::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("block isn't found")]
    BlockNotFound,
    #[error("block pool is empty")]
    LatestHeightNil,
    #[error("missing column family {0}")]
    MissingColumnFamily(&'static str),
    #[error("corrupt height index entry for height {0}")]
    CorruptHeightIndex(u64),
}

/// Durable, crash-safe store mapping block hashes to blocks and headers.
///
/// Full blocks and headers live under disjoint key prefixes in the `blocks`
/// column family; a `heights` column family indexes big-endian heights to
/// hashes so height lookups and the latest-height query stay logarithmic.
/// Each stored block is committed through a single write batch, so after a
/// crash either every key for that block is present or none is.
pub struct BlockPool {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl BlockPool {
    pub fn open(path: &Path) -> Result<Self, BlockPoolError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_BLOCKS, Options::default()),
            ColumnFamilyDescriptor::new(CF_HEIGHTS, Options::default()),
        ];
        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)?;
        Ok(Self { db: Arc::new(db) })
    }

    fn blocks_cf(&self) -> Result<Arc<BoundColumnFamily<'_>>, BlockPoolError> {
        self.db
            .cf_handle(CF_BLOCKS)
            .ok_or(BlockPoolError::MissingColumnFamily(CF_BLOCKS))
    }

    fn heights_cf(&self) -> Result<Arc<BoundColumnFamily<'_>>, BlockPoolError> {
        self.db
            .cf_handle(CF_HEIGHTS)
            .ok_or(BlockPoolError::MissingColumnFamily(CF_HEIGHTS))
    }

    fn block_key(hash: &Hash32) -> Vec<u8> {
        format!("{BLOCK_KEY_PREFIX}{hash}").into_bytes()
    }

    fn header_key(hash: &Hash32) -> Vec<u8> {
        format!("{HEADER_KEY_PREFIX}{hash}").into_bytes()
    }

    /// Persist a block and its header atomically.
    pub fn store_block(&self, block: &Block) -> Result<(), BlockPoolError> {
        let blocks_cf = self.blocks_cf()?;
        let heights_cf = self.heights_cf()?;

        let data = to_cbor(block)?;
        let header_data = to_cbor(&block.header)?;
        let hash = &block.header.hash;

        let mut batch = WriteBatch::default();
        batch.put_cf(&blocks_cf, Self::block_key(hash), data);
        batch.put_cf(&blocks_cf, Self::header_key(hash), header_data);
        batch.put_cf(
            &heights_cf,
            block.header.height.to_be_bytes(),
            hash.as_bytes(),
        );
        self.db.write(batch)?;
        Ok(())
    }

    /// Whether a block with the given hash is stored. A missing key is a
    /// plain `false`, not an error.
    pub fn has_block(&self, hash: &Hash32) -> Result<bool, BlockPoolError> {
        let cf = self.blocks_cf()?;
        Ok(self.db.get_cf(&cf, Self::block_key(hash))?.is_some())
    }

    pub fn fetch_block(&self, hash: &Hash32) -> Result<Block, BlockPoolError> {
        let cf = self.blocks_cf()?;
        let data = self
            .db
            .get_cf(&cf, Self::block_key(hash))?
            .ok_or(BlockPoolError::BlockNotFound)?;
        Ok(from_cbor(&data)?)
    }

    pub fn fetch_block_header(&self, hash: &Hash32) -> Result<BlockHeader, BlockPoolError> {
        let cf = self.blocks_cf()?;
        let data = self
            .db
            .get_cf(&cf, Self::header_key(hash))?
            .ok_or(BlockPoolError::BlockNotFound)?;
        Ok(from_cbor(&data)?)
    }

    pub fn fetch_block_header_by_height(&self, height: u64) -> Result<BlockHeader, BlockPoolError> {
        let cf = self.heights_cf()?;
        let hash_bytes = self
            .db
            .get_cf(&cf, height.to_be_bytes())?
            .ok_or(BlockPoolError::BlockNotFound)?;
        let hash = Hash32::try_from(hash_bytes.as_slice())
            .map_err(|_| BlockPoolError::CorruptHeightIndex(height))?;
        self.fetch_block_header(&hash)
    }

    /// Height of the newest stored block. `LatestHeightNil` signals an empty
    /// pool and is not a failure.
    pub fn latest_block_height(&self) -> Result<u64, BlockPoolError> {
        let cf = self.heights_cf()?;
        let mut iter = self.db.iterator_cf(&cf, IteratorMode::End);
        match iter.next() {
            Some(entry) => {
                let (key, _value) = entry?;
                let height_bytes: [u8; 8] = key
                    .as_ref()
                    .try_into()
                    .map_err(|_| BlockPoolError::CorruptHeightIndex(0))?;
                Ok(u64::from_be_bytes(height_bytes))
            }
            None => Err(BlockPoolError::LatestHeightNil),
        }
    }
}

impl Clone for BlockPool {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}
