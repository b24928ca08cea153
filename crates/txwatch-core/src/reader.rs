//! The `ChainReader` trait: the remote source of blocks.

use async_trait::async_trait;

use crate::error::IndexerError;
use crate::types::BlockTransaction;

/// Reads blocks and the chain tip from a node.
///
/// Implementations do no retrying of their own. Callers cancel an in-flight
/// call by dropping its future, so implementations must not hold work that
/// outlives the returned future.
#[async_trait]
pub trait ChainReader: Send + Sync + 'static {
    /// Fetch all transactions of block `block_number`.
    async fn fetch_block(&self, block_number: u64) -> Result<Vec<BlockTransaction>, IndexerError>;

    /// Current chain tip.
    async fn latest_block(&self) -> Result<u64, IndexerError>;
}
