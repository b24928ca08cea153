//! Fluent builder API for wiring an indexer.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use txwatch_evm::{HttpChainReader, IndexerBuilder};
//! use txwatch_storage::MemoryIndexStore;
//!
//! # fn main() -> Result<(), txwatch_core::IndexerError> {
//! let builder = IndexerBuilder::new()
//!     .rpc_url("https://cloudflare-eth.com")
//!     .concurrency(4)
//!     .chunk_size(25)
//!     .lookback(10);
//!
//! let config = builder.build_config();
//! let reader = Arc::new(HttpChainReader::new(&config.rpc_url, config.request_timeout())?);
//! let sync = builder.build(reader, Arc::new(MemoryIndexStore::new()))?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use txwatch_core::checkpoint::Checkpoint;
use txwatch_core::config::IndexerConfig;
use txwatch_core::error::IndexerError;
use txwatch_core::reader::ChainReader;
use txwatch_core::store::IndexStore;

use crate::processor::RangeProcessor;
use crate::sync_loop::SyncLoop;

/// Fluent builder for `IndexerConfig` and the sync loop around it.
#[derive(Debug, Clone, Default)]
pub struct IndexerBuilder {
    config: IndexerConfig,
    start_checkpoint: u64,
}

impl IndexerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: IndexerConfig) -> Self {
        Self {
            config,
            start_checkpoint: 0,
        }
    }

    /// Set the JSON-RPC endpoint.
    pub fn rpc_url(mut self, url: impl Into<String>) -> Self {
        self.config.rpc_url = url.into();
        self
    }

    /// Set the maximum number of concurrent block fetches.
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    /// Set the number of blocks per checkpoint step.
    pub fn chunk_size(mut self, size: u64) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set total fetch attempts per block.
    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn backoff_base_ms(mut self, ms: u64) -> Self {
        self.config.backoff_base_ms = ms;
        self
    }

    /// Set how far behind the tip catch-up begins.
    pub fn lookback(mut self, blocks: u64) -> Self {
        self.config.lookback = blocks;
        self
    }

    /// Set live mode polling interval in milliseconds.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn request_timeout_ms(mut self, ms: u64) -> Self {
        self.config.request_timeout_ms = ms;
        self
    }

    /// Initial checkpoint value for the processor.
    pub fn start_checkpoint(mut self, block: u64) -> Self {
        self.start_checkpoint = block;
        self
    }

    /// Build the `IndexerConfig`.
    pub fn build_config(&self) -> IndexerConfig {
        self.config.clone()
    }

    /// Validate the configuration and wire a sync loop over `reader` and `store`.
    pub fn build<C: ChainReader>(
        &self,
        reader: Arc<C>,
        store: Arc<dyn IndexStore>,
    ) -> Result<SyncLoop<C>, IndexerError> {
        self.config.validate()?;
        let processor = RangeProcessor::new(
            reader,
            store,
            Checkpoint::new(self.start_checkpoint),
            &self.config,
        );
        Ok(SyncLoop::new(Arc::new(processor), &self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockChainReader;
    use txwatch_storage::MemoryIndexStore;

    #[test]
    fn builder_defaults() {
        let cfg = IndexerBuilder::new().build_config();
        assert_eq!(cfg, IndexerConfig::default());
        assert_eq!(cfg.concurrency, 1);
        assert_eq!(cfg.chunk_size, 50);
    }

    #[test]
    fn builder_custom() {
        let cfg = IndexerBuilder::new()
            .rpc_url("http://localhost:8545")
            .concurrency(8)
            .chunk_size(25)
            .max_retries(5)
            .backoff_base_ms(250)
            .lookback(64)
            .poll_interval_ms(500)
            .request_timeout_ms(10_000)
            .build_config();

        assert_eq!(cfg.rpc_url, "http://localhost:8545");
        assert_eq!(cfg.concurrency, 8);
        assert_eq!(cfg.chunk_size, 25);
        assert_eq!(cfg.max_retries, 5);
        assert_eq!(cfg.backoff_base_ms, 250);
        assert_eq!(cfg.lookback, 64);
        assert_eq!(cfg.poll_interval_ms, 500);
        assert_eq!(cfg.request_timeout_ms, 10_000);
    }

    #[test]
    fn build_rejects_invalid_config() {
        let result = IndexerBuilder::new().chunk_size(0).build(
            Arc::new(MockChainReader::new()),
            Arc::new(MemoryIndexStore::new()),
        );
        assert!(matches!(result, Err(IndexerError::Config(_))));
    }

    #[test]
    fn build_seeds_checkpoint() {
        let sync = IndexerBuilder::new()
            .start_checkpoint(1_000)
            .build(Arc::new(MockChainReader::new()), Arc::new(MemoryIndexStore::new()))
            .unwrap();
        assert_eq!(sync.processor().current_block(), 1_000);
    }
}
