//! txwatch-core — foundation for the watched-address transaction indexer.
//!
//! # Architecture
//!
//! ```text
//! SyncLoop → RangeProcessor ─┬── WorkerPool      (bounded concurrent fetches)
//!                            ├── RetryPolicy     (exponential backoff per block)
//!                            ├── ChainReader     (remote node)
//!                            ├── IndexStore      (subscription-filtered index)
//!                            └── Checkpoint      (highest committed block)
//! ```
//!
//! This crate holds the chain-agnostic pieces; the processor and sync loop
//! live in `txwatch-evm`, the in-memory index in `txwatch-storage`.

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod pool;
pub mod query;
pub mod reader;
pub mod retry;
pub mod store;
pub mod types;

pub use checkpoint::{Checkpoint, CheckpointSnapshot};
pub use config::{IndexerConfig, IndexerState};
pub use error::IndexerError;
pub use pool::WorkerPool;
pub use query::IndexQuery;
pub use reader::ChainReader;
pub use retry::{RetryConfig, RetryPolicy};
pub use store::IndexStore;
pub use types::{normalize_address, BlockResult, BlockTransaction, RangeSummary, Transaction};
