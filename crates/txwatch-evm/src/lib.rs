//! txwatch-evm — EVM chain reader, range processor and sync loop.

pub mod builder;
pub mod processor;
pub mod reader;
pub mod rpc;
pub mod sync_loop;

#[cfg(test)]
mod testing;

pub use builder::IndexerBuilder;
pub use processor::RangeProcessor;
pub use reader::HttpChainReader;
pub use sync_loop::{SyncHandle, SyncLoop};
