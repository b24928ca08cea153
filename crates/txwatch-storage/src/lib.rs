//! txwatch-storage — backends for the address index.
//!
//! Backends:
//! - [`memory`]: in-memory (no persistence; everything is lost on exit)

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "memory")]
pub use memory::MemoryIndexStore;
