//! Indexer configuration and runtime state types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::IndexerError;

/// Configuration for an ingestion pipeline instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// JSON-RPC endpoint of the chain node.
    pub rpc_url: String,
    /// Maximum number of block fetches in flight at once.
    pub concurrency: usize,
    /// Number of blocks committed per checkpoint step.
    pub chunk_size: u64,
    /// Total fetch attempts per block before it is dropped.
    pub max_retries: u32,
    /// Backoff unit in milliseconds; the n-th retry waits `2^n` units.
    pub backoff_base_ms: u64,
    /// How many blocks behind the tip the initial catch-up starts.
    pub lookback: u64,
    /// Tip polling interval in live mode (milliseconds).
    pub poll_interval_ms: u64,
    /// Per-request timeout for the chain reader (milliseconds).
    pub request_timeout_ms: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://cloudflare-eth.com".into(),
            concurrency: 1,
            chunk_size: 50,
            max_retries: 3,
            backoff_base_ms: 1000,
            lookback: 10,
            poll_interval_ms: 2000,
            request_timeout_ms: 30_000,
        }
    }
}

impl IndexerConfig {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), IndexerError> {
        if self.concurrency == 0 {
            return Err(IndexerError::Config("concurrency must be at least 1".into()));
        }
        if self.chunk_size == 0 {
            return Err(IndexerError::Config("chunk_size must be at least 1".into()));
        }
        if self.max_retries == 0 {
            return Err(IndexerError::Config("max_retries must be at least 1".into()));
        }
        if self.rpc_url.trim().is_empty() {
            return Err(IndexerError::Config("rpc_url must not be empty".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Runtime state of the sync loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexerState {
    /// Not yet started.
    Idle,
    /// Processing the initial lookback window.
    CatchingUp,
    /// Polling the chain tip.
    Live,
    /// Shut down after cancellation.
    Stopped,
    /// Terminated on an unrecoverable error.
    Error,
}

impl std::fmt::Display for IndexerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::CatchingUp => write!(f, "catching-up"),
            Self::Live => write!(f, "live"),
            Self::Stopped => write!(f, "stopped"),
            Self::Error => write!(f, "error"),
        }
    }
}
