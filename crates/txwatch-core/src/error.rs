//! Error types for the txwatch pipeline.

use thiserror::Error;

/// Errors that can occur while ingesting or querying the index.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid range: start block ({start}) > end block ({end})")]
    InvalidRange { start: u64, end: u64 },

    #[error("Block {block_number} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        block_number: u64,
        attempts: u32,
        #[source]
        source: Box<IndexerError>,
    },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid address: {0:?}")]
    InvalidAddress(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    /// Returns `true` if the error is the result of cooperative cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` if the error is transient and the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Rpc(_) | Self::Decode(_))
    }

    /// Returns `true` if the index itself failed (fatal to a range).
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(IndexerError::Rpc("timeout".into()).is_retryable());
        assert!(IndexerError::Decode("truncated".into()).is_retryable());
        assert!(!IndexerError::Storage("poisoned".into()).is_retryable());
        assert!(IndexerError::Storage("poisoned".into()).is_storage());
        assert!(IndexerError::Cancelled.is_cancelled());
    }

    #[test]
    fn exhausted_wraps_last_error() {
        let err = IndexerError::RetriesExhausted {
            block_number: 42,
            attempts: 3,
            source: Box::new(IndexerError::Rpc("HTTP 502".into())),
        };
        let msg = err.to_string();
        assert!(msg.contains("Block 42"));
        assert!(msg.contains("HTTP 502"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
