//! Checkpoint: the highest block number fully committed to the index.
//!
//! The range processor is the only writer; the sync loop and query layer
//! read it. The value only moves forward, and it is advanced only after every
//! block of a chunk has been committed.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// Point-in-time view of the checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointSnapshot {
    /// Highest fully committed block number.
    pub block_number: u64,
    /// Unix timestamp of the last advance (`0` if never advanced).
    pub updated_at: i64,
}

/// Shared, monotonic checkpoint handle. Cloning shares the same value.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    inner: Arc<RwLock<CheckpointSnapshot>>,
}

impl Checkpoint {
    /// Create a checkpoint starting at `block_number`.
    pub fn new(block_number: u64) -> Self {
        Self {
            inner: Arc::new(RwLock::new(CheckpointSnapshot {
                block_number,
                updated_at: 0,
            })),
        }
    }

    /// Highest fully committed block number.
    pub fn current(&self) -> u64 {
        self.snapshot().block_number
    }

    pub fn snapshot(&self) -> CheckpointSnapshot {
        // A u64 + i64 pair is never observed half-written, so a poisoned
        // lock still holds a valid value.
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move the checkpoint forward to `block_number`.
    ///
    /// Returns `false` (and changes nothing) if the checkpoint is already at
    /// or past `block_number`.
    pub fn advance(&self, block_number: u64) -> bool {
        let mut cp = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let never_advanced = cp.updated_at == 0;
        if block_number < cp.block_number || (block_number == cp.block_number && !never_advanced) {
            return false;
        }
        cp.block_number = block_number;
        cp.updated_at = chrono::Utc::now().timestamp();
        true
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::new(0)
    }
}
