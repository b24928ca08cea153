//! Bounded worker pool: runs a fetch function over a set of block numbers
//! with at most `concurrency` calls in flight.
//!
//! Results arrive on a channel sized to the number of blocks, so workers
//! never block on a slow consumer. Completion order is unspecified.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::IndexerError;
use crate::types::{BlockResult, BlockTransaction};

/// Fixed-width pool of concurrent block fetches.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    concurrency: usize,
}

impl WorkerPool {
    /// Create a pool. A concurrency of 0 is treated as 1.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run `fetch` for every block in `blocks`.
    ///
    /// Every scheduled block yields exactly one [`BlockResult`]. Once `cancel`
    /// fires no further blocks are scheduled; in-flight calls receive the
    /// token and decide how to stop. The receiver closes when all scheduled
    /// calls have finished.
    pub fn run<F, Fut>(
        &self,
        blocks: Vec<u64>,
        cancel: CancellationToken,
        fetch: F,
    ) -> mpsc::Receiver<BlockResult>
    where
        F: Fn(u64, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<BlockTransaction>, IndexerError>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(blocks.len().max(1));
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let fetch = Arc::new(fetch);

        tokio::spawn(async move {
            let mut tasks = JoinSet::new();

            for block_number in blocks {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        tracing::debug!(block = block_number, "pool cancelled, not scheduling further blocks");
                        break;
                    }
                    permit = semaphore.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                let fut = fetch(block_number, cancel.clone());
                let tx = tx.clone();
                tasks.spawn(async move {
                    // A panicking fetch still has to report its block.
                    let outcome = match tokio::spawn(fut).await {
                        Ok(outcome) => outcome,
                        Err(e) => Err(IndexerError::Other(format!("fetch task failed: {e}"))),
                    };
                    drop(permit);
                    // Capacity equals the block count, so this never waits.
                    let _ = tx
                        .send(BlockResult {
                            block_number,
                            outcome,
                        })
                        .await;
                });
            }

            drop(tx);
            while tasks.join_next().await.is_some() {}
        });

        rx
    }
}
