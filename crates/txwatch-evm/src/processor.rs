//! Range processor: fetches `[start, end]` chunk by chunk, commits each
//! chunk in ascending block order, then advances the checkpoint.
//!
//! # Per chunk
//! 1. Fan the chunk's block numbers out to the worker pool; each block is
//!    fetched through the retry policy.
//! 2. Drop blocks that failed permanently (logged, reported in the summary).
//! 3. Sort the fetched blocks ascending and commit them one by one.
//! 4. Advance the checkpoint to the chunk's last block.
//!
//! Chunks never overlap in time, so the checkpoint only ever covers fully
//! committed chunks. A store error aborts the whole range before the
//! checkpoint moves. Note that a dropped block is still passed by the
//! checkpoint and will not be fetched again.
//!
//! Blocks committed by a chunk that then failed are remembered until a later
//! chunk covering them completes, so resuming from the checkpoint neither
//! refetches nor re-appends them. The store itself always appends.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use txwatch_core::checkpoint::Checkpoint;
use txwatch_core::config::IndexerConfig;
use txwatch_core::error::IndexerError;
use txwatch_core::pool::WorkerPool;
use txwatch_core::reader::ChainReader;
use txwatch_core::retry::{RetryConfig, RetryPolicy};
use txwatch_core::store::IndexStore;
use txwatch_core::types::{BlockTransaction, RangeSummary, Transaction};

/// Drives block ranges from the chain reader into the index store.
pub struct RangeProcessor<C: ChainReader> {
    reader: Arc<C>,
    store: Arc<dyn IndexStore>,
    checkpoint: Checkpoint,
    pool: WorkerPool,
    retry: RetryPolicy,
    chunk_size: u64,
    /// Blocks committed past the checkpoint by a chunk that did not finish.
    uncheckpointed: Mutex<BTreeSet<u64>>,
}

impl<C: ChainReader> RangeProcessor<C> {
    pub fn new(
        reader: Arc<C>,
        store: Arc<dyn IndexStore>,
        checkpoint: Checkpoint,
        config: &IndexerConfig,
    ) -> Self {
        Self {
            reader,
            store,
            checkpoint,
            pool: WorkerPool::new(config.concurrency),
            retry: RetryPolicy::new(RetryConfig {
                max_attempts: config.max_retries.max(1),
                base_delay: config.backoff_base(),
                ..Default::default()
            }),
            chunk_size: config.chunk_size.max(1),
            uncheckpointed: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn reader(&self) -> &Arc<C> {
        &self.reader
    }

    /// Handle to the checkpoint this processor advances.
    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Highest block fully committed to the index.
    pub fn current_block(&self) -> u64 {
        self.checkpoint.current()
    }

    /// Fetch, order, and commit every block in `[start, end]`.
    pub async fn process_range(
        &self,
        start: u64,
        end: u64,
        cancel: &CancellationToken,
    ) -> Result<RangeSummary, IndexerError> {
        if start > end {
            return Err(IndexerError::InvalidRange { start, end });
        }

        let mut summary = RangeSummary {
            start,
            end,
            ..Default::default()
        };

        let mut chunk_start = start;
        loop {
            if cancel.is_cancelled() {
                return Err(IndexerError::Cancelled);
            }
            let chunk_end = chunk_start.saturating_add(self.chunk_size - 1).min(end);

            self.process_chunk(chunk_start, chunk_end, cancel, &mut summary)
                .await
                .map_err(|e| {
                    if !e.is_cancelled() {
                        tracing::error!(chunk_start, chunk_end, error = %e, "chunk failed, aborting range");
                    }
                    e
                })?;

            self.checkpoint.advance(chunk_end);
            self.uncheckpointed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|b| *b < chunk_start || *b > chunk_end);
            summary.chunks += 1;
            tracing::info!(
                chunk_start,
                chunk_end,
                checkpoint = self.checkpoint.current(),
                "chunk committed"
            );

            if chunk_end == end {
                break;
            }
            chunk_start = chunk_end + 1;
        }

        summary.failed_blocks.sort_unstable();
        Ok(summary)
    }

    async fn process_chunk(
        &self,
        chunk_start: u64,
        chunk_end: u64,
        cancel: &CancellationToken,
        summary: &mut RangeSummary,
    ) -> Result<(), IndexerError> {
        let blocks: Vec<u64> = {
            let done = self.uncheckpointed.lock().unwrap_or_else(PoisonError::into_inner);
            (chunk_start..=chunk_end).filter(|b| !done.contains(b)).collect()
        };
        let resumed = (chunk_end - chunk_start + 1) as usize - blocks.len();
        if resumed > 0 {
            tracing::debug!(chunk_start, chunk_end, resumed, "skipping blocks committed before a failed chunk");
        }

        let reader = self.reader.clone();
        let retry = self.retry.clone();
        let mut results = self.pool.run(blocks, cancel.clone(), move |block_number, cancel| {
            let reader = reader.clone();
            let retry = retry.clone();
            async move {
                retry
                    .run(block_number, &cancel, || reader.fetch_block(block_number))
                    .await
            }
        });

        let mut fetched: Vec<(u64, Vec<BlockTransaction>)> = Vec::new();
        while let Some(result) = results.recv().await {
            match result.outcome {
                Ok(transactions) => fetched.push((result.block_number, transactions)),
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    tracing::warn!(block = result.block_number, error = %e, "dropping block after permanent failure");
                    summary.failed_blocks.push(result.block_number);
                }
            }
        }

        // Some blocks may not have been scheduled at all; commit nothing.
        if cancel.is_cancelled() {
            return Err(IndexerError::Cancelled);
        }

        fetched.sort_by_key(|(block_number, _)| *block_number);

        for (block_number, transactions) in fetched {
            let records: Vec<Transaction> = transactions
                .into_iter()
                .map(|tx| Transaction::from_block_tx(block_number, tx))
                .collect();
            summary.transactions_seen += records.len() as u64;

            self.store
                .store_block_transactions(block_number, records)
                .await
                .map_err(|e| match e {
                    IndexerError::Storage(msg) => {
                        IndexerError::Storage(format!("store block {block_number}: {msg}"))
                    }
                    other => other,
                })?;
            self.uncheckpointed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(block_number);
            summary.blocks_committed += 1;
        }

        Ok(())
    }
}
