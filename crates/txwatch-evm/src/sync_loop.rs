//! Sync loop that keeps the index following the chain tip.
//!
//! # Phase 1: CATCH-UP
//! Read the tip once and process `[tip - lookback, tip]`. Failing to read the
//! tip or to process that range is fatal: there is no valid starting point.
//! The checkpoint is seeded just below the window so readers see the derived
//! start before the first chunk lands.
//!
//! # Phase 2: LIVE
//! Every `poll_interval`: read the tip, and if the checkpoint is behind it,
//! process `[checkpoint + 1, tip]`. Errors here are logged and retried on the
//! next poll. The checkpoint gates each range, so ranges never overlap.
//!
//! The loop ends only when its cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use txwatch_core::config::{IndexerConfig, IndexerState};
use txwatch_core::error::IndexerError;
use txwatch_core::reader::ChainReader;
use txwatch_core::types::RangeSummary;

use crate::processor::RangeProcessor;

/// Drives a [`RangeProcessor`] from catch-up into live polling.
pub struct SyncLoop<C: ChainReader> {
    processor: Arc<RangeProcessor<C>>,
    lookback: u64,
    poll_interval: Duration,
    state: watch::Sender<IndexerState>,
}

impl<C: ChainReader> SyncLoop<C> {
    pub fn new(processor: Arc<RangeProcessor<C>>, config: &IndexerConfig) -> Self {
        let (state, _) = watch::channel(IndexerState::Idle);
        Self {
            processor,
            lookback: config.lookback,
            poll_interval: config.poll_interval(),
            state,
        }
    }

    /// Subscribe to state changes.
    pub fn state(&self) -> watch::Receiver<IndexerState> {
        self.state.subscribe()
    }

    pub fn processor(&self) -> &Arc<RangeProcessor<C>> {
        &self.processor
    }

    /// Run catch-up then poll until `cancel` fires.
    ///
    /// Returns `Ok(())` on cancellation and an error only if catch-up failed.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), IndexerError> {
        match self.catch_up(&cancel).await {
            Ok(_) => {}
            Err(e) if e.is_cancelled() => {
                self.state.send_replace(IndexerState::Stopped);
                return Ok(());
            }
            Err(e) => {
                tracing::error!(error = %e, "catch-up failed");
                self.state.send_replace(IndexerState::Error);
                return Err(e);
            }
        }

        self.poll(&cancel).await;
        self.state.send_replace(IndexerState::Stopped);
        tracing::info!(checkpoint = self.processor.current_block(), "sync loop stopped");
        Ok(())
    }

    /// Process the lookback window behind the current tip.
    pub async fn catch_up(&self, cancel: &CancellationToken) -> Result<RangeSummary, IndexerError> {
        self.state.send_replace(IndexerState::CatchingUp);

        let tip = self.latest_block(cancel).await?;
        let start = tip.saturating_sub(self.lookback);
        if let Some(below) = start.checked_sub(1) {
            self.processor.checkpoint().advance(below);
        }
        tracing::info!(start, tip, checkpoint = self.processor.current_block(), "starting catch-up");

        let summary = self.processor.process_range(start, tip, cancel).await?;
        tracing::info!(
            checkpoint = self.processor.current_block(),
            blocks = summary.blocks_committed,
            failed = summary.failed_blocks.len(),
            "catch-up complete"
        );
        Ok(summary)
    }

    /// One live iteration: returns `Ok(None)` when already at the tip.
    pub async fn poll_once(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<RangeSummary>, IndexerError> {
        let tip = self.latest_block(cancel).await?;
        self.advance_to(tip, cancel).await
    }

    async fn advance_to(
        &self,
        tip: u64,
        cancel: &CancellationToken,
    ) -> Result<Option<RangeSummary>, IndexerError> {
        let checkpoint = self.processor.current_block();
        if checkpoint >= tip {
            return Ok(None);
        }
        self.processor
            .process_range(checkpoint + 1, tip, cancel)
            .await
            .map(Some)
    }

    async fn poll(&self, cancel: &CancellationToken) {
        self.state.send_replace(IndexerState::Live);

        while !cancel.is_cancelled() {
            match self.latest_block(cancel).await {
                Ok(tip) => match self.advance_to(tip, cancel).await {
                    Ok(Some(summary)) => tracing::info!(
                        start = summary.start,
                        end = summary.end,
                        checkpoint = self.processor.current_block(),
                        "updated"
                    ),
                    Ok(None) => {}
                    Err(e) if e.is_cancelled() => break,
                    Err(e) => tracing::error!(
                        from = self.processor.current_block() + 1,
                        to = tip,
                        error = %e,
                        "range processing failed, retrying next poll"
                    ),
                },
                Err(e) if e.is_cancelled() => break,
                Err(e) => tracing::warn!(error = %e, "failed to read chain tip"),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    async fn latest_block(&self, cancel: &CancellationToken) -> Result<u64, IndexerError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(IndexerError::Cancelled),
            tip = self.processor.reader().latest_block() => tip,
        }
    }
}

impl<C: ChainReader> SyncLoop<C> {
    /// Move the loop onto a background task owned by the returned handle.
    pub fn spawn(self, cancel: CancellationToken) -> SyncHandle {
        let state = self.state();
        let token = cancel.clone();
        let task = tokio::spawn(async move { self.run(token).await });
        SyncHandle {
            cancel,
            state,
            task,
        }
    }
}

/// Owned handle to a running sync loop.
pub struct SyncHandle {
    cancel: CancellationToken,
    state: watch::Receiver<IndexerState>,
    task: JoinHandle<Result<(), IndexerError>>,
}

impl SyncHandle {
    pub fn state(&self) -> IndexerState {
        *self.state.borrow()
    }

    pub fn state_receiver(&self) -> watch::Receiver<IndexerState> {
        self.state.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to end on its own (catch-up failure) or by cancellation.
    pub async fn join(self) -> Result<(), IndexerError> {
        self.task
            .await
            .map_err(|e| IndexerError::Other(format!("sync task failed: {e}")))?
    }

    /// Cancel the loop and wait for it to finish its current step.
    pub async fn shutdown(self) -> Result<(), IndexerError> {
        self.cancel.cancel();
        self.join().await
    }
}
