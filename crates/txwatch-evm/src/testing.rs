//! Test doubles: a scripted chain reader and a store that can be broken.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use txwatch_core::error::IndexerError;
use txwatch_core::reader::ChainReader;
use txwatch_core::store::IndexStore;
use txwatch_core::types::{BlockTransaction, Transaction};
use txwatch_storage::MemoryIndexStore;

type LatencyFn = Box<dyn Fn(u64) -> Duration + Send + Sync>;

pub fn transfer(hash: &str, from: &str, to: &str) -> BlockTransaction {
    BlockTransaction {
        hash: hash.into(),
        from: from.into(),
        to: Some(to.into()),
        block_number: None,
        value: "0x1".into(),
    }
}

/// Chain reader returning canned blocks, with scripted failures and latency.
#[derive(Default)]
pub struct MockChainReader {
    blocks: Mutex<HashMap<u64, Vec<BlockTransaction>>>,
    /// Remaining failures per block (`u32::MAX` = always fail).
    failures: Mutex<HashMap<u64, u32>>,
    fetches: Mutex<HashMap<u64, u32>>,
    latency: Mutex<Option<LatencyFn>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    tip: AtomicU64,
    tip_failures: AtomicU32,
    tip_reads: AtomicU32,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockChainReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_block(&self, number: u64, txs: Vec<BlockTransaction>) {
        self.blocks.lock().unwrap().insert(number, txs);
    }

    pub fn fail_block(&self, number: u64, times: u32) {
        self.failures.lock().unwrap().insert(number, times);
    }

    pub fn set_latency(&self, f: impl Fn(u64) -> Duration + Send + Sync + 'static) {
        *self.latency.lock().unwrap() = Some(Box::new(f));
    }

    pub fn set_tip(&self, tip: u64) {
        self.tip.store(tip, Ordering::SeqCst);
    }

    pub fn fail_tip(&self, times: u32) {
        self.tip_failures.store(times, Ordering::SeqCst);
    }

    pub fn tip_reads(&self) -> u32 {
        self.tip_reads.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetches.lock().unwrap().values().sum()
    }

    pub fn fetches_of(&self, number: u64) -> u32 {
        self.fetches.lock().unwrap().get(&number).copied().unwrap_or(0)
    }

    pub fn fetched_blocks(&self) -> BTreeSet<u64> {
        self.fetches.lock().unwrap().keys().copied().collect()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn fetch_block(&self, block_number: u64) -> Result<Vec<BlockTransaction>, IndexerError> {
        *self.fetches.lock().unwrap().entry(block_number).or_default() += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.peak.fetch_max(now, Ordering::SeqCst);

        let delay = self.latency.lock().unwrap().as_ref().map(|f| f(block_number));
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&block_number) {
                if *remaining > 0 {
                    if *remaining != u32::MAX {
                        *remaining -= 1;
                    }
                    return Err(IndexerError::Rpc(format!("block {block_number}: HTTP 503")));
                }
            }
        }

        Ok(self
            .blocks
            .lock()
            .unwrap()
            .get(&block_number)
            .cloned()
            .unwrap_or_default())
    }

    async fn latest_block(&self) -> Result<u64, IndexerError> {
        self.tip_reads.fetch_add(1, Ordering::SeqCst);
        let pending = self.tip_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.tip_failures.store(pending - 1, Ordering::SeqCst);
            return Err(IndexerError::Rpc("eth_blockNumber: connection refused".into()));
        }
        Ok(self.tip.load(Ordering::SeqCst))
    }
}

/// Memory store that fails to commit one block until healed.
pub struct FailingStore {
    inner: MemoryIndexStore,
    fail_at: u64,
    broken: AtomicBool,
}

impl FailingStore {
    pub fn new(fail_at: u64) -> Self {
        Self {
            inner: MemoryIndexStore::new(),
            fail_at,
            broken: AtomicBool::new(true),
        }
    }

    pub fn heal(&self) {
        self.broken.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl IndexStore for FailingStore {
    async fn subscribe(&self, address: &str) -> Result<bool, IndexerError> {
        self.inner.subscribe(address).await
    }

    async fn store_block_transactions(
        &self,
        block_number: u64,
        transactions: Vec<Transaction>,
    ) -> Result<(), IndexerError> {
        if block_number == self.fail_at && self.broken.load(Ordering::SeqCst) {
            return Err(IndexerError::Storage("disk full".into()));
        }
        self.inner.store_block_transactions(block_number, transactions).await
    }

    async fn transactions(&self, address: &str) -> Result<Vec<Transaction>, IndexerError> {
        self.inner.transactions(address).await
    }

    async fn subscribed_addresses(&self) -> Result<BTreeSet<String>, IndexerError> {
        self.inner.subscribed_addresses().await
    }
}
