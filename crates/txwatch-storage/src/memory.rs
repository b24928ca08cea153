//! In-memory index backend.
//!
//! Subscriptions and per-address transaction lists sit behind one lock, so a
//! block commit and a concurrent subscription are serialized: a transaction
//! is either seen by the subscription or committed before it, never lost
//! half-way. Every commit appends; callers decide what not to replay.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use txwatch_core::error::IndexerError;
use txwatch_core::store::IndexStore;
use txwatch_core::types::{normalize_address, Transaction};

#[derive(Default)]
struct IndexState {
    subscribed: HashSet<String>,
    transactions: HashMap<String, Vec<Transaction>>,
}

/// In-memory address index.
///
/// All data is lost when the process exits.
#[derive(Default)]
pub struct MemoryIndexStore {
    state: RwLock<IndexState>,
}

impl MemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, IndexState>, IndexerError> {
        self.state
            .read()
            .map_err(|_| IndexerError::Storage("index lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, IndexState>, IndexerError> {
        self.state
            .write()
            .map_err(|_| IndexerError::Storage("index lock poisoned".into()))
    }

    /// Total number of stored entries across all addresses.
    pub fn entry_count(&self) -> Result<usize, IndexerError> {
        Ok(self.read()?.transactions.values().map(Vec::len).sum())
    }
}

#[async_trait]
impl IndexStore for MemoryIndexStore {
    async fn subscribe(&self, address: &str) -> Result<bool, IndexerError> {
        let address = normalize_address(address);
        if address.is_empty() {
            return Err(IndexerError::InvalidAddress(address));
        }
        Ok(self.write()?.subscribed.insert(address))
    }

    async fn store_block_transactions(
        &self,
        block_number: u64,
        transactions: Vec<Transaction>,
    ) -> Result<(), IndexerError> {
        let mut state = self.write()?;
        let IndexState {
            subscribed,
            transactions: index,
        } = &mut *state;

        let mut stored = 0usize;
        for tx in transactions {
            let (from, to) = tx.normalized_endpoints();
            let to = to.filter(|to| subscribed.contains(to) && *to != from);
            let from = Some(from).filter(|from| subscribed.contains(from));

            match (from, to) {
                (None, None) => continue,
                (Some(from), Some(to)) => {
                    index.entry(from).or_default().push(tx.clone());
                    index.entry(to).or_default().push(tx);
                }
                (Some(addr), None) | (None, Some(addr)) => {
                    index.entry(addr).or_default().push(tx);
                }
            }
            stored += 1;
        }

        if stored > 0 {
            tracing::debug!(block = block_number, stored, "committed block transactions");
        }
        Ok(())
    }

    async fn transactions(&self, address: &str) -> Result<Vec<Transaction>, IndexerError> {
        let address = normalize_address(address);
        Ok(self
            .read()?
            .transactions
            .get(&address)
            .cloned()
            .unwrap_or_default())
    }

    async fn subscribed_addresses(&self) -> Result<BTreeSet<String>, IndexerError> {
        Ok(self.read()?.subscribed.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn tx(hash: &str, from: &str, to: Option<&str>, block: u64) -> Transaction {
        Transaction {
            hash: hash.into(),
            from: from.into(),
            to: to.map(Into::into),
            block_number: block,
            value: "0x0".into(),
        }
    }

    #[tokio::test]
    async fn subscribe_is_idempotent_and_case_insensitive() {
        let store = MemoryIndexStore::new();
        assert!(store.subscribe("0xABC").await.unwrap());
        assert!(!store.subscribe("0xABC").await.unwrap());
        assert!(!store.subscribe("0xabc").await.unwrap());

        let subs = store.subscribed_addresses().await.unwrap();
        assert_eq!(subs.into_iter().collect::<Vec<_>>(), vec!["0xabc".to_string()]);
    }

    #[tokio::test]
    async fn empty_address_is_rejected() {
        let store = MemoryIndexStore::new();
        assert!(matches!(
            store.subscribe("   ").await,
            Err(IndexerError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn only_subscribed_endpoints_are_indexed() {
        let store = MemoryIndexStore::new();
        store.subscribe("0xaaa").await.unwrap();
        store.subscribe("0xBBB").await.unwrap();

        store
            .store_block_transactions(
                10,
                vec![
                    tx("0x1", "0xAAA", Some("0xccc"), 10),
                    tx("0x2", "0xddd", Some("0xeee"), 10),
                    tx("0x3", "0xaaa", Some("0xbbb"), 10),
                    tx("0x4", "0xbbb", None, 10),
                ],
            )
            .await
            .unwrap();

        let a: Vec<_> = store.transactions("0xaaa").await.unwrap().into_iter().map(|t| t.hash).collect();
        let b: Vec<_> = store.transactions("0xBbB").await.unwrap().into_iter().map(|t| t.hash).collect();
        assert_eq!(a, vec!["0x1", "0x3"]);
        assert_eq!(b, vec!["0x3", "0x4"]);
        assert!(store.transactions("0xddd").await.unwrap().is_empty());
        assert!(store.transactions("0xeee").await.unwrap().is_empty());
        assert_eq!(store.entry_count().unwrap(), 4);
    }

    #[tokio::test]
    async fn self_transfer_is_recorded_once() {
        let store = MemoryIndexStore::new();
        store.subscribe("0xaaa").await.unwrap();
        store
            .store_block_transactions(1, vec![tx("0x1", "0xaaa", Some("0xAAA"), 1)])
            .await
            .unwrap();
        assert_eq!(store.transactions("0xaaa").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unsubscribed_history_is_not_backfilled() {
        let store = MemoryIndexStore::new();
        store
            .store_block_transactions(1, vec![tx("0x1", "0xaaa", None, 1)])
            .await
            .unwrap();
        store.subscribe("0xaaa").await.unwrap();
        store
            .store_block_transactions(2, vec![tx("0x2", "0xaaa", None, 2)])
            .await
            .unwrap();

        let hashes: Vec<_> = store.transactions("0xaaa").await.unwrap().into_iter().map(|t| t.hash).collect();
        assert_eq!(hashes, vec!["0x2"]);
    }

    #[tokio::test]
    async fn commits_append_in_call_order() {
        let store = MemoryIndexStore::new();
        store.subscribe("0xaaa").await.unwrap();
        for block in [50, 51, 3] {
            store
                .store_block_transactions(block, vec![tx(&format!("0x{block}"), "0xaaa", None, block)])
                .await
                .unwrap();
        }
        let hashes: Vec<_> = store.transactions("0xaaa").await.unwrap().into_iter().map(|t| t.hash).collect();
        assert_eq!(hashes, vec!["0x50", "0x51", "0x3"]);
    }

    #[tokio::test]
    async fn reads_are_snapshots() {
        let store = MemoryIndexStore::new();
        store.subscribe("0xaaa").await.unwrap();
        store
            .store_block_transactions(1, vec![tx("0x1", "0xaaa", None, 1)])
            .await
            .unwrap();

        let snapshot = store.transactions("0xaaa").await.unwrap();
        store
            .store_block_transactions(2, vec![tx("0x2", "0xaaa", None, 2)])
            .await
            .unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.transactions("0xaaa").await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_never_observe_half_a_block() {
        let store = Arc::new(MemoryIndexStore::new());
        store.subscribe("0xaaa").await.unwrap();

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for block in 0..500u64 {
                    let txs = (0..4)
                        .map(|i| tx(&format!("0x{block}-{i}"), "0xaaa", None, block))
                        .collect();
                    store.store_block_transactions(block, txs).await.unwrap();
                }
            })
        };

        let reader = {
            let store = store.clone();
            tokio::spawn(async move {
                for _ in 0..500 {
                    let txs = store.transactions("0xaaa").await.unwrap();
                    assert_eq!(txs.len() % 4, 0, "partial block visible");
                    assert!(txs.windows(2).all(|w| w[0].block_number <= w[1].block_number));
                    tokio::task::yield_now().await;
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();
        assert_eq!(store.transactions("0xaaa").await.unwrap().len(), 2000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn subscription_racing_commits_sees_whole_blocks() {
        let store = Arc::new(MemoryIndexStore::new());

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for block in 0..500u64 {
                    let txs = (0..4)
                        .map(|i| tx(&format!("0x{block}-{i}"), "0xsender", Some("0xNEW"), block))
                        .collect();
                    store.store_block_transactions(block, txs).await.unwrap();
                    if block % 8 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        };

        let subscriber = {
            let store = store.clone();
            tokio::spawn(async move {
                for _ in 0..20 {
                    tokio::task::yield_now().await;
                }
                store.subscribe("0xnew").await.unwrap();
            })
        };

        subscriber.await.unwrap();
        writer.await.unwrap();

        let mut per_block: BTreeMap<u64, usize> = BTreeMap::new();
        for t in store.transactions("0xnew").await.unwrap() {
            *per_block.entry(t.block_number).or_default() += 1;
        }
        assert!(per_block.values().all(|n| *n == 4), "partially applied block");

        // Every block from the first one seen onwards is present.
        if let Some(first) = per_block.keys().next().copied() {
            assert_eq!(per_block.keys().copied().collect::<Vec<_>>(), (first..500).collect::<Vec<_>>());
        }
    }
}
