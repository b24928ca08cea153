//! The `IndexStore` trait: the subscription-filtered address index.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::IndexerError;
use crate::types::Transaction;

/// Concurrency-safe store mapping subscribed addresses to their transactions.
///
/// Implementations must make `store_block_transactions` atomic with respect
/// to `subscribe` and to every read: a reader never observes half a block.
/// All addresses are matched after [`normalize_address`](crate::types::normalize_address).
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Start tracking `address`. Returns `true` if it was newly added.
    async fn subscribe(&self, address: &str) -> Result<bool, IndexerError>;

    /// Commit every transaction of one block whose `from` or `to` is subscribed.
    ///
    /// A transaction between two subscribed addresses is appended to both.
    async fn store_block_transactions(
        &self,
        block_number: u64,
        transactions: Vec<Transaction>,
    ) -> Result<(), IndexerError>;

    /// Snapshot of the transactions recorded for `address`, in commit order.
    async fn transactions(&self, address: &str) -> Result<Vec<Transaction>, IndexerError>;

    /// Snapshot of the subscription set.
    async fn subscribed_addresses(&self) -> Result<BTreeSet<String>, IndexerError>;
}
