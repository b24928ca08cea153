//! Read-side facade over the index and checkpoint, used by the query layer.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::checkpoint::Checkpoint;
use crate::error::IndexerError;
use crate::store::IndexStore;
use crate::types::Transaction;

/// What the query layer is allowed to do: subscribe and read.
///
/// It holds a clone of the checkpoint handle but never advances it.
#[derive(Clone)]
pub struct IndexQuery {
    store: Arc<dyn IndexStore>,
    checkpoint: Checkpoint,
}

impl IndexQuery {
    pub fn new(store: Arc<dyn IndexStore>, checkpoint: Checkpoint) -> Self {
        Self { store, checkpoint }
    }

    /// Highest block fully committed to the index.
    pub fn current_block(&self) -> u64 {
        self.checkpoint.current()
    }

    pub async fn subscribe(&self, address: &str) -> Result<bool, IndexerError> {
        self.store.subscribe(address).await
    }

    pub async fn transactions(&self, address: &str) -> Result<Vec<Transaction>, IndexerError> {
        self.store.transactions(address).await
    }

    pub async fn subscribed_addresses(&self) -> Result<BTreeSet<String>, IndexerError> {
        self.store.subscribed_addresses().await
    }
}
