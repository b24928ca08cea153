//! Shared types for the ingestion pipeline.

use serde::{Deserialize, Serialize};

use crate::error::IndexerError;

// ─── Addresses ───────────────────────────────────────────────────────────────

/// Normalize an address for subscription matching (trimmed, lower-cased).
pub fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

// ─── BlockTransaction ────────────────────────────────────────────────────────

/// A transaction as returned by the chain reader, before indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTransaction {
    /// Transaction hash (`0x…`).
    pub hash: String,
    /// Sender address.
    pub from: String,
    /// Recipient address; `None` for contract creation.
    pub to: Option<String>,
    /// Block number reported by the node, if any.
    pub block_number: Option<u64>,
    /// Transferred value as reported by the node (hex quantity).
    pub value: String,
}

// ─── Transaction ─────────────────────────────────────────────────────────────

/// An indexed transaction record.
///
/// Addresses keep the casing the node reported; matching against
/// subscriptions always goes through [`normalize_address`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: String,
    pub from: String,
    pub to: Option<String>,
    pub block_number: u64,
    pub value: String,
}

impl Transaction {
    /// Translate a fetched transaction into an index record for `block_number`.
    ///
    /// The block being committed is authoritative for the block number.
    pub fn from_block_tx(block_number: u64, tx: BlockTransaction) -> Self {
        Self {
            hash: tx.hash,
            from: tx.from,
            to: tx.to,
            block_number,
            value: tx.value,
        }
    }

    /// Normalized `(from, to)` pair used for subscription matching.
    pub fn normalized_endpoints(&self) -> (String, Option<String>) {
        (
            normalize_address(&self.from),
            self.to.as_deref().map(normalize_address),
        )
    }
}

// ─── BlockResult ─────────────────────────────────────────────────────────────

/// The outcome of fetching one block: its transactions or a terminal error.
#[derive(Debug)]
pub struct BlockResult {
    pub block_number: u64,
    pub outcome: Result<Vec<BlockTransaction>, IndexerError>,
}

impl BlockResult {
    pub fn ok(block_number: u64, transactions: Vec<BlockTransaction>) -> Self {
        Self {
            block_number,
            outcome: Ok(transactions),
        }
    }

    pub fn err(block_number: u64, error: IndexerError) -> Self {
        Self {
            block_number,
            outcome: Err(error),
        }
    }

    /// Returns `true` if the fetch succeeded.
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

// ─── RangeSummary ────────────────────────────────────────────────────────────

/// What a single `process_range` call did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeSummary {
    pub start: u64,
    pub end: u64,
    /// Number of chunks committed.
    pub chunks: u64,
    /// Blocks whose transactions were committed to the index.
    pub blocks_committed: u64,
    /// Transactions handed to the index (before subscription filtering).
    pub transactions_seen: u64,
    /// Blocks that permanently failed and were skipped.
    pub failed_blocks: Vec<u64>,
}

// ─── Tests ────────────────────────────────────────────────────────────────────
