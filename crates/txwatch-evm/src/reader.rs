//! HTTP JSON-RPC chain reader backed by `reqwest`.
//!
//! One request per call, no retries: backoff is the range processor's job.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use txwatch_core::error::IndexerError;
use txwatch_core::reader::ChainReader;
use txwatch_core::types::BlockTransaction;

use crate::rpc::{
    block_transactions_from_json, parse_hex_u64, to_hex_quantity, JsonRpcRequest, JsonRpcResponse,
};

/// Reads blocks from an EVM node over HTTP JSON-RPC.
pub struct HttpChainReader {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpChainReader {
    /// Create a reader for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self, IndexerError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| IndexerError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            http,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, IndexerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = JsonRpcRequest::new(id, method, params);

        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| IndexerError::Rpc(format!("{method}: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(IndexerError::Rpc(format!("{method}: HTTP {status}: {body}")));
        }

        resp.json::<JsonRpcResponse>()
            .await
            .map_err(|e| IndexerError::Decode(format!("{method}: {e}")))?
            .into_result()
    }
}

#[async_trait]
impl ChainReader for HttpChainReader {
    async fn fetch_block(&self, block_number: u64) -> Result<Vec<BlockTransaction>, IndexerError> {
        let result = self
            .call(
                "eth_getBlockByNumber",
                vec![json!(to_hex_quantity(block_number)), json!(true)],
            )
            .await?;
        block_transactions_from_json(block_number, result)
    }

    async fn latest_block(&self) -> Result<u64, IndexerError> {
        let result = self.call("eth_blockNumber", vec![]).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| IndexerError::Decode(format!("eth_blockNumber: expected string, got {result}")))?;
        parse_hex_u64(hex)
    }
}
