//! JSON-RPC 2.0 wire types and hex helpers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use txwatch_core::error::IndexerError;
use txwatch_core::types::BlockTransaction;

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Vec<Value>,
    pub id: u64,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Extract the result, turning a JSON-RPC error object into `IndexerError::Rpc`.
    pub fn into_result(self) -> Result<Value, IndexerError> {
        if let Some(err) = self.error {
            return Err(IndexerError::Rpc(format!(
                "JSON-RPC error {}: {}",
                err.code, err.message
            )));
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

/// A full transaction object inside an `eth_getBlockByNumber` result.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    hash: String,
    from: String,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    block_number: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RpcBlock {
    #[serde(default)]
    transactions: Vec<RpcTransaction>,
}

/// Parse a hex quantity (`0x…`) to u64.
pub fn parse_hex_u64(s: &str) -> Result<u64, IndexerError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u64::from_str_radix(digits, 16)
        .map_err(|e| IndexerError::Decode(format!("invalid hex quantity {s:?}: {e}")))
}

/// Format a block number as a hex quantity.
pub fn to_hex_quantity(n: u64) -> String {
    format!("0x{n:x}")
}

/// Convert an `eth_getBlockByNumber(…, true)` result into block transactions.
///
/// A `null` result means the node does not have the block yet.
pub fn block_transactions_from_json(
    block_number: u64,
    result: Value,
) -> Result<Vec<BlockTransaction>, IndexerError> {
    if result.is_null() {
        return Err(IndexerError::Rpc(format!("block {block_number} not available")));
    }
    let block: RpcBlock = serde_json::from_value(result)
        .map_err(|e| IndexerError::Decode(format!("block {block_number}: {e}")))?;

    block
        .transactions
        .into_iter()
        .map(|tx| -> Result<BlockTransaction, IndexerError> {
            Ok(BlockTransaction {
                hash: tx.hash,
                from: tx.from,
                to: tx.to,
                block_number: tx.block_number.as_deref().map(parse_hex_u64).transpose()?,
                value: tx.value.unwrap_or_else(|| "0x0".into()),
            })
        })
        .collect()
}
