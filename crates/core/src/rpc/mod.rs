//! JSON-RPC log emulation over indexed logs.
//!
//! Serves `eth_getLogs` (plus `eth_chainId` and `eth_blockNumber`) so that
//! standard Ethereum clients can read indexed events without a node. Logs are
//! never returned above the last fully indexed block.

mod filter;

pub use filter::{LogFilter, OneOrMany};

use crate::store::{timed, IndexStore, StoreError};
use futures::future::join_all;
use indexer_chain::{hex_lower, ChainLog};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument};

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL: i64 = -32603;
    pub const LIMIT_EXCEEDED: i64 = -32005;

    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(Self::PARSE_ERROR, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_REQUEST, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(Self::METHOD_NOT_FOUND, format!("the method {method} does not exist/is not available"))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(Self::INVALID_PARAMS, message)
    }

    pub fn limit_exceeded(max: usize) -> Self {
        Self::new(Self::LIMIT_EXCEEDED, format!("query returned more than {max} results"))
    }
}

impl From<StoreError> for RpcError {
    fn from(e: StoreError) -> Self {
        error!(error = %e, "Log emulation storage failure");
        Self::new(Self::INTERNAL, "internal error")
    }
}

/// Serves JSON-RPC requests for one or more chains from the index.
pub struct LogEmulator {
    store: Arc<dyn IndexStore>,
    max_logs: usize,
    timeout: Duration,
}

impl LogEmulator {
    pub fn new(store: Arc<dyn IndexStore>, max_logs: usize, timeout: Duration) -> Self {
        Self {
            store,
            max_logs,
            timeout,
        }
    }

    /// Handle a single request object or a batch array.
    pub async fn handle(&self, chain_id: u64, body: Value) -> Value {
        match body {
            Value::Array(requests) if requests.is_empty() => {
                response(Value::Null, Err(RpcError::invalid_request("empty batch")))
            }
            Value::Array(requests) => {
                let responses = join_all(requests.into_iter().map(|request| self.handle_one(chain_id, request))).await;
                Value::Array(responses)
            }
            request => self.handle_one(chain_id, request).await,
        }
    }

    async fn handle_one(&self, chain_id: u64, request: Value) -> Value {
        let Value::Object(mut request) = request else {
            return response(Value::Null, Err(RpcError::invalid_request("request must be an object")));
        };
        let id = request.remove("id").unwrap_or(Value::Null);
        let Some(method) = request.get("method").and_then(Value::as_str).map(str::to_owned) else {
            return response(id, Err(RpcError::invalid_request("missing method")));
        };
        let params = request.remove("params").unwrap_or(Value::Array(Vec::new()));

        response(id, self.dispatch(chain_id, &method, &params).await)
    }

    #[instrument(skip(self, params))]
    async fn dispatch(&self, chain_id: u64, method: &str, params: &Value) -> Result<Value, RpcError> {
        match method {
            "eth_chainId" => Ok(json!(format!("{chain_id:#x}"))),
            "eth_blockNumber" => {
                let latest = self.latest(chain_id).await?.unwrap_or(0);
                Ok(json!(format!("{latest:#x}")))
            }
            "eth_getLogs" => {
                let filter = LogFilter::from_params(params)?;
                let logs = self.get_logs(chain_id, filter).await?;
                Ok(Value::Array(logs.iter().map(log_json).collect()))
            }
            other => Err(RpcError::method_not_found(other)),
        }
    }

    async fn latest(&self, chain_id: u64) -> Result<Option<u64>, StoreError> {
        timed(
            "latest_indexed_block",
            self.timeout,
            self.store.latest_indexed_block(chain_id),
        )
        .await
    }

    /// Logs matching `filter` up to the last fully indexed block.
    pub async fn get_logs(&self, chain_id: u64, filter: LogFilter) -> Result<Vec<ChainLog>, RpcError> {
        // Nothing is fully indexed yet
        let Some(latest) = self.latest(chain_id).await? else {
            return Ok(Vec::new());
        };
        // One extra row tells an exact fit apart from an overflow
        let Some(query) = filter.resolve(latest, self.max_logs.saturating_add(1))? else {
            return Ok(Vec::new());
        };

        let logs = timed("logs", self.timeout, self.store.logs(chain_id, &query)).await?;
        if logs.len() > self.max_logs {
            return Err(RpcError::limit_exceeded(self.max_logs));
        }
        debug!(chain_id, from = query.from_block, to = query.to_block, logs = logs.len(), "eth_getLogs served");
        Ok(logs)
    }
}

/// JSON-RPC 2.0 response envelope.
pub fn response(id: Value, result: Result<Value, RpcError>) -> Value {
    match result {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err(error) => json!({ "jsonrpc": "2.0", "id": id, "error": error }),
    }
}

/// Standard `eth_getLogs` log object.
fn log_json(log: &ChainLog) -> Value {
    json!({
        "address": hex_lower(log.address),
        "topics": log.topics.iter().map(hex_lower).collect::<Vec<_>>(),
        "data": hex_lower(&log.data),
        "blockNumber": format!("{:#x}", log.block_number),
        "blockHash": hex_lower(log.block_hash),
        "transactionHash": hex_lower(log.transaction_hash),
        "transactionIndex": format!("{:#x}", log.transaction_index),
        "logIndex": format!("{:#x}", log.log_index),
        "removed": false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use alloy::primitives::{Address, Bytes, B256};

    const CHAIN: u64 = 1337;

    fn log(block: u64, log_index: u64) -> ChainLog {
        ChainLog {
            block_number: block,
            block_hash: B256::repeat_byte(block as u8),
            transaction_hash: B256::repeat_byte(0xee),
            transaction_index: 0,
            log_index,
            address: Address::repeat_byte(0xAB),
            topics: [B256::repeat_byte(0x01)].into_iter().collect(),
            data: Bytes::from(vec![0xde, 0xad]),
        }
    }

    fn emulator(latest: Option<u64>, blocks: &[u64], max_logs: usize) -> LogEmulator {
        let store = MemoryStore::new();
        for (i, block) in blocks.iter().enumerate() {
            store.insert_log(CHAIN, log(*block, i as u64));
        }
        if let Some(latest) = latest {
            store.set_latest_indexed_block(CHAIN, latest);
        }
        LogEmulator::new(Arc::new(store), max_logs, Duration::from_secs(1))
    }

    fn get_logs(filter: Value) -> Value {
        json!({ "jsonrpc": "2.0", "id": 1, "method": "eth_getLogs", "params": [filter] })
    }

    #[tokio::test]
    async fn test_unset_to_block_stops_at_latest_indexed() {
        let rpc = emulator(Some(10), &[5, 10, 11, 12], 100);
        let out = rpc.handle(CHAIN, get_logs(json!({ "fromBlock": "0x0" }))).await;

        let blocks: Vec<&str> = out["result"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["blockNumber"].as_str().unwrap())
            .collect();
        assert_eq!(blocks, vec!["0x5", "0xa"]);
    }

    #[tokio::test]
    async fn test_log_object_shape() {
        let rpc = emulator(Some(10), &[5], 100);
        let out = rpc.handle(CHAIN, get_logs(json!({}))).await;
        // default range is latest..latest
        assert_eq!(out["result"], json!([]));

        let out = rpc.handle(CHAIN, get_logs(json!({ "fromBlock": "earliest" }))).await;
        let entry = &out["result"][0];
        assert_eq!(entry["address"], json!(format!("0x{}", "ab".repeat(20))));
        assert_eq!(entry["data"], json!("0xdead"));
        assert_eq!(entry["logIndex"], json!("0x0"));
        assert_eq!(entry["removed"], json!(false));
        assert_eq!(out["id"], json!(1));
    }

    #[tokio::test]
    async fn test_nothing_indexed_returns_empty() {
        let rpc = emulator(None, &[1], 100);
        let out = rpc.handle(CHAIN, get_logs(json!({ "fromBlock": "0x0" }))).await;
        assert_eq!(out["result"], json!([]));

        let out = rpc
            .handle(CHAIN, json!({ "jsonrpc": "2.0", "id": 2, "method": "eth_blockNumber" }))
            .await;
        assert_eq!(out["result"], json!("0x0"));
    }

    #[tokio::test]
    async fn test_result_cap() {
        let rpc = emulator(Some(10), &[1, 2, 3], 2);
        let out = rpc.handle(CHAIN, get_logs(json!({ "fromBlock": "0x0" }))).await;
        assert_eq!(out["error"]["code"], json!(RpcError::LIMIT_EXCEEDED));

        let exact = emulator(Some(10), &[1, 2], 2);
        let out = exact.handle(CHAIN, get_logs(json!({ "fromBlock": "0x0" }))).await;
        assert_eq!(out["result"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_error_codes() {
        let rpc = emulator(Some(10), &[], 100);

        let out = rpc.handle(CHAIN, json!({ "id": 3, "method": "eth_sendRawTransaction" })).await;
        assert_eq!(out["error"]["code"], json!(RpcError::METHOD_NOT_FOUND));
        assert_eq!(out["id"], json!(3));

        let out = rpc.handle(CHAIN, json!("eth_getLogs")).await;
        assert_eq!(out["error"]["code"], json!(RpcError::INVALID_REQUEST));

        let out = rpc.handle(CHAIN, get_logs(json!({ "toBlock": "latest!" }))).await;
        assert_eq!(out["error"]["code"], json!(RpcError::INVALID_PARAMS));
    }

    #[tokio::test]
    async fn test_batch() {
        let rpc = emulator(Some(16), &[], 100);
        let out = rpc
            .handle(
                CHAIN,
                json!([
                    { "jsonrpc": "2.0", "id": 1, "method": "eth_chainId" },
                    { "jsonrpc": "2.0", "id": 2, "method": "eth_blockNumber" },
                ]),
            )
            .await;
        assert_eq!(out[0]["result"], json!("0x539"));
        assert_eq!(out[1]["result"], json!("0x10"));

        let out = rpc.handle(CHAIN, json!([])).await;
        assert_eq!(out["error"]["code"], json!(RpcError::INVALID_REQUEST));
    }
}
