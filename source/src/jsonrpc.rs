//! Ethereum-style JSON-RPC ledger source over HTTP.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use chainwatch_types::{Block, BlockHeight, Transaction};

use crate::quantity::{encode_quantity, parse_quantity};
use crate::{LedgerSource, SourceError};

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Block object as returned by `eth_getBlockByNumber(.., true)`.
/// Every field besides these is ignored.
#[derive(Deserialize)]
struct RpcBlock {
    number: Option<String>,
    #[serde(default)]
    transactions: Vec<Transaction>,
}

/// HTTP client for a JSON-RPC node.
pub struct JsonRpcSource {
    /// Endpoint URL the requests are POSTed to.
    endpoint: String,
    /// Reusable HTTP client.
    client: reqwest::Client,
    timeout: Duration,
    next_id: AtomicU64,
}

impl JsonRpcSource {
    /// Create a source pointing at `endpoint` with the default timeout.
    pub fn new(endpoint: &str) -> Self {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            client: reqwest::Client::new(),
            timeout,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Perform a single JSON-RPC call. `Ok(None)` means the node answered
    /// with a `null` result.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, SourceError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(SourceError::Status {
                status: resp.status().as_u16(),
                url: self.endpoint.clone(),
            });
        }

        let body: RpcResponse<T> = resp
            .json()
            .await
            .map_err(|e| SourceError::Decode(format!("{method}: {e}")))?;

        if let Some(err) = body.error {
            return Err(SourceError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(body.result)
    }
}

#[async_trait]
impl LedgerSource for JsonRpcSource {
    async fn current_height(&self) -> Result<BlockHeight, SourceError> {
        let head: String = self
            .call("eth_blockNumber", json!([]))
            .await?
            .ok_or_else(|| SourceError::Decode("eth_blockNumber returned null".into()))?;
        parse_quantity(&head)
    }

    async fn block_at(&self, height: BlockHeight) -> Result<Block, SourceError> {
        let block: Option<RpcBlock> = self
            .call(
                "eth_getBlockByNumber",
                json!([encode_quantity(height), true]),
            )
            .await?;

        let Some(block) = block else {
            tracing::trace!(height, "block not produced yet");
            return Ok(Block::not_yet_produced());
        };

        let number = match block.number.as_deref() {
            Some(n) if !n.is_empty() => Some(parse_quantity(n)?),
            _ => None,
        };
        Ok(Block {
            number,
            transactions: block.transactions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_as_jsonrpc_2() {
        let req = RpcRequest {
            jsonrpc: "2.0",
            method: "eth_getBlockByNumber",
            params: json!(["0x10", true]),
            id: 7,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v,
            json!({"jsonrpc": "2.0", "method": "eth_getBlockByNumber", "params": ["0x10", true], "id": 7})
        );
    }

    #[test]
    fn null_result_decodes_to_none() {
        let resp: RpcResponse<RpcBlock> =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":null}"#).unwrap();
        assert!(resp.result.is_none());
        assert!(resp.error.is_none());
    }
}
