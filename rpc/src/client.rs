//! JSON-RPC over HTTP
//!
//! A thin client speaking the Bitcoin-style JSON-RPC 1.0 dialect the
//! chain daemons expose. The transport trait exists so the failover
//! manager can be exercised against mock nodes in tests.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::RpcError;

/// Default per-call timeout
pub const RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// A single daemon endpoint
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Performs one JSON-RPC call and returns the `result` field
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError>;

    /// Endpoint description for logs
    fn endpoint(&self) -> &str;
}

/// HTTP client for one daemon node
pub struct NodeClient {
    url: String,
    user: String,
    password: String,
    client: reqwest::Client,
}

impl NodeClient {
    pub fn new(url: String, user: String, password: String) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder().timeout(RPC_TIMEOUT).build()?;
        Ok(NodeClient {
            url,
            user,
            password,
            client,
        })
    }
}

#[async_trait]
impl RpcTransport for NodeClient {
    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let request = json!({
            "jsonrpc": "1.0",
            "id": "mergepool",
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&request)
            .send()
            .await?;

        let body: Value = response.json().await?;
        if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(-1);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown daemon error")
                .to_string();
            return Err(RpcError::Daemon { code, message });
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| RpcError::InvalidResponse("missing result field".to_string()))
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}
