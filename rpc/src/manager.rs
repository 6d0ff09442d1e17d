//! Node Failover Manager
//!
//! Holds the ordered daemon endpoints for one chain. Calls go to the
//! node that last answered; when it fails, the manager walks the rest of
//! the list before surfacing the error, so a flapping daemon never takes
//! the pool down with it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{info, warn};
use serde_json::{json, Value};

use crate::client::RpcTransport;
use crate::RpcError;

/// Failover wrapper over a chain's daemon nodes
pub struct Manager {
    chain: String,
    nodes: Vec<Arc<dyn RpcTransport>>,
    active: AtomicUsize,
}

impl Manager {
    pub fn new(chain: String, nodes: Vec<Arc<dyn RpcTransport>>) -> Self {
        Manager {
            chain,
            nodes,
            active: AtomicUsize::new(0),
        }
    }

    /// The chain this manager serves
    pub fn chain(&self) -> &str {
        &self.chain
    }

    /// Calls the active node, failing over through the rest of the list
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let start = self.active.load(Ordering::Relaxed);
        let mut last_error = String::from("no nodes configured");

        for attempt in 0..self.nodes.len() {
            let idx = (start + attempt) % self.nodes.len();
            let node = &self.nodes[idx];
            match node.call(method, params.clone()).await {
                Ok(result) => {
                    if idx != start {
                        info!(
                            "{}: recovered on node {} after failover",
                            self.chain,
                            node.endpoint()
                        );
                        self.active.store(idx, Ordering::Relaxed);
                    }
                    return Ok(result);
                }
                Err(err) => {
                    warn!(
                        "{}: node {} failed {}: {}",
                        self.chain,
                        node.endpoint(),
                        method,
                        err
                    );
                    last_error = err.to_string();
                }
            }
        }

        Err(RpcError::AllNodesFailed {
            chain: self.chain.clone(),
            last: last_error,
        })
    }

    /// Fetches the primary chain's block template
    pub async fn get_block_template(&self) -> Result<Value, RpcError> {
        self.call("getblocktemplate", json!([{ "rules": ["segwit"] }]))
            .await
    }

    /// Requests auxiliary work paying to `reward_address`
    pub async fn create_aux_block(&self, reward_address: &str) -> Result<Value, RpcError> {
        self.call("createauxblock", json!([reward_address])).await
    }

    /// Submits an AuxPoW proof for the aux block `hash`
    pub async fn submit_aux_block(&self, hash: &str, auxpow_hex: &str) -> Result<bool, RpcError> {
        let result = self.call("getauxblock", json!([hash, auxpow_hex])).await?;
        result
            .as_bool()
            .ok_or_else(|| RpcError::InvalidResponse(format!("getauxblock returned {}", result)))
    }

    /// Submits a serialized primary block
    ///
    /// `submitblock` answers null on acceptance and a reason string on
    /// rejection.
    pub async fn submit_block(&self, block_hex: &str) -> Result<(), RpcError> {
        let result = self.call("submitblock", json!([block_hex])).await?;
        match result {
            Value::Null => Ok(()),
            other => Err(RpcError::Daemon {
                code: -1,
                message: format!("submitblock rejected: {}", other),
            }),
        }
    }
}
