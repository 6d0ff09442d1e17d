//! Chain Daemon JSON-RPC Clients for Mergepool
//!
//! One `Manager` per chain wraps an ordered list of daemon endpoints and
//! fails over between them: template fetches and block submissions try
//! the active node first and walk the list on transport failure.

use thiserror::Error;

pub mod client;
pub mod manager;

pub use client::{NodeClient, RpcTransport};
pub use manager::Manager;

/// RPC error types
#[derive(Debug, Error)]
pub enum RpcError {
    /// HTTP transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body was not the JSON-RPC shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The daemon returned a JSON-RPC error object
    #[error("Daemon error {code}: {message}")]
    Daemon { code: i64, message: String },

    /// Every configured node failed
    #[error("All {chain} nodes failed, last error: {last}")]
    AllNodesFailed { chain: String, last: String },

    /// JSON encoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        RpcError::Transport(err.to_string())
    }
}
