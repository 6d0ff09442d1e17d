//! Stratum Server and Share Pipeline for Mergepool
//!
//! This crate ties the pieces together: it serves the line-delimited JSON
//! mining protocol over TCP, keeps the live work snapshot fresh from the
//! chain daemons, evaluates submitted shares against the primary and every
//! auxiliary target, and drives winning solutions through the AuxPoW
//! assembler out to each daemon.

use thiserror::Error;

use mergepool_consensus::TargetError;
use mergepool_core::CoreError;
use mergepool_rpc::RpcError;
use mergepool_storage::StorageError;
use mergepool_util::UtilError;

pub mod buffer;
pub mod config;
pub mod protocol;
pub mod server;
pub mod session;
pub mod share;
pub mod submit;
pub mod work;

#[cfg(test)]
pub(crate) mod test_util;

pub use config::{NodeConfig, PoolConfig};
pub use server::PoolServer;
pub use share::{ShareOutcome, ShareStatus};
pub use work::LiveWork;

/// Pool error types
#[derive(Debug, Error)]
pub enum PoolError {
    /// Block assembly failure
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Target arithmetic failure
    #[error(transparent)]
    Target(#[from] TargetError),

    /// Daemon RPC failure
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Persistence failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Byte-order helper failure
    #[error(transparent)]
    Util(#[from] UtilError),

    /// JSON encoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration, fatal at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed miner request
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Submission against a replaced job
    #[error("Stale work: job {0} is no longer current")]
    StaleWork(String),

    /// Worker string did not carry a valid payout address
    #[error("Invalid miner address")]
    InvalidMinerAddress,

    /// No template fetched yet
    #[error("Primary block template not yet set")]
    TemplateNotReady,
}

impl PoolError {
    /// Stratum error code for the reject reply
    pub fn stratum_code(&self) -> i32 {
        match self {
            PoolError::StaleWork(_) => 21,
            PoolError::InvalidMinerAddress => 24,
            _ => 20,
        }
    }
}
