//! Share and Found-Block Persistence for Mergepool
//!
//! Defines the two records the pool writes: one `Share` per accepted
//! submission and one `Found` per block candidate submitted to a chain
//! daemon. Backends implement the store traits; the pool buffers shares
//! and flushes them in batches, so batch insertion is the primary path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Storage error types
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend failure
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

/// One accepted share
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Share {
    /// Configured pool name
    pub pool_id: String,

    /// Primary chain height the share was mined against
    pub block_height: u64,

    /// Payout address from the worker string
    pub miner: String,

    /// Rig identifier from the worker string
    pub worker: String,

    /// Miner software identification
    pub user_agent: String,

    /// Share difficulty at the pool target
    pub difficulty: f64,

    /// Primary network difficulty at submission time
    pub network_difficulty: f64,

    /// Submitting connection's address
    pub ip_address: String,

    /// Submission time
    pub created: DateTime<Utc>,
}

/// Lifecycle of a found block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FoundStatus {
    Pending,
    Confirmed,
    Orphaned,
    Failed,
}

impl FoundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FoundStatus::Pending => "pending",
            FoundStatus::Confirmed => "confirmed",
            FoundStatus::Orphaned => "orphaned",
            FoundStatus::Failed => "failed",
        }
    }
}

/// One block candidate submitted to a chain daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Found {
    /// Configured pool name
    pub pool_id: String,

    /// Chain the block was submitted to
    pub chain: String,

    /// Submission outcome
    pub status: FoundStatus,

    /// Human-readable candidate classification
    pub kind: String,

    /// Confirmation progress, 0..=1
    pub confirmation_progress: f64,

    /// Payout address of the finding miner
    pub miner: String,

    /// Origin tag, empty unless relayed
    pub source: String,

    /// Height on the found chain
    pub block_height: u64,

    /// Block hash on the found chain
    pub hash: String,

    /// Reversed coinbase hash used to track confirmation
    pub transaction_confirmation_data: String,

    /// Network difficulty of the found chain
    pub network_difficulty: f64,

    /// Submission time
    pub created: DateTime<Utc>,
}

/// Batch sink for shares
#[async_trait]
pub trait ShareStore: Send + Sync {
    /// Inserts a drained share batch; an error re-buffers the whole batch
    async fn insert_batch(&self, shares: &[Share]) -> Result<(), StorageError>;
}

/// Sink for found blocks
#[async_trait]
pub trait FoundStore: Send + Sync {
    async fn insert(&self, found: Found) -> Result<(), StorageError>;
}
