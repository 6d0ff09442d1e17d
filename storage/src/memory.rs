//! In-Memory Store
//!
//! Backs tests and development runs; everything is lost on shutdown.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{Found, FoundStore, Share, ShareStore, StorageError};

/// Volatile store holding records in vectors
#[derive(Default)]
pub struct MemoryStore {
    shares: RwLock<Vec<Share>>,
    found: RwLock<Vec<Found>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the persisted shares
    pub async fn shares(&self) -> Vec<Share> {
        self.shares.read().await.clone()
    }

    /// Snapshot of the persisted found blocks
    pub async fn found(&self) -> Vec<Found> {
        self.found.read().await.clone()
    }
}

#[async_trait]
impl ShareStore for MemoryStore {
    async fn insert_batch(&self, shares: &[Share]) -> Result<(), StorageError> {
        self.shares.write().await.extend_from_slice(shares);
        Ok(())
    }
}

#[async_trait]
impl FoundStore for MemoryStore {
    async fn insert(&self, found: Found) -> Result<(), StorageError> {
        self.found.write().await.push(found);
        Ok(())
    }
}
