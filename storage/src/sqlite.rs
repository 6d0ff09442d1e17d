//! SQLite Store
//!
//! The production backend: shares land in batched transactions on the
//! flush interval, found blocks are written immediately on submission.

use std::path::PathBuf;

use async_trait::async_trait;
use log::debug;
use rusqlite::{params, Connection};
use tokio::sync::Mutex;

use crate::{Found, FoundStore, Share, ShareStore, StorageError};

/// SQLite-backed share and found-block store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database at `db_path`
    pub fn open(db_path: PathBuf) -> Result<Self, StorageError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&db_path)?;
        Self::create_tables(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn create_tables(conn: &Connection) -> Result<(), StorageError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS shares (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pool_id TEXT NOT NULL,
                block_height INTEGER NOT NULL,
                miner TEXT NOT NULL,
                worker TEXT NOT NULL,
                user_agent TEXT NOT NULL,
                difficulty REAL NOT NULL,
                network_difficulty REAL NOT NULL,
                ip_address TEXT NOT NULL,
                created TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS found_blocks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pool_id TEXT NOT NULL,
                chain TEXT NOT NULL,
                status TEXT NOT NULL,
                kind TEXT NOT NULL,
                confirmation_progress REAL NOT NULL,
                miner TEXT NOT NULL,
                source TEXT NOT NULL,
                block_height INTEGER NOT NULL,
                hash TEXT NOT NULL,
                transaction_confirmation_data TEXT NOT NULL,
                network_difficulty REAL NOT NULL,
                created TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_shares_miner ON shares(miner)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_found_chain_height ON found_blocks(chain, block_height)",
            [],
        )?;

        Ok(())
    }
}

#[async_trait]
impl ShareStore for SqliteStore {
    async fn insert_batch(&self, shares: &[Share]) -> Result<(), StorageError> {
        if shares.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        for share in shares {
            tx.execute(
                "INSERT INTO shares
                 (pool_id, block_height, miner, worker, user_agent,
                  difficulty, network_difficulty, ip_address, created)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    share.pool_id,
                    share.block_height,
                    share.miner,
                    share.worker,
                    share.user_agent,
                    share.difficulty,
                    share.network_difficulty,
                    share.ip_address,
                    share.created.to_rfc3339(),
                ],
            )?;
        }
        tx.commit()?;
        debug!("Flushed {} share(s)", shares.len());
        Ok(())
    }
}

#[async_trait]
impl FoundStore for SqliteStore {
    async fn insert(&self, found: Found) -> Result<(), StorageError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO found_blocks
             (pool_id, chain, status, kind, confirmation_progress, miner,
              source, block_height, hash, transaction_confirmation_data,
              network_difficulty, created)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                found.pool_id,
                found.chain,
                found.status.as_str(),
                found.kind,
                found.confirmation_progress,
                found.miner,
                found.source,
                found.block_height,
                found.hash,
                found.transaction_confirmation_data,
                found.network_difficulty,
                found.created.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FoundStatus;
    use chrono::Utc;

    fn temp_store(name: &str) -> SqliteStore {
        let mut path = std::env::temp_dir();
        path.push(format!("mergepool-{}-{}.db", name, std::process::id()));
        let _ = std::fs::remove_file(&path);
        SqliteStore::open(path).unwrap()
    }

    #[tokio::test]
    async fn test_insert_share_batch() {
        let store = temp_store("shares");
        let share = Share {
            pool_id: "mergepool".to_string(),
            block_height: 100,
            miner: "DH5yaieqoZN36fDVciNyRueRGvGLR3mr7L".to_string(),
            worker: "rig1".to_string(),
            user_agent: "cpuminer/2.5".to_string(),
            difficulty: 1.0,
            network_difficulty: 1234.5,
            ip_address: "127.0.0.1".to_string(),
            created: Utc::now(),
        };
        store.insert_batch(&[share.clone(), share]).await.unwrap();

        let conn = store.conn.lock().await;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM shares", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_insert_found() {
        let store = temp_store("found");
        store
            .insert(Found {
                pool_id: "mergepool".to_string(),
                chain: "bellscoin".to_string(),
                status: FoundStatus::Pending,
                kind: "primary candidate".to_string(),
                confirmation_progress: 0.0,
                miner: "addr".to_string(),
                source: String::new(),
                block_height: 100,
                hash: "00".repeat(32),
                transaction_confirmation_data: "11".repeat(32),
                network_difficulty: 50.0,
                created: Utc::now(),
            })
            .await
            .unwrap();

        let conn = store.conn.lock().await;
        let status: String = conn
            .query_row("SELECT status FROM found_blocks", [], |row| row.get(0))
            .unwrap();
        assert_eq!(status, "pending");
    }
}
