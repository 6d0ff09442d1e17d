//! Miner Sessions
//!
//! One session per TCP connection. The extranonce1 assigned at subscribe
//! time is the session's slice of the coinbase search space; it returns
//! to the pool when the connection goes away.

use std::time::Instant;

use log::warn;
use tokio::sync::mpsc;

/// Server-assigned extranonce1 length in bytes
pub const EXTRANONCE1_SIZE: usize = 4;

/// Miner-ground extranonce2 length in bytes
pub const EXTRANONCE2_SIZE: usize = 4;

/// State of one miner connection
pub struct Session {
    /// Connection id, unique for the process lifetime
    pub id: u64,

    /// Peer address
    pub ip: String,

    /// Assigned extranonce1, hex
    pub extranonce1: String,

    /// Fixed extranonce2 size miners must honor
    pub extranonce2_size: usize,

    /// Difficulty last pushed to this miner
    pub difficulty: f64,

    /// Payout address from authorization
    pub miner_address: String,

    /// Rig identifier from authorization
    pub rig_id: String,

    /// Miner software identification from subscribe
    pub user_agent: String,

    pub subscribed: bool,
    pub authorized: bool,

    /// Last request time, drives idle reaping
    pub last_activity: Instant,

    /// Shares accepted on this connection
    pub shares_accepted: u64,

    /// Shares rejected on this connection
    pub shares_rejected: u64,

    /// Line sink to the writer task
    outbox: mpsc::Sender<String>,
}

impl Session {
    pub fn new(id: u64, ip: String, extranonce1: String, outbox: mpsc::Sender<String>) -> Self {
        Session {
            id,
            ip,
            extranonce1,
            extranonce2_size: EXTRANONCE2_SIZE,
            difficulty: 0.0,
            miner_address: String::new(),
            rig_id: String::new(),
            user_agent: String::new(),
            subscribed: false,
            authorized: false,
            last_activity: Instant::now(),
            shares_accepted: 0,
            shares_rejected: 0,
            outbox,
        }
    }

    /// Marks the session active
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Queues a line for the writer task; a full outbox drops the line
    /// rather than blocking the caller
    pub fn send_line(&self, line: String) {
        if self.outbox.try_send(line).is_err() {
            warn!("Session {} outbox full, dropping message", self.id);
        }
    }
}
