//! Miner-Facing Work Tuples
//!
//! The `mining.notify` job tuple and the `mining.submit` share tuple are
//! positional arrays on the wire; the slot layout here is protocol and
//! must not be reordered.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::CoreError;

/// A broadcast job, in `mining.notify` parameter order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Work {
    pub job_id: String,

    /// Previous block hash, byte-reversed hex per Stratum convention
    pub prev_hash: String,

    /// Coinbase bytes before the extranonce window, hex
    pub coinb1: String,

    /// Coinbase bytes after the extranonce window, hex
    pub coinb2: String,

    /// Merkle branch for the coinbase, hex per level
    pub merkle_branches: Vec<String>,

    /// Block version, big-endian hex
    pub version: String,

    /// Compact target, big-endian hex
    pub nbits: String,

    /// Current time, big-endian hex
    pub ntime: String,

    /// Whether miners must drop jobs from before this one
    pub clean_jobs: bool,
}

impl Work {
    /// Projects the job into the positional `mining.notify` params array
    pub fn notify_params(&self) -> Vec<Value> {
        vec![
            json!(self.job_id),
            json!(self.prev_hash),
            json!(self.coinb1),
            json!(self.coinb2),
            json!(self.merkle_branches),
            json!(self.version),
            json!(self.nbits),
            json!(self.ntime),
            json!(self.clean_jobs),
        ]
    }
}

/// A share submission, in `mining.submit` parameter order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// `address.rig` worker string
    pub worker: String,

    /// Job the share was mined against
    pub job_id: String,

    /// Miner-chosen extranonce2, hex
    pub extranonce2: String,

    /// Header time, big-endian hex
    pub ntime: String,

    /// Header nonce, big-endian hex
    pub nonce: String,
}

impl Submission {
    pub const WORKER_SLOT: usize = 0;
    pub const JOB_ID_SLOT: usize = 1;
    pub const EXTRANONCE2_SLOT: usize = 2;
    pub const NTIME_SLOT: usize = 3;
    pub const NONCE_SLOT: usize = 4;

    /// Reads the fixed submission slots out of the params array
    pub fn from_params(params: &[Value]) -> Result<Self, CoreError> {
        if params.len() < 5 {
            return Err(CoreError::Malformed(format!(
                "submit expects 5 fields, got {}",
                params.len()
            )));
        }
        let field = |slot: usize, name: &str| -> Result<String, CoreError> {
            params[slot]
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| CoreError::Malformed(format!("submit field {} is not a string", name)))
        };
        Ok(Submission {
            worker: field(Self::WORKER_SLOT, "worker")?,
            job_id: field(Self::JOB_ID_SLOT, "job_id")?,
            extranonce2: field(Self::EXTRANONCE2_SLOT, "extranonce2")?,
            ntime: field(Self::NTIME_SLOT, "ntime")?,
            nonce: field(Self::NONCE_SLOT, "nonce")?,
        })
    }
}
