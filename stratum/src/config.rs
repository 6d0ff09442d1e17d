//! Pool Configuration
//!
//! Everything the operator tunes: chain order, daemon endpoints, pool
//! difficulty and the various intervals. Validation happens once at
//! startup and is fatal; a pool running with a half-checked chain list
//! would mint unsubmittable blocks.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use mergepool_core::get_chain;
use mergepool_util::parse_duration;

use crate::PoolError;

/// Sizes the aux commitment tree supports
pub const SUPPORTED_MERKLE_SIZES: [u32; 4] = [2, 4, 8, 16];

/// Connection settings for one chain's daemons
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Chain profile name
    pub chain: String,

    /// Daemon endpoints in failover order
    pub rpc_urls: Vec<String>,

    /// RPC basic-auth user
    #[serde(default)]
    pub rpc_user: String,

    /// RPC basic-auth password
    #[serde(default)]
    pub rpc_password: String,

    /// Reward address handed to `createauxblock`
    pub reward_to: String,

    /// Public key whose P2PKH script receives the primary coinbase
    pub reward_pub_script_key: String,
}

/// Top-level pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Pool identifier stamped into persisted records
    pub pool_name: String,

    /// Fixed share difficulty handed to miners
    pub pool_difficulty: f64,

    /// How often the share buffer drains
    #[serde(default = "default_share_flush_interval")]
    pub share_flush_interval: String,

    /// Idle session lifetime
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: String,

    /// Stratum listener address
    #[serde(default = "default_stratum_bind")]
    pub stratum_bind: String,

    /// Block-notification hint listener; disabled when unset
    #[serde(default)]
    pub notify_bind: Option<String>,

    /// Template re-fetch interval
    #[serde(default = "default_template_refresh_interval")]
    pub template_refresh_interval: String,

    /// Slot count of the aux commitment tree
    #[serde(default = "default_aux_merkle_size")]
    pub aux_merkle_size: u32,

    /// Arbitrary hex spliced into the coinbase before the merged-mining
    /// marker
    #[serde(default)]
    pub block_signature: String,

    /// Validate miner addresses against testnet patterns
    #[serde(default)]
    pub testnet: bool,

    /// Chain names in order; position 0 is the primary
    pub block_chain_order: Vec<String>,

    /// Per-chain daemon settings, keyed by chain name
    pub nodes: HashMap<String, NodeConfig>,
}

fn default_share_flush_interval() -> String {
    "5s".to_string()
}

fn default_connection_timeout() -> String {
    "10m".to_string()
}

fn default_stratum_bind() -> String {
    "0.0.0.0:3333".to_string()
}

fn default_template_refresh_interval() -> String {
    "30s".to_string()
}

fn default_aux_merkle_size() -> u32 {
    4
}

impl PoolConfig {
    /// The primary chain name
    pub fn primary_chain(&self) -> &str {
        &self.block_chain_order[0]
    }

    /// Auxiliary chain names in configured order
    pub fn aux_chains(&self) -> &[String] {
        &self.block_chain_order[1..]
    }

    /// Node settings for a chain
    pub fn node(&self, chain: &str) -> Option<&NodeConfig> {
        self.nodes.get(chain)
    }

    /// The pool signature as bytes
    pub fn block_signature_bytes(&self) -> Result<Vec<u8>, PoolError> {
        hex::decode(&self.block_signature)
            .map_err(|e| PoolError::Config(format!("block_signature is not hex: {}", e)))
    }

    /// Checks every fatal startup condition
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.pool_name.is_empty() {
            return Err(PoolError::Config("pool must have a name".to_string()));
        }
        if self.block_chain_order.is_empty() {
            return Err(PoolError::Config(
                "pool must have a blockchain order to tell primary vs aux".to_string(),
            ));
        }
        if self.nodes.is_empty() {
            return Err(PoolError::Config(
                "pool must have at least 1 blockchain node to work from".to_string(),
            ));
        }
        if self.pool_difficulty <= 0.0 || !self.pool_difficulty.is_finite() {
            return Err(PoolError::Config(format!(
                "pool_difficulty {} must be positive",
                self.pool_difficulty
            )));
        }
        if !SUPPORTED_MERKLE_SIZES.contains(&self.aux_merkle_size) {
            return Err(PoolError::Config(format!(
                "aux_merkle_size {} not in {:?}",
                self.aux_merkle_size, SUPPORTED_MERKLE_SIZES
            )));
        }
        if self.aux_chains().len() > self.aux_merkle_size as usize {
            return Err(PoolError::Config(format!(
                "{} aux chains cannot fit a {}-slot merkle tree",
                self.aux_chains().len(),
                self.aux_merkle_size
            )));
        }
        for name in &self.block_chain_order {
            get_chain(name).map_err(|e| PoolError::Config(e.to_string()))?;
            let node = self
                .nodes
                .get(name)
                .ok_or_else(|| PoolError::Config(format!("no node configured for {}", name)))?;
            if node.rpc_urls.is_empty() {
                return Err(PoolError::Config(format!("no rpc_urls for {}", name)));
            }
        }
        self.block_signature_bytes()?;
        for interval in [
            &self.share_flush_interval,
            &self.connection_timeout,
            &self.template_refresh_interval,
        ] {
            parse_duration(interval).map_err(|e| PoolError::Config(e.to_string()))?;
        }
        Ok(())
    }
}
