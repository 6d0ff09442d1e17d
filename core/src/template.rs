//! Block Template Model
//!
//! The primary chain's `getblocktemplate` response and the auxiliary
//! chains' `createauxblock` responses, deserialized as the daemons send
//! them. Templates are frozen once fetched; a refresh replaces the whole
//! set atomically.

use serde::{Deserialize, Serialize};

/// A transaction entry from `getblocktemplate`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateTransaction {
    /// Raw transaction bytes, hex
    pub data: String,

    /// Transaction hash, hex, as the daemon displays it
    pub hash: String,

    /// Txid where it differs from the hash (segwit)
    #[serde(default)]
    pub txid: Option<String>,

    /// Fee in base units, when reported
    #[serde(default)]
    pub fee: Option<i64>,
}

/// A primary-chain block template
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Template {
    /// Block version
    pub version: u32,

    /// Previous block hash, big-endian hex
    #[serde(rename = "previousblockhash")]
    pub previous_block_hash: String,

    /// Network target, big-endian hex
    pub target: String,

    /// Compact target
    pub bits: String,

    /// Current network-adjusted time
    #[serde(rename = "curtime")]
    pub cur_time: u32,

    /// Minimum allowed header time
    #[serde(default, rename = "mintime")]
    pub min_time: u32,

    /// Height of the block being built
    pub height: u64,

    /// Transactions to include, in template order
    #[serde(default)]
    pub transactions: Vec<TemplateTransaction>,

    /// Coinbase reward plus collected fees, base units
    #[serde(rename = "coinbasevalue")]
    pub coinbase_value: u64,

    /// Witness commitment output script, when the chain requires one
    #[serde(default, rename = "default_witness_commitment")]
    pub default_witness_commitment: Option<String>,
}

/// An auxiliary-chain work unit from `createauxblock`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuxBlock {
    /// Aux header hash to commit to, big-endian hex
    pub hash: String,

    /// Chain id assigned by the aux chain
    #[serde(rename = "chainid")]
    pub chain_id: u32,

    /// Aux chain's previous block hash
    #[serde(default, rename = "previousblockhash")]
    pub previous_block_hash: String,

    /// Aux coinbase hash, when the daemon reports it
    #[serde(default, rename = "coinbasehash")]
    pub coinbase_hash: String,

    /// Aux block reward, base units
    #[serde(default, rename = "coinbasevalue")]
    pub coinbase_value: u64,

    /// Compact target
    #[serde(default)]
    pub bits: String,

    /// Aux block height
    #[serde(default)]
    pub height: u64,

    /// Target, big-endian hex
    #[serde(default)]
    pub target: String,

    /// Alternate target field some daemons use instead
    #[serde(default, rename = "_target")]
    pub target_alt: Option<String>,

    /// Chain name this block belongs to; assigned by the pool, not the RPC
    #[serde(skip)]
    pub chain: String,
}

impl AuxBlock {
    /// Mirrors `_target` into `target` when the daemon only filled the
    /// alternate field
    pub fn normalize_target(&mut self) {
        if let Some(alt) = self.target_alt.take() {
            if !alt.is_empty() {
                self.target = alt;
            }
        }
    }
}
