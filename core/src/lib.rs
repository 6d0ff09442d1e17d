//! Block assembly and merged-mining primitives for Mergepool
//!
//! This crate owns the consensus-critical byte formats of the pool: the
//! coinbase transaction with its merged-mining commitment, the transaction
//! and aux-chain Merkle trees, the 80-byte block header, the miner-facing
//! work tuple, and the AuxPoW proof blob submitted to auxiliary daemons.

use thiserror::Error;

use mergepool_crypto::CryptoError;
use mergepool_util::UtilError;

pub mod aux_merkle;
pub mod auxpow;
pub mod block;
pub mod chain;
pub mod coinbase;
pub mod encoding;
pub mod merkle;
pub mod template;
pub mod work;

pub use aux_merkle::{build_aux_leaves, expected_slot};
pub use auxpow::{AuxPow, MerkleBranch};
pub use block::{AssembledHeader, BitcoinBlock};
pub use chain::{get_chain, ChainSpec};
pub use coinbase::{Coinbase, MERGED_MINING_MAGIC};
pub use template::{AuxBlock, Template, TemplateTransaction};
pub use work::{Submission, Work};

/// Errors raised while assembling or parsing block structures
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed hex input
    #[error("Hex decoding error: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Digest failure
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Byte-order helper failure
    #[error(transparent)]
    Util(#[from] UtilError),

    /// No chain profile registered under the given name
    #[error("Unknown chain: {0}")]
    UnknownChain(String),

    /// Aux merkle size must be a power of two
    #[error("Aux merkle size {0} is not a power of two")]
    BadMerkleSize(u32),

    /// Two aux chains resolved to the same merkle slot
    #[error("Aux chains {first} and {second} collide at merkle slot {slot}")]
    AuxSlotCollision { slot: u32, first: u32, second: u32 },

    /// Leaf index outside the configured tree
    #[error("Aux merkle index {0} out of range for size {1}")]
    AuxIndexOutOfRange(u32, u32),

    /// No aux block at the requested position
    #[error("No aux block at position {0}")]
    AuxBlockMissing(usize),

    /// A fixed-width field had the wrong length
    #[error("Field {field} has length {got}, expected {want}")]
    BadLength {
        field: &'static str,
        got: usize,
        want: usize,
    },

    /// A numeric hex field failed to parse
    #[error("Invalid numeric field {0}")]
    BadNumber(&'static str),

    /// Structural parse failure
    #[error("Malformed {0}")]
    Malformed(String),
}
