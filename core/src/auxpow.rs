//! AuxPoW Assembly
//!
//! Builds the proof blob an auxiliary daemon's `getauxblock` submit
//! endpoint expects: the parent coinbase carrying the commitment, the
//! parent header hash, the coinbase's Merkle branch in the parent block,
//! the aux chain's branch in the commitment tree, and the unhashed
//! 80-byte parent header.

use crate::aux_merkle::{build_aux_leaves, branch_for, slot_for};
use crate::block::{AssembledHeader, BitcoinBlock};
use crate::encoding::var_int;
use crate::template::AuxBlock;
use crate::CoreError;

/// A serialized Merkle branch: count, sibling hashes, 4-byte LE mask
#[derive(Debug, Clone)]
pub struct MerkleBranch {
    pub hashes: Vec<[u8; 32]>,
    pub mask: u32,
}

impl MerkleBranch {
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = var_int(self.hashes.len() as u64);
        for hash in &self.hashes {
            out.extend_from_slice(hash);
        }
        out.extend_from_slice(&self.mask.to_le_bytes());
        out
    }
}

/// The AuxPoW blob for one winning auxiliary chain
#[derive(Debug, Clone)]
pub struct AuxPow {
    /// The parent (primary) coinbase with the spliced extranonce
    pub parent_coinbase: Vec<u8>,

    /// Proof-of-work digest of the parent header
    pub parent_header_hash: [u8; 32],

    /// Coinbase branch in the parent block, mask 0
    pub parent_branch: MerkleBranch,

    /// Aux chain branch in the commitment tree, mask = starting slot
    pub aux_branch: MerkleBranch,

    /// The unhashed 80-byte parent header
    pub parent_header: [u8; 80],
}

impl AuxPow {
    /// Assembles the proof for the aux block at `index` in the template's
    /// aux list
    pub fn assemble(
        block: &BitcoinBlock,
        assembled: &AssembledHeader,
        aux_blocks: &[AuxBlock],
        merkle_size: u32,
        index: usize,
    ) -> Result<Self, CoreError> {
        let aux = aux_blocks
            .get(index)
            .ok_or(CoreError::AuxBlockMissing(index))?;

        let leaves = build_aux_leaves(aux_blocks, merkle_size)?;
        let slot = slot_for(aux, merkle_size)?;
        let (branch, _root) = branch_for(&leaves, slot)?;

        Ok(AuxPow {
            parent_coinbase: assembled.coinbase.clone(),
            parent_header_hash: assembled.pow,
            parent_branch: MerkleBranch {
                hashes: block.merkle_steps.clone(),
                mask: 0,
            },
            aux_branch: MerkleBranch {
                hashes: branch,
                mask: slot,
            },
            parent_header: assembled.header,
        })
    }

    /// The hex blob handed to `getauxblock`
    pub fn to_hex(&self) -> String {
        let mut out = Vec::new();
        out.extend_from_slice(&self.parent_coinbase);
        out.extend_from_slice(&self.parent_header_hash);
        out.extend_from_slice(&self.parent_branch.serialize());
        out.extend_from_slice(&self.aux_branch.serialize());
        out.extend_from_slice(&self.parent_header);
        hex::encode(out)
    }
}
