//! Live Work Assembly
//!
//! `BitcoinBlock` is the frozen snapshot of one fetch cycle: the primary
//! template plus the coinbase halves and precomputed Merkle branch derived
//! from it. Share evaluation assembles candidate headers against the
//! snapshot without mutating it, so concurrent submissions never race.

use mergepool_crypto::double_sha256;
use mergepool_util::{reverse_bytes, reverse_hex};

use crate::chain::ChainSpec;
use crate::coinbase::Coinbase;
use crate::encoding::{decode_hash32, parse_u32_hex, var_int};
use crate::merkle::{fold_coinbase, merkle_steps};
use crate::template::{AuxBlock, Template};
use crate::work::Work;
use crate::{aux_merkle, CoreError};

/// The live work snapshot for the primary chain
pub struct BitcoinBlock {
    /// The template this work was derived from
    pub template: Template,

    /// Profile of the primary chain
    pub chain: &'static dyn ChainSpec,

    /// Coinbase halves around the extranonce window
    pub coinbase: Coinbase,

    /// Precomputed coinbase Merkle branch over the template transactions
    pub merkle_steps: Vec<[u8; 32]>,
}

impl std::fmt::Debug for BitcoinBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitcoinBlock")
            .field("template", &self.template)
            .field("chain", &self.chain.chain_name())
            .field("coinbase", &self.coinbase)
            .field("merkle_steps", &self.merkle_steps)
            .finish()
    }
}

/// A candidate header assembled from one share submission
pub struct AssembledHeader {
    /// Full coinbase with the extranonce spliced in
    pub coinbase: Vec<u8>,

    /// Double SHA-256 of the coinbase
    pub coinbase_hash: [u8; 32],

    /// The 80-byte header
    pub header: [u8; 80],

    /// Proof-of-work digest of the header, natural byte order
    pub pow: [u8; 32],
}

impl BitcoinBlock {
    /// Derives the live work and its miner-facing job from a template set
    #[allow(clippy::too_many_arguments)]
    pub fn generate(
        template: Template,
        chain: &'static dyn ChainSpec,
        aux_blocks: &[AuxBlock],
        merkle_size: u32,
        merkle_nonce: u32,
        pool_signature: &[u8],
        reward_pubkey_hex: &str,
        extranonce_reserve: usize,
        job_id: &str,
        clean_jobs: bool,
    ) -> Result<(Self, Work), CoreError> {
        let leaves = aux_merkle::build_aux_leaves(aux_blocks, merkle_size)?;
        let aux_root = aux_merkle::merkle_root(&leaves);
        let coinbase = Coinbase::build(
            &template,
            &aux_root,
            merkle_size,
            merkle_nonce,
            pool_signature,
            reward_pubkey_hex,
            extranonce_reserve,
        )?;

        let tx_hashes = template
            .transactions
            .iter()
            .map(|tx| decode_hash32(&tx.hash, "transaction hash"))
            .collect::<Result<Vec<_>, _>>()?;
        let steps = merkle_steps(&tx_hashes);

        let work = Work {
            job_id: job_id.to_string(),
            prev_hash: reverse_hex(&template.previous_block_hash)?,
            coinb1: hex::encode(&coinbase.coinb1),
            coinb2: hex::encode(&coinbase.coinb2),
            merkle_branches: steps.iter().map(hex::encode).collect(),
            version: format!("{:08x}", template.version),
            nbits: template.bits.clone(),
            ntime: format!("{:08x}", template.cur_time),
            clean_jobs,
        };

        Ok((
            BitcoinBlock {
                template,
                chain,
                coinbase,
                merkle_steps: steps,
            },
            work,
        ))
    }

    /// Assembles the candidate header for a submission
    ///
    /// `extranonce_hex` is the concatenation of the session's extranonce1
    /// and the submitted extranonce2 and must fill the reserved window
    /// exactly.
    pub fn assemble_header(
        &self,
        extranonce_hex: &str,
        ntime_hex: &str,
        nonce_hex: &str,
    ) -> Result<AssembledHeader, CoreError> {
        let extranonce = hex::decode(extranonce_hex)?;
        let coinbase = self.coinbase.splice(&extranonce)?;
        let coinbase_hash = double_sha256(&coinbase);
        let merkle_root = fold_coinbase(coinbase_hash, &self.merkle_steps);

        let prev = decode_hash32(&self.template.previous_block_hash, "previous block hash")?;
        let ntime = parse_u32_hex(ntime_hex, "ntime")?;
        let nbits = parse_u32_hex(&self.template.bits, "nbits")?;
        let nonce = parse_u32_hex(nonce_hex, "nonce")?;

        let mut header = [0u8; 80];
        header[0..4].copy_from_slice(&self.template.version.to_le_bytes());
        header[4..36].copy_from_slice(&reverse_bytes(&prev));
        header[36..68].copy_from_slice(&reverse_bytes(&merkle_root));
        header[68..72].copy_from_slice(&ntime.to_le_bytes());
        header[72..76].copy_from_slice(&nbits.to_le_bytes());
        header[76..80].copy_from_slice(&nonce.to_le_bytes());

        let pow_hex = self.chain.header_digest(&hex::encode(header))?;
        let pow = decode_hash32(&pow_hex, "header digest")?;

        Ok(AssembledHeader {
            coinbase,
            coinbase_hash,
            header,
            pow,
        })
    }

    /// Serializes the full block for `submitblock`
    pub fn submit_hex(&self, assembled: &AssembledHeader) -> String {
        let mut out = hex::encode(assembled.header);
        out.push_str(&hex::encode(var_int(
            1 + self.template.transactions.len() as u64,
        )));
        out.push_str(&hex::encode(&assembled.coinbase));
        for tx in &self.template.transactions {
            out.push_str(&tx.data);
        }
        out
    }
}

impl AssembledHeader {
    /// Proof-of-work digest in display order (byte-reversed hex)
    pub fn pow_display_hex(&self) -> String {
        hex::encode(reverse_bytes(&self.pow))
    }

    /// Coinbase hash in display order, the transaction-confirmation datum
    /// persisted with found blocks
    pub fn coinbase_display_hex(&self) -> String {
        hex::encode(reverse_bytes(&self.coinbase_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::get_chain;

    fn fixture_template() -> Template {
        Template {
            version: 0x2000_0000,
            previous_block_hash: "84fd9bac333ad79154348296204fa7f8c537a96e08983e5f73b3f5aca8e8edf7"
                .to_string(),
            target: "00000ffff0000000000000000000000000000000000000000000000000000000"
                .to_string(),
            bits: "1e0ffff0".to_string(),
            cur_time: 1_722_500_000,
            height: 100,
            coinbase_value: 5_000_000_000,
            ..Default::default()
        }
    }

    fn fixture_aux() -> AuxBlock {
        AuxBlock {
            hash: "a617dfb275f834e26a6f0c94052dd88982c86297dba990fd96645026e7c69e10"
                .to_string(),
            chain_id: 1,
            coinbase_hash: "6b31977a8ac73ede3f3653ea0d96bc3656242461e31d771985a0b17084d3cf91"
                .to_string(),
            height: 5000,
            chain: "dogecoin".to_string(),
            ..Default::default()
        }
    }

    const REWARD_PUBKEY: &str =
        "021111111111111111111111111111111111111111111111111111111111111111";

    fn fixture_block() -> (BitcoinBlock, Work) {
        BitcoinBlock::generate(
            fixture_template(),
            get_chain("bellscoin").unwrap(),
            &[fixture_aux()],
            4,
            0,
            b"/mergepool/",
            REWARD_PUBKEY,
            8,
            "00000001",
            true,
        )
        .unwrap()
    }

    #[test]
    fn test_work_projection() {
        let (_, work) = fixture_block();
        assert_eq!(
            work.prev_hash,
            "f7ede8a8acf5b3735f3e98086ea937c5f8a74f209682345491d73a33ac9bfd84"
        );
        assert_eq!(work.version, "20000000");
        assert_eq!(work.nbits, "1e0ffff0");
        assert_eq!(work.ntime, "66ab43a0");
        assert!(work.merkle_branches.is_empty());
        assert!(work.clean_jobs);
    }

    #[test]
    fn test_header_golden() {
        let (block, _) = fixture_block();
        let assembled = block
            .assemble_header("010203040a0b0c0d", "66ab43a0", "00ff00ff")
            .unwrap();
        assert_eq!(
            hex::encode(assembled.header),
            "00000020f7ede8a8acf5b3735f3e98086ea937c5f8a74f209682345491d73a33ac9bfd8464cbdd61030ce3f3b6a5ea197453242f08394d40fe0312625dbcfa5a02b36e69a043ab66f0ff0f1eff00ff00"
        );
        assert_eq!(
            hex::encode(assembled.pow),
            "6ca993f53e6abc02e21b63cd77ead262d2abe72487652a2edf96b137bc477fbe"
        );
        assert_eq!(
            assembled.pow_display_hex(),
            "be7f47bc37b196df2e2a658724e7abd262d2ea77cd631be202bc6a3ef593a96c"
        );
    }

    #[test]
    fn test_no_aux_chains_still_commits() {
        // With no aux work the tree roots over zero leaves, but the
        // marker stays in the scriptSig so aux chains can join without a
        // layout change.
        let (block, _) = BitcoinBlock::generate(
            fixture_template(),
            get_chain("bellscoin").unwrap(),
            &[],
            4,
            0,
            b"",
            REWARD_PUBKEY,
            8,
            "00000001",
            true,
        )
        .unwrap();
        let coinb1_hex = hex::encode(&block.coinbase.coinb1);
        assert!(coinb1_hex.contains("fabe6d6d"));
        assert!(coinb1_hex.ends_with("0400000000000000"));
    }

    #[test]
    fn test_header_rejects_bad_extranonce() {
        let (block, _) = fixture_block();
        assert!(block.assemble_header("0102", "66ab43a0", "00ff00ff").is_err());
        assert!(block
            .assemble_header("010203040a0b0c0d", "xyz", "00ff00ff")
            .is_err());
    }

    #[test]
    fn test_submit_hex_layout() {
        let (block, _) = fixture_block();
        let assembled = block
            .assemble_header("010203040a0b0c0d", "66ab43a0", "00ff00ff")
            .unwrap();
        let submit = block.submit_hex(&assembled);
        assert!(submit.starts_with(&hex::encode(assembled.header)));
        // One transaction: the coinbase.
        assert_eq!(&submit[160..162], "01");
        assert!(submit.ends_with(&hex::encode(&assembled.coinbase)));
    }
}
