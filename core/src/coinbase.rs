//! Coinbase Builder
//!
//! Assembles the coinbase transaction in two halves around a reserved
//! extranonce window, so miners can grind extranonce2 without disturbing
//! any downstream offset. The scriptSig carries, in order: the BIP34
//! height push, the operator's pool signature, and the merged-mining
//! commitment (magic, reversed aux Merkle root, tree size, tree nonce).

use log::warn;

use mergepool_crypto::hash160;
use mergepool_util::reverse_bytes;

use crate::encoding::{encode_script_num, read_var_int, var_int};
use crate::template::Template;
use crate::CoreError;

/// Merged-mining commitment magic bytes
pub const MERGED_MINING_MAGIC: [u8; 4] = [0xfa, 0xbe, 0x6d, 0x6d];

/// Consensus bound on the coinbase scriptSig
pub const MAX_SCRIPT_SIG_LEN: usize = 100;

/// Builds the merged-mining commitment scriptSig fragment
pub fn merged_mining_script(aux_root: &[u8; 32], merkle_size: u32, merkle_nonce: u32) -> Vec<u8> {
    let mut script = Vec::with_capacity(44);
    script.extend_from_slice(&MERGED_MINING_MAGIC);
    script.extend_from_slice(&reverse_bytes(aux_root));
    script.extend_from_slice(&merkle_size.to_le_bytes());
    script.extend_from_slice(&merkle_nonce.to_le_bytes());
    script
}

/// Derives the P2PKH output script for a hex-encoded public key
pub fn p2pkh_script(pubkey_hex: &str) -> Result<Vec<u8>, CoreError> {
    let pubkey = hex::decode(pubkey_hex)?;
    let pubkey_hash = hash160(&pubkey);
    let mut script = Vec::with_capacity(25);
    script.push(0x76); // OP_DUP
    script.push(0xa9); // OP_HASH160
    script.push(0x14);
    script.extend_from_slice(&pubkey_hash);
    script.push(0x88); // OP_EQUALVERIFY
    script.push(0xac); // OP_CHECKSIG
    Ok(script)
}

/// A coinbase transaction split around the extranonce reservation
#[derive(Debug, Clone)]
pub struct Coinbase {
    /// Bytes before the extranonce window
    pub coinb1: Vec<u8>,

    /// Bytes after the extranonce window
    pub coinb2: Vec<u8>,

    /// Reserved length for extranonce1 + extranonce2
    pub extranonce_reserve: usize,
}

impl Coinbase {
    /// Assembles the coinbase for a template
    ///
    /// Outputs are the witness commitment (when the template carries one)
    /// followed by a single pool-reward P2PKH output.
    pub fn build(
        template: &Template,
        aux_root: &[u8; 32],
        merkle_size: u32,
        merkle_nonce: u32,
        pool_signature: &[u8],
        reward_pubkey_hex: &str,
        extranonce_reserve: usize,
    ) -> Result<Self, CoreError> {
        let height_script = encode_script_num(template.height);
        let marker = merged_mining_script(aux_root, merkle_size, merkle_nonce);
        let script_sig_len =
            height_script.len() + pool_signature.len() + marker.len() + extranonce_reserve;
        if script_sig_len > MAX_SCRIPT_SIG_LEN {
            warn!(
                "Coinbase scriptSig is {} bytes, above the {}-byte consensus limit",
                script_sig_len, MAX_SCRIPT_SIG_LEN
            );
        }

        let mut coinb1 = Vec::with_capacity(47 + script_sig_len);
        // The coinbase transaction version is fixed, independent of the
        // template's block version.
        coinb1.extend_from_slice(&1u32.to_le_bytes());
        coinb1.extend_from_slice(&var_int(1));
        coinb1.extend_from_slice(&[0u8; 32]);
        coinb1.extend_from_slice(&[0xff, 0xff, 0xff, 0xff]);
        coinb1.extend_from_slice(&var_int(script_sig_len as u64));
        coinb1.extend_from_slice(&height_script);
        coinb1.extend_from_slice(pool_signature);
        coinb1.extend_from_slice(&marker);

        let mut outputs = Vec::new();
        let mut output_count = 0u64;
        if let Some(commitment) = &template.default_witness_commitment {
            let script = hex::decode(commitment)?;
            outputs.extend_from_slice(&0u64.to_le_bytes());
            outputs.extend_from_slice(&var_int(script.len() as u64));
            outputs.extend_from_slice(&script);
            output_count += 1;
        }
        let reward_script = p2pkh_script(reward_pubkey_hex)?;
        outputs.extend_from_slice(&template.coinbase_value.to_le_bytes());
        outputs.extend_from_slice(&var_int(reward_script.len() as u64));
        outputs.extend_from_slice(&reward_script);
        output_count += 1;

        let mut coinb2 = Vec::with_capacity(9 + outputs.len());
        coinb2.extend_from_slice(&0u32.to_le_bytes()); // input sequence
        coinb2.extend_from_slice(&var_int(output_count));
        coinb2.extend_from_slice(&outputs);
        coinb2.extend_from_slice(&0u32.to_le_bytes()); // lock time

        Ok(Coinbase {
            coinb1,
            coinb2,
            extranonce_reserve,
        })
    }

    /// Splices an extranonce into the reserved window, yielding the full
    /// serialized transaction
    pub fn splice(&self, extranonce: &[u8]) -> Result<Vec<u8>, CoreError> {
        if extranonce.len() != self.extranonce_reserve {
            return Err(CoreError::BadLength {
                field: "extranonce",
                got: extranonce.len(),
                want: self.extranonce_reserve,
            });
        }
        let mut tx = Vec::with_capacity(self.coinb1.len() + extranonce.len() + self.coinb2.len());
        tx.extend_from_slice(&self.coinb1);
        tx.extend_from_slice(extranonce);
        tx.extend_from_slice(&self.coinb2);
        Ok(tx)
    }
}

/// A coinbase transaction decomposed back into its sections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCoinbase {
    pub version: u32,
    pub height: u64,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
    pub outputs: Vec<(u64, Vec<u8>)>,
    pub lock_time: u32,
}

/// Parses a serialized coinbase transaction
pub fn parse_coinbase(bytes: &[u8]) -> Result<ParsedCoinbase, CoreError> {
    let mut cursor = 0usize;
    let version = read_u32(bytes, &mut cursor)?;

    let (input_count, used) = read_var_int(&bytes[cursor..])?;
    cursor += used;
    if input_count != 1 {
        return Err(CoreError::Malformed(format!(
            "coinbase: {} inputs, expected 1",
            input_count
        )));
    }

    let prev_out = read_slice(bytes, &mut cursor, 32)?;
    if prev_out.iter().any(|b| *b != 0) {
        return Err(CoreError::Malformed(
            "coinbase: previous output txid is not zero".to_string(),
        ));
    }
    let prev_index = read_u32(bytes, &mut cursor)?;
    if prev_index != 0xffff_ffff {
        return Err(CoreError::Malformed(
            "coinbase: previous output index is not 0xffffffff".to_string(),
        ));
    }

    let (script_len, used) = read_var_int(&bytes[cursor..])?;
    cursor += used;
    let script_sig = read_slice(bytes, &mut cursor, script_len as usize)?.to_vec();
    let height = parse_height(&script_sig)?;

    let sequence = read_u32(bytes, &mut cursor)?;

    let (output_count, used) = read_var_int(&bytes[cursor..])?;
    cursor += used;
    let mut outputs = Vec::with_capacity(output_count as usize);
    for _ in 0..output_count {
        let value = read_u64(bytes, &mut cursor)?;
        let (script_len, used) = read_var_int(&bytes[cursor..])?;
        cursor += used;
        let script = read_slice(bytes, &mut cursor, script_len as usize)?.to_vec();
        outputs.push((value, script));
    }

    let lock_time = read_u32(bytes, &mut cursor)?;
    if cursor != bytes.len() {
        return Err(CoreError::Malformed(format!(
            "coinbase: {} trailing bytes",
            bytes.len() - cursor
        )));
    }

    Ok(ParsedCoinbase {
        version,
        height,
        script_sig,
        sequence,
        outputs,
        lock_time,
    })
}

fn parse_height(script_sig: &[u8]) -> Result<u64, CoreError> {
    let first = *script_sig
        .first()
        .ok_or_else(|| CoreError::Malformed("coinbase: empty scriptSig".to_string()))?;
    match first {
        0x51..=0x60 => Ok((first - 0x50) as u64),
        len @ 1..=8 => {
            let bytes = script_sig.get(1..1 + len as usize).ok_or_else(|| {
                CoreError::Malformed("coinbase: truncated height push".to_string())
            })?;
            let mut height = 0u64;
            for (i, byte) in bytes.iter().enumerate() {
                height |= (*byte as u64) << (8 * i);
            }
            Ok(height)
        }
        other => Err(CoreError::Malformed(format!(
            "coinbase: unexpected height opcode {:#04x}",
            other
        ))),
    }
}

fn read_slice<'a>(bytes: &'a [u8], cursor: &mut usize, len: usize) -> Result<&'a [u8], CoreError> {
    let slice = bytes
        .get(*cursor..*cursor + len)
        .ok_or_else(|| CoreError::Malformed("coinbase: truncated input".to_string()))?;
    *cursor += len;
    Ok(slice)
}

fn read_u32(bytes: &[u8], cursor: &mut usize) -> Result<u32, CoreError> {
    let slice = read_slice(bytes, cursor, 4)?;
    Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

fn read_u64(bytes: &[u8], cursor: &mut usize) -> Result<u64, CoreError> {
    let slice = read_slice(bytes, cursor, 8)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(slice);
    Ok(u64::from_le_bytes(raw))
}
