//! Hashing primitives for Mergepool
//!
//! This crate wraps the digest functions the pool needs: double SHA-256
//! for transactions and Merkle nodes, Scrypt (N=1024, r=1, p=1) for the
//! header proof of work on Scrypt-family chains, and HASH160 for
//! pay-to-pubkey-hash script derivation.

use ripemd::Ripemd160;
use scrypt::Params;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid scrypt parameters")]
    ScryptParams,

    #[error("Scrypt output length mismatch")]
    ScryptOutput,
}

/// SHA-256 of the input
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 applied twice
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Scrypt header hash: N=1024, r=1, p=1, 32-byte output
///
/// The input is used as both password and salt, as Scrypt-family chains
/// hash their 80-byte headers.
pub fn scrypt_hash(data: &[u8]) -> Result<[u8; 32], CryptoError> {
    // log2(1024) = 10
    let params = Params::new(10, 1, 1, 32).map_err(|_| CryptoError::ScryptParams)?;
    let mut output = [0u8; 32];
    scrypt::scrypt(data, data, &params, &mut output).map_err(|_| CryptoError::ScryptOutput)?;
    Ok(output)
}

/// RIPEMD-160 of the input
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// RIPEMD-160 of SHA-256, the Bitcoin address hash
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd160(&sha256(data))
}
