//! Chain Profiles
//!
//! One capability set per supported blockchain: its digest functions, share
//! difficulty multiplier, payout-address patterns, and confirmation depth.
//! Profiles are looked up by name at startup; every chain shipped here is a
//! Scrypt-family chain, so the header digest is Scrypt and the coinbase
//! digest is double SHA-256 throughout.

use once_cell::sync::Lazy;
use regex::Regex;

use mergepool_crypto::{double_sha256, scrypt_hash};

use crate::CoreError;

/// Confirmation depth for chains that do not override it
pub const DEFAULT_MIN_CONFIRMATIONS: u32 = 100;

/// Per-chain capabilities
pub trait ChainSpec: Send + Sync {
    /// Canonical lowercase chain name
    fn chain_name(&self) -> &'static str;

    /// Digest used for the coinbase transaction
    fn coinbase_digest(&self, coinbase_hex: &str) -> Result<String, CoreError> {
        double_sha256_hex(coinbase_hex)
    }

    /// Digest used for header proof of work
    fn header_digest(&self, header_hex: &str) -> Result<String, CoreError> {
        scrypt_hex(header_hex)
    }

    /// Factor by which share difficulty is scaled on this chain
    fn share_multiplier(&self) -> f64 {
        65536.0
    }

    /// Whether the string is a plausible mainnet payout address
    fn valid_mainnet_address(&self, address: &str) -> bool;

    /// Whether the string is a plausible testnet payout address
    fn valid_testnet_address(&self, address: &str) -> bool;

    /// Confirmations before a found block is considered mature
    fn minimum_confirmations(&self) -> u32 {
        DEFAULT_MIN_CONFIRMATIONS
    }
}

/// Double SHA-256 over hex input, hex output
pub fn double_sha256_hex(data_hex: &str) -> Result<String, CoreError> {
    let bytes = hex::decode(data_hex)?;
    Ok(hex::encode(double_sha256(&bytes)))
}

/// Scrypt (N=1024, r=1, p=1) over hex input, hex output
pub fn scrypt_hex(data_hex: &str) -> Result<String, CoreError> {
    let bytes = hex::decode(data_hex)?;
    Ok(hex::encode(scrypt_hash(&bytes)?))
}

static BELLSCOIN_MAINNET: Lazy<Regex> =
    Lazy::new(|| Regex::new("^(B|M)[A-Za-z0-9]{33}$|^(bel1)[0-9A-Za-z]{39}$").unwrap());
static BELLSCOIN_TESTNET: Lazy<Regex> = Lazy::new(|| Regex::new("[a-zA-Z0-9]{34}").unwrap());
static DOGE_STYLE_MAINNET: Lazy<Regex> =
    Lazy::new(|| Regex::new("^(D|A|9)[a-km-zA-HJ-NP-Z1-9]{33,34}$").unwrap());
static DOGE_STYLE_TESTNET: Lazy<Regex> =
    Lazy::new(|| Regex::new("^(K|2)[a-km-zA-HJ-NP-Z1-9]{33}$").unwrap());
static VERGECOIN_TESTNET: Lazy<Regex> =
    Lazy::new(|| Regex::new("^(o|2)[a-km-zA-HJ-NP-Z1-9]{33}$").unwrap());

/// Bellscoin, the usual primary chain
pub struct Bellscoin;

impl ChainSpec for Bellscoin {
    fn chain_name(&self) -> &'static str {
        "bellscoin"
    }

    fn valid_mainnet_address(&self, address: &str) -> bool {
        BELLSCOIN_MAINNET.is_match(address)
    }

    fn valid_testnet_address(&self, address: &str) -> bool {
        BELLSCOIN_TESTNET.is_match(address)
    }
}

/// Luckycoin
pub struct Luckycoin;

impl ChainSpec for Luckycoin {
    fn chain_name(&self) -> &'static str {
        "luckycoin"
    }

    fn valid_mainnet_address(&self, address: &str) -> bool {
        DOGE_STYLE_MAINNET.is_match(address)
    }

    fn valid_testnet_address(&self, address: &str) -> bool {
        DOGE_STYLE_TESTNET.is_match(address)
    }

    fn minimum_confirmations(&self) -> u32 {
        251
    }
}

/// Pepecoin
pub struct Pepecoin;

impl ChainSpec for Pepecoin {
    fn chain_name(&self) -> &'static str {
        "pepecoin"
    }

    fn valid_mainnet_address(&self, address: &str) -> bool {
        DOGE_STYLE_MAINNET.is_match(address)
    }

    fn valid_testnet_address(&self, address: &str) -> bool {
        DOGE_STYLE_TESTNET.is_match(address)
    }

    fn minimum_confirmations(&self) -> u32 {
        251
    }
}

/// Vergecoin
pub struct Vergecoin;

impl ChainSpec for Vergecoin {
    fn chain_name(&self) -> &'static str {
        "vergecoin"
    }

    fn valid_mainnet_address(&self, address: &str) -> bool {
        DOGE_STYLE_MAINNET.is_match(address)
    }

    fn valid_testnet_address(&self, address: &str) -> bool {
        VERGECOIN_TESTNET.is_match(address)
    }

    fn minimum_confirmations(&self) -> u32 {
        251
    }
}

/// Dogecoin, the usual auxiliary chain
pub struct Dogecoin;

impl ChainSpec for Dogecoin {
    fn chain_name(&self) -> &'static str {
        "dogecoin"
    }

    fn valid_mainnet_address(&self, address: &str) -> bool {
        DOGE_STYLE_MAINNET.is_match(address)
    }

    fn valid_testnet_address(&self, address: &str) -> bool {
        DOGE_STYLE_TESTNET.is_match(address)
    }

    fn minimum_confirmations(&self) -> u32 {
        251
    }
}

/// Looks up a chain profile by name
pub fn get_chain(name: &str) -> Result<&'static dyn ChainSpec, CoreError> {
    match name {
        "bellscoin" => Ok(&Bellscoin),
        "luckycoin" => Ok(&Luckycoin),
        "pepecoin" => Ok(&Pepecoin),
        "vergecoin" => Ok(&Vergecoin),
        "dogecoin" => Ok(&Dogecoin),
        other => Err(CoreError::UnknownChain(other.to_string())),
    }
}
