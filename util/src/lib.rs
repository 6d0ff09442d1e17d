//! Utility functions and types for Mergepool

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UtilError {
    #[error("Hex decoding error: {0}")]
    HexError(#[from] hex::FromHexError),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Converts a hex string to bytes
pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, UtilError> {
    Ok(hex::decode(hex)?)
}

/// Converts bytes to a hex string
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Reverses the byte order of a slice, length-preserving
pub fn reverse_bytes(data: &[u8]) -> Vec<u8> {
    data.iter().rev().copied().collect()
}

/// Reverses the byte order of a hex string
///
/// The input must have an even number of hex digits; the result is the
/// hex encoding of the byte-reversed value.
pub fn reverse_hex(hex: &str) -> Result<String, UtilError> {
    let bytes = hex_to_bytes(hex)?;
    Ok(bytes_to_hex(&reverse_bytes(&bytes)))
}

/// Parses a duration string such as "500ms", "5s", "10m" or "2h"
///
/// A bare number is interpreted as seconds.
pub fn parse_duration(s: &str) -> Result<Duration, UtilError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(UtilError::InvalidFormat("empty duration".to_string()));
    }

    let (value, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => s.split_at(idx),
        None => (s, "s"),
    };

    let value: u64 = value
        .parse()
        .map_err(|_| UtilError::InvalidFormat(format!("bad duration: {}", s)))?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        _ => Err(UtilError::InvalidFormat(format!("bad duration unit: {}", unit))),
    }
}
