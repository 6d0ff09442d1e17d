//! 256-bit Target Arithmetic
//!
//! A target is an unsigned 256-bit integer; a header hash meets the target
//! when, interpreted as a little-endian integer, it compares less than or
//! equal. Difficulty is defined against the truncated maximum target
//! `0x00000000FFFF << 208`, the canonical difficulty-1 constant.

use once_cell::sync::Lazy;
use primitive_types::{U256, U512};
use thiserror::Error;

/// Target arithmetic errors
#[derive(Debug, Error)]
pub enum TargetError {
    /// Malformed hex input
    #[error("Invalid target hex: {0}")]
    InvalidHex(String),

    /// Difficulty must be a positive finite number
    #[error("Invalid difficulty: {0}")]
    InvalidDifficulty(f64),

    /// Compact encoding with the sign bit set
    #[error("Negative compact target: {0:#010x}")]
    NegativeCompact(u32),

    /// Compact encoding that does not fit 256 bits
    #[error("Compact target overflow: {0:#010x}")]
    CompactOverflow(u32),

    /// Division by a zero target
    #[error("Zero target has no difficulty")]
    ZeroTarget,
}

/// The difficulty-1 target: 0xFFFF shifted 208 bits left
static MAX_TARGET: Lazy<U256> = Lazy::new(|| U256::from(0xffffu64) << 208usize);

/// Fractional difficulty is carried with 24 bits of precision when
/// converted back to an integer target.
const DIFFICULTY_SCALE_BITS: u32 = 24;

/// A 256-bit proof-of-work target
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Target(U256);

impl Target {
    /// The difficulty-1 target
    pub fn max() -> Self {
        Target(*MAX_TARGET)
    }

    /// Wrap a raw 256-bit value
    pub fn from_u256(value: U256) -> Self {
        Target(value)
    }

    /// Parse a big-endian hex string, as targets arrive from daemon RPC
    pub fn from_be_hex(hex: &str) -> Result<Self, TargetError> {
        let value = U256::from_str_radix(hex, 16)
            .map_err(|_| TargetError::InvalidHex(hex.to_string()))?;
        Ok(Target(value))
    }

    /// Decode the compact `nbits` representation
    pub fn from_compact(bits: u32) -> Result<Self, TargetError> {
        if bits & 0x0080_0000 != 0 {
            return Err(TargetError::NegativeCompact(bits));
        }
        let exponent = (bits >> 24) as usize;
        let mantissa = U256::from(bits & 0x007f_ffff);
        if exponent <= 3 {
            Ok(Target(mantissa >> (8 * (3 - exponent))))
        } else {
            let shift = 8 * (exponent - 3);
            if shift >= 256 || (mantissa.leading_zeros() as usize) < shift {
                return Err(TargetError::CompactOverflow(bits));
            }
            Ok(Target(mantissa << shift))
        }
    }

    /// Encode as compact `nbits`: exponent byte and 3-byte mantissa,
    /// sign bit clear
    pub fn to_compact(&self) -> u32 {
        if self.0.is_zero() {
            return 0;
        }
        let mut size = (self.0.bits() + 7) / 8;
        let mut mantissa = if size <= 3 {
            (self.0 << (8 * (3 - size))).low_u64() as u32
        } else {
            (self.0 >> (8 * (size - 3))).low_u64() as u32
        };
        if mantissa & 0x0080_0000 != 0 {
            mantissa >>= 8;
            size += 1;
        }
        ((size as u32) << 24) | mantissa
    }

    /// Derive the target for a given difficulty: `max_target / difficulty`,
    /// rounding toward zero
    ///
    /// Sub-unit difficulties yield targets above the maximum; results that
    /// do not fit 256 bits saturate to `U256::MAX`.
    pub fn from_difficulty(difficulty: f64) -> Result<Self, TargetError> {
        if !difficulty.is_finite() || difficulty <= 0.0 {
            return Err(TargetError::InvalidDifficulty(difficulty));
        }
        let scaled = (difficulty * (1u64 << DIFFICULTY_SCALE_BITS) as f64).round();
        if scaled < 1.0 {
            return Ok(Target(U256::MAX));
        }
        if scaled >= u128::MAX as f64 {
            return Err(TargetError::InvalidDifficulty(difficulty));
        }
        let numerator: U512 =
            MAX_TARGET.full_mul(U256::from(1u64) << (DIFFICULTY_SCALE_BITS as usize));
        let quotient = numerator / U512::from(scaled as u128);
        if quotient > U512::from(U256::MAX) {
            return Ok(Target(U256::MAX));
        }
        let limbs = quotient.0;
        Ok(Target(U256([limbs[0], limbs[1], limbs[2], limbs[3]])))
    }

    /// Difficulty of this target: `max_target / target`
    pub fn to_difficulty(&self) -> Result<f64, TargetError> {
        if self.0.is_zero() {
            return Err(TargetError::ZeroTarget);
        }
        Ok(u256_to_f64(*MAX_TARGET) / u256_to_f64(self.0))
    }

    /// Whether a hash, interpreted as a little-endian 256-bit integer,
    /// meets this target
    pub fn met_by(&self, hash: &[u8; 32]) -> bool {
        U256::from_little_endian(hash) <= self.0
    }

    /// The raw 256-bit value
    pub fn as_u256(&self) -> U256 {
        self.0
    }

    /// Big-endian hex encoding, zero-padded to 64 digits
    pub fn to_be_hex(&self) -> String {
        let mut buf = [0u8; 32];
        self.0.to_big_endian(&mut buf);
        hex::encode(buf)
    }
}

/// Lossy conversion for difficulty ratios
fn u256_to_f64(value: U256) -> f64 {
    value
        .0
        .iter()
        .enumerate()
        .map(|(i, limb)| (*limb as f64) * 2f64.powi(64 * i as i32))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIFF1_HEX: &str = "00000000ffff0000000000000000000000000000000000000000000000000000";

    #[test]
    fn test_max_target_hex() {
        assert_eq!(Target::max().to_be_hex(), DIFF1_HEX);
    }

    #[test]
    fn test_compact_round_trip() {
        let diff1 = Target::from_compact(0x1d00ffff).unwrap();
        assert_eq!(diff1, Target::max());
        assert_eq!(diff1.to_compact(), 0x1d00ffff);

        let scrypt_floor = Target::from_compact(0x1e0ffff0).unwrap();
        assert_eq!(
            scrypt_floor.to_be_hex(),
            "00000ffff0000000000000000000000000000000000000000000000000000000"
        );
        assert_eq!(scrypt_floor.to_compact(), 0x1e0ffff0);
    }

    #[test]
    fn test_compact_rejects_sign_bit() {
        assert!(matches!(
            Target::from_compact(0x1d80ffff),
            Err(TargetError::NegativeCompact(_))
        ));
    }

    #[test]
    fn test_compact_rejects_overflow() {
        assert!(matches!(
            Target::from_compact(0xff7fffff),
            Err(TargetError::CompactOverflow(_))
        ));
    }

    #[test]
    fn test_difficulty_one() {
        assert_eq!(Target::from_difficulty(1.0).unwrap(), Target::max());
        assert_eq!(Target::max().to_difficulty().unwrap(), 1.0);
    }

    #[test]
    fn test_share_multiplier_scaling() {
        // Pool difficulty 1 on a chain with multiplier 65536 softens the
        // target by exactly 16 bits.
        let pool = Target::from_difficulty(1.0 / 65536.0).unwrap();
        assert_eq!(
            pool.to_be_hex(),
            "0000ffff00000000000000000000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn test_tiny_difficulty_saturates() {
        let target = Target::from_difficulty(1e-9).unwrap();
        assert_eq!(target.as_u256(), U256::MAX);
    }

    #[test]
    fn test_invalid_difficulty() {
        assert!(Target::from_difficulty(0.0).is_err());
        assert!(Target::from_difficulty(-1.0).is_err());
        assert!(Target::from_difficulty(f64::NAN).is_err());
    }

    #[test]
    fn test_met_by_is_little_endian() {
        // 0x01 in the last byte is the most significant little-endian byte.
        let mut high = [0u8; 32];
        high[31] = 0x01;
        assert!(!Target::max().met_by(&high));

        let mut low = [0u8; 32];
        low[0] = 0x01;
        assert!(Target::max().met_by(&low));
    }

    #[test]
    fn test_zero_target_has_no_difficulty() {
        let zero = Target::from_be_hex("00").unwrap();
        assert!(matches!(zero.to_difficulty(), Err(TargetError::ZeroTarget)));
        assert!(zero.met_by(&[0u8; 32]));
    }
}
