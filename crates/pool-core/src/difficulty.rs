//! Target, difficulty and compact "bits" conversions.
//!
//! Targets are 256-bit integers held as [`BigUint`] so that `2^256` itself
//! (the average attempts for target 0) stays representable.

use core::fmt;
use core::hash::{Hash, Hasher};
use std::sync::OnceLock;

use bytes::BufMut;
use num_bigint::BigUint;
use num_traits::{FromPrimitive, One, ToPrimitive, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::error::{DataError, Result};
use crate::hash::Hash256;
use crate::pack::{read_u32, Decode, Encode};

/// `2^256`.
pub fn two_pow_256() -> BigUint {
    BigUint::one() << 256usize
}

/// Largest 256-bit target, `2^256 - 1`.
pub fn max_target() -> BigUint {
    two_pow_256() - 1u8
}

/// The target of difficulty 1: `0xffff0000 * 2^192 + 1`.
pub fn difficulty_1_target() -> BigUint {
    (BigUint::from(0xffff_0000u32) << 192usize) + 1u8
}

fn warn_if_oversized(target: &BigUint) {
    if target.bits() > 256 {
        warn!(value = %target, "target >= 2**256");
    }
}

/// Integer division result rounded like `int(x - 1 + 0.5)` and clamped to a
/// 256-bit target.
fn float_to_target(value: f64) -> BigUint {
    let rounded = (value - 1.0 + 0.5).trunc();
    if rounded <= 0.0 {
        return BigUint::zero();
    }
    match BigUint::from_f64(rounded) {
        Some(target) if target.bits() <= 256 => target,
        // Infinite or beyond 256 bits
        _ => max_target(),
    }
}

fn ratio_to_f64(numerator: &BigUint, denominator: &BigUint) -> f64 {
    let num = numerator.to_f64().unwrap_or(f64::INFINITY);
    let den = denominator.to_f64().unwrap_or(f64::INFINITY);
    num / den
}

/// Expected number of hashes needed to find one at or below `target`.
pub fn target_to_average_attempts(target: &BigUint) -> BigUint {
    warn_if_oversized(target);
    two_pow_256() / (target + 1u8)
}

/// Inverse of [`target_to_average_attempts`], rounded to the nearest target.
pub fn average_attempts_to_target(average_attempts: f64) -> Result<BigUint> {
    if average_attempts.is_nan() || average_attempts <= 0.0 {
        return Err(DataError::Domain(format!(
            "average attempts must be positive, got {}",
            average_attempts
        )));
    }
    let pow = two_pow_256().to_f64().unwrap_or(f64::INFINITY);
    Ok(float_to_target(pow / average_attempts))
}

pub fn target_to_difficulty(target: &BigUint) -> f64 {
    warn_if_oversized(target);
    ratio_to_f64(&difficulty_1_target(), &(target + 1u8))
}

/// Convert a difficulty back to a target. Difficulty 0 is the easiest
/// possible target, `2^256 - 1`.
pub fn difficulty_to_target(difficulty: f64) -> Result<BigUint> {
    if difficulty.is_nan() || difficulty < 0.0 {
        return Err(DataError::Domain(format!(
            "difficulty must be non-negative, got {}",
            difficulty
        )));
    }
    if difficulty == 0.0 {
        return Ok(max_target());
    }
    let reference = difficulty_1_target().to_f64().unwrap_or(f64::INFINITY);
    Ok(float_to_target(reference / difficulty))
}

fn check_modifier(modifier: f64) -> Result<()> {
    if !modifier.is_finite() || modifier <= 0.0 {
        return Err(DataError::Domain(format!(
            "difficulty modifier must be positive, got {}",
            modifier
        )));
    }
    Ok(())
}

/// [`target_to_difficulty`] for chains that report difficulty scaled by
/// `modifier`.
pub fn target_to_difficulty_alt(target: &BigUint, modifier: f64) -> Result<f64> {
    check_modifier(modifier)?;
    Ok(target_to_difficulty(target) * modifier)
}

pub fn difficulty_to_target_alt(difficulty: f64, modifier: f64) -> Result<BigUint> {
    check_modifier(modifier)?;
    if difficulty.is_nan() || difficulty < 0.0 {
        return Err(DataError::Domain(format!(
            "difficulty must be non-negative, got {}",
            difficulty
        )));
    }
    difficulty_to_target(difficulty / modifier)
}

/// Check if a hash meets the target (valid proof of work).
#[inline]
pub fn hash_meets_target(hash: &Hash256, target: &BigUint) -> bool {
    &hash.to_biguint() <= target
}

/// Format difficulty for display (e.g., "1.23T" for trillion).
pub fn format_difficulty(difficulty: f64) -> String {
    if difficulty >= 1e15 {
        format!("{:.2}P", difficulty / 1e15)
    } else if difficulty >= 1e12 {
        format!("{:.2}T", difficulty / 1e12)
    } else if difficulty >= 1e9 {
        format!("{:.2}G", difficulty / 1e9)
    } else if difficulty >= 1e6 {
        format!("{:.2}M", difficulty / 1e6)
    } else if difficulty >= 1e3 {
        format!("{:.2}K", difficulty / 1e3)
    } else {
        format!("{:.2}", difficulty)
    }
}

/// Compact "bits" representation of a target.
///
/// The bits format is: [exponent (1 byte)][mantissa (3 bytes)]
/// Target = mantissa * 256^(exponent - 3)
///
/// Every 32-bit word decodes to some target. Two values are equal when their
/// words are equal, regardless of the targets they denote.
#[derive(Clone)]
pub struct CompactTarget {
    bits: u32,
    target: OnceLock<BigUint>,
}

impl CompactTarget {
    pub fn new(bits: u32) -> Self {
        CompactTarget {
            bits,
            target: OnceLock::new(),
        }
    }

    /// Build from a word that must decode to `target`.
    pub fn with_target(bits: u32, target: &BigUint) -> Result<Self> {
        let compact = CompactTarget::new(bits);
        if compact.target() != target {
            return Err(DataError::Domain(format!(
                "bits {:#010x} do not encode target {:#x}",
                bits, target
            )));
        }
        Ok(compact)
    }

    /// The most precise compact value whose target does not exceed `target`.
    ///
    /// Only the top three significant bytes survive, so the decoded target
    /// is always `<= target`.
    pub fn from_upper_bound(target: &BigUint) -> Result<Self> {
        let mut n = if target.is_zero() {
            Vec::new()
        } else {
            target.to_bytes_be()
        };
        // A set top bit would read back as a negative mantissa.
        if n.first().is_some_and(|&b| b >= 0x80) {
            n.insert(0, 0x00);
        }
        let len = u8::try_from(n.len()).map_err(|_| {
            DataError::Domain(format!("target of {} bytes has no compact form", n.len()))
        })?;
        n.resize(n.len().max(3), 0);

        let bits = u32::from_be_bytes([len, n[0], n[1], n[2]]);
        Ok(CompactTarget::new(bits))
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn exponent(&self) -> u8 {
        (self.bits >> 24) as u8
    }

    pub fn mantissa(&self) -> u32 {
        self.bits & 0x00ff_ffff
    }

    /// The decoded target, computed on first use.
    pub fn target(&self) -> &BigUint {
        self.target.get_or_init(|| {
            let mantissa = BigUint::from(self.mantissa());
            let exponent = self.exponent() as usize;
            if exponent >= 3 {
                mantissa << (8 * (exponent - 3))
            } else {
                mantissa >> (8 * (3 - exponent))
            }
        })
    }

    pub fn difficulty(&self) -> f64 {
        target_to_difficulty(self.target())
    }
}

impl PartialEq for CompactTarget {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl Eq for CompactTarget {}

impl Hash for CompactTarget {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits.hash(state);
    }
}

impl fmt::Debug for CompactTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CompactTarget(bits={:#010x}, target={:#x})",
            self.bits,
            self.target()
        )
    }
}

impl From<u32> for CompactTarget {
    fn from(bits: u32) -> Self {
        CompactTarget::new(bits)
    }
}

impl Encode for CompactTarget {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_u32_le(self.bits);
        Ok(())
    }
}

impl Decode for CompactTarget {
    fn decode_from(buf: &mut &[u8]) -> Result<Self> {
        Ok(CompactTarget::new(read_u32(buf)?))
    }
}

impl Serialize for CompactTarget {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits)
    }
}

impl<'de> Deserialize<'de> for CompactTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        Ok(CompactTarget::new(u32::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_target_genesis() {
        // Genesis block bits: 0x1d00ffff
        let target = CompactTarget::new(0x1d00ffff);
        let expected = BigUint::from(0xffffu32) << (8 * 26);
        assert_eq!(target.target(), &expected);
    }

    #[test]
    fn test_compact_target_small_exponent() {
        // Exponent below 3 shifts the mantissa right.
        assert_eq!(CompactTarget::new(0x02123456).target(), &BigUint::from(0x1234u32));
        assert_eq!(CompactTarget::new(0x01123456).target(), &BigUint::from(0x12u32));
        assert!(CompactTarget::new(0x00123456).target().is_zero());
    }

    #[test]
    fn test_compact_target_roundtrip() {
        let test_cases = [
            0x1d00ffff, // Genesis
            0x17034219, // High difficulty
            0x1b0404cb, // Medium difficulty
        ];

        for &bits in &test_cases {
            let target = CompactTarget::new(bits).target().clone();
            let recovered = CompactTarget::from_upper_bound(&target).unwrap();
            assert_eq!(bits, recovered.bits(), "Roundtrip failed for bits {:08x}", bits);
        }
    }

    #[test]
    fn test_from_upper_bound_sign_padding() {
        // 0x80 has its top bit set, so a zero byte is prefixed.
        let compact = CompactTarget::from_upper_bound(&BigUint::from(0x80u32)).unwrap();
        assert_eq!(compact.bits(), 0x02008000);
        assert_eq!(compact.target(), &BigUint::from(0x80u32));

        let compact = CompactTarget::from_upper_bound(&BigUint::zero()).unwrap();
        assert_eq!(compact.bits(), 0);
        assert!(compact.target().is_zero());
    }

    #[test]
    fn test_from_upper_bound_rounds_down() {
        let target = BigUint::from(0x12345678u32);
        let compact = CompactTarget::from_upper_bound(&target).unwrap();
        assert_eq!(compact.bits(), 0x04123456);
        assert_eq!(compact.target(), &BigUint::from(0x12345600u32));
        assert!(compact.target() <= &target);
    }

    #[test]
    fn test_with_target_validates() {
        let target = CompactTarget::new(0x1d00ffff).target().clone();
        assert!(CompactTarget::with_target(0x1d00ffff, &target).is_ok());
        assert!(matches!(
            CompactTarget::with_target(0x1d00fffe, &target),
            Err(DataError::Domain(_))
        ));
    }

    #[test]
    fn test_compact_equality_is_on_bits() {
        // Both words decode to zero but are different values.
        assert!(CompactTarget::new(0x00000001).target().is_zero());
        assert!(CompactTarget::new(0x00000002).target().is_zero());
        assert_ne!(CompactTarget::new(0x00000001), CompactTarget::new(0x00000002));
        assert_eq!(CompactTarget::new(0x1d00ffff), CompactTarget::from(0x1d00ffff));
    }

    #[test]
    fn test_compact_wire_format() {
        let compact = CompactTarget::new(0x1d00ffff);
        assert_eq!(compact.encode().unwrap(), vec![0xff, 0xff, 0x00, 0x1d]);
        assert_eq!(CompactTarget::decode(&[0xff, 0xff, 0x00, 0x1d]).unwrap(), compact);
    }

    #[test]
    fn test_average_attempts_extremes() {
        assert_eq!(target_to_average_attempts(&BigUint::zero()), two_pow_256());
        assert_eq!(target_to_average_attempts(&max_target()), BigUint::one());
    }

    #[test]
    fn test_average_attempts_to_target() {
        assert_eq!(average_attempts_to_target(1.0).unwrap(), max_target());
        // 2^256 / 2^32 - 1 + 0.5 rounds back to 2^224 in f64
        let target = average_attempts_to_target(4_294_967_296.0).unwrap();
        assert_eq!(target, BigUint::one() << 224usize);
        assert!(average_attempts_to_target(0.0).is_err());
        assert!(average_attempts_to_target(-5.0).is_err());
        assert!(average_attempts_to_target(f64::NAN).is_err());
    }

    #[test]
    fn test_difficulty_one() {
        let target = CompactTarget::new(0x1d00ffff).target().clone();
        let difficulty = target_to_difficulty(&target);
        assert!((difficulty - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_difficulty_to_target() {
        assert_eq!(difficulty_to_target(0.0).unwrap(), max_target());
        assert!(difficulty_to_target(-1.0).is_err());

        let target = difficulty_to_target(1.0).unwrap();
        let expected = difficulty_1_target() - 1u8;
        let error = if target > expected {
            &target - &expected
        } else {
            &expected - &target
        };
        // f64 keeps 53 bits of a 224-bit value.
        assert!(error.bits() <= 224 - 52);
    }

    #[test]
    fn test_difficulty_alt_forms() {
        let target = CompactTarget::new(0x1d00ffff).target().clone();
        let scaled = target_to_difficulty_alt(&target, 256.0).unwrap();
        assert!((scaled - 256.0).abs() < 1e-6);

        assert_eq!(
            difficulty_to_target_alt(256.0, 256.0).unwrap(),
            difficulty_to_target(1.0).unwrap()
        );
        assert_eq!(difficulty_to_target_alt(0.0, 16.0).unwrap(), max_target());
        assert!(target_to_difficulty_alt(&target, 0.0).is_err());
        assert!(difficulty_to_target_alt(1.0, f64::NAN).is_err());
    }

    #[test]
    fn test_oversized_target_is_tolerated() {
        let oversized = two_pow_256();
        assert_eq!(target_to_average_attempts(&oversized), BigUint::zero());
        assert!(target_to_difficulty(&oversized) > 0.0);
    }

    #[test]
    fn test_hash_meets_target() {
        let target = CompactTarget::new(0x1d00ffff).target().clone();

        let mut good = [0u8; 32];
        good[25] = 0x12; // well below 0xffff << 208
        assert!(hash_meets_target(&Hash256::from_le_bytes(good), &target));

        let mut bad = [0u8; 32];
        bad[28] = 0x01;
        assert!(!hash_meets_target(&Hash256::from_le_bytes(bad), &target));
    }

    #[test]
    fn test_format_difficulty() {
        assert_eq!(format_difficulty(1.5), "1.50");
        assert_eq!(format_difficulty(2_500_000.0), "2.50M");
        assert_eq!(format_difficulty(3.2e12), "3.20T");
    }
}
