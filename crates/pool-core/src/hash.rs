//! Hash primitives and the 256/160-bit integer types they produce.
//!
//! Hashes are stored in the byte order they travel on the wire, which is the
//! little-endian encoding of the integer they represent. Comparisons between
//! hashes and targets are integer comparisons.

use core::cmp::Ordering;
use core::fmt;
use core::str::FromStr;

use num_bigint::BigUint;
use ripemd::Ripemd160;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::{DataError, Result};

/// Bitcoin's double SHA256: SHA256(SHA256(data)).
///
/// This is used for block header hashing, transaction IDs, merkle trees and
/// address checksums.
#[inline]
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut result = [0u8; 32];
    result.copy_from_slice(&second);
    result
}

/// Single SHA256 hash.
#[inline]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let hash = Sha256::digest(data);
    let mut result = [0u8; 32];
    result.copy_from_slice(&hash);
    result
}

/// Double SHA256 as a 256-bit integer.
#[inline]
pub fn hash256(data: &[u8]) -> Hash256 {
    Hash256(double_sha256(data))
}

/// RIPEMD160(SHA256(data)) as a 160-bit integer.
pub fn hash160(data: &[u8]) -> Hash160 {
    let digest = Ripemd160::digest(sha256(data));
    let mut result = [0u8; 20];
    result.copy_from_slice(&digest);
    Hash160(result)
}

/// Reverse the byte order of a 32-byte array.
///
/// Hashes are displayed most significant byte first, the reverse of their
/// wire order.
#[inline]
pub fn reverse_bytes(bytes: &[u8; 32]) -> [u8; 32] {
    let mut reversed = *bytes;
    reversed.reverse();
    reversed
}

/// A 256-bit unsigned integer produced by [`hash256`] (or any PoW function).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    /// The zero hash, used as the "none" sentinel on the wire.
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    /// Wrap bytes given in wire (little-endian) order.
    pub const fn from_le_bytes(bytes: [u8; 32]) -> Self {
        Hash256(bytes)
    }

    /// Wrap bytes given in display (big-endian) order.
    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        Hash256(reverse_bytes(&bytes))
    }

    /// Wire (little-endian) bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Display (big-endian) bytes.
    pub fn to_be_bytes(&self) -> [u8; 32] {
        reverse_bytes(&self.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_le(&self.0)
    }

    /// Convert an integer to a hash, failing if it needs more than 256 bits.
    pub fn from_biguint(value: &BigUint) -> Result<Self> {
        let bytes = value.to_bytes_le();
        if bytes.len() > 32 {
            return Err(DataError::Encoding(format!(
                "integer of {} bits does not fit in 256 bits",
                value.bits()
            )));
        }
        let mut out = [0u8; 32];
        out[..bytes.len()].copy_from_slice(&bytes);
        Ok(Hash256(out))
    }
}

impl Ord for Hash256 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.iter().rev().cmp(other.0.iter().rev())
    }
}

impl PartialOrd for Hash256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_be_bytes()))
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self)
    }
}

impl FromStr for Hash256 {
    type Err = DataError;

    /// Parse the display (big-endian) hex form.
    fn from_str(s: &str) -> Result<Self> {
        let bytes: [u8; 32] = hex::decode(s)
            .map_err(|e| DataError::Encoding(format!("invalid hash hex: {}", e)))?
            .try_into()
            .map_err(|_| DataError::Encoding("hash must be 32 bytes".into()))?;
        Ok(Hash256::from_be_bytes(bytes))
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A 160-bit unsigned integer, normally a pubkey or script hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash160([u8; 20]);

impl Hash160 {
    /// Wrap bytes given in wire (little-endian) order. For a value produced by
    /// [`hash160`] these are the raw digest bytes.
    pub const fn from_le_bytes(bytes: [u8; 20]) -> Self {
        Hash160(bytes)
    }

    /// Wrap bytes given most significant first, as in a segwit program.
    pub fn from_be_bytes(mut bytes: [u8; 20]) -> Self {
        bytes.reverse();
        Hash160(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_be_bytes(&self) -> [u8; 20] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_le(&self.0)
    }
}

impl fmt::Display for Hash160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_be_bytes()))
    }
}

impl fmt::Debug for Hash160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash160({})", self)
    }
}

impl FromStr for Hash160 {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes: [u8; 20] = hex::decode(s)
            .map_err(|e| DataError::Encoding(format!("invalid hash hex: {}", e)))?
            .try_into()
            .map_err(|_| DataError::Encoding("hash160 must be 20 bytes".into()))?;
        Ok(Hash160::from_be_bytes(bytes))
    }
}

impl Serialize for Hash160 {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash160 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
