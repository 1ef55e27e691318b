//! Error types for the data layer.

use thiserror::Error;

/// Failures raised while encoding, decoding or validating pool data.
///
/// Every operation either succeeds completely or returns one of these; no
/// variant implies partial output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    /// Base58 record checksum did not match its payload.
    #[error("invalid checksum")]
    Checksum,

    /// Address is neither a valid base58 record nor a valid bech32 address
    /// for the selected network.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Merkle link cannot be evaluated against its branch.
    #[error("invalid merkle proof: {0}")]
    InvalidProof(String),

    /// Malformed or truncated wire data, or a value that does not fit its field.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Numeric input outside the domain of a target/difficulty function.
    #[error("domain error: {0}")]
    Domain(String),
}

pub type Result<T> = std::result::Result<T, DataError>;
