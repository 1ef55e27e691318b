//! Data layer of the Veil p2pool node.
//!
//! This crate provides pure Rust implementations of:
//! - Target, difficulty and compact "bits" arithmetic
//! - Merkle roots and merkle links
//! - Transaction, block header, block and aux-pow wire codecs
//! - Base58 and bech32 addresses and the output scripts they pay to
//! - Chain and share chain parameters for the supported networks

pub mod address;
pub mod block;
pub mod difficulty;
pub mod error;
pub mod hash;
pub mod merkle;
pub mod network;
pub mod pack;
pub mod peer_address;
pub mod segwit_addr;
pub mod transaction;

pub use address::{
    address_to_pubkey_hash, base58_decode, base58_encode, is_segwit_script,
    pubkey_hash_to_address, pubkey_hash_to_script2, pubkey_to_address, pubkey_to_script2,
    script2_to_address, script2_to_human,
};
pub use block::{make_auxpow_tree, AuxPow, AuxPowCoinbase, Block, BlockHeader, MerkleTx, StrippedBlock};
pub use difficulty::{
    average_attempts_to_target, difficulty_to_target, difficulty_to_target_alt,
    hash_meets_target, target_to_average_attempts, target_to_difficulty,
    target_to_difficulty_alt, CompactTarget,
};
pub use error::{DataError, Result};
pub use hash::{double_sha256, hash160, hash256, Hash160, Hash256};
pub use merkle::{calculate_merkle_link, check_merkle_link, merkle_hash, MerkleLink};
pub use network::{ChainParams, Network, PoolParams};
pub use pack::{Decode, Encode};
pub use peer_address::NetAddress;
pub use transaction::{
    get_txid, get_wtxid, is_segwit_tx, OutPoint, Transaction, TxIn, TxOut, WitnessData,
};
