//! Human addresses and output scripts.
//!
//! Supports:
//! - Base58Check records `version ‖ pubkey_hash ‖ checksum`, used for
//!   pubkey hash (P2PKH) and script hash (P2SH) addresses
//! - Native segwit v0 addresses over the network's bech32 prefix
//!
//! A pubkey hash is a 160-bit integer. Base58 records and legacy scripts
//! carry it little-endian (the raw digest bytes), segwit programs carry it
//! big-endian.

use num_bigint::BigUint;
use tracing::{debug, trace};

use crate::error::{DataError, Result};
use crate::hash::{double_sha256, hash160, Hash160};
use crate::network::ChainParams;
use crate::pack::{read_bytes, read_u8, Decode, Encode};
use crate::segwit_addr;

const BASE58_ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Encode bytes as base58. Each leading zero byte becomes a leading `1`.
pub fn base58_encode(data: &[u8]) -> String {
    let zeros = data.iter().take_while(|&&b| b == 0).count();
    let mut out = "1".repeat(zeros);

    let rest = &data[zeros..];
    if !rest.is_empty() {
        let digits = BigUint::from_bytes_be(rest).to_radix_be(58);
        out.extend(digits.iter().map(|&d| BASE58_ALPHABET[d as usize] as char));
    }
    out
}

/// Decode base58. Each leading `1` becomes a leading zero byte.
pub fn base58_decode(input: &str) -> Result<Vec<u8>> {
    let zeros = input.bytes().take_while(|&c| c == b'1').count();
    let mut out = vec![0u8; zeros];

    let digits = input.as_bytes()[zeros..]
        .iter()
        .map(|&c| {
            BASE58_ALPHABET
                .iter()
                .position(|&x| x == c)
                .map(|d| d as u8)
                .ok_or_else(|| {
                    DataError::InvalidAddress(format!("invalid base58 character {:?}", c as char))
                })
        })
        .collect::<Result<Vec<u8>>>()?;

    if !digits.is_empty() {
        let value = BigUint::from_radix_be(&digits, 58)
            .ok_or_else(|| DataError::InvalidAddress("invalid base58 digits".into()))?;
        out.extend(value.to_bytes_be());
    }
    Ok(out)
}

/// A record followed by the first four bytes of its double SHA256.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksummed<T>(pub T);

impl<T: Encode> Encode for Checksummed<T> {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<()> {
        let start = out.len();
        self.0.encode_to(out)?;
        let checksum = double_sha256(&out[start..]);
        out.extend_from_slice(&checksum[..4]);
        Ok(())
    }
}

impl<T: Decode> Decode for Checksummed<T> {
    fn decode_from(buf: &mut &[u8]) -> Result<Self> {
        let start = *buf;
        let inner = T::decode_from(buf)?;
        let payload = &start[..start.len() - buf.len()];
        let checksum: [u8; 4] = read_bytes(buf)?;
        if checksum[..] != double_sha256(payload)[..4] {
            return Err(DataError::Checksum);
        }
        Ok(Checksummed(inner))
    }
}

/// Payload of a base58 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanAddress {
    pub version: u8,
    pub pubkey_hash: Hash160,
}

impl Encode for HumanAddress {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(self.version);
        self.pubkey_hash.encode_to(out)
    }
}

impl Decode for HumanAddress {
    fn decode_from(buf: &mut &[u8]) -> Result<Self> {
        Ok(HumanAddress {
            version: read_u8(buf)?,
            pubkey_hash: Hash160::decode_from(buf)?,
        })
    }
}

/// Base58Check address for any version byte.
pub fn encode_base58_address(pubkey_hash: &Hash160, version: u8) -> Result<String> {
    let record = Checksummed(HumanAddress {
        version,
        pubkey_hash: *pubkey_hash,
    });
    Ok(base58_encode(&record.encode()?))
}

/// Decode a Base58Check address without checking its version.
pub fn decode_base58_address(address: &str) -> Result<HumanAddress> {
    let Checksummed(record) = Checksummed::<HumanAddress>::decode(&base58_decode(address)?)?;
    Ok(record)
}

/// Address of a pubkey hash. Version 0 selects a segwit v0 address.
pub fn pubkey_hash_to_address(
    pubkey_hash: &Hash160,
    version: u8,
    net: &ChainParams,
) -> Result<String> {
    if version == 0 {
        return segwit_addr::encode(net.human_readable_part, 0, &pubkey_hash.to_be_bytes());
    }
    encode_base58_address(pubkey_hash, version)
}

pub fn pubkey_to_address(pubkey: &[u8], net: &ChainParams) -> Result<String> {
    pubkey_hash_to_address(&hash160(pubkey), net.address_version, net)
}

type AddressDecoder = fn(&str, &ChainParams) -> Result<(Hash160, u8)>;

/// Decoders tried in order; the first success wins.
const ADDRESS_DECODERS: [(&str, AddressDecoder); 2] = [
    ("base58", decode_base58_for_net),
    ("bech32", decode_bech32_for_net),
];

fn decode_base58_for_net(address: &str, net: &ChainParams) -> Result<(Hash160, u8)> {
    let record = decode_base58_address(address)?;
    if record.version != net.address_version && record.version != net.segwit_address_version {
        return Err(DataError::InvalidAddress(format!(
            "address version {} not for {}",
            record.version, net.name
        )));
    }
    Ok((record.pubkey_hash, record.version))
}

fn decode_bech32_for_net(address: &str, net: &ChainParams) -> Result<(Hash160, u8)> {
    let (witver, program) = segwit_addr::decode(net.human_readable_part, address)?;
    if witver != 0 {
        return Err(DataError::InvalidAddress(format!(
            "unsupported witness version {}",
            witver
        )));
    }
    let program: [u8; 20] = program.try_into().map_err(|p: Vec<u8>| {
        DataError::InvalidAddress(format!("witness program of {} bytes", p.len()))
    })?;
    Ok((Hash160::from_be_bytes(program), 0))
}

/// Pubkey hash and version of an address on `net`.
pub fn address_to_pubkey_hash(address: &str, net: &ChainParams) -> Result<(Hash160, u8)> {
    for (strategy, decoder) in ADDRESS_DECODERS {
        match decoder(address, net) {
            Ok(decoded) => return Ok(decoded),
            Err(e) => trace!(strategy, error = %e, "address decode strategy failed"),
        }
    }
    Err(DataError::InvalidAddress(format!(
        "{:?} is not a valid {} address",
        address, net.name
    )))
}

const OP_0: u8 = 0x00;
const OP_DUP: u8 = 0x76;
const OP_EQUAL: u8 = 0x87;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_HASH160: u8 = 0xa9;
const OP_CHECKSIG: u8 = 0xac;
const PUSH_20: u8 = 0x14;

/// `<pubkey> OP_CHECKSIG`
pub fn pubkey_to_script2(pubkey: &[u8]) -> Result<Vec<u8>> {
    if pubkey.len() > 75 {
        return Err(DataError::Encoding(format!(
            "pubkey of {} bytes does not fit a direct push",
            pubkey.len()
        )));
    }
    let mut script = Vec::with_capacity(pubkey.len() + 2);
    script.push(pubkey.len() as u8);
    script.extend_from_slice(pubkey);
    script.push(OP_CHECKSIG);
    Ok(script)
}

/// Output script paying a pubkey hash of the given address version.
pub fn pubkey_hash_to_script2(pubkey_hash: &Hash160, version: u8, net: &ChainParams) -> Vec<u8> {
    if version == 0 {
        // OP_0 <20-byte program>
        let mut script = Vec::with_capacity(22);
        script.extend_from_slice(&[OP_0, PUSH_20]);
        script.extend_from_slice(&pubkey_hash.to_be_bytes());
        return script;
    }
    if version == net.segwit_address_version {
        // OP_HASH160 <20-byte-hash> OP_EQUAL
        let mut script = Vec::with_capacity(23);
        script.extend_from_slice(&[OP_HASH160, PUSH_20]);
        script.extend_from_slice(pubkey_hash.as_bytes());
        script.push(OP_EQUAL);
        return script;
    }
    // OP_DUP OP_HASH160 <20-byte-hash> OP_EQUALVERIFY OP_CHECKSIG
    let mut script = Vec::with_capacity(25);
    script.extend_from_slice(&[OP_DUP, OP_HASH160, PUSH_20]);
    script.extend_from_slice(pubkey_hash.as_bytes());
    script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    script
}

fn hash_at(script: &[u8], start: usize) -> Option<[u8; 20]> {
    script.get(start..start + 20)?.try_into().ok()
}

fn match_pubkey(script: &[u8], net: &ChainParams) -> Option<String> {
    if script.len() < 2 {
        return None;
    }
    let pubkey = &script[1..script.len() - 1];
    if pubkey_to_script2(pubkey).ok()? != script {
        return None;
    }
    pubkey_to_address(pubkey, net).ok()
}

fn match_template(
    script: &[u8],
    net: &ChainParams,
    version: u8,
    hash_start: usize,
    from_bytes: fn([u8; 20]) -> Hash160,
) -> Option<String> {
    let pubkey_hash = from_bytes(hash_at(script, hash_start)?);
    if pubkey_hash_to_script2(&pubkey_hash, version, net) != script {
        return None;
    }
    pubkey_hash_to_address(&pubkey_hash, version, net).ok()
}

fn match_pubkey_hash(script: &[u8], net: &ChainParams) -> Option<String> {
    match_template(script, net, net.address_version, 3, Hash160::from_le_bytes)
}

fn match_witness_v0(script: &[u8], net: &ChainParams) -> Option<String> {
    match_template(script, net, 0, 2, Hash160::from_be_bytes)
}

fn match_script_hash(script: &[u8], net: &ChainParams) -> Option<String> {
    match_template(script, net, net.segwit_address_version, 2, Hash160::from_le_bytes)
}

type ScriptMatcher = fn(&[u8], &ChainParams) -> Option<String>;

/// Output script templates tried in order.
const SCRIPT_TEMPLATES: [ScriptMatcher; 4] = [
    match_pubkey,
    match_pubkey_hash,
    match_witness_v0,
    match_script_hash,
];

/// Address paid by an output script, if it matches a known template.
pub fn script2_to_address(script: &[u8], net: &ChainParams) -> Option<String> {
    let address = SCRIPT_TEMPLATES
        .iter()
        .find_map(|matcher| matcher(script, net));
    if address.is_none() {
        debug!(script = %hex::encode(script), "unrecognized output script");
    }
    address
}

/// One-line description of an output script for display.
pub fn script2_to_human(script: &[u8], net: &ChainParams) -> String {
    if let Some(address) = match_pubkey(script, net) {
        return format!("Pubkey. Address: {}", address);
    }
    if let Some(address) = match_pubkey_hash(script, net) {
        return format!("Address. Address: {}", address);
    }
    format!("Unknown. Script: {}", hex::encode(script))
}

/// True for scripts starting like a v0 witness program or a P2SH output.
pub fn is_segwit_script(script: &[u8]) -> bool {
    script.starts_with(&[OP_0, PUSH_20]) || script.starts_with(&[OP_HASH160, PUSH_20])
}
