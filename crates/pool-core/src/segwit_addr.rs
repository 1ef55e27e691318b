//! Bech32 and Bech32m segwit address encoding (BIP173 / BIP350).
//!
//! Witness version 0 uses the Bech32 checksum, versions 1 to 16 use Bech32m.

use crate::error::{DataError, Result};

const BECH32_CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const BECH32M_CONST: u32 = 0x2bc830a3;
const MAX_LENGTH: usize = 90;
const CHECKSUM_LENGTH: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Bech32,
    Bech32m,
}

impl Variant {
    fn constant(self) -> u32 {
        match self {
            Variant::Bech32 => 1,
            Variant::Bech32m => BECH32M_CONST,
        }
    }

    fn for_witness_version(witver: u8) -> Self {
        if witver == 0 {
            Variant::Bech32
        } else {
            Variant::Bech32m
        }
    }
}

fn invalid(reason: impl Into<String>) -> DataError {
    DataError::InvalidAddress(reason.into())
}

fn hrp_expand(hrp: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(hrp.len() * 2 + 1);
    result.extend(hrp.bytes().map(|c| c >> 5));
    result.push(0);
    result.extend(hrp.bytes().map(|c| c & 31));
    result
}

fn bech32_polymod(values: impl IntoIterator<Item = u8>) -> u32 {
    const GEN: [u32; 5] = [0x3b6a57b2, 0x26508e6d, 0x1ea119fa, 0x3d4233dd, 0x2a1462b3];

    let mut chk: u32 = 1;
    for value in values {
        let top = chk >> 25;
        chk = ((chk & 0x1ffffff) << 5) ^ (value as u32);
        for (i, &g) in GEN.iter().enumerate() {
            if (top >> i) & 1 == 1 {
                chk ^= g;
            }
        }
    }
    chk
}

fn create_checksum(hrp: &str, data: &[u8], variant: Variant) -> [u8; CHECKSUM_LENGTH] {
    let values = hrp_expand(hrp)
        .into_iter()
        .chain(data.iter().copied())
        .chain([0u8; CHECKSUM_LENGTH]);
    let polymod = bech32_polymod(values) ^ variant.constant();

    let mut checksum = [0u8; CHECKSUM_LENGTH];
    for (i, item) in checksum.iter_mut().enumerate() {
        *item = ((polymod >> (5 * (5 - i))) & 31) as u8;
    }
    checksum
}

/// Regroup a bit stream from `from_bits`-wide to `to_bits`-wide values.
pub fn convert_bits(data: &[u8], from_bits: u8, to_bits: u8, pad: bool) -> Result<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u8 = 0;
    let mut result = Vec::with_capacity(data.len() * from_bits as usize / to_bits as usize + 1);
    let max_value = (1u32 << to_bits) - 1;

    for &value in data {
        if (value as u32) >> from_bits != 0 {
            return Err(invalid("value out of range in bech32 data"));
        }
        acc = ((acc << from_bits) | value as u32) & 0xfff;
        bits += from_bits;

        while bits >= to_bits {
            bits -= to_bits;
            result.push(((acc >> bits) & max_value) as u8);
        }
    }

    if pad {
        if bits > 0 {
            result.push(((acc << (to_bits - bits)) & max_value) as u8);
        }
    } else if bits >= from_bits || ((acc << (to_bits - bits)) & max_value) != 0 {
        return Err(invalid("invalid padding in bech32 data"));
    }

    Ok(result)
}

/// Encode 5-bit `data` under `hrp` with the given checksum variant.
pub fn bech32_encode(hrp: &str, data: &[u8], variant: Variant) -> String {
    let checksum = create_checksum(hrp, data, variant);
    let mut out = String::with_capacity(hrp.len() + 1 + data.len() + CHECKSUM_LENGTH);
    out.push_str(hrp);
    out.push('1');
    for &d in data.iter().chain(checksum.iter()) {
        out.push(BECH32_CHARSET[d as usize] as char);
    }
    out
}

/// Split a bech32 string into its lowercase HRP, 5-bit data (checksum
/// removed) and the checksum variant it validates under.
pub fn bech32_decode(input: &str) -> Result<(String, Vec<u8>, Variant)> {
    if input.len() > MAX_LENGTH {
        return Err(invalid(format!("bech32 string of {} chars is too long", input.len())));
    }
    if input.bytes().any(|c| !(33..=126).contains(&c)) {
        return Err(invalid("bech32 string has characters outside printable ASCII"));
    }
    let has_lower = input.bytes().any(|c| c.is_ascii_lowercase());
    let has_upper = input.bytes().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        return Err(invalid("bech32 string has mixed case"));
    }

    let lower = input.to_ascii_lowercase();
    let sep_pos = lower
        .rfind('1')
        .ok_or_else(|| invalid("bech32 separator not found"))?;
    if sep_pos == 0 || sep_pos + 1 + CHECKSUM_LENGTH > lower.len() {
        return Err(invalid("invalid bech32 separator position"));
    }

    let hrp = &lower[..sep_pos];
    let data = lower[sep_pos + 1..]
        .bytes()
        .map(|c| {
            BECH32_CHARSET
                .iter()
                .position(|&x| x == c)
                .map(|idx| idx as u8)
                .ok_or_else(|| invalid(format!("invalid bech32 character {:?}", c as char)))
        })
        .collect::<Result<Vec<u8>>>()?;

    let variant = match bech32_polymod(hrp_expand(hrp).into_iter().chain(data.iter().copied())) {
        1 => Variant::Bech32,
        BECH32M_CONST => Variant::Bech32m,
        _ => return Err(invalid("invalid bech32 checksum")),
    };

    let payload_len = data.len() - CHECKSUM_LENGTH;
    let mut payload = data;
    payload.truncate(payload_len);
    Ok((hrp.to_string(), payload, variant))
}

fn check_program(witver: u8, program: &[u8]) -> Result<()> {
    if witver > 16 {
        return Err(invalid(format!("invalid witness version {}", witver)));
    }
    if !(2..=40).contains(&program.len()) {
        return Err(invalid(format!(
            "invalid witness program length {}",
            program.len()
        )));
    }
    if witver == 0 && program.len() != 20 && program.len() != 32 {
        return Err(invalid(format!(
            "invalid v0 witness program length {}",
            program.len()
        )));
    }
    Ok(())
}

/// Decode a segwit address, requiring the given HRP.
pub fn decode(hrp: &str, addr: &str) -> Result<(u8, Vec<u8>)> {
    let (found_hrp, data, variant) = bech32_decode(addr)?;
    if found_hrp != hrp {
        return Err(invalid(format!(
            "address prefix {:?} does not match {:?}",
            found_hrp, hrp
        )));
    }

    let (&witver, program_bits) = data
        .split_first()
        .ok_or_else(|| invalid("missing witness version"))?;
    let program = convert_bits(program_bits, 5, 8, false)?;
    check_program(witver, &program)?;

    if variant != Variant::for_witness_version(witver) {
        return Err(invalid(format!(
            "witness version {} with {:?} checksum",
            witver, variant
        )));
    }

    Ok((witver, program))
}

/// Encode a segwit address.
pub fn encode(hrp: &str, witver: u8, program: &[u8]) -> Result<String> {
    check_program(witver, program)?;
    let mut data = vec![witver];
    data.extend(convert_bits(program, 8, 5, true)?);
    Ok(bech32_encode(
        hrp,
        &data,
        Variant::for_witness_version(witver),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bip173_p2wpkh() {
        let address = "BC1QW508D6QEJXTDG4Y5R3ZARVARY0C5XW7KV8F3T4";
        let (witver, program) = decode("bc", address).unwrap();

        assert_eq!(witver, 0);
        assert_eq!(
            hex::encode(&program),
            "751e76e8199196d454941c45d1b3a323f1433bd6"
        );
        assert_eq!(
            encode("bc", witver, &program).unwrap(),
            address.to_lowercase()
        );
    }

    #[test]
    fn test_bip350_taproot() {
        let address = "bc1p0xlxvlhemja6c4dqv22uapctqupfhlxm9h8z3k2e72q4k9hcz7vqzk5jj0";
        let (witver, program) = decode("bc", address).unwrap();

        assert_eq!(witver, 1);
        assert_eq!(
            hex::encode(&program),
            "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
        assert_eq!(encode("bc", 1, &program).unwrap(), address);
    }

    #[test]
    fn test_veil_hrp_roundtrip() {
        let program = [0x42u8; 20];
        let address = encode("veil", 0, &program).unwrap();
        assert!(address.starts_with("veil1q"));
        assert_eq!(decode("veil", &address).unwrap(), (0, program.to_vec()));
    }

    #[test]
    fn test_wrong_hrp() {
        let address = encode("tveil", 0, &[0x01; 20]).unwrap();
        assert!(matches!(
            decode("veil", &address),
            Err(DataError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_checksum_variant_must_match_version() {
        let mut data = vec![0u8];
        data.extend(convert_bits(&[0x11; 20], 8, 5, true).unwrap());
        let address = bech32_encode("bc", &data, Variant::Bech32m);
        assert_eq!(bech32_decode(&address).unwrap().2, Variant::Bech32m);
        assert!(decode("bc", &address).is_err());
    }

    #[test]
    fn test_invalid_strings() {
        // Mixed case
        assert!(bech32_decode("bc1qW508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4").is_err());
        // Bad checksum
        assert!(bech32_decode("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t5").is_err());
        // No separator
        assert!(bech32_decode("pzry9x0s0muk").is_err());
        // Empty HRP
        assert!(bech32_decode("1pzry9x0s0muk").is_err());
        // Too long
        assert!(bech32_decode(&format!("bc1{}", "q".repeat(90))).is_err());
    }

    #[test]
    fn test_program_length_rules() {
        assert!(encode("bc", 0, &[0u8; 21]).is_err());
        assert!(encode("bc", 1, &[0u8; 1]).is_err());
        assert!(encode("bc", 1, &[0u8; 41]).is_err());
        assert!(encode("bc", 17, &[0u8; 20]).is_err());
        assert!(encode("bc", 2, &[0u8; 40]).is_ok());
    }
}
