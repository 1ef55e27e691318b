//! Primitive wire codec shared by every record in the crate.
//!
//! All integers are little-endian unless a function says otherwise. Records
//! are built by composing these primitives inside [`Encode`] and [`Decode`]
//! implementations.
//!
//! VarInt rules:
//! - value < 0xfd: single byte
//! - value <= 0xffff: 0xfd prefix + 2 bytes
//! - value <= 0xffffffff: 0xfe prefix + 4 bytes
//! - otherwise: 0xff prefix + 8 bytes
//!
//! Non-minimal prefixes are accepted on read.

use bytes::{Buf, BufMut};

use crate::error::{DataError, Result};
use crate::hash::{Hash160, Hash256};

/// A value with a fixed wire layout.
pub trait Encode {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<()>;

    fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode_to(&mut out)?;
        Ok(out)
    }
}

/// A value that can be read back from its wire layout.
pub trait Decode: Sized {
    /// Read one value from the front of `buf`, advancing it.
    fn decode_from(buf: &mut &[u8]) -> Result<Self>;

    /// Read one value that must span all of `data`.
    fn decode(data: &[u8]) -> Result<Self> {
        let mut buf = data;
        let value = Self::decode_from(&mut buf)?;
        if buf.has_remaining() {
            return Err(DataError::Encoding(format!(
                "{} bytes of extra data after record",
                buf.remaining()
            )));
        }
        Ok(value)
    }
}

fn need(buf: &[u8], len: usize, what: &str) -> Result<()> {
    if buf.remaining() < len {
        return Err(DataError::Encoding(format!(
            "need {} bytes for {}, {} left",
            len,
            what,
            buf.remaining()
        )));
    }
    Ok(())
}

pub fn read_u8(buf: &mut &[u8]) -> Result<u8> {
    need(buf, 1, "u8")?;
    Ok(buf.get_u8())
}

pub fn read_u16(buf: &mut &[u8]) -> Result<u16> {
    need(buf, 2, "u16")?;
    Ok(buf.get_u16_le())
}

pub fn read_u16_be(buf: &mut &[u8]) -> Result<u16> {
    need(buf, 2, "u16")?;
    Ok(buf.get_u16())
}

pub fn read_u32(buf: &mut &[u8]) -> Result<u32> {
    need(buf, 4, "u32")?;
    Ok(buf.get_u32_le())
}

pub fn read_u64(buf: &mut &[u8]) -> Result<u64> {
    need(buf, 8, "u64")?;
    Ok(buf.get_u64_le())
}

pub fn read_bytes<const N: usize>(buf: &mut &[u8]) -> Result<[u8; N]> {
    need(buf, N, "fixed bytes")?;
    let mut out = [0u8; N];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

/// Encode a variable-length integer.
pub fn write_varint(out: &mut Vec<u8>, value: u64) {
    if value < 0xfd {
        out.put_u8(value as u8);
    } else if value <= 0xffff {
        out.put_u8(0xfd);
        out.put_u16_le(value as u16);
    } else if value <= 0xffff_ffff {
        out.put_u8(0xfe);
        out.put_u32_le(value as u32);
    } else {
        out.put_u8(0xff);
        out.put_u64_le(value);
    }
}

pub fn read_varint(buf: &mut &[u8]) -> Result<u64> {
    match read_u8(buf)? {
        0xfd => Ok(read_u16(buf)? as u64),
        0xfe => Ok(read_u32(buf)? as u64),
        0xff => read_u64(buf),
        b => Ok(b as u64),
    }
}

/// Read a varint that is about to size an allocation or a loop.
pub fn read_count(buf: &mut &[u8]) -> Result<usize> {
    let count = read_varint(buf)?;
    usize::try_from(count)
        .map_err(|_| DataError::Encoding(format!("length {} does not fit in memory", count)))
}

/// Encode a varint length prefix followed by the bytes.
pub fn write_varstr(out: &mut Vec<u8>, data: &[u8]) {
    write_varint(out, data.len() as u64);
    out.put_slice(data);
}

pub fn read_varstr(buf: &mut &[u8]) -> Result<Vec<u8>> {
    let len = read_count(buf)?;
    need(buf, len, "varstr body")?;
    let mut data = vec![0u8; len];
    buf.copy_to_slice(&mut data);
    Ok(data)
}

/// Encode a varint count followed by each item.
pub fn write_list<T: Encode>(out: &mut Vec<u8>, items: &[T]) -> Result<()> {
    write_varint(out, items.len() as u64);
    for item in items {
        item.encode_to(out)?;
    }
    Ok(())
}

pub fn read_list<T: Decode>(buf: &mut &[u8]) -> Result<Vec<T>> {
    read_list_with(buf, T::decode_from)
}

/// Read a varint count followed by that many items produced by `read_item`.
pub fn read_list_with<T, F>(buf: &mut &[u8], mut read_item: F) -> Result<Vec<T>>
where
    F: FnMut(&mut &[u8]) -> Result<T>,
{
    let count = read_count(buf)?;
    read_items(buf, count, &mut read_item)
}

/// Read exactly `count` items with no length prefix.
pub fn read_items<T, F>(buf: &mut &[u8], count: usize, mut read_item: F) -> Result<Vec<T>>
where
    F: FnMut(&mut &[u8]) -> Result<T>,
{
    // Every item takes at least one byte.
    let mut items = Vec::with_capacity(count.min(buf.remaining()));
    for _ in 0..count {
        items.push(read_item(buf)?);
    }
    Ok(items)
}

/// Encode a list of byte strings (a witness stack).
pub fn write_varstr_list(out: &mut Vec<u8>, items: &[Vec<u8>]) {
    write_varint(out, items.len() as u64);
    for item in items {
        write_varstr(out, item);
    }
}

pub fn read_varstr_list(buf: &mut &[u8]) -> Result<Vec<Vec<u8>>> {
    read_list_with(buf, read_varstr)
}

/// Write `value`, or `none_value` when absent.
///
/// Writing `Some(none_value)` is rejected because it would read back as `None`.
pub fn write_possibly_none<T: Encode + PartialEq>(
    out: &mut Vec<u8>,
    value: &Option<T>,
    none_value: &T,
) -> Result<()> {
    match value {
        Some(v) if v == none_value => Err(DataError::Encoding(
            "sentinel value used for a present field".into(),
        )),
        Some(v) => v.encode_to(out),
        None => none_value.encode_to(out),
    }
}

pub fn read_possibly_none<T: Decode + PartialEq>(
    buf: &mut &[u8],
    none_value: &T,
) -> Result<Option<T>> {
    let value = T::decode_from(buf)?;
    Ok(if &value == none_value { None } else { Some(value) })
}

impl Encode for u32 {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_u32_le(*self);
        Ok(())
    }
}

impl Decode for u32 {
    fn decode_from(buf: &mut &[u8]) -> Result<Self> {
        read_u32(buf)
    }
}

impl Encode for Hash256 {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_slice(self.as_bytes());
        Ok(())
    }
}

impl Decode for Hash256 {
    fn decode_from(buf: &mut &[u8]) -> Result<Self> {
        Ok(Hash256::from_le_bytes(read_bytes(buf)?))
    }
}

impl Encode for Hash160 {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_slice(self.as_bytes());
        Ok(())
    }
}

impl Decode for Hash160 {
    fn decode_from(buf: &mut &[u8]) -> Result<Self> {
        Ok(Hash160::from_le_bytes(read_bytes(buf)?))
    }
}
