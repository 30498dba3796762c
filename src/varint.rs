//! LEB128 variable-length integers and fixed-width little-endian integers.
//!
//! Compact arrays and objects carry two LEB128 fields: the total byte length right after the
//! tag, and the member count at the very end. The count is stored so that it reads back when
//! scanned from the last byte toward the front.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Number of bytes needed to LEB128-encode `v`.
pub fn encoded_len(mut v: u64) -> usize {
    let mut len = 1;
    while v >= 0x80 {
        v >>= 7;
        len += 1;
    }
    len
}

/// Append `v` as forward LEB128.
pub fn write(buf: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        buf.push((v as u8) | 0x80);
        v >>= 7;
    }
    buf.push(v as u8);
}

/// Write `v` as forward LEB128 into `dst`, which must be exactly `encoded_len(v)` bytes long.
pub fn store(dst: &mut [u8], mut v: u64) {
    for b in dst.iter_mut() {
        *b = (v as u8 & 0x7f) | if v >= 0x80 { 0x80 } else { 0 };
        v >>= 7;
    }
}

/// Append `v` so that it reads back with [`read_reversed`] starting at the last byte.
pub fn write_reversed(buf: &mut Vec<u8>, v: u64) {
    let start = buf.len();
    write(buf, v);
    buf[start..].reverse();
}

/// Read a forward LEB128 integer starting at `pos`.
pub fn read(data: &[u8], pos: usize) -> Result<u64> {
    let mut v = 0u64;
    let mut shift = 0;
    let mut idx = pos;
    loop {
        let b = *data.get(idx).ok_or(Error::LengthTooShort {
            step: "read LEB128",
            actual: data.len(),
            expected: idx + 1,
        })?;
        if shift >= 64 {
            return Err(Error::Internal("LEB128 value wider than 64 bits"));
        }
        v |= ((b & 0x7f) as u64) << shift;
        shift += 7;
        idx += 1;
        if b & 0x80 == 0 {
            return Ok(v);
        }
    }
}

/// Read a reversed LEB128 integer whose first group is stored at `last` and whose remaining
/// groups run toward the front of `data`.
pub fn read_reversed(data: &[u8], last: usize) -> Result<u64> {
    if last >= data.len() {
        return Err(Error::LengthTooShort {
            step: "read reversed LEB128",
            actual: data.len(),
            expected: last + 1,
        });
    }
    let mut v = 0u64;
    let mut shift = 0;
    let mut idx = last;
    loop {
        let b = data[idx];
        if shift >= 64 {
            return Err(Error::Internal("LEB128 value wider than 64 bits"));
        }
        v |= ((b & 0x7f) as u64) << shift;
        shift += 7;
        if b & 0x80 == 0 {
            return Ok(v);
        }
        idx = idx.checked_sub(1).ok_or(Error::Internal(
            "reversed LEB128 runs past the start of the value",
        ))?;
    }
}

/// Read a little-endian unsigned integer of 1 to 8 bytes starting at `pos`.
pub fn read_uint_le(data: &[u8], pos: usize, width: usize) -> Result<u64> {
    debug_assert!((1..=8).contains(&width));
    let end = pos.checked_add(width).ok_or(Error::Internal("offset overflow"))?;
    let bytes = data.get(pos..end).ok_or(Error::LengthTooShort {
        step: "read fixed-width integer",
        actual: data.len(),
        expected: end,
    })?;
    Ok(LittleEndian::read_uint(bytes, width))
}

/// Write the low `dst.len()` bytes of `v` in little-endian order.
pub fn store_uint_le(dst: &mut [u8], v: u64) {
    let width = dst.len();
    debug_assert!((1..=8).contains(&width));
    LittleEndian::write_uint(dst, v, width);
}
