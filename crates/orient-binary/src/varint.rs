//! Variable-length zigzag integer encoding.
//!
//! Every signed integer in a binary record (SHORT, INTEGER, LONG, DATETIME,
//! string and byte lengths, collection counts, optimized links) is first
//! zigzag-mapped to an unsigned value and then written as a little-endian
//! base-128 varint: seven payload bits per byte, high bit set while more
//! bytes follow.
//!
//! ```text
//!     0 -> 0x00        -1 -> 0x01        1 -> 0x02
//!    63 -> 0x7e       -64 -> 0x7f       64 -> 0x80 0x01
//! ```
//!
//! Decoding is bounded: a 32-bit value must terminate within
//! [`MAX_VARINT32_BYTES`] bytes and a 64-bit value within
//! [`MAX_VARINT64_BYTES`].

use crate::BinaryError;

/// Maximum encoded length of a 32-bit varint.
pub const MAX_VARINT32_BYTES: usize = 5;

/// Maximum encoded length of a 64-bit varint.
pub const MAX_VARINT64_BYTES: usize = 10;

/// Map a signed 32-bit integer onto an unsigned one, small magnitudes first.
#[inline]
pub fn zigzag_encode32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

/// Map a signed 64-bit integer onto an unsigned one, small magnitudes first.
#[inline]
pub fn zigzag_encode64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

/// Inverse of [`zigzag_encode32`].
#[inline]
pub fn zigzag_decode32(u: u32) -> i32 {
    ((u >> 1) as i32) ^ -((u & 1) as i32)
}

/// Inverse of [`zigzag_encode64`].
#[inline]
pub fn zigzag_decode64(u: u64) -> i64 {
    ((u >> 1) as i64) ^ -((u & 1) as i64)
}

/// Append the varint encoding of `value` to `buf`.
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            break;
        }
        buf.push(byte | 0x80);
    }
}

/// Number of bytes [`encode_varint`] produces for `value`.
pub fn varint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7).max(1)
}

/// Decode a varint from the start of `bytes`, returning `(value, bytes_consumed)`.
///
/// Fails with [`BinaryError::UnexpectedEndOfStream`] when the input ends before
/// the terminal byte and with [`BinaryError::VarintTooLong`] when no terminal
/// byte appears within `max_bytes`.
pub fn decode_varint(bytes: &[u8], max_bytes: usize) -> Result<(u64, usize), BinaryError> {
    let mut result: u64 = 0;
    let mut shift = 0u32;

    for (i, &byte) in bytes.iter().take(max_bytes).enumerate() {
        result |= u64::from(byte & 0x7f).wrapping_shl(shift);
        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
        shift += 7;
    }

    if bytes.len() >= max_bytes {
        Err(BinaryError::VarintTooLong { max_bytes })
    } else {
        Err(BinaryError::UnexpectedEndOfStream {
            needed: bytes.len() + 1,
            available: bytes.len(),
        })
    }
}

/// Zigzag-encode a signed value and return its varint bytes.
pub fn write_varint(value: i64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MAX_VARINT64_BYTES);
    encode_varint(zigzag_encode64(value), &mut buf);
    buf
}

/// Read a zigzag varint from the start of `bytes`, returning `(value, bytes_consumed)`.
pub fn read_varint(bytes: &[u8]) -> Result<(i64, usize), BinaryError> {
    let (raw, used) = decode_varint(bytes, MAX_VARINT64_BYTES)?;
    Ok((zigzag_decode64(raw), used))
}
