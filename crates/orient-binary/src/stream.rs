//! Cursor-based reader and writer over record bytes.
//!
//! Header entries in a binary record reference their values by absolute
//! offset, so both sides need more than sequential access: the [`Reader`]
//! can seek anywhere in the buffer, and the [`Writer`] can reserve a 4-byte
//! pointer slot and patch it once the value's position is known.

use crate::BinaryError;
use crate::varint::{
    MAX_VARINT32_BYTES, MAX_VARINT64_BYTES, decode_varint, encode_varint, zigzag_decode32,
    zigzag_decode64, zigzag_encode32, zigzag_encode64,
};

/// Read cursor over a borrowed byte buffer.
///
/// Every read either returns a complete value or fails with
/// [`BinaryError::UnexpectedEndOfStream`]; the cursor does not move on failure.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Create a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current absolute position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total length of the underlying buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the underlying buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Move the cursor to an absolute position. Seeking to the end is allowed.
    pub fn seek(&mut self, pos: usize) -> Result<(), BinaryError> {
        if pos > self.data.len() {
            return Err(BinaryError::malformed(format!(
                "offset {pos} outside buffer of {} bytes",
                self.data.len()
            )));
        }
        self.pos = pos;
        Ok(())
    }

    /// Advance the cursor by `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<(), BinaryError> {
        self.read_bytes(n).map(|_| ())
    }

    /// Read `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], BinaryError> {
        let end = self.pos.checked_add(len).ok_or(BinaryError::UnexpectedEndOfStream {
            needed: usize::MAX,
            available: self.remaining(),
        })?;
        let slice = self
            .data
            .get(self.pos..end)
            .ok_or(BinaryError::UnexpectedEndOfStream {
                needed: len,
                available: self.remaining(),
            })?;
        self.pos = end;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], BinaryError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_byte(&mut self) -> Result<u8, BinaryError> {
        let [b] = self.read_array::<1>()?;
        Ok(b)
    }

    /// Any non-zero byte reads as `true`.
    pub fn read_bool(&mut self) -> Result<bool, BinaryError> {
        Ok(self.read_byte()? != 0)
    }

    pub fn read_i16(&mut self) -> Result<i16, BinaryError> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, BinaryError> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, BinaryError> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, BinaryError> {
        Ok(f32::from_be_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, BinaryError> {
        Ok(f64::from_be_bytes(self.read_array()?))
    }

    fn read_raw_varint(&mut self, max_bytes: usize) -> Result<u64, BinaryError> {
        let rest = self.data.get(self.pos..).unwrap_or_default();
        let (value, used) = decode_varint(rest, max_bytes)?;
        self.pos += used;
        Ok(value)
    }

    /// Read a zigzag varint that must fit in 32 bits.
    pub fn read_varint32(&mut self) -> Result<i32, BinaryError> {
        let start = self.pos;
        let raw = self.read_raw_varint(MAX_VARINT32_BYTES)?;
        let raw = u32::try_from(raw).map_err(|_| {
            self.pos = start;
            BinaryError::malformed(format!("varint at offset {start} overflows 32 bits"))
        })?;
        Ok(zigzag_decode32(raw))
    }

    /// Read a zigzag varint of up to 64 bits.
    pub fn read_varint64(&mut self) -> Result<i64, BinaryError> {
        Ok(zigzag_decode64(self.read_raw_varint(MAX_VARINT64_BYTES)?))
    }

    /// Read a varint length prefix, rejecting negative values.
    pub fn read_len(&mut self) -> Result<usize, BinaryError> {
        let start = self.pos;
        let len = self.read_varint32()?;
        usize::try_from(len).map_err(|_| {
            BinaryError::malformed(format!("negative length {len} at offset {start}"))
        })
    }

    /// Read a length-prefixed byte sequence.
    pub fn read_binary(&mut self) -> Result<&'a [u8], BinaryError> {
        let len = self.read_len()?;
        self.read_bytes(len)
    }

    /// Read a length-prefixed UTF-8 string. Length zero is the empty string.
    pub fn read_string(&mut self) -> Result<String, BinaryError> {
        let bytes = self.read_binary()?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| BinaryError::InvalidUtf8)
    }
}

/// Position of a reserved 4-byte pointer slot in a [`Writer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerSlot(usize);

impl PointerSlot {
    /// Position of the slot inside the writer.
    pub fn position(self) -> usize {
        self.0
    }
}

/// Growable write buffer with pointer patch-up.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct Writer {
    data: Vec<u8>,
}

impl Writer {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Create an empty writer with preallocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far, which is also the next write position.
    pub fn position(&self) -> usize {
        self.data.len()
    }

    pub fn write_byte(&mut self, b: u8) {
        self.data.push(b);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.data.push(u8::from(v));
    }

    pub fn write_i16(&mut self, v: i16) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn write_varint32(&mut self, v: i32) {
        encode_varint(u64::from(zigzag_encode32(v)), &mut self.data);
    }

    pub fn write_varint64(&mut self, v: i64) {
        encode_varint(zigzag_encode64(v), &mut self.data);
    }

    /// Write a length prefix. Lengths beyond `i32::MAX` cannot be represented.
    pub fn write_len(&mut self, len: usize) -> Result<(), BinaryError> {
        let len = i32::try_from(len)
            .map_err(|_| BinaryError::malformed(format!("length {len} exceeds i32 range")))?;
        self.write_varint32(len);
        Ok(())
    }

    /// Write a length-prefixed byte sequence.
    pub fn write_binary(&mut self, bytes: &[u8]) -> Result<(), BinaryError> {
        self.write_len(bytes.len())?;
        self.write_bytes(bytes);
        Ok(())
    }

    /// Write a length-prefixed UTF-8 string.
    pub fn write_string(&mut self, s: &str) -> Result<(), BinaryError> {
        self.write_binary(s.as_bytes())
    }

    /// Reserve a zeroed 4-byte pointer slot to be filled by [`Writer::patch_pointer`].
    pub fn reserve_pointer(&mut self) -> PointerSlot {
        let slot = PointerSlot(self.data.len());
        self.data.extend_from_slice(&[0; 4]);
        slot
    }

    /// Overwrite a reserved slot with a big-endian pointer value.
    pub fn patch_pointer(&mut self, slot: PointerSlot, value: i32) -> Result<(), BinaryError> {
        let len = self.data.len();
        self.data
            .get_mut(slot.0..slot.0 + 4)
            .ok_or(BinaryError::UnexpectedEndOfStream {
                needed: slot.0 + 4,
                available: len,
            })?
            .copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Get the bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the writer and return the bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl From<Writer> for Vec<u8> {
    fn from(writer: Writer) -> Self {
        writer.data
    }
}

impl AsRef<[u8]> for Writer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
