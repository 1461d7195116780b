//! Parcel primitives: an append-only writer and a bounds-checked reader.
//!
//! Numbers are little-endian fixed width; strings and blobs carry a u32
//! length prefix. Every length coming off the wire is validated against
//! the remaining input before it is consumed, so a malformed parcel
//! fails with a precise error instead of panicking or over-reading.

use crate::error::CodecError;

/// An append-only buffer for building wire parcels.
///
/// # Examples
///
/// ```
/// use syncbell::wire::{Parcel, ParcelReader};
///
/// let mut parcel = Parcel::new();
/// parcel.write_u32(7);
/// parcel.write_string("dev-A");
///
/// let mut reader = ParcelReader::new(parcel.as_bytes());
/// assert_eq!(reader.read_u32().unwrap(), 7);
/// assert_eq!(reader.read_string().unwrap(), "dev-A");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Parcel {
    buf: Vec<u8>,
}

impl Parcel {
    /// Creates an empty parcel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty parcel with pre-allocated space.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if nothing has been written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the parcel, returning the encoded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Appends one raw byte. Used for value tags.
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Appends a bool as a single `0`/`1` byte.
    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    /// Appends a little-endian i32.
    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Appends a little-endian u32.
    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Appends a little-endian i64.
    pub fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Appends a little-endian IEEE 754 double.
    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Appends a u32 length prefix followed by the UTF-8 bytes.
    pub fn write_string(&mut self, value: &str) {
        self.write_u32(value.len() as u32);
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Appends a u32 length prefix followed by the raw bytes.
    pub fn write_blob(&mut self, value: &[u8]) {
        self.write_u32(value.len() as u32);
        self.buf.extend_from_slice(value);
    }
}

/// A bounds-checked cursor over an encoded parcel.
#[derive(Debug)]
pub struct ParcelReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ParcelReader<'a> {
    /// Wraps a byte slice for reading.
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Returns true once every byte has been consumed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if len > self.remaining() {
            return Err(CodecError::BufferUnderflow {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Reads one raw byte.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::BufferUnderflow` if the input is exhausted.
    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    /// Reads a bool byte.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::InvalidBool` for any byte other than `0` or `1`.
    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            byte => Err(CodecError::InvalidBool { byte }),
        }
    }

    /// Reads a little-endian i32.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::BufferUnderflow` if fewer than 4 bytes remain.
    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(i32::from_le_bytes(raw))
    }

    /// Reads a little-endian u32.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::BufferUnderflow` if fewer than 4 bytes remain.
    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(raw))
    }

    /// Reads a little-endian i64.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::BufferUnderflow` if fewer than 8 bytes remain.
    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(i64::from_le_bytes(raw))
    }

    /// Reads a little-endian IEEE 754 double.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::BufferUnderflow` if fewer than 8 bytes remain.
    pub fn read_f64(&mut self) -> Result<f64, CodecError> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(f64::from_le_bytes(raw))
    }

    /// Reads a length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::LengthOverrun` if the declared length exceeds
    /// the remaining input, and `CodecError::InvalidUtf8` if the bytes are
    /// not valid UTF-8.
    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let bytes = self.read_len_prefixed()?;
        let text = std::str::from_utf8(bytes).map_err(|e| CodecError::InvalidUtf8 {
            message: e.to_string(),
        })?;
        Ok(text.to_string())
    }

    /// Reads a length-prefixed byte blob.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::LengthOverrun` if the declared length exceeds
    /// the remaining input.
    pub fn read_blob(&mut self) -> Result<Vec<u8>, CodecError> {
        Ok(self.read_len_prefixed()?.to_vec())
    }

    fn read_len_prefixed(&mut self) -> Result<&'a [u8], CodecError> {
        let declared = self.read_u32()? as usize;
        if declared > self.remaining() {
            return Err(CodecError::LengthOverrun {
                declared,
                remaining: self.remaining(),
            });
        }
        self.take(declared)
    }
}
