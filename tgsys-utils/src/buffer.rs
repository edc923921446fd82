//! Bounds-checked little-endian byte codec.
//!
//! The binlog record framing and the binlog key-value payloads are built
//! on these two types. All multi-byte integers are little-endian.

// Layer 1: Standard library
// (none)

// Layer 2: Third-party
use thiserror::Error;

// Layer 3: Internal
use crate::error::CoreError;

/// Errors produced while decoding from a byte slice.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// The slice ended before the requested number of bytes.
    #[error("unexpected end of buffer: need {need} bytes, {left} left")]
    Truncated { need: usize, left: usize },
}

impl From<BufferError> for CoreError {
    fn from(err: BufferError) -> Self {
        CoreError::state(err.to_string())
    }
}

/// Sequential reader over a borrowed byte slice.
#[derive(Debug)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Start reading at the beginning of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Current read offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// True once every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Read `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], BufferError> {
        if self.remaining() < len {
            return Err(BufferError::Truncated {
                need: len,
                left: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    /// Skip `len` bytes.
    pub fn skip(&mut self, len: usize) -> Result<(), BufferError> {
        self.read_bytes(len).map(|_| ())
    }

    /// Read a little-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32, BufferError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a little-endian `u64`.
    pub fn read_u64(&mut self) -> Result<u64, BufferError> {
        let bytes = self.read_bytes(8)?;
        Ok(u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    /// Read a `u32` length prefix followed by that many bytes.
    pub fn read_len_prefixed(&mut self) -> Result<&'a [u8], BufferError> {
        let len = self.read_u32()? as usize;
        self.read_bytes(len)
    }
}

/// Append-only writer producing a `Vec<u8>`.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with reserved capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Append raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append a little-endian `u32`.
    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a little-endian `u64`.
    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a `u32` length prefix followed by the bytes themselves.
    pub fn write_len_prefixed(&mut self, bytes: &[u8]) {
        self.write_u32(bytes.len() as u32);
        self.write_bytes(bytes);
    }

    /// Zero-pad so the total length is a multiple of `alignment`.
    pub fn pad_to(&mut self, alignment: usize) {
        debug_assert!(alignment.is_power_of_two());
        while self.buf.len() % alignment != 0 {
            self.buf.push(0);
        }
    }

    /// Consume the writer, returning the produced bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    /// Borrow the produced bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}
