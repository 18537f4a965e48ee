use std::io::{Error as IoError, ErrorKind, Result as IoResult};

use byteorder::{BigEndian, ByteOrder};

/// Growable byte buffer with a read cursor, used for header and AMF
/// encoding work
pub struct ByteBuffer {
    buffer: Vec<u8>,
    cursor: usize,
}

impl ByteBuffer {
    /// Create a new ByteBuffer from bytes
    pub fn new(data: Vec<u8>) -> Self {
        ByteBuffer {
            buffer: data,
            cursor: 0,
        }
    }

    /// Create an empty ByteBuffer with capacity
    pub fn with_capacity(capacity: usize) -> Self {
        ByteBuffer {
            buffer: Vec::with_capacity(capacity),
            cursor: 0,
        }
    }

    /// Get current cursor position
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Set cursor position
    pub fn set_position(&mut self, pos: usize) -> IoResult<()> {
        if pos > self.buffer.len() {
            return Err(IoError::new(
                ErrorKind::InvalidInput,
                "Position out of bounds",
            ));
        }
        self.cursor = pos;
        Ok(())
    }

    /// Get remaining bytes from current position
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.cursor)
    }

    /// Check if buffer has at least n bytes remaining
    pub fn has_remaining(&self, n: usize) -> bool {
        self.remaining() >= n
    }

    /// Consume n bytes and return the slice covering them
    fn take(&mut self, n: usize) -> IoResult<&[u8]> {
        if !self.has_remaining(n) {
            return Err(IoError::new(ErrorKind::UnexpectedEof, "Not enough bytes"));
        }
        let start = self.cursor;
        self.cursor += n;
        Ok(&self.buffer[start..start + n])
    }

    /// Read bytes into a new Vec
    pub fn read_bytes(&mut self, len: usize) -> IoResult<Vec<u8>> {
        self.take(len).map(|slice| slice.to_vec())
    }

    /// Append raw bytes
    pub fn write_bytes(&mut self, data: &[u8]) -> IoResult<()> {
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Read u8
    pub fn read_u8(&mut self) -> IoResult<u8> {
        self.take(1).map(|slice| slice[0])
    }

    /// Write u8
    pub fn write_u8(&mut self, value: u8) -> IoResult<()> {
        self.buffer.push(value);
        Ok(())
    }

    /// Read u16 (big endian)
    pub fn read_u16_be(&mut self) -> IoResult<u16> {
        self.take(2).map(BigEndian::read_u16)
    }

    /// Write u16 (big endian)
    pub fn write_u16_be(&mut self, value: u16) -> IoResult<()> {
        let mut bytes = [0u8; 2];
        BigEndian::write_u16(&mut bytes, value);
        self.write_bytes(&bytes)
    }

    /// Read i16 (big endian)
    pub fn read_i16_be(&mut self) -> IoResult<i16> {
        self.take(2).map(BigEndian::read_i16)
    }

    /// Write i16 (big endian)
    pub fn write_i16_be(&mut self, value: i16) -> IoResult<()> {
        let mut bytes = [0u8; 2];
        BigEndian::write_i16(&mut bytes, value);
        self.write_bytes(&bytes)
    }

    /// Read u32 (big endian)
    pub fn read_u32_be(&mut self) -> IoResult<u32> {
        self.take(4).map(BigEndian::read_u32)
    }

    /// Write u32 (big endian)
    pub fn write_u32_be(&mut self, value: u32) -> IoResult<()> {
        let mut bytes = [0u8; 4];
        BigEndian::write_u32(&mut bytes, value);
        self.write_bytes(&bytes)
    }

    /// Read f64 (big endian)
    pub fn read_f64_be(&mut self) -> IoResult<f64> {
        self.take(8).map(BigEndian::read_f64)
    }

    /// Write f64 (big endian)
    pub fn write_f64_be(&mut self, value: f64) -> IoResult<()> {
        let mut bytes = [0u8; 8];
        BigEndian::write_f64(&mut bytes, value);
        self.write_bytes(&bytes)
    }

    /// Get all bytes as Vec
    pub fn to_vec(&self) -> Vec<u8> {
        self.buffer.clone()
    }

    /// Get slice of underlying buffer
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get length of buffer
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
