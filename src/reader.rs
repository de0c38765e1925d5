//! Forward-only cursor over a NAMB byte buffer
//!
//! All multi-byte values in a NAMB file are little-endian. A read that can't be
//! satisfied fails with `NambError::UnexpectedEof` and leaves the cursor where it was.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{NambError, Result};

/// Typed little-endian reader with position tracking
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    /// Create a reader positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current byte offset from the start of the buffer
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes not yet read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Borrow the next `n` bytes and advance past them
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if n > available {
            return Err(NambError::UnexpectedEof {
                offset: self.pos,
                needed: n,
                available,
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Advance past `n` bytes without decoding them
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Read a one-byte flag; any non-zero value is `true`
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.read_bytes(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.read_bytes(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(self.read_bytes(4)?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.read_bytes(4)?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(LittleEndian::read_f64(self.read_bytes(8)?))
    }

    /// Read a `u32` and widen it to `usize`
    pub fn read_len(&mut self) -> Result<usize> {
        Ok(self.read_u32()? as usize)
    }

    /// Read a UTF-8 string prefixed by its `u16` byte length
    pub fn read_string(&mut self) -> Result<String> {
        let start = self.pos;
        let len = self.read_u16()? as usize;
        let bytes = match self.read_bytes(len) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.pos = start;
                return Err(err);
            }
        };
        match String::from_utf8(bytes.to_vec()) {
            Ok(s) => Ok(s),
            Err(err) => {
                self.pos = start;
                Err(err.into())
            }
        }
    }

    /// Read a `u16` count followed by that many `u32` values
    pub fn read_u32_list(&mut self) -> Result<Vec<u32>> {
        let start = self.pos;
        let count = self.read_u16()? as usize;
        let bytes = match self.read_bytes(count * 4) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.pos = start;
                return Err(err);
            }
        };
        let mut values = vec![0u32; count];
        LittleEndian::read_u32_into(bytes, &mut values);
        Ok(values)
    }
}
