//! Little-endian encoder mirroring [`BinaryReader`](crate::reader::BinaryReader)

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{NambError, Result};

/// Growable buffer with typed little-endian writes
#[derive(Debug, Default, Clone)]
pub struct BinaryWriter {
    buf: Vec<u8>,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(value as u8);
    }

    pub fn write_u16(&mut self, value: u16) {
        let mut bytes = [0u8; 2];
        LittleEndian::write_u16(&mut bytes, value);
        self.write_bytes(&bytes);
    }

    pub fn write_u32(&mut self, value: u32) {
        let mut bytes = [0u8; 4];
        LittleEndian::write_u32(&mut bytes, value);
        self.write_bytes(&bytes);
    }

    pub fn write_i32(&mut self, value: i32) {
        let mut bytes = [0u8; 4];
        LittleEndian::write_i32(&mut bytes, value);
        self.write_bytes(&bytes);
    }

    pub fn write_f32(&mut self, value: f32) {
        let mut bytes = [0u8; 4];
        LittleEndian::write_f32(&mut bytes, value);
        self.write_bytes(&bytes);
    }

    pub fn write_f64(&mut self, value: f64) {
        let mut bytes = [0u8; 8];
        LittleEndian::write_f64(&mut bytes, value);
        self.write_bytes(&bytes);
    }

    /// Write a `usize` as `u32`, failing if it doesn't fit
    pub fn write_len(&mut self, value: usize) -> Result<()> {
        let value = u32::try_from(value)
            .map_err(|_| NambError::InvalidFormat(format!("Length {} exceeds u32", value)))?;
        self.write_u32(value);
        Ok(())
    }

    /// Write a UTF-8 string prefixed by its `u16` byte length
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        let len = u16::try_from(value.len()).map_err(|_| {
            NambError::InvalidFormat(format!("String of {} bytes is too long", value.len()))
        })?;
        self.write_u16(len);
        self.write_bytes(value.as_bytes());
        Ok(())
    }

    /// Write a `u16` count followed by the `u32` values
    pub fn write_u32_list(&mut self, values: &[u32]) -> Result<()> {
        let count = u16::try_from(values.len()).map_err(|_| {
            NambError::InvalidFormat(format!("List of {} items is too long", values.len()))
        })?;
        self.write_u16(count);
        for &value in values {
            self.write_u32(value);
        }
        Ok(())
    }
}
