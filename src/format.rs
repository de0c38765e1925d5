//! NAMB file envelope
//!
//! ```text
//! magic "NAMB" | version u16 | architecture u8 | flags u8 | payload_len u32
//! metadata block | architecture payload | weight_count u32 | weights f32 * n
//! ```

use crate::error::{NambError, Result};
use crate::reader::BinaryReader;
use crate::writer::BinaryWriter;

/// Magic bytes opening every NAMB file
pub const NAMB_MAGIC: [u8; 4] = *b"NAMB";

/// Format version written by this crate
pub const NAMB_VERSION: u16 = 1;

/// Size of the fixed header in bytes
pub const HEADER_SIZE: usize = 12;

/// Fixed header found at the beginning of a NAMB file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NambHeader {
    /// Format version of the file
    pub version: u16,
    /// Architecture identifier used to pick the payload parser
    pub architecture: u8,
    /// Reserved flag bits, preserved as read
    pub flags: u8,
    /// Length of the architecture payload in bytes
    pub payload_len: u32,
}

impl NambHeader {
    /// Parse a header from a reader positioned at the start of the file.
    ///
    /// # Errors
    ///
    /// Returns `NambError::InvalidFormat` if the magic bytes don't match and
    /// `NambError::UnexpectedEof` if the file is shorter than a header.
    pub fn parse(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let magic = reader.read_bytes(NAMB_MAGIC.len())?;
        if magic != NAMB_MAGIC {
            return Err(NambError::InvalidFormat(format!(
                "Invalid magic bytes. Expected {:02X?}, got {:02X?}",
                NAMB_MAGIC, magic
            )));
        }

        let version = reader.read_u16()?;
        let architecture = reader.read_u8()?;
        let flags = reader.read_u8()?;
        let payload_len = reader.read_u32()?;

        Ok(NambHeader {
            version,
            architecture,
            flags,
            payload_len,
        })
    }

    pub fn write(&self, writer: &mut BinaryWriter) {
        writer.write_bytes(&NAMB_MAGIC);
        writer.write_u16(self.version);
        writer.write_u8(self.architecture);
        writer.write_u8(self.flags);
        writer.write_u32(self.payload_len);
    }

    /// Check if this format version is supported by this library
    pub fn is_version_supported(&self) -> bool {
        self.version == NAMB_VERSION
    }
}
