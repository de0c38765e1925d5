//! File-level model metadata
//!
//! Extracted by the envelope layer before dispatch and handed to every parser
//! by reference.

use std::collections::BTreeMap;

use crate::error::{NambError, Result};
use crate::reader::BinaryReader;
use crate::writer::BinaryWriter;

const HAS_SAMPLE_RATE: u8 = 1 << 0;
const HAS_LOUDNESS: u8 = 1 << 1;
const HAS_INPUT_LEVEL: u8 = 1 << 2;
const HAS_OUTPUT_LEVEL: u8 = 1 << 3;

/// Metadata describing a NAMB model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelMetadata {
    /// Version of the exporter that produced the model (e.g. "0.5.4")
    pub version: String,
    /// Sample rate the model was trained at, in Hz
    pub sample_rate: Option<f64>,
    /// Measured output loudness, in dB
    pub loudness: Option<f32>,
    /// Calibrated input level, in dBu
    pub input_level_dbu: Option<f32>,
    /// Calibrated output level, in dBu
    pub output_level_dbu: Option<f32>,
    /// Free-form string fields ("name", "modeled_by", "gear_type", ...)
    pub fields: BTreeMap<String, String>,
}

impl ModelMetadata {
    /// Read the metadata block from a reader positioned right after the header.
    pub fn parse(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let version = reader.read_string()?;
        let present = reader.read_u8()?;

        let sample_rate = if present & HAS_SAMPLE_RATE != 0 {
            Some(reader.read_f64()?)
        } else {
            None
        };
        let loudness = read_optional_f32(reader, present & HAS_LOUDNESS != 0)?;
        let input_level_dbu = read_optional_f32(reader, present & HAS_INPUT_LEVEL != 0)?;
        let output_level_dbu = read_optional_f32(reader, present & HAS_OUTPUT_LEVEL != 0)?;

        let n_fields = reader.read_u16()?;
        let mut fields = BTreeMap::new();
        for _ in 0..n_fields {
            let key = reader.read_string()?;
            let value = reader.read_string()?;
            fields.insert(key, value);
        }

        Ok(ModelMetadata {
            version,
            sample_rate,
            loudness,
            input_level_dbu,
            output_level_dbu,
            fields,
        })
    }

    /// Encode the metadata block
    pub fn write(&self, writer: &mut BinaryWriter) -> Result<()> {
        writer.write_string(&self.version)?;

        let mut present = 0u8;
        if self.sample_rate.is_some() {
            present |= HAS_SAMPLE_RATE;
        }
        if self.loudness.is_some() {
            present |= HAS_LOUDNESS;
        }
        if self.input_level_dbu.is_some() {
            present |= HAS_INPUT_LEVEL;
        }
        if self.output_level_dbu.is_some() {
            present |= HAS_OUTPUT_LEVEL;
        }
        writer.write_u8(present);

        if let Some(rate) = self.sample_rate {
            writer.write_f64(rate);
        }
        for value in [self.loudness, self.input_level_dbu, self.output_level_dbu]
            .into_iter()
            .flatten()
        {
            writer.write_f32(value);
        }

        let n_fields = u16::try_from(self.fields.len()).map_err(|_| {
            NambError::InvalidFormat(format!(
                "Too many metadata fields: {}",
                self.fields.len()
            ))
        })?;
        writer.write_u16(n_fields);
        for (key, value) in &self.fields {
            writer.write_string(key)?;
            writer.write_string(value)?;
        }
        Ok(())
    }

    /// Look up a free-form field
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.get("name")
    }

    pub fn modeled_by(&self) -> Option<&str> {
        self.get("modeled_by")
    }

    pub fn gear_type(&self) -> Option<&str> {
        self.get("gear_type")
    }
}

fn read_optional_f32(reader: &mut BinaryReader<'_>, present: bool) -> Result<Option<f32>> {
    if present {
        Ok(Some(reader.read_f32()?))
    } else {
        Ok(None)
    }
}
