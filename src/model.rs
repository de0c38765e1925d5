//! Loading complete NAMB models
//!
//! This module ties the envelope, metadata and weight block together and hands
//! the architecture payload to the parser registry.

use std::path::Path;

use tracing::debug;

use crate::config::ModelConfig;
use crate::error::{NambError, Result};
use crate::format::{NAMB_VERSION, NambHeader};
use crate::metadata::ModelMetadata;
use crate::reader::BinaryReader;
use crate::registry::{self, ParserRegistry};
use crate::weights::{WeightView, decode_f32_le};
use crate::writer::BinaryWriter;

/// Options controlling how strictly a file is checked while loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Require the weights left after parsing to match the configuration's
    /// `weight_count()` when it reports one
    pub validate_weight_count: bool,
    /// Attempt to load files whose format version isn't known
    pub allow_unsupported_version: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            validate_weight_count: true,
            allow_unsupported_version: false,
        }
    }
}

impl LoadOptions {
    pub fn validate_weight_count(mut self, validate: bool) -> Self {
        self.validate_weight_count = validate;
        self
    }

    pub fn allow_unsupported_version(mut self, allow: bool) -> Self {
        self.allow_unsupported_version = allow;
        self
    }
}

/// A fully loaded NAMB model
#[derive(Debug)]
pub struct NambModel {
    pub header: NambHeader,
    pub metadata: ModelMetadata,
    /// Architecture-specific configuration produced by the registered parser
    pub config: Box<dyn ModelConfig>,
    /// Weights left over once the parser claimed what it needed
    pub weights: Vec<f32>,
}

impl NambModel {
    /// Load a model from memory with the global registry and default options.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes_with(registry::global(), bytes, &LoadOptions::default())
    }

    /// Load a model from memory.
    ///
    /// # Errors
    ///
    /// Returns `NambError::UnknownArchitecture` if `registry` has no parser for
    /// the file's architecture, any error raised by that parser, and
    /// `NambError::InvalidFormat` / `NambError::WeightCountMismatch` when the
    /// envelope and the parsed configuration disagree.
    pub fn from_bytes_with(
        registry: &ParserRegistry,
        bytes: &[u8],
        options: &LoadOptions,
    ) -> Result<Self> {
        let mut reader = BinaryReader::new(bytes);
        let header = NambHeader::parse(&mut reader)?;

        if !header.is_version_supported() {
            if !options.allow_unsupported_version {
                return Err(NambError::Unsupported(format!(
                    "NAMB version {} (expected {})",
                    header.version, NAMB_VERSION
                )));
            }
            tracing::warn!(version = header.version, "loading unsupported NAMB version");
        }

        let metadata = ModelMetadata::parse(&mut reader)?;
        let payload_start = reader.position();
        let payload_len = header.payload_len as usize;

        // The weight block sits after the payload; decode it first so the
        // parser can claim from it.
        let mut tail = reader.clone();
        tail.skip(payload_len)?;
        let weight_count = tail.read_len()?;
        let weight_bytes = weight_count.checked_mul(4).ok_or_else(|| {
            NambError::InvalidFormat(format!("Weight count {} overflows", weight_count))
        })?;
        let all_weights = decode_f32_le(tail.read_bytes(weight_bytes)?)?;
        if !tail.is_empty() {
            return Err(NambError::InvalidFormat(format!(
                "{} trailing bytes after weight data",
                tail.remaining()
            )));
        }

        let mut view = WeightView::new(&all_weights);
        let config = registry.dispatch(header.architecture, &mut reader, &mut view, &metadata)?;

        let consumed = reader.position() - payload_start;
        if consumed != payload_len {
            return Err(NambError::InvalidFormat(format!(
                "{} parser consumed {} payload bytes, header declares {}",
                config.architecture_name(),
                consumed,
                payload_len
            )));
        }

        let weights = view.as_slice().to_vec();
        if options.validate_weight_count {
            if let Some(expected) = config.weight_count() {
                if expected != weights.len() {
                    return Err(NambError::WeightCountMismatch {
                        expected,
                        actual: weights.len(),
                    });
                }
            }
        }

        debug!(
            architecture = config.architecture_name(),
            claimed = view.offset(),
            weights = weights.len(),
            "loaded NAMB model"
        );

        Ok(NambModel {
            header,
            metadata,
            config,
            weights,
        })
    }

    /// Read and load a model file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Read and load a model file without blocking the async runtime on I/O
    pub async fn load_async(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        Self::from_bytes(&bytes)
    }

    pub fn architecture_id(&self) -> u8 {
        self.header.architecture
    }

    pub fn architecture_name(&self) -> &'static str {
        self.config.architecture_name()
    }

    /// Encode the model back into NAMB bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        encode_with_header(
            self.header.version,
            self.header.flags,
            self.config.as_ref(),
            &self.metadata,
            &self.weights,
        )
    }
}

/// Encode a configuration, its metadata and its trailing weights as a NAMB file.
///
/// Weights owned by the configuration itself are written ahead of `weights`.
pub fn encode_model(
    config: &dyn ModelConfig,
    metadata: &ModelMetadata,
    weights: &[f32],
) -> Result<Vec<u8>> {
    encode_with_header(NAMB_VERSION, 0, config, metadata, weights)
}

fn encode_with_header(
    version: u16,
    flags: u8,
    config: &dyn ModelConfig,
    metadata: &ModelMetadata,
    weights: &[f32],
) -> Result<Vec<u8>> {
    let mut payload = BinaryWriter::new();
    let mut all_weights = Vec::new();
    config.write_payload(&mut payload, &mut all_weights)?;
    all_weights.extend_from_slice(weights);

    let payload_len = u32::try_from(payload.len()).map_err(|_| {
        NambError::InvalidFormat(format!("Payload of {} bytes is too large", payload.len()))
    })?;
    let header = NambHeader {
        version,
        architecture: config.architecture_id(),
        flags,
        payload_len,
    };

    let mut writer = BinaryWriter::new();
    header.write(&mut writer);
    metadata.write(&mut writer)?;
    writer.write_bytes(payload.as_bytes());
    writer.write_len(all_weights.len())?;
    for &weight in &all_weights {
        writer.write_f32(weight);
    }
    Ok(writer.into_inner())
}
