//! ConvNet architecture: a stack of dilated convolutions with a linear head

use std::any::Any;

use crate::config::ModelConfig;
use crate::error::{NambError, Result};
use crate::metadata::ModelMetadata;
use crate::reader::BinaryReader;
use crate::registry::BinaryConfigParser;
use crate::weights::WeightView;
use crate::writer::BinaryWriter;

pub const ARCH_ID: u8 = 1;
pub const NAME: &str = "ConvNet";

const KERNEL_SIZE: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvNetConfig {
    pub channels: usize,
    /// One dilation per convolution block
    pub dilations: Vec<u32>,
    pub batchnorm: bool,
    pub activation: String,
}

impl ConvNetConfig {
    fn block_weight_count(&self, in_channels: usize) -> Option<usize> {
        let conv = KERNEL_SIZE.checked_mul(in_channels)?.checked_mul(self.channels)?;
        if self.batchnorm {
            // running mean, running var, scale, shift, eps
            conv.checked_add(self.channels.checked_mul(4)?)?.checked_add(1)
        } else {
            conv.checked_add(self.channels)
        }
    }
}

impl ModelConfig for ConvNetConfig {
    fn architecture_id(&self) -> u8 {
        ARCH_ID
    }

    fn architecture_name(&self) -> &'static str {
        NAME
    }

    fn weight_count(&self) -> Option<usize> {
        let blocks = (0..self.dilations.len()).try_fold(0usize, |total, i| {
            total.checked_add(self.block_weight_count(if i == 0 { 1 } else { self.channels })?)
        })?;
        blocks.checked_add(self.channels)?.checked_add(1)
    }

    fn write_payload(&self, payload: &mut BinaryWriter, _weights: &mut Vec<f32>) -> Result<()> {
        payload.write_len(self.channels)?;
        payload.write_u32_list(&self.dilations)?;
        payload.write_bool(self.batchnorm);
        payload.write_string(&self.activation)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ConvNetParser;

impl BinaryConfigParser for ConvNetParser {
    fn parse(
        &self,
        reader: &mut BinaryReader<'_>,
        _weights: &mut WeightView<'_>,
        _metadata: &ModelMetadata,
    ) -> Result<Box<dyn ModelConfig>> {
        let channels = reader.read_len()?;
        let dilations = reader.read_u32_list()?;
        let batchnorm = reader.read_bool()?;
        let activation = reader.read_string()?;

        if channels == 0 {
            return Err(NambError::invalid_payload(NAME, "channel count must be positive"));
        }
        if dilations.is_empty() {
            return Err(NambError::invalid_payload(NAME, "no convolution blocks"));
        }

        let config = ConvNetConfig {
            channels,
            dilations,
            batchnorm,
            activation,
        };
        if config.weight_count().is_none() {
            return Err(NambError::invalid_payload(NAME, "channel count overflows the weight count"));
        }
        Ok(Box::new(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(batchnorm: bool) -> ConvNetConfig {
        ConvNetConfig {
            channels: 16,
            dilations: vec![1, 2, 4],
            batchnorm,
            activation: "Tanh".to_string(),
        }
    }

    #[test]
    fn weight_count_follows_block_layout() {
        // first block sees 1 input channel, the rest see `channels`
        let plain = 2 * 16 + 16 + 2 * (2 * 16 * 16 + 16) + 17;
        assert_eq!(config(false).weight_count(), Some(plain));

        let normed = (2 * 16 + 65) + 2 * (2 * 16 * 16 + 65) + 17;
        assert_eq!(config(true).weight_count(), Some(normed));
    }

    #[test]
    fn payload_round_trips() {
        let original = config(true);
        let mut payload = BinaryWriter::new();
        original.write_payload(&mut payload, &mut Vec::new()).unwrap();

        let bytes = payload.into_inner();
        let mut reader = BinaryReader::new(&bytes);
        let parsed = ConvNetParser
            .parse(&mut reader, &mut WeightView::new(&[]), &ModelMetadata::default())
            .unwrap();

        assert_eq!(parsed.downcast_ref::<ConvNetConfig>(), Some(&original));
        assert!(reader.is_empty());
    }

    #[test]
    fn empty_dilations_are_rejected() {
        let mut payload = BinaryWriter::new();
        payload.write_u32(8);
        payload.write_u32_list(&[]).unwrap();
        payload.write_bool(false);
        payload.write_string("Tanh").unwrap();

        let bytes = payload.into_inner();
        let result = ConvNetParser.parse(
            &mut BinaryReader::new(&bytes),
            &mut WeightView::new(&[]),
            &ModelMetadata::default(),
        );
        assert!(matches!(result, Err(NambError::InvalidPayload { .. })));
    }

    #[test]
    fn oversized_channel_count_is_rejected() {
        let huge = ConvNetConfig {
            channels: u32::MAX as usize,
            ..config(false)
        };
        assert_eq!(huge.weight_count(), None);

        let mut payload = BinaryWriter::new();
        huge.write_payload(&mut payload, &mut Vec::new()).unwrap();
        let bytes = payload.into_inner();
        let result = ConvNetParser.parse(
            &mut BinaryReader::new(&bytes),
            &mut WeightView::new(&[]),
            &ModelMetadata::default(),
        );
        assert!(matches!(
            result,
            Err(NambError::InvalidPayload { architecture: "ConvNet", .. })
        ));
    }
}
