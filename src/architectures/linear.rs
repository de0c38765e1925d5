//! Linear (FIR) architecture

use std::any::Any;

use crate::config::ModelConfig;
use crate::error::{NambError, Result};
use crate::metadata::ModelMetadata;
use crate::reader::BinaryReader;
use crate::registry::BinaryConfigParser;
use crate::weights::WeightView;
use crate::writer::BinaryWriter;

pub const ARCH_ID: u8 = 0;
pub const NAME: &str = "Linear";

/// A single FIR filter over the last `receptive_field` samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearConfig {
    pub receptive_field: usize,
    pub bias: bool,
}

impl ModelConfig for LinearConfig {
    fn architecture_id(&self) -> u8 {
        ARCH_ID
    }

    fn architecture_name(&self) -> &'static str {
        NAME
    }

    fn weight_count(&self) -> Option<usize> {
        self.receptive_field.checked_add(usize::from(self.bias))
    }

    fn write_payload(&self, payload: &mut BinaryWriter, _weights: &mut Vec<f32>) -> Result<()> {
        payload.write_len(self.receptive_field)?;
        payload.write_bool(self.bias);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LinearParser;

impl BinaryConfigParser for LinearParser {
    fn parse(
        &self,
        reader: &mut BinaryReader<'_>,
        _weights: &mut WeightView<'_>,
        _metadata: &ModelMetadata,
    ) -> Result<Box<dyn ModelConfig>> {
        let receptive_field = reader.read_len()?;
        let bias = reader.read_bool()?;

        if receptive_field == 0 {
            return Err(NambError::invalid_payload(NAME, "receptive field must be positive"));
        }

        let config = LinearConfig {
            receptive_field,
            bias,
        };
        if config.weight_count().is_none() {
            return Err(NambError::invalid_payload(NAME, "receptive field overflows the weight count"));
        }
        Ok(Box::new(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(bytes: &[u8]) -> Result<Box<dyn ModelConfig>> {
        let mut reader = BinaryReader::new(bytes);
        let mut weights = WeightView::new(&[]);
        LinearParser.parse(&mut reader, &mut weights, &ModelMetadata::default())
    }

    #[test]
    fn parses_payload() {
        let mut payload = BinaryWriter::new();
        payload.write_u32(32);
        payload.write_bool(true);

        let config = parse(payload.as_bytes()).unwrap();
        assert_eq!(config.architecture_name(), "Linear");
        assert_eq!(config.weight_count(), Some(33));
        assert_eq!(
            config.downcast_ref::<LinearConfig>(),
            Some(&LinearConfig {
                receptive_field: 32,
                bias: true
            })
        );
    }

    #[test]
    fn zero_receptive_field_is_rejected() {
        let mut payload = BinaryWriter::new();
        payload.write_u32(0);
        payload.write_bool(false);

        assert!(matches!(
            parse(payload.as_bytes()),
            Err(NambError::InvalidPayload { architecture: "Linear", .. })
        ));
    }

    #[test]
    fn weight_count_does_not_wrap() {
        let config = LinearConfig {
            receptive_field: usize::MAX,
            bias: true,
        };
        assert_eq!(config.weight_count(), None);
    }
}
