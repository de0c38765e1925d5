//! Stacked LSTM architecture with a linear head

use std::any::Any;

use crate::config::ModelConfig;
use crate::error::{NambError, Result};
use crate::metadata::ModelMetadata;
use crate::reader::BinaryReader;
use crate::registry::BinaryConfigParser;
use crate::weights::WeightView;
use crate::writer::BinaryWriter;

pub const ARCH_ID: u8 = 2;
pub const NAME: &str = "LSTM";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LstmConfig {
    pub num_layers: usize,
    pub input_size: usize,
    pub hidden_size: usize,
}

impl ModelConfig for LstmConfig {
    fn architecture_id(&self) -> u8 {
        ARCH_ID
    }

    fn architecture_name(&self) -> &'static str {
        NAME
    }

    fn weight_count(&self) -> Option<usize> {
        let h = self.hidden_size;
        let gates = h.checked_mul(4)?;
        let layers = (0..self.num_layers).try_fold(0usize, |total, layer| {
            let input = if layer == 0 { self.input_size } else { h };
            // gate matrix, gate bias, initial hidden and cell state
            let params = gates
                .checked_mul(input.checked_add(h)?)?
                .checked_add(gates)?
                .checked_add(h.checked_mul(2)?)?;
            total.checked_add(params)
        })?;
        layers.checked_add(h)?.checked_add(1)
    }

    fn write_payload(&self, payload: &mut BinaryWriter, _weights: &mut Vec<f32>) -> Result<()> {
        payload.write_len(self.num_layers)?;
        payload.write_len(self.input_size)?;
        payload.write_len(self.hidden_size)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LstmParser;

impl BinaryConfigParser for LstmParser {
    fn parse(
        &self,
        reader: &mut BinaryReader<'_>,
        _weights: &mut WeightView<'_>,
        _metadata: &ModelMetadata,
    ) -> Result<Box<dyn ModelConfig>> {
        let num_layers = reader.read_len()?;
        let input_size = reader.read_len()?;
        let hidden_size = reader.read_len()?;

        if num_layers == 0 {
            return Err(NambError::invalid_payload(NAME, "at least one layer is required"));
        }
        if hidden_size == 0 {
            return Err(NambError::invalid_payload(NAME, "hidden size must be positive"));
        }

        let config = LstmConfig {
            num_layers,
            input_size,
            hidden_size,
        };
        if config.weight_count().is_none() {
            return Err(NambError::invalid_payload(NAME, "layer sizes overflow the weight count"));
        }
        Ok(Box::new(config))
    }
}
