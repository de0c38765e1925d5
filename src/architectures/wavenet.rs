//! WaveNet architecture
//!
//! A WaveNet is a sequence of layer arrays, each a stack of dilated (optionally
//! gated) convolutions feeding a head. A WaveNet may embed a complete second
//! model, the condition DSP, that preprocesses the conditioning signal. The
//! embedded model's payload follows the WaveNet payload, prefixed with its own
//! architecture identifier, and its weights come first in the weight block.

use std::any::Any;
use std::cell::Cell;

use crate::config::ModelConfig;
use crate::error::{NambError, Result};
use crate::metadata::ModelMetadata;
use crate::reader::BinaryReader;
use crate::registry::{self, BinaryConfigParser};
use crate::weights::WeightView;
use crate::writer::BinaryWriter;

pub const ARCH_ID: u8 = 3;
pub const NAME: &str = "WaveNet";

/// Deepest chain of embedded condition DSPs accepted
const MAX_NESTING: usize = 8;

thread_local! {
    static NESTING: Cell<usize> = const { Cell::new(0) };
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerArrayConfig {
    pub input_size: usize,
    pub condition_size: usize,
    pub head_size: usize,
    pub channels: usize,
    pub kernel_size: usize,
    pub dilations: Vec<u32>,
    pub activation: String,
    pub gated: bool,
    pub head_bias: bool,
}

impl LayerArrayConfig {
    /// `None` when the sizes are too large to count
    fn weight_count(&self) -> Option<usize> {
        let channels = self.channels;
        let mid = if self.gated { channels.checked_mul(2)? } else { channels };
        let rechannel = self.input_size.checked_mul(channels)?;
        let layer = self
            .kernel_size
            .checked_mul(channels)?
            .checked_mul(mid)?
            .checked_add(mid)?
            .checked_add(self.condition_size.checked_mul(mid)?)?
            .checked_add(channels.checked_mul(channels)?)?
            .checked_add(channels)?;
        let head = channels
            .checked_mul(self.head_size)?
            .checked_add(if self.head_bias { self.head_size } else { 0 })?;
        rechannel
            .checked_add(self.dilations.len().checked_mul(layer)?)?
            .checked_add(head)
    }

    fn parse(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let layer = LayerArrayConfig {
            input_size: reader.read_len()?,
            condition_size: reader.read_len()?,
            head_size: reader.read_len()?,
            channels: reader.read_len()?,
            kernel_size: reader.read_len()?,
            dilations: reader.read_u32_list()?,
            activation: reader.read_string()?,
            gated: reader.read_bool()?,
            head_bias: reader.read_bool()?,
        };

        if layer.channels == 0 || layer.kernel_size == 0 {
            return Err(NambError::invalid_payload(
                NAME,
                "layer array channels and kernel size must be positive",
            ));
        }
        if layer.dilations.is_empty() {
            return Err(NambError::invalid_payload(NAME, "layer array has no layers"));
        }
        Ok(layer)
    }

    fn write(&self, payload: &mut BinaryWriter) -> Result<()> {
        payload.write_len(self.input_size)?;
        payload.write_len(self.condition_size)?;
        payload.write_len(self.head_size)?;
        payload.write_len(self.channels)?;
        payload.write_len(self.kernel_size)?;
        payload.write_u32_list(&self.dilations)?;
        payload.write_string(&self.activation)?;
        payload.write_bool(self.gated);
        payload.write_bool(self.head_bias);
        Ok(())
    }
}

/// A model embedded in a WaveNet, together with the weights it claimed
#[derive(Debug)]
pub struct ConditionDsp {
    pub config: Box<dyn ModelConfig>,
    pub weights: Vec<f32>,
}

#[derive(Debug)]
pub struct WaveNetConfig {
    pub layers: Vec<LayerArrayConfig>,
    pub head_scale: f32,
    pub condition_dsp: Option<ConditionDsp>,
}

impl ModelConfig for WaveNetConfig {
    fn architecture_id(&self) -> u8 {
        ARCH_ID
    }

    fn architecture_name(&self) -> &'static str {
        NAME
    }

    fn weight_count(&self) -> Option<usize> {
        self.layers
            .iter()
            .try_fold(0usize, |total, layer| total.checked_add(layer.weight_count()?))
    }

    fn write_payload(&self, payload: &mut BinaryWriter, weights: &mut Vec<f32>) -> Result<()> {
        let n_layers = u16::try_from(self.layers.len()).map_err(|_| {
            NambError::InvalidFormat(format!("Too many layer arrays: {}", self.layers.len()))
        })?;
        payload.write_u16(n_layers);
        for layer in &self.layers {
            layer.write(payload)?;
        }
        payload.write_f32(self.head_scale);

        payload.write_bool(self.condition_dsp.is_some());
        if let Some(dsp) = &self.condition_dsp {
            payload.write_u8(dsp.config.architecture_id());
            dsp.config.write_payload(payload, weights)?;
            weights.extend_from_slice(&dsp.weights);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WaveNetParser;

impl BinaryConfigParser for WaveNetParser {
    fn parse(
        &self,
        reader: &mut BinaryReader<'_>,
        weights: &mut WeightView<'_>,
        metadata: &ModelMetadata,
    ) -> Result<Box<dyn ModelConfig>> {
        let n_layers = reader.read_u16()?;
        if n_layers == 0 {
            return Err(NambError::invalid_payload(NAME, "no layer arrays"));
        }
        let layers = (0..n_layers)
            .map(|_| LayerArrayConfig::parse(reader))
            .collect::<Result<Vec<_>>>()?;
        let head_scale = reader.read_f32()?;

        let condition_dsp = if reader.read_bool()? {
            Some(parse_condition_dsp(reader, weights, metadata)?)
        } else {
            None
        };

        let config = WaveNetConfig {
            layers,
            head_scale,
            condition_dsp,
        };
        if config.weight_count().is_none() {
            return Err(NambError::invalid_payload(NAME, "layer sizes overflow the weight count"));
        }
        Ok(Box::new(config))
    }
}

/// Holds one level of condition DSP nesting; released on drop, including unwinds
struct NestingGuard {
    depth: usize,
}

impl NestingGuard {
    fn enter() -> Result<Self> {
        let depth = NESTING.with(Cell::get);
        if depth >= MAX_NESTING {
            return Err(NambError::invalid_payload(
                NAME,
                format!("condition DSPs nested deeper than {}", MAX_NESTING),
            ));
        }
        NESTING.with(|n| n.set(depth + 1));
        Ok(NestingGuard { depth })
    }
}

impl Drop for NestingGuard {
    fn drop(&mut self) {
        let _ = NESTING.try_with(|n| n.set(self.depth));
    }
}

fn parse_condition_dsp(
    reader: &mut BinaryReader<'_>,
    weights: &mut WeightView<'_>,
    metadata: &ModelMetadata,
) -> Result<ConditionDsp> {
    let nesting = NestingGuard::enter()?;
    let arch_id = reader.read_u8()?;
    // Same registry the WaveNet itself was dispatched from
    let config = registry::current().dispatch(arch_id, reader, weights, metadata)?;
    drop(nesting);

    let count = config.weight_count().ok_or_else(|| {
        NambError::invalid_payload(
            NAME,
            format!(
                "condition DSP {} has no fixed weight count",
                config.architecture_name()
            ),
        )
    })?;
    let dsp_weights = weights.take_vec(count)?;

    Ok(ConditionDsp {
        config,
        weights: dsp_weights,
    })
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};

    use super::*;
    use crate::architectures::linear::{self, LinearConfig, LinearParser};
    use crate::registry::ParserRegistry;

    fn layer_array() -> LayerArrayConfig {
        LayerArrayConfig {
            input_size: 1,
            condition_size: 1,
            head_size: 8,
            channels: 16,
            kernel_size: 3,
            dilations: vec![1, 2, 4, 8],
            activation: "Tanh".to_string(),
            gated: false,
            head_bias: false,
        }
    }

    fn encode(config: &WaveNetConfig) -> (Vec<u8>, Vec<f32>) {
        let mut payload = BinaryWriter::new();
        let mut weights = Vec::new();
        config.write_payload(&mut payload, &mut weights).unwrap();
        (payload.into_inner(), weights)
    }

    #[test]
    fn layer_array_weight_count() {
        let layer = layer_array();
        let per_layer = 3 * 16 * 16 + 16 + 16 + 16 * 16 + 16;
        assert_eq!(layer.weight_count(), Some(16 + 4 * per_layer + 16 * 8));

        let gated = LayerArrayConfig {
            gated: true,
            head_bias: true,
            ..layer_array()
        };
        let per_gated = 3 * 16 * 32 + 32 + 32 + 16 * 16 + 16;
        assert_eq!(gated.weight_count(), Some(16 + 4 * per_gated + 16 * 8 + 8));
    }

    #[test]
    fn oversized_layer_array_is_rejected() {
        let huge = LayerArrayConfig {
            channels: u32::MAX as usize,
            ..layer_array()
        };
        assert_eq!(huge.weight_count(), None);

        let config = WaveNetConfig {
            layers: vec![huge],
            head_scale: 1.0,
            condition_dsp: None,
        };
        let (bytes, _) = encode(&config);
        let result = WaveNetParser.parse(
            &mut BinaryReader::new(&bytes),
            &mut WeightView::new(&[]),
            &ModelMetadata::default(),
        );
        assert!(matches!(
            result,
            Err(NambError::InvalidPayload { architecture: "WaveNet", .. })
        ));
    }

    #[test]
    fn parses_without_condition_dsp() {
        let config = WaveNetConfig {
            layers: vec![layer_array(), layer_array()],
            head_scale: 0.02,
            condition_dsp: None,
        };
        let (bytes, extra) = encode(&config);
        assert!(extra.is_empty());

        let mut reader = BinaryReader::new(&bytes);
        let data = [0.0f32; 4];
        let mut weights = WeightView::new(&data);
        let parsed = WaveNetParser
            .parse(&mut reader, &mut weights, &ModelMetadata::default())
            .unwrap();

        let parsed = parsed.downcast_ref::<WaveNetConfig>().unwrap();
        assert_eq!(parsed.layers, config.layers);
        assert_eq!(parsed.head_scale, 0.02);
        assert!(parsed.condition_dsp.is_none());
        assert_eq!(weights.len(), 4);
        assert!(reader.is_empty());
    }

    #[test]
    fn condition_dsp_claims_its_weights() {
        let config = WaveNetConfig {
            layers: vec![layer_array()],
            head_scale: 1.0,
            condition_dsp: Some(ConditionDsp {
                config: Box::new(LinearConfig {
                    receptive_field: 3,
                    bias: true,
                }),
                weights: vec![0.1, 0.2, 0.3, 0.4],
            }),
        };
        let (bytes, mut data) = encode(&config);
        assert_eq!(data, vec![0.1, 0.2, 0.3, 0.4]);
        data.extend_from_slice(&[9.0, 9.0]);

        let mut reader = BinaryReader::new(&bytes);
        let mut weights = WeightView::new(&data);
        let parsed = WaveNetParser
            .parse(&mut reader, &mut weights, &ModelMetadata::default())
            .unwrap();

        let parsed = parsed.downcast_ref::<WaveNetConfig>().unwrap();
        let dsp = parsed.condition_dsp.as_ref().unwrap();
        assert_eq!(dsp.config.architecture_id(), linear::ARCH_ID);
        assert_eq!(dsp.weights, vec![0.1, 0.2, 0.3, 0.4]);
        assert_eq!(weights.offset(), 4);
        assert_eq!(weights.as_slice(), &[9.0, 9.0]);
        assert!(reader.is_empty());
    }

    #[test]
    fn condition_dsp_short_of_weights_fails() {
        let config = WaveNetConfig {
            layers: vec![layer_array()],
            head_scale: 1.0,
            condition_dsp: Some(ConditionDsp {
                config: Box::new(LinearConfig {
                    receptive_field: 8,
                    bias: false,
                }),
                weights: vec![0.0; 8],
            }),
        };
        let (bytes, _) = encode(&config);

        let data = [0.0f32; 5];
        let mut weights = WeightView::new(&data);
        let result = WaveNetParser.parse(
            &mut BinaryReader::new(&bytes),
            &mut weights,
            &ModelMetadata::default(),
        );
        assert!(matches!(
            result,
            Err(NambError::InsufficientWeights {
                requested: 8,
                available: 5
            })
        ));
        assert_eq!(weights.len(), 5);
    }

    #[test]
    fn unknown_condition_dsp_architecture_propagates() {
        let mut payload = BinaryWriter::new();
        payload.write_u16(1);
        layer_array().write(&mut payload).unwrap();
        payload.write_f32(1.0);
        payload.write_bool(true);
        payload.write_u8(250);

        let bytes = payload.into_inner();
        let result = WaveNetParser.parse(
            &mut BinaryReader::new(&bytes),
            &mut WeightView::new(&[]),
            &ModelMetadata::default(),
        );
        assert!(matches!(result, Err(NambError::UnknownArchitecture(250))));
    }

    #[test]
    fn runaway_nesting_is_rejected() {
        let mut config = WaveNetConfig {
            layers: vec![layer_array()],
            head_scale: 1.0,
            condition_dsp: None,
        };
        for _ in 0..=MAX_NESTING {
            let weights = vec![0.0; config.weight_count().unwrap()];
            config = WaveNetConfig {
                layers: vec![layer_array()],
                head_scale: 1.0,
                condition_dsp: Some(ConditionDsp {
                    config: Box::new(config),
                    weights,
                }),
            };
        }
        let (bytes, data) = encode(&config);

        let result = WaveNetParser.parse(
            &mut BinaryReader::new(&bytes),
            &mut WeightView::new(&data),
            &ModelMetadata::default(),
        );
        assert!(matches!(result, Err(NambError::InvalidPayload { .. })));
        assert_eq!(NESTING.with(Cell::get), 0);
    }

    #[test]
    fn condition_dsp_resolves_through_dispatching_registry() {
        let registry = ParserRegistry::new();
        registry.register(ARCH_ID, WaveNetParser);
        registry.register(77, LinearParser);
        assert!(!registry::global().has(77));

        let mut payload = BinaryWriter::new();
        payload.write_u16(1);
        layer_array().write(&mut payload).unwrap();
        payload.write_f32(1.0);
        payload.write_bool(true);
        payload.write_u8(77);
        LinearConfig {
            receptive_field: 2,
            bias: false,
        }
        .write_payload(&mut payload, &mut Vec::new())
        .unwrap();
        let bytes = payload.into_inner();
        let data = [0.5f32, 0.25];

        let config = registry
            .dispatch(
                ARCH_ID,
                &mut BinaryReader::new(&bytes),
                &mut WeightView::new(&data),
                &ModelMetadata::default(),
            )
            .unwrap();
        let dsp = config
            .downcast_ref::<WaveNetConfig>()
            .unwrap()
            .condition_dsp
            .as_ref()
            .unwrap();
        assert!(dsp.config.is::<LinearConfig>());
        assert_eq!(dsp.weights, vec![0.5, 0.25]);
    }

    #[test]
    fn nesting_depth_recovers_from_panicking_parser() {
        let registry = ParserRegistry::new();
        registry.register(ARCH_ID, WaveNetParser);
        registry.register(
            66,
            |_: &mut BinaryReader<'_>,
             _: &mut WeightView<'_>,
             _: &ModelMetadata|
             -> Result<Box<dyn ModelConfig>> { panic!("condition DSP parser failed") },
        );

        let mut payload = BinaryWriter::new();
        payload.write_u16(1);
        layer_array().write(&mut payload).unwrap();
        payload.write_f32(1.0);
        payload.write_bool(true);
        payload.write_u8(66);
        let bytes = payload.into_inner();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            registry.dispatch(
                ARCH_ID,
                &mut BinaryReader::new(&bytes),
                &mut WeightView::new(&[]),
                &ModelMetadata::default(),
            )
        }));
        assert!(outcome.is_err());
        assert_eq!(NESTING.with(Cell::get), 0);
        assert!(!registry::current().has(66));
    }
}
