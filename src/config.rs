//! Architecture-specific model configuration
//!
//! Parsers produce a `Box<dyn ModelConfig>`; callers that need the concrete type
//! downcast based on the architecture identifier.

use std::any::Any;
use std::fmt;

use crate::error::Result;
use crate::writer::BinaryWriter;

/// Common base of every architecture's configuration
pub trait ModelConfig: fmt::Debug + Send + Sync + Any {
    /// Identifier this configuration is stored under in a NAMB file
    fn architecture_id(&self) -> u8;

    /// Human-readable architecture name
    fn architecture_name(&self) -> &'static str;

    /// Number of trailing weights the model consumes, if it can be computed
    fn weight_count(&self) -> Option<usize>;

    /// Encode the architecture payload. Weights owned by the configuration
    /// (such as those of an embedded model) are appended to `weights`.
    fn write_payload(&self, payload: &mut BinaryWriter, weights: &mut Vec<f32>) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}

impl dyn ModelConfig {
    /// Check whether the configuration is a `T`
    pub fn is<T: ModelConfig>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Borrow the configuration as a `T`
    pub fn downcast_ref<T: ModelConfig>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}
