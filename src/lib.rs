//! NAMB Interface Library - Loads binary neural amp model files
//!
//! A NAMB file names its architecture with a single byte. The loader reads the
//! envelope and metadata, then hands the architecture payload to whichever parser
//! is registered for that byte in the [`registry`].

pub mod architectures;
pub mod config;
pub mod error;
pub mod format;
pub mod metadata;
pub mod model;
pub mod reader;
pub mod registry;
pub mod weights;
pub mod writer;

// Re-export the main types for easier access
pub use config::ModelConfig;
pub use error::{NambError, Result};
pub use format::{NAMB_MAGIC, NAMB_VERSION, NambHeader};
pub use metadata::ModelMetadata;
pub use model::{LoadOptions, NambModel, encode_model};
pub use reader::BinaryReader;
pub use registry::{BinaryConfigParser, ParserRegistration, ParserRegistry};
pub use weights::WeightView;
pub use writer::BinaryWriter;
