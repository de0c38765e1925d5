use std::io;

use thiserror::Error;

/// Result type for NAMB operations
pub type Result<T> = std::result::Result<T, NambError>;

/// Errors that can occur when loading NAMB files
#[derive(Debug, Error)]
pub enum NambError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid file format (wrong magic number, malformed envelope, etc.)
    #[error("Invalid NAMB format: {0}")]
    InvalidFormat(String),

    /// Unsupported NAMB version or feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    /// Invalid UTF-8 string data
    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// A read ran past the end of the buffer
    #[error("Unexpected end of data at offset {offset}: needed {needed} bytes, {available} available")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// No parser is registered for the architecture identifier
    #[error("Unknown architecture ID {0}")]
    UnknownArchitecture(u8),

    /// A strict registration found the identifier already taken
    #[error("Architecture ID {0} is already registered")]
    DuplicateArchitecture(u8),

    /// A parser asked for more weights than the view holds
    #[error("Insufficient weight data: requested {requested}, {available} available")]
    InsufficientWeights { requested: usize, available: usize },

    /// The weights left after parsing don't match what the configuration needs
    #[error("Weight count mismatch: configuration expects {expected}, file provides {actual}")]
    WeightCountMismatch { expected: usize, actual: usize },

    /// An architecture payload decoded but describes an impossible model
    #[error("Invalid {architecture} payload: {reason}")]
    InvalidPayload {
        architecture: &'static str,
        reason: String,
    },
}

impl NambError {
    pub(crate) fn invalid_payload(architecture: &'static str, reason: impl Into<String>) -> Self {
        NambError::InvalidPayload {
            architecture,
            reason: reason.into(),
        }
    }
}
