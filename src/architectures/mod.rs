//! Built-in NAM architectures
//!
//! Each submodule owns one stable architecture identifier, its configuration
//! type and the parser for its binary payload.

pub mod convnet;
pub mod linear;
pub mod lstm;
pub mod wavenet;

use crate::registry::ParserRegistry;

/// Register every built-in architecture into `registry`.
pub fn register_builtin(registry: &ParserRegistry) {
    registry.register(linear::ARCH_ID, linear::LinearParser);
    registry.register(convnet::ARCH_ID, convnet::ConvNetParser);
    registry.register(lstm::ARCH_ID, lstm::LstmParser);
    registry.register(wavenet::ARCH_ID, wavenet::WaveNetParser);
}

/// Name of a built-in architecture, for diagnostics
pub fn name_of(arch_id: u8) -> Option<&'static str> {
    match arch_id {
        linear::ARCH_ID => Some(linear::NAME),
        convnet::ARCH_ID => Some(convnet::NAME),
        lstm::ARCH_ID => Some(lstm::NAME),
        wavenet::ARCH_ID => Some(wavenet::NAME),
        _ => None,
    }
}
