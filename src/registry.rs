//! Architecture parser registry
//!
//! Maps the one-byte architecture identifier of a NAMB file to the parser for
//! that architecture. The loader only ever calls [`ParserRegistry::dispatch`]; it
//! never needs to know which architectures exist.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::architectures;
use crate::config::ModelConfig;
use crate::error::{NambError, Result};
use crate::metadata::ModelMetadata;
use crate::reader::BinaryReader;
use crate::weights::WeightView;

/// Decoder for one architecture's binary payload.
///
/// The reader is positioned at the start of the architecture payload. The parser
/// may claim a prefix of `weights`; whatever it leaves is what the caller sees
/// once `parse` returns.
pub trait BinaryConfigParser: Send + Sync {
    fn parse(
        &self,
        reader: &mut BinaryReader<'_>,
        weights: &mut WeightView<'_>,
        metadata: &ModelMetadata,
    ) -> Result<Box<dyn ModelConfig>>;
}

impl<F> BinaryConfigParser for F
where
    F: Fn(&mut BinaryReader<'_>, &mut WeightView<'_>, &ModelMetadata) -> Result<Box<dyn ModelConfig>>
        + Send
        + Sync,
{
    fn parse(
        &self,
        reader: &mut BinaryReader<'_>,
        weights: &mut WeightView<'_>,
        metadata: &ModelMetadata,
    ) -> Result<Box<dyn ModelConfig>> {
        self(reader, weights, metadata)
    }
}

type ParserTable = HashMap<u8, Arc<dyn BinaryConfigParser>>;

/// Table from architecture identifier to parser
///
/// Clones are handles to the same table.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: Arc<RwLock<ParserTable>>,
}

impl ParserRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `parser` for `arch_id`, replacing any existing entry.
    pub fn register<P>(&self, arch_id: u8, parser: P)
    where
        P: BinaryConfigParser + 'static,
    {
        let mut parsers = self.parsers.write().unwrap_or_else(PoisonError::into_inner);
        if parsers.insert(arch_id, Arc::new(parser)).is_some() {
            warn!(arch_id, "replaced existing NAMB parser registration");
        } else {
            debug!(arch_id, "registered NAMB parser");
        }
    }

    /// Register `parser` for `arch_id` unless the identifier is already taken.
    pub fn try_register<P>(&self, arch_id: u8, parser: P) -> Result<()>
    where
        P: BinaryConfigParser + 'static,
    {
        let mut parsers = self.parsers.write().unwrap_or_else(PoisonError::into_inner);
        if parsers.contains_key(&arch_id) {
            return Err(NambError::DuplicateArchitecture(arch_id));
        }
        parsers.insert(arch_id, Arc::new(parser));
        debug!(arch_id, "registered NAMB parser");
        Ok(())
    }

    pub fn has(&self, arch_id: u8) -> bool {
        self.parsers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&arch_id)
    }

    /// Registered identifiers in ascending order
    pub fn ids(&self) -> Vec<u8> {
        let mut ids: Vec<u8> = self
            .parsers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Parse an architecture payload with the parser registered for `arch_id`.
    ///
    /// # Errors
    ///
    /// Returns `NambError::UnknownArchitecture` if nothing is registered for
    /// `arch_id`; the reader and weight view are left untouched in that case.
    /// Any error from the parser itself is returned unchanged.
    pub fn dispatch(
        &self,
        arch_id: u8,
        reader: &mut BinaryReader<'_>,
        weights: &mut WeightView<'_>,
        metadata: &ModelMetadata,
    ) -> Result<Box<dyn ModelConfig>> {
        // Clone the entry out so the lock isn't held while the parser runs;
        // parsers for container models dispatch again.
        let parser = self
            .parsers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&arch_id)
            .cloned()
            .ok_or(NambError::UnknownArchitecture(arch_id))?;

        debug!(
            arch_id,
            payload_offset = reader.position(),
            weights_available = weights.len(),
            "dispatching NAMB parser"
        );
        let _active = ActiveRegistry::enter(self);
        parser.parse(reader, weights, metadata)
    }
}

thread_local! {
    /// Registries whose `dispatch` is running on this thread, innermost last
    static ACTIVE: RefCell<Vec<ParserRegistry>> = const { RefCell::new(Vec::new()) };
}

/// Marks a registry as active for the duration of one parser call
struct ActiveRegistry;

impl ActiveRegistry {
    fn enter(registry: &ParserRegistry) -> Self {
        ACTIVE.with(|active| active.borrow_mut().push(registry.clone()));
        ActiveRegistry
    }
}

impl Drop for ActiveRegistry {
    fn drop(&mut self) {
        // Also runs while unwinding out of a panicking parser.
        let _ = ACTIVE.try_with(|active| active.borrow_mut().pop());
    }
}

/// The registry that is dispatching on this thread.
///
/// Parsers for container models resolve embedded architectures through this, so
/// a model loaded with a custom registry decodes its nested models with that same
/// registry. Outside any dispatch this is the process-wide registry.
pub fn current() -> ParserRegistry {
    ACTIVE
        .with(|active| active.borrow().last().cloned())
        .unwrap_or_else(|| global().clone())
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

static GLOBAL: OnceLock<ParserRegistry> = OnceLock::new();

/// The process-wide registry, with the built-in architectures registered.
pub fn global() -> &'static ParserRegistry {
    GLOBAL.get_or_init(|| {
        let registry = ParserRegistry::new();
        architectures::register_builtin(&registry);
        registry
    })
}

/// Make sure the process-wide registry exists. Safe to call any number of times.
pub fn ensure_initialized() {
    global();
}

/// Registers a parser into the process-wide registry when constructed.
///
/// Lets an architecture defined outside this crate plug itself in without
/// touching the loader:
///
/// ```
/// use namb::registry::{self, ParserRegistration};
/// use namb::architectures::linear::LinearParser;
///
/// let registration = ParserRegistration::new(200, LinearParser);
/// assert!(registry::global().has(registration.arch_id()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserRegistration {
    arch_id: u8,
}

impl ParserRegistration {
    pub fn new<P>(arch_id: u8, parser: P) -> Self
    where
        P: BinaryConfigParser + 'static,
    {
        global().register(arch_id, parser);
        Self { arch_id }
    }

    pub fn arch_id(&self) -> u8 {
        self.arch_id
    }
}
