//! Active definitions, addressed by local message type.

use thiserror::Error;

use crate::sans::definition::MessageDefinition;

/// Number of local message types addressable by a normal record header.
pub const SLOTS: usize = 16;

/// An error looking up a definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    /// A data message referenced a slot no definition was declared for.
    #[error("No definition declared for local message type {0}.")]
    UndefinedLocalMessage(u8),
}

/// Store of definitions declared so far in one document.
///
/// Normal record headers address all sixteen slots; compressed timestamp
/// headers carry a two-bit local type and so only reach slots 0 to 3. Both
/// address the same slots.
#[derive(Debug, Clone, Default)]
pub struct DefinitionTable {
    slots: [Option<MessageDefinition>; SLOTS],
}

impl DefinitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a definition, replacing any earlier one for the same slot.
    pub fn define(&mut self, local_type: u8, definition: MessageDefinition) {
        self.slots[local_type as usize % SLOTS] = Some(definition);
    }

    /// Retrieve the active definition for a slot.
    pub fn lookup(&self, local_type: u8) -> Result<&MessageDefinition, TableError> {
        self.slots
            .get(local_type as usize)
            .and_then(Option::as_ref)
            .ok_or(TableError::UndefinedLocalMessage(local_type))
    }

    /// Forget every definition, as at the start of a new document.
    pub fn reset(&mut self) {
        self.slots = Default::default();
    }

    /// Number of slots holding a definition.
    pub fn active(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}
