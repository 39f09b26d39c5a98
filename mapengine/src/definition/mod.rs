//! Immutable map definitions and their loader.
//!
//! A [`MapDefinition`] is loaded once and shared read-only between worker
//! threads behind an `Arc`; every [`crate::context::ConcurrentMapContext`]
//! clones its own map from it. Layers, classes and styles are flat records:
//! where behaviour differs by layer kind or connection kind the engine matches
//! on the enum tag.

mod loader;
mod types;

pub use loader::{ConfigLoader, IniDefinitionLoader};
pub use types::{ClassDefinition, LayerDefinition, LayerKind, LayerStatus, MapDefinition};

use thiserror::Error;

/// Errors produced while loading a definition.
#[derive(Debug, Error)]
pub enum DefinitionError {
    /// The file could not be read or parsed as INI.
    #[error("Failed to read map definition: {0}")]
    Read(#[from] ini::Error),

    /// INI syntax error in an in-memory definition.
    #[error("Invalid map definition syntax: {0}")]
    Syntax(String),

    /// A required section is absent.
    #[error("Missing [{0}] section")]
    MissingSection(String),

    /// A required key is absent.
    #[error("Missing key {section}.{key}")]
    MissingKey { section: String, key: String },

    /// A value failed validation.
    #[error("Invalid value: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Two layers share a name.
    #[error("Duplicate layer '{0}'")]
    DuplicateLayer(String),
}
