//! Per-thread map and layer handles.
//!
//! A [`MapHandle`] is one logical map cloned from a shared
//! [`MapDefinition`](crate::definition::MapDefinition). It owns its layers,
//! and each layer points back at its map through an uncounted
//! [`BackRef`](crate::handle::BackRef). Every [`LayerHandle`] the map hands
//! out also pins the map, so a layer's owner resolves for the handle's whole
//! lifetime even after the caller drops its last `MapHandle`.
//!
//! Both handles are `Rc`-based and `!Send`: a map lives on the thread that
//! cloned it, and the query path takes no locks.

mod handle;
mod layer;

pub use handle::MapHandle;
pub use layer::{LayerHandle, LayerState};

use crate::handle::HandleError;
use crate::pool::PoolError;
use thiserror::Error;

/// Errors raised by map and layer handles.
#[derive(Debug, Clone, Error)]
pub enum MapError {
    /// Back-reference misuse, such as inserting a layer into a second map.
    #[error(transparent)]
    Handle(#[from] HandleError),

    /// A layer with the same name is already in the map.
    #[error("Layer '{0}' already exists in map")]
    DuplicateLayer(String),

    /// The layer's connection could not be acquired.
    #[error("Failed to open layer '{layer}': {source}")]
    Open {
        layer: String,
        #[source]
        source: PoolError,
    },

    /// Releasing the layer's connection failed.
    #[error("Failed to close layer '{layer}': {source}")]
    Close {
        layer: String,
        #[source]
        source: PoolError,
    },
}
