//! Layer queries and their cached results.
//!
//! [`LayerQueryEngine`] runs attribute, rectangle and index queries against an
//! open layer. A successful query replaces the layer's [`ResultCache`]
//! wholesale with a new [`ResultSet`]; a failed one leaves the previous set
//! visible.
//!
//! Results are addresses only ([`ResultEntry`]). Geometry and attributes are
//! fetched on demand with [`LayerQueryEngine::materialize_shape`].

mod cache;
mod engine;
mod filter;
mod result;

pub use cache::ResultCache;
pub use engine::LayerQueryEngine;
pub use filter::{MatchMode, QueryFilter, QueryOptions};
pub use result::{ResultEntry, ResultSet};

use crate::backend::BackendError;
use crate::pool::PoolError;
use thiserror::Error;

/// Errors raised by queries and result access.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// The layer has not been opened, or has been closed.
    #[error("Layer '{0}' is not open")]
    LayerNotOpen(String),

    /// The attribute is not part of the layer's schema.
    #[error("Field '{field}' not found in layer '{layer}'")]
    FieldNotFound { layer: String, field: String },

    /// Ordinal past the end of a result set or feature collection.
    #[error("Index {index} out of range (count {count})")]
    IndexOutOfRange { index: usize, count: usize },

    /// The query deadline passed. The previous results are untouched.
    #[error("Query on layer '{0}' timed out")]
    Timeout(String),

    /// Connection acquisition failed.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The backend failed mid-query.
    #[error(transparent)]
    Backend(#[from] BackendError),
}
