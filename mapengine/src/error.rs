//! Engine-wide error type.
//!
//! Each module raises its own error enum. [`EngineError`] wraps them for
//! callers that drive a whole work cycle, and [`EngineError::kind`] classifies
//! any of them into the engine's taxonomy.

use crate::backend::BackendError;
use crate::config::ConfigFileError;
use crate::definition::DefinitionError;
use crate::handle::HandleError;
use crate::map::MapError;
use crate::pool::PoolError;
use crate::query::QueryError;
use crate::render::RenderError;
use std::fmt;
use thiserror::Error;

/// Classification of an engine error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Release without a matching acquire. A programming error.
    ReferenceUnderflow,
    /// Backend unreachable or failing. Recoverable.
    BackendUnavailable,
    /// Unknown attribute in a query.
    FieldNotFound,
    /// Ordinal past the end of a result set or feature collection.
    IndexOutOfRange,
    /// Query on a layer that is not open.
    LayerNotOpen,
    /// Unknown layer name.
    LayerNotFound,
    /// Deadline passed. Recoverable; resources were released first.
    Timeout,
    /// Map definition could not be loaded or is inconsistent.
    Definition,
    /// Drawing or encoding failed.
    Render,
    /// Engine configuration is invalid.
    Config,
    /// Handle misuse other than underflow.
    Handle,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReferenceUnderflow => "ReferenceUnderflow",
            Self::BackendUnavailable => "BackendUnavailable",
            Self::FieldNotFound => "FieldNotFound",
            Self::IndexOutOfRange => "IndexOutOfRange",
            Self::LayerNotOpen => "LayerNotOpen",
            Self::LayerNotFound => "LayerNotFound",
            Self::Timeout => "Timeout",
            Self::Definition => "Definition",
            Self::Render => "Render",
            Self::Config => "Config",
            Self::Handle => "Handle",
        };
        write!(f, "{}", name)
    }
}

/// Any error the engine can return.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Handle(#[from] HandleError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Map(#[from] MapError),

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Config(#[from] ConfigFileError),

    /// No layer with this name in the context's map.
    #[error("Layer '{0}' not found")]
    LayerNotFound(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Handle(e) => handle_kind(e),
            Self::Pool(e) => pool_kind(e),
            Self::Backend(e) => backend_kind(e),
            Self::Query(e) => query_kind(e),
            Self::Map(e) => map_kind(e),
            Self::Definition(_) => ErrorKind::Definition,
            Self::Render(_) => ErrorKind::Render,
            Self::Config(_) => ErrorKind::Config,
            Self::LayerNotFound(_) => ErrorKind::LayerNotFound,
        }
    }

    /// Whether retrying the unit of work may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::BackendUnavailable | ErrorKind::Timeout
        )
    }
}

fn handle_kind(e: &HandleError) -> ErrorKind {
    match e {
        HandleError::ReferenceUnderflow(_) => ErrorKind::ReferenceUnderflow,
        HandleError::Closing(_) | HandleError::AlreadyAttached(_) => ErrorKind::Handle,
    }
}

fn backend_kind(e: &BackendError) -> ErrorKind {
    match e {
        BackendError::Unavailable { .. } | BackendError::Closed(_) => {
            ErrorKind::BackendUnavailable
        }
        BackendError::FeatureNotFound { .. } => ErrorKind::IndexOutOfRange,
    }
}

fn pool_kind(e: &PoolError) -> ErrorKind {
    match e {
        PoolError::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
        PoolError::Timeout { .. } => ErrorKind::Timeout,
        PoolError::Handle(h) => handle_kind(h),
        PoolError::Backend(b) => backend_kind(b),
    }
}

fn query_kind(e: &QueryError) -> ErrorKind {
    match e {
        QueryError::LayerNotOpen(_) => ErrorKind::LayerNotOpen,
        QueryError::FieldNotFound { .. } => ErrorKind::FieldNotFound,
        QueryError::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
        QueryError::Timeout(_) => ErrorKind::Timeout,
        QueryError::Pool(p) => pool_kind(p),
        QueryError::Backend(b) => backend_kind(b),
    }
}

fn map_kind(e: &MapError) -> ErrorKind {
    match e {
        MapError::Handle(h) => handle_kind(h),
        MapError::DuplicateLayer(_) => ErrorKind::Definition,
        MapError::Open { source, .. } | MapError::Close { source, .. } => pool_kind(source),
    }
}
