//! Backend data sources and the connector contract.
//!
//! A backend is identified by a [`ConnectionKey`]: the connection type plus
//! the connection string, compared case-insensitively. Two layers with equal
//! keys share one pooled connection.
//!
//! Drivers implement [`Connector`] (open a connection) and
//! [`BackendConnection`] (read features, close). The pool is the only caller
//! of `connect` and `close`.

pub mod memory;

pub use memory::{Dataset, MemoryBackend};

use crate::geometry::ShapeHandle;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kind of backend a layer connects to.
///
/// Behaviour that differs by backend dispatches on this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConnectionKind {
    /// Local file-based dataset (shapefile and friends)
    Local,
    /// OGR-readable dataset
    Ogr,
    /// PostGIS database
    PostGis,
    /// Oracle Spatial database
    Oracle,
    /// Remote WMS service
    Wms,
    /// Remote WFS service
    Wfs,
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Local => "local",
            Self::Ogr => "ogr",
            Self::PostGis => "postgis",
            Self::Oracle => "oracle",
            Self::Wms => "wms",
            Self::Wfs => "wfs",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ConnectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "shapefile" => Ok(Self::Local),
            "ogr" => Ok(Self::Ogr),
            "postgis" => Ok(Self::PostGis),
            "oracle" | "oraclespatial" => Ok(Self::Oracle),
            "wms" => Ok(Self::Wms),
            "wfs" => Ok(Self::Wfs),
            other => Err(format!("unknown connection type '{}'", other)),
        }
    }
}

/// Normalized identity of a backend connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionKey {
    kind: ConnectionKind,
    connection: String,
}

impl ConnectionKey {
    /// Creates a key, trimming and lower-casing the connection string.
    pub fn new(kind: ConnectionKind, connection: &str) -> Self {
        Self {
            kind,
            connection: connection.trim().to_lowercase(),
        }
    }

    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    /// Normalized connection string.
    pub fn connection(&self) -> &str {
        &self.connection
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.connection)
    }
}

/// How the pool treats a layer's connection (the `CLOSE_CONNECTION` setting).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPolicy {
    /// Pooled and shared; closed by the next reclamation pass once unreferenced.
    #[default]
    Normal,
    /// Pooled and shared; kept open across releases until a reclamation pass
    /// or pool shutdown finds it unreferenced. Joins `Normal` entries.
    Defer,
    /// Never shared: each acquire opens a private connection, closed on release.
    Always,
}

impl fmt::Display for ConnectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Defer => write!(f, "defer"),
            Self::Always => write!(f, "always"),
        }
    }
}

impl FromStr for ConnectionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "defer" => Ok(Self::Defer),
            "always" => Ok(Self::Always),
            other => Err(format!("unrecognised close_connection value '{}'", other)),
        }
    }
}

/// Errors raised by backend drivers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend cannot be reached.
    #[error("Backend {key} unavailable: {reason}")]
    Unavailable { key: String, reason: String },

    /// The requested feature does not exist.
    #[error("Feature {index} not found in {key}")]
    FeatureNotFound { key: String, index: usize },

    /// The connection was used after being closed.
    #[error("Connection to {0} is closed")]
    Closed(String),
}

/// An open connection to one backend.
///
/// Connections are shared between threads through the pool, which serializes
/// access with a per-entry lock, so implementations only need `Send`.
pub trait BackendConnection: Send {
    /// Attribute schema, in value order.
    fn fields(&self) -> &[String];

    /// Number of features, i.e. the exclusive upper bound of shape indices.
    fn feature_count(&self) -> Result<usize, BackendError>;

    /// Reads the feature at `shape_index`.
    fn read_feature(&mut self, shape_index: usize) -> Result<ShapeHandle, BackendError>;

    /// Releases driver resources. Called exactly once, by the pool.
    fn close(&mut self);
}

/// Opens connections for the pool.
pub trait Connector: Send + Sync {
    /// Opens a connection to `key`.
    ///
    /// May block on I/O. Must not retry internally.
    fn connect(&self, key: &ConnectionKey) -> Result<Box<dyn BackendConnection>, BackendError>;
}
