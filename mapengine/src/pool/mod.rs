//! Shared backend connection pool.
//!
//! Map contexts cloned on many threads open the same layers, and layers with
//! equal [`ConnectionKey`](crate::backend::ConnectionKey)s share one backend
//! connection through this pool. Every acquisition hands out a
//! [`ConnectionLease`]; the entry's reference count is the number of live
//! leases.
//!
//! # Reclamation
//!
//! Releasing the last lease never closes anything. Connections are closed by
//! an explicit [`ConnectionPool::reclaim_unreferenced`] pass, which any thread
//! may run at any time. The pass decides and closes under the entry's own
//! compare-and-swap, so an acquire racing with it either keeps the entry alive
//! or installs a fresh one; it never receives a closed connection.
//!
//! # Example
//!
//! ```
//! use mapengine::backend::{ConnectionKey, ConnectionKind, Dataset, MemoryBackend};
//! use mapengine::geometry::ShapeKind;
//! use mapengine::log::NoOpLogger;
//! use mapengine::pool::ConnectionPool;
//! use std::sync::Arc;
//!
//! let backend = Arc::new(MemoryBackend::new());
//! let key = ConnectionKey::new(ConnectionKind::Local, "data/points");
//! backend.register(key.clone(), Dataset::new(ShapeKind::Point, &["FNAME"]));
//!
//! let pool = ConnectionPool::new(backend, Arc::new(NoOpLogger));
//! let lease = pool.acquire(&key).unwrap();
//! assert_eq!(pool.ref_count(&key), Some(1));
//!
//! pool.release(lease).unwrap();
//! assert_eq!(pool.reclaim_unreferenced(), 1);
//! assert!(pool.is_empty());
//! ```

mod entry;
mod lease;
mod registry;
mod stats;

pub use lease::ConnectionLease;
pub use registry::{ConnectionPool, ShutdownReport};
pub use stats::PoolStats;

use crate::backend::BackendError;
use crate::handle::HandleError;
use thiserror::Error;

/// Errors raised by the connection pool.
#[derive(Debug, Clone, Error)]
pub enum PoolError {
    /// The backend refused or failed the connection attempt.
    #[error("Backend unavailable for {key}: {source}")]
    BackendUnavailable {
        key: String,
        #[source]
        source: BackendError,
    },

    /// The caller's deadline passed before the connection was usable.
    #[error("Timed out acquiring connection to {key}")]
    Timeout { key: String },

    /// Reference count misuse.
    #[error(transparent)]
    Handle(#[from] HandleError),

    /// The backend failed while a lease was in use.
    #[error(transparent)]
    Backend(#[from] BackendError),
}
