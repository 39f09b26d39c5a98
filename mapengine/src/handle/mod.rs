//! Resource handles: counted lifetimes and non-owning back-references.
//!
//! Two primitives underpin every shared or parented object in the engine:
//!
//! - [`RefCount`]: an atomic `{count, closing}` state word. Pool entries and
//!   per-context lease trackers use it; `release()` past zero is reported as
//!   [`HandleError::ReferenceUnderflow`] instead of wrapping.
//! - [`BackRef`]: an uncounted link from a child to its parent (layer → map).
//!   It resolves for as long as the parent's own strong chain keeps it alive
//!   and never extends that lifetime.
//!
//! Reaching a count of zero never destroys anything by itself. Objects become
//! *eligible* for reclamation, and an owner decides when to reclaim (see
//! [`crate::pool::ConnectionPool::reclaim_unreferenced`]).

mod backref;
mod refcount;

pub use backref::BackRef;
pub use refcount::RefCount;

use thiserror::Error;

/// Errors raised by the handle primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandleError {
    /// `release()` was called more times than `acquire()`.
    ///
    /// Always a programming error. Callers log it and abort the unit of work.
    #[error("Reference underflow on {0}: released more times than acquired")]
    ReferenceUnderflow(String),

    /// The object is being closed and can no longer be acquired.
    #[error("{0} is closing and cannot be acquired")]
    Closing(String),

    /// The child already has a live parent.
    #[error("{0} is already attached to a parent")]
    AlreadyAttached(String),
}
