//! Counted access to a pooled connection.

use super::entry::PoolEntry;
use super::registry::PoolInner;
use super::PoolError;
use crate::backend::{BackendConnection, BackendError, ConnectionKey, ConnectionPolicy};
use crate::handle::{HandleError, RefCount};
use crate::log_error;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// One reference to a pooled connection.
///
/// Holding a lease keeps the entry's count above zero, which keeps
/// reclamation away from it. Dropping a lease releases it; use
/// [`release`](Self::release) to observe release errors.
///
/// Leases are `Send`: a lease taken on one thread may be released on another.
pub struct ConnectionLease {
    pool: Arc<PoolInner>,
    entry: Arc<PoolEntry>,
    tracker: Option<Arc<RefCount>>,
    released: bool,
}

impl ConnectionLease {
    pub(super) fn new(pool: Arc<PoolInner>, entry: Arc<PoolEntry>) -> Self {
        Self {
            pool,
            entry,
            tracker: None,
            released: false,
        }
    }

    /// Key of the leased connection.
    pub fn key(&self) -> &ConnectionKey {
        self.entry.key()
    }

    /// Policy the entry was created with.
    pub fn policy(&self) -> ConnectionPolicy {
        self.entry.policy()
    }

    /// Identifier of the pool entry, unique for the pool's lifetime.
    pub fn entry_id(&self) -> u64 {
        self.entry.id()
    }

    /// Whether the leased connection is private to this lease.
    pub fn is_private(&self) -> bool {
        self.entry.policy() == ConnectionPolicy::Always
    }

    /// Counts this lease against `tracker` until it is released.
    ///
    /// Used by map contexts to find leases still outstanding at teardown.
    pub fn attach_tracker(&mut self, tracker: Arc<RefCount>) -> Result<(), HandleError> {
        if let Some(previous) = self.tracker.take() {
            previous.release()?;
        }
        tracker.try_acquire()?;
        self.tracker = Some(tracker);
        Ok(())
    }

    /// Runs `f` with exclusive access to the connection.
    pub fn with_connection<R, E>(
        &self,
        f: impl FnOnce(&mut dyn BackendConnection) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<PoolError>,
    {
        self.with_connection_until(None, f)
    }

    /// Like [`with_connection`](Self::with_connection), failing with
    /// [`PoolError::Timeout`] if the connection is still busy at `deadline`.
    pub fn with_connection_until<R, E>(
        &self,
        deadline: Option<Instant>,
        f: impl FnOnce(&mut dyn BackendConnection) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<PoolError>,
    {
        let mut slot = self.entry.lock_slot(deadline).ok_or_else(|| {
            self.pool.counters().record_timeout();
            PoolError::Timeout {
                key: self.key().to_string(),
            }
        })?;
        match slot.as_mut() {
            Some(conn) => f(conn.as_mut()),
            None => Err(PoolError::Backend(BackendError::Closed(self.key().to_string())).into()),
        }
    }

    /// Releases the lease.
    ///
    /// Does not close the connection unless it is private.
    pub fn release(mut self) -> Result<(), PoolError> {
        self.release_once()
    }

    fn release_once(&mut self) -> Result<(), PoolError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        let tracked = match self.tracker.take() {
            Some(tracker) => tracker.release().map(|_| ()).map_err(|e| {
                log_error!(self.pool.logger(), "{}", e);
                e
            }),
            None => Ok(()),
        };
        self.pool.release_entry(&self.entry)?;
        tracked.map_err(PoolError::from)
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        // Errors are already logged by the pool.
        let _ = self.release_once();
    }
}

impl fmt::Debug for ConnectionLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionLease")
            .field("entry", &self.entry)
            .field("tracked", &self.tracker.is_some())
            .field("released", &self.released)
            .finish()
    }
}
