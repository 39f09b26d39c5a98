//! One pooled backend connection.

use crate::backend::{BackendConnection, ConnectionKey, ConnectionPolicy};
use crate::handle::RefCount;
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::time::Instant;

pub(crate) type ConnectionSlot = Option<Box<dyn BackendConnection>>;

/// A connection slot plus the reference count that governs its lifetime.
///
/// The slot is empty until the first acquirer connects under the slot lock,
/// and empty again once the entry has been closed.
pub(crate) struct PoolEntry {
    id: u64,
    key: ConnectionKey,
    policy: ConnectionPolicy,
    refs: RefCount,
    connection: Mutex<ConnectionSlot>,
    created: Instant,
}

impl PoolEntry {
    pub fn new(id: u64, key: ConnectionKey, policy: ConnectionPolicy) -> Self {
        let label = format!("{} (#{})", key, id);
        Self {
            id,
            key,
            policy,
            refs: RefCount::new(label),
            connection: Mutex::new(None),
            created: Instant::now(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> &ConnectionKey {
        &self.key
    }

    pub fn policy(&self) -> ConnectionPolicy {
        self.policy
    }

    pub fn refs(&self) -> &RefCount {
        &self.refs
    }

    pub fn created(&self) -> Instant {
        self.created
    }

    /// Locks the connection slot, giving up at `deadline`.
    pub fn lock_slot(&self, deadline: Option<Instant>) -> Option<MutexGuard<'_, ConnectionSlot>> {
        match deadline {
            Some(deadline) => self.connection.try_lock_until(deadline),
            None => Some(self.connection.lock()),
        }
    }

    /// Whether the slot holds a connection, or `None` if another thread has
    /// the slot locked right now. Never blocks.
    pub fn try_is_connected(&self) -> Option<bool> {
        self.connection.try_lock().map(|slot| slot.is_some())
    }

    /// Takes the connection out of the slot and closes it.
    ///
    /// Returns `false` if the slot was already empty. Callers must have won
    /// [`RefCount::try_begin_close`] first.
    pub fn close_connection(&self) -> bool {
        let taken = self.connection.lock().take();
        match taken {
            Some(mut conn) => {
                conn.close();
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for PoolEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolEntry")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("policy", &self.policy)
            .field("refs", &self.refs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ConnectionKind, Connector, Dataset, MemoryBackend};
    use crate::geometry::ShapeKind;
    use std::time::Duration;

    fn key() -> ConnectionKey {
        ConnectionKey::new(ConnectionKind::Local, "data/points")
    }

    #[test]
    fn test_new_entry_is_empty_and_unreferenced() {
        let entry = PoolEntry::new(7, key(), ConnectionPolicy::Normal);
        assert_eq!(entry.id(), 7);
        assert!(entry.refs().is_unreferenced());
        assert!(entry.lock_slot(None).unwrap().is_none());
        assert!(!entry.close_connection());
    }

    #[test]
    fn test_close_connection_takes_slot_once() {
        let backend = MemoryBackend::new();
        backend.register(key(), Dataset::new(ShapeKind::Point, &["FNAME"]));
        let entry = PoolEntry::new(1, key(), ConnectionPolicy::Normal);
        *entry.lock_slot(None).unwrap() = Some(backend.connect(&key()).unwrap());

        assert!(entry.close_connection());
        assert!(!entry.close_connection());
        assert_eq!(backend.close_count(), 1);
        assert_eq!(backend.double_close_count(), 0);
    }

    #[test]
    fn test_lock_slot_respects_deadline() {
        let entry = PoolEntry::new(1, key(), ConnectionPolicy::Normal);
        let _held = entry.lock_slot(None).unwrap();

        let deadline = Instant::now() + Duration::from_millis(20);
        assert!(entry.lock_slot(Some(deadline)).is_none());
    }

    #[test]
    fn test_try_is_connected_never_blocks() {
        let backend = MemoryBackend::new();
        backend.register(key(), Dataset::new(ShapeKind::Point, &["FNAME"]));
        let entry = PoolEntry::new(1, key(), ConnectionPolicy::Normal);
        assert_eq!(entry.try_is_connected(), Some(false));

        {
            let mut slot = entry.lock_slot(None).unwrap();
            assert_eq!(entry.try_is_connected(), None);
            *slot = Some(backend.connect(&key()).unwrap());
        }
        assert_eq!(entry.try_is_connected(), Some(true));
    }
}
