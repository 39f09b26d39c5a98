//! The keyed connection registry.

use super::entry::PoolEntry;
use super::lease::ConnectionLease;
use super::stats::{PoolCounters, PoolStats};
use super::PoolError;
use crate::backend::{ConnectionKey, ConnectionPolicy, Connector};
use crate::handle::HandleError;
use crate::log::Logger;
use crate::{log_debug, log_error, log_warn};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

// =============================================================================
// Shared state
// =============================================================================

pub(crate) struct PoolInner {
    entries: DashMap<ConnectionKey, Arc<PoolEntry>>,
    connector: Arc<dyn Connector>,
    logger: Arc<dyn Logger>,
    counters: PoolCounters,
    next_id: AtomicU64,
}

impl PoolInner {
    pub(super) fn counters(&self) -> &PoolCounters {
        &self.counters
    }

    pub(super) fn logger(&self) -> &dyn Logger {
        self.logger.as_ref()
    }

    fn new_entry(&self, key: &ConnectionKey, policy: ConnectionPolicy) -> Arc<PoolEntry> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Arc::new(PoolEntry::new(id, key.clone(), policy))
    }

    /// Increments the count of the registered entry for `key`, replacing an
    /// entry that is closing. Runs under the map's shard lock; no I/O.
    fn reference_entry(
        &self,
        key: &ConnectionKey,
        policy: ConnectionPolicy,
    ) -> Result<Arc<PoolEntry>, HandleError> {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let existing = Arc::clone(occupied.get());
                match existing.refs().try_acquire() {
                    Ok(_) => Ok(existing),
                    Err(HandleError::Closing(_)) => {
                        let fresh = self.new_entry(key, policy);
                        fresh.refs().try_acquire()?;
                        occupied.insert(Arc::clone(&fresh));
                        log_debug!(
                            self.logger,
                            "Replaced closing entry #{} for {} with #{}",
                            existing.id(),
                            key,
                            fresh.id()
                        );
                        Ok(fresh)
                    }
                    Err(e) => Err(e),
                }
            }
            Entry::Vacant(vacant) => {
                let fresh = self.new_entry(key, policy);
                fresh.refs().try_acquire()?;
                vacant.insert(Arc::clone(&fresh));
                log_debug!(self.logger, "Registered entry #{} for {}", fresh.id(), key);
                Ok(fresh)
            }
        }
    }

    /// Makes sure the entry holds an open connection, connecting under the
    /// entry's own lock if needed.
    fn ensure_connected(
        &self,
        entry: &PoolEntry,
        deadline: Option<Instant>,
    ) -> Result<(), PoolError> {
        let Some(mut slot) = entry.lock_slot(deadline) else {
            return Err(PoolError::Timeout {
                key: entry.key().to_string(),
            });
        };
        if slot.is_some() {
            return Ok(());
        }
        match self.connector.connect(entry.key()) {
            Ok(conn) => {
                *slot = Some(conn);
                self.counters.record_open();
                log_debug!(
                    self.logger,
                    "Opened connection for {} (#{})",
                    entry.key(),
                    entry.id()
                );
                Ok(())
            }
            Err(source) => {
                self.counters.record_connect_failure();
                Err(PoolError::BackendUnavailable {
                    key: entry.key().to_string(),
                    source,
                })
            }
        }
    }

    /// Drops a reference taken by a failed acquisition.
    ///
    /// A shared entry left unreferenced and unconnected is discarded so the
    /// failure is not cached. A shared entry that did connect stays for the
    /// next reclamation pass; a private one is closed now. Never waits on the
    /// slot: a busy slot means another acquirer is using the entry.
    fn abandon(&self, entry: &Arc<PoolEntry>) {
        if let Err(e) = entry.refs().release() {
            log_error!(self.logger, "{}", e);
            return;
        }
        let keep = entry.policy() != ConnectionPolicy::Always
            && entry.try_is_connected().unwrap_or(true);
        if !keep && entry.refs().try_begin_close() {
            self.retire(entry);
        }
    }

    pub(super) fn release_entry(&self, entry: &PoolEntry) -> Result<(), HandleError> {
        let remaining = entry.refs().release().map_err(|e| {
            log_error!(self.logger, "{}", e);
            e
        })?;
        self.counters.record_release();
        log_debug!(
            self.logger,
            "Released {} (#{}), {} references remain",
            entry.key(),
            entry.id(),
            remaining
        );

        if entry.policy() == ConnectionPolicy::Always
            && remaining == 0
            && entry.refs().try_begin_close()
            && entry.close_connection()
        {
            self.counters.record_close();
            log_debug!(
                self.logger,
                "Closed private connection for {} (#{})",
                entry.key(),
                entry.id()
            );
        }
        Ok(())
    }

    /// Closes and unregisters an entry that already won its close transition.
    fn retire(&self, entry: &Arc<PoolEntry>) {
        self.entries
            .remove_if(entry.key(), |_, current| Arc::ptr_eq(current, entry));
        if entry.close_connection() {
            self.counters.record_close();
            log_debug!(
                self.logger,
                "Closed connection for {} (#{}) after {:?}",
                entry.key(),
                entry.id(),
                entry.created().elapsed()
            );
        } else {
            log_debug!(
                self.logger,
                "Discarded unconnected entry #{} for {}",
                entry.id(),
                entry.key()
            );
        }
    }

    fn snapshot_entries(&self) -> Vec<Arc<PoolEntry>> {
        self.entries
            .iter()
            .map(|item| Arc::clone(item.value()))
            .collect()
    }
}

// =============================================================================
// Public pool
// =============================================================================

/// Outcome of [`ConnectionPool::shutdown`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Connections closed by the shutdown.
    pub closed: usize,
    /// Entries still referenced, with their counts. These are left open.
    pub leaked: Vec<(ConnectionKey, usize)>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.leaked.is_empty()
    }
}

/// Thread-safe registry of backend connections keyed by [`ConnectionKey`].
///
/// Cloning is cheap; clones share the same registry.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Creates an empty pool that opens connections through `connector`.
    pub fn new(connector: Arc<dyn Connector>, logger: Arc<dyn Logger>) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                entries: DashMap::new(),
                connector,
                logger,
                counters: PoolCounters::default(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Acquires a shared connection to `key` with the default policy.
    pub fn acquire(&self, key: &ConnectionKey) -> Result<ConnectionLease, PoolError> {
        self.acquire_with_deadline(key, ConnectionPolicy::default(), None)
    }

    /// Acquires a connection to `key` under `policy`.
    pub fn acquire_with_policy(
        &self,
        key: &ConnectionKey,
        policy: ConnectionPolicy,
    ) -> Result<ConnectionLease, PoolError> {
        self.acquire_with_deadline(key, policy, None)
    }

    /// Acquires a connection, giving up at `deadline`.
    ///
    /// A shared entry keeps the policy it was created with. On
    /// [`PoolError::Timeout`] or [`PoolError::BackendUnavailable`] the
    /// reference taken by this call has already been released.
    pub fn acquire_with_deadline(
        &self,
        key: &ConnectionKey,
        policy: ConnectionPolicy,
        deadline: Option<Instant>,
    ) -> Result<ConnectionLease, PoolError> {
        log_debug!(self.inner.logger, "Requested connection for {} ({})", key, policy);

        let entry = match policy {
            ConnectionPolicy::Always => {
                let private = self.inner.new_entry(key, policy);
                private.refs().try_acquire()?;
                private
            }
            ConnectionPolicy::Normal | ConnectionPolicy::Defer => {
                self.inner.reference_entry(key, policy)?
            }
        };

        let connected = self
            .inner
            .ensure_connected(&entry, deadline)
            .and_then(|()| match deadline {
                Some(deadline) if Instant::now() > deadline => Err(PoolError::Timeout {
                    key: key.to_string(),
                }),
                _ => Ok(()),
            });

        if let Err(e) = connected {
            if matches!(e, PoolError::Timeout { .. }) {
                self.inner.counters.record_timeout();
            }
            log_debug!(self.inner.logger, "Acquire of {} failed: {}", key, e);
            self.inner.abandon(&entry);
            return Err(e);
        }

        self.inner.counters.record_acquire();
        Ok(ConnectionLease::new(Arc::clone(&self.inner), entry))
    }

    /// Releases a lease. The connection stays pooled.
    pub fn release(&self, lease: ConnectionLease) -> Result<(), PoolError> {
        lease.release()
    }

    /// Closes and removes every shared entry whose count is zero.
    ///
    /// Safe to call concurrently with any acquire or release. Returns the
    /// number of entries reclaimed; a second call with no intervening
    /// activity returns 0.
    pub fn reclaim_unreferenced(&self) -> usize {
        let candidates: Vec<Arc<PoolEntry>> = self
            .inner
            .snapshot_entries()
            .into_iter()
            .filter(|e| e.refs().is_unreferenced())
            .collect();

        let mut reclaimed = 0;
        for entry in candidates {
            if !entry.refs().try_begin_close() {
                continue;
            }
            self.inner.retire(&entry);
            reclaimed += 1;
        }

        self.inner.counters.record_reclaim_pass();
        if reclaimed > 0 {
            log_debug!(self.inner.logger, "Reclaimed {} unreferenced connections", reclaimed);
        }
        reclaimed
    }

    /// Closes every unreferenced entry.
    ///
    /// Entries still referenced are reported as leaks and left open.
    pub fn shutdown(&self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        for entry in self.inner.snapshot_entries() {
            if entry.refs().try_begin_close() {
                self.inner.retire(&entry);
                report.closed += 1;
                continue;
            }
            let count = entry.refs().count();
            if count > 0 {
                log_warn!(
                    self.inner.logger,
                    "ResourceLeak: {} (#{}) still has {} references at shutdown",
                    entry.key(),
                    entry.id(),
                    count
                );
                report.leaked.push((entry.key().clone(), count));
            }
        }
        report.leaked.sort();
        report
    }

    /// Whether an entry is registered for `key`.
    pub fn contains(&self, key: &ConnectionKey) -> bool {
        self.inner.entries.contains_key(key)
    }

    /// Reference count of the registered entry for `key`.
    pub fn ref_count(&self, key: &ConnectionKey) -> Option<usize> {
        self.inner
            .entries
            .get(key)
            .map(|entry| entry.refs().count())
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<ConnectionKey> {
        let mut keys: Vec<ConnectionKey> =
            self.inner.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.counters.snapshot(self.len())
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, ConnectionKind, Dataset, MemoryBackend};
    use crate::geometry::{Point, ShapeKind};
    use crate::log::testing::CapturingLogger;
    use crate::log::{LogLevel, NoOpLogger};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn points_key() -> ConnectionKey {
        ConnectionKey::new(ConnectionKind::Local, "data/points")
    }

    fn lines_key() -> ConnectionKey {
        ConnectionKey::new(ConnectionKind::PostGis, "host=db")
    }

    fn backend() -> Arc<MemoryBackend> {
        let backend = Arc::new(MemoryBackend::new());
        backend.register(
            points_key(),
            Dataset::new(ShapeKind::Point, &["FNAME"])
                .with_feature(vec![Point::new(0.0, 0.0)], &["A Point"]),
        );
        backend.register(lines_key(), Dataset::new(ShapeKind::Line, &["NAME"]));
        backend
    }

    fn pool(backend: &Arc<MemoryBackend>) -> ConnectionPool {
        ConnectionPool::new(backend.clone(), Arc::new(NoOpLogger))
    }

    #[test]
    fn test_acquire_shares_one_connection() {
        let backend = backend();
        let pool = pool(&backend);

        let a = pool.acquire(&points_key()).unwrap();
        let b = pool
            .acquire(&ConnectionKey::new(ConnectionKind::Local, " DATA/Points "))
            .unwrap();

        assert_eq!(a.entry_id(), b.entry_id());
        assert_eq!(pool.ref_count(&points_key()), Some(2));
        assert_eq!(backend.connect_count(), 1);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_release_does_not_close() {
        let backend = backend();
        let pool = pool(&backend);

        let lease = pool.acquire(&points_key()).unwrap();
        pool.release(lease).unwrap();

        assert!(pool.contains(&points_key()));
        assert_eq!(pool.ref_count(&points_key()), Some(0));
        assert_eq!(backend.close_count(), 0);
    }

    #[test]
    fn test_reclaim_closes_only_unreferenced() {
        let backend = backend();
        let pool = pool(&backend);

        let held = pool.acquire(&points_key()).unwrap();
        let dropped = pool.acquire(&lines_key()).unwrap();
        drop(dropped);

        assert_eq!(pool.reclaim_unreferenced(), 1);
        assert!(pool.contains(&points_key()));
        assert!(!pool.contains(&lines_key()));
        assert_eq!(backend.close_count(), 1);

        // Idempotent.
        assert_eq!(pool.reclaim_unreferenced(), 0);
        drop(held);
    }

    #[test]
    fn test_reacquire_after_reclaim_opens_fresh_connection() {
        let backend = backend();
        let pool = pool(&backend);

        let first = pool.acquire(&points_key()).unwrap();
        let first_id = first.entry_id();
        drop(first);
        pool.reclaim_unreferenced();

        let second = pool.acquire(&points_key()).unwrap();
        assert_ne!(second.entry_id(), first_id);
        assert_eq!(backend.connect_count(), 2);
        let count = second
            .with_connection(|conn| conn.feature_count().map_err(PoolError::from))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_connect_failure_is_not_cached() {
        let backend = backend();
        let pool = pool(&backend);
        backend.set_offline(&points_key(), true);

        let err = pool.acquire(&points_key()).unwrap_err();
        assert!(matches!(err, PoolError::BackendUnavailable { .. }));
        assert!(!pool.contains(&points_key()));
        assert_eq!(pool.stats().connect_failures, 1);

        backend.set_offline(&points_key(), false);
        assert!(pool.acquire(&points_key()).is_ok());
    }

    #[test]
    fn test_unknown_key_is_unavailable() {
        let backend = backend();
        let pool = pool(&backend);
        let key = ConnectionKey::new(ConnectionKind::Wms, "http://nowhere");

        let err = pool.acquire(&key).unwrap_err();
        assert!(matches!(
            err,
            PoolError::BackendUnavailable {
                source: BackendError::Unavailable { .. },
                ..
            }
        ));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_deadline_expiry_releases_partial_acquisition() {
        let backend = backend();
        backend.set_connect_delay(Duration::from_millis(50));
        let pool = pool(&backend);

        let deadline = Instant::now() + Duration::from_millis(5);
        let err = pool
            .acquire_with_deadline(&points_key(), ConnectionPolicy::Normal, Some(deadline))
            .unwrap_err();

        assert!(matches!(err, PoolError::Timeout { .. }));
        assert_eq!(pool.ref_count(&points_key()), Some(0));
        assert_eq!(pool.stats().timeouts, 1);
        assert_eq!(pool.reclaim_unreferenced(), 1);
        assert_eq!(backend.open_count(), 0);
    }

    #[test]
    fn test_deadline_on_busy_connection() {
        let backend = backend();
        let pool = pool(&backend);
        let lease = pool.acquire(&points_key()).unwrap();
        let other = pool.acquire(&points_key()).unwrap();

        let result: Result<(), PoolError> = lease.with_connection(|_| {
            let deadline = Instant::now() + Duration::from_millis(10);
            other.with_connection_until(Some(deadline), |_| Ok(()))
        });

        assert!(matches!(result, Err(PoolError::Timeout { .. })));
    }

    #[test]
    fn test_always_policy_never_shares() {
        let backend = backend();
        let pool = pool(&backend);

        let a = pool
            .acquire_with_policy(&points_key(), ConnectionPolicy::Always)
            .unwrap();
        let b = pool
            .acquire_with_policy(&points_key(), ConnectionPolicy::Always)
            .unwrap();

        assert!(a.is_private());
        assert_ne!(a.entry_id(), b.entry_id());
        assert!(!pool.contains(&points_key()));
        assert_eq!(backend.open_count(), 2);

        drop(a);
        assert_eq!(backend.open_count(), 1);
        drop(b);
        assert_eq!(backend.open_count(), 0);
    }

    #[test]
    fn test_reclaim_closes_unreferenced_entries_of_every_shared_policy() {
        let backend = backend();
        let pool = pool(&backend);

        let deferred = pool
            .acquire_with_policy(&points_key(), ConnectionPolicy::Defer)
            .unwrap();
        let normal = pool.acquire(&lines_key()).unwrap();
        drop(deferred);

        // Released but not reclaimed yet: the connection stays open.
        assert!(pool.contains(&points_key()));
        assert_eq!(backend.open_count(), 2);

        assert_eq!(pool.reclaim_unreferenced(), 1);
        assert_eq!(pool.keys(), vec![lines_key()]);
        assert_eq!(backend.open_count(), 1);

        drop(normal);
        assert_eq!(pool.reclaim_unreferenced(), 1);
        assert!(pool.is_empty());
        assert_eq!(backend.open_count(), 0);
    }

    #[test]
    fn test_timed_out_acquire_does_not_wait_for_other_connect() {
        let backend = backend();
        backend.set_connect_delay(Duration::from_millis(600));
        let pool = pool(&backend);
        let started = Barrier::new(2);

        thread::scope(|s| {
            let slow = s.spawn(|| {
                started.wait();
                pool.acquire(&points_key())
            });

            started.wait();
            thread::sleep(Duration::from_millis(50));
            let begun = Instant::now();
            let deadline = begun + Duration::from_millis(20);
            let err = pool
                .acquire_with_deadline(&points_key(), ConnectionPolicy::Normal, Some(deadline))
                .unwrap_err();
            let waited = begun.elapsed();

            assert!(matches!(err, PoolError::Timeout { .. }));
            assert!(waited < Duration::from_millis(300), "waited {:?}", waited);

            // The slow acquirer still gets its connection.
            let lease = slow.join().unwrap().unwrap();
            assert_eq!(pool.ref_count(&points_key()), Some(1));
            drop(lease);
        });

        assert_eq!(pool.stats().timeouts, 1);
        assert_eq!(pool.reclaim_unreferenced(), 1);
        assert_eq!(backend.open_count(), 0);
    }

    #[test]
    fn test_shared_entry_keeps_creation_policy() {
        let backend = backend();
        let pool = pool(&backend);

        let deferred = pool
            .acquire_with_policy(&points_key(), ConnectionPolicy::Defer)
            .unwrap();
        let normal = pool.acquire(&points_key()).unwrap();

        assert_eq!(normal.policy(), ConnectionPolicy::Defer);
        assert_eq!(deferred.entry_id(), normal.entry_id());
    }

    #[test]
    fn test_shutdown_reports_leaks() {
        let backend = backend();
        let logger = Arc::new(CapturingLogger::default());
        let pool = ConnectionPool::new(backend.clone(), logger.clone());

        let held = pool.acquire(&points_key()).unwrap();
        drop(pool.acquire(&lines_key()).unwrap());

        let report = pool.shutdown();
        assert_eq!(report.closed, 1);
        assert_eq!(report.leaked, vec![(points_key(), 1)]);
        assert!(pool.contains(&points_key()));

        let warnings = logger.messages_at(LogLevel::Warn);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("ResourceLeak"));
        drop(held);
    }

    #[test]
    fn test_tracker_counts_leases() {
        use crate::handle::RefCount;

        let backend = backend();
        let pool = pool(&backend);
        let tracker = Arc::new(RefCount::new("context"));

        let mut lease = pool.acquire(&points_key()).unwrap();
        lease.attach_tracker(Arc::clone(&tracker)).unwrap();
        assert_eq!(tracker.count(), 1);

        lease.release().unwrap();
        assert_eq!(tracker.count(), 0);
    }

    #[test]
    fn test_stats_track_activity() {
        let backend = backend();
        let pool = pool(&backend);

        let lease = pool.acquire(&points_key()).unwrap();
        drop(pool.acquire(&points_key()).unwrap());
        drop(lease);
        pool.reclaim_unreferenced();

        let stats = pool.stats();
        assert_eq!(stats.acquires, 2);
        assert_eq!(stats.releases, 2);
        assert_eq!(stats.connections_opened, 1);
        assert_eq!(stats.connections_closed, 1);
        assert_eq!(stats.reclaim_passes, 1);
        assert_eq!(stats.entries, 0);
    }

    #[test]
    fn test_reclaim_races_with_acquire() {
        let backend = backend();
        let pool = pool(&backend);
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads + 1));

        thread::scope(|s| {
            for _ in 0..threads {
                let pool = pool.clone();
                let barrier = Arc::clone(&barrier);
                s.spawn(move || {
                    barrier.wait();
                    for _ in 0..200 {
                        let lease = pool.acquire(&points_key()).unwrap();
                        let count = lease
                            .with_connection(|conn| conn.feature_count().map_err(PoolError::from))
                            .unwrap();
                        assert_eq!(count, 1);
                        drop(lease);
                    }
                });
            }
            barrier.wait();
            for _ in 0..200 {
                pool.reclaim_unreferenced();
            }
        });

        pool.reclaim_unreferenced();
        assert!(pool.is_empty());
        assert_eq!(backend.open_count(), 0);
        assert_eq!(backend.double_close_count(), 0);
    }
}
