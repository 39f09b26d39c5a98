//! Pool statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, updated lock-free by every pool operation.
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    acquires: AtomicU64,
    releases: AtomicU64,
    opened: AtomicU64,
    closed: AtomicU64,
    connect_failures: AtomicU64,
    timeouts: AtomicU64,
    reclaim_passes: AtomicU64,
}

impl PoolCounters {
    pub fn record_acquire(&self) {
        self.acquires.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_open(&self) {
        self.opened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_close(&self) {
        self.closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connect_failure(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reclaim_pass(&self) {
        self.reclaim_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, entries: usize) -> PoolStats {
        PoolStats {
            acquires: self.acquires.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            connections_opened: self.opened.load(Ordering::Relaxed),
            connections_closed: self.closed.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            reclaim_passes: self.reclaim_passes.load(Ordering::Relaxed),
            entries,
        }
    }
}

/// Point-in-time view of pool activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Successful acquisitions
    pub acquires: u64,
    /// Lease releases
    pub releases: u64,
    /// Backend connections opened
    pub connections_opened: u64,
    /// Backend connections closed
    pub connections_closed: u64,
    /// Connect attempts that failed
    pub connect_failures: u64,
    /// Acquisitions abandoned at their deadline
    pub timeouts: u64,
    /// Completed reclamation passes
    pub reclaim_passes: u64,
    /// Entries currently registered
    pub entries: usize,
}

impl PoolStats {
    /// Leases handed out and not yet released.
    pub fn outstanding(&self) -> u64 {
        self.acquires.saturating_sub(self.releases)
    }

    /// Connections currently open, pooled or private.
    pub fn open_connections(&self) -> u64 {
        self.connections_opened
            .saturating_sub(self.connections_closed)
    }
}
