//! Parallel work cycles over a shared map definition.
//!
//! The [`WorkerRunner`] spawns scoped threads that each repeat the same
//! cycle against a shared [`MapDefinition`]:
//!
//! ```text
//! ┌──────────── one cycle ────────────┐
//! │ build context from definition     │
//! │ open target layer                 │
//! │ query                             │
//! │ materialize + buffer first result │  (optional)
//! │ draw                              │
//! │ teardown                          │
//! └───────────────────────────────────┘
//!          every `reclaim_every` cycles: pool.reclaim_unreferenced()
//! ```
//!
//! Failures inside a cycle are logged and counted; the worker moves on to the
//! next cycle. A buffer the geometry engine cannot produce is skipped, and a
//! backend that drops out during the optional steps does not fail the cycle.

mod runner;

pub use runner::WorkerRunner;

use crate::definition::MapDefinition;
use crate::query::{MatchMode, QueryFilter};
use std::sync::Arc;

/// Worker runner settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkerConfig {
    /// Worker threads to spawn.
    pub threads: usize,
    /// Cycles each worker performs.
    pub cycles: usize,
    /// Run a reclamation pass after every this many cycles (0 disables).
    pub reclaim_every: usize,
    /// Distance passed to the geometry engine's buffer.
    pub buffer_distance: f64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: crate::config::num_cpus(),
            cycles: crate::config::DEFAULT_WORKER_CYCLES,
            reclaim_every: crate::config::DEFAULT_RECLAIM_EVERY,
            buffer_distance: crate::config::DEFAULT_BUFFER_DISTANCE,
        }
    }
}

impl WorkerConfig {
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_cycles(mut self, cycles: usize) -> Self {
        self.cycles = cycles;
        self
    }

    pub fn with_reclaim_every(mut self, reclaim_every: usize) -> Self {
        self.reclaim_every = reclaim_every;
        self
    }
}

/// What each cycle does.
#[derive(Debug, Clone)]
pub struct WorkJob {
    pub definition: Arc<MapDefinition>,
    /// Layer to open and query.
    pub layer: String,
    pub filter: QueryFilter,
    pub mode: MatchMode,
    /// Materialize and buffer the first result of each query.
    pub materialize: bool,
}

impl WorkJob {
    pub fn new(definition: Arc<MapDefinition>, layer: impl Into<String>, filter: QueryFilter) -> Self {
        Self {
            definition,
            layer: layer.into(),
            filter,
            mode: MatchMode::Multiple,
            materialize: false,
        }
    }

    pub fn with_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_materialize(mut self, materialize: bool) -> Self {
        self.materialize = materialize;
        self
    }
}

/// Totals over every worker of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub cycles_completed: usize,
    pub failed_cycles: usize,
    /// Sum of query result counts over completed cycles.
    pub total_results: usize,
    /// Buffers the geometry engine could not produce.
    pub buffers_skipped: usize,
    /// Leases reported as leaked by context teardown.
    pub leaks: usize,
    pub panicked_workers: usize,
}

impl RunReport {
    fn merge(&mut self, other: &RunReport) {
        self.cycles_completed += other.cycles_completed;
        self.failed_cycles += other.failed_cycles;
        self.total_results += other.total_results;
        self.buffers_skipped += other.buffers_skipped;
        self.leaks += other.leaks;
        self.panicked_workers += other.panicked_workers;
    }

    pub fn is_clean(&self) -> bool {
        self.failed_cycles == 0 && self.leaks == 0 && self.panicked_workers == 0
    }
}
