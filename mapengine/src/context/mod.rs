//! Per-thread map contexts.
//!
//! A [`ConcurrentMapContext`] is what a worker thread holds for one unit of
//! work: its own [`MapHandle`](crate::map::MapHandle) cloned from a shared
//! definition, plus the shared [`EngineServices`] (pool, renderer, geometry
//! engine, dispatcher).
//!
//! # State machine
//!
//! ```text
//! context: Ready ──draw──▶ Drawn ──draw──▶ Drawn
//! layer:   Ready ──open──▶ Open ──close──▶ Closed ──open──▶ Open
//! ```
//!
//! Queries need an open layer. Drawing is allowed in any state and leaves
//! layers alone. Teardown (or drop) closes every open layer, then waits up to
//! [`ContextConfig::leak_grace`] for leases handed out by
//! [`ConcurrentMapContext::lease`]; anything still outstanding is logged as a
//! `ResourceLeak` and reported.

mod concurrent;
mod services;

pub use concurrent::ConcurrentMapContext;
pub use services::EngineServices;

use std::time::Duration;

/// Interval between checks for outstanding leases during teardown.
pub const LEAK_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Per-context settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextConfig {
    /// How long teardown waits for outstanding leases.
    pub leak_grace: Duration,
    /// Deadline applied to layer opens, leases and queries.
    pub query_timeout: Option<Duration>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            leak_grace: Duration::from_millis(crate::config::DEFAULT_LEAK_GRACE_MS),
            query_timeout: None,
        }
    }
}

/// Context lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Built from a definition; nothing drawn yet.
    Ready,
    /// Drawn at least once.
    Drawn,
}

/// What teardown released and what it could not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Layers that were open and have been closed.
    pub layers_closed: usize,
    /// Layer closes that failed.
    pub close_errors: usize,
    /// Context leases still outstanding after the grace period.
    pub leaked_leases: usize,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.close_errors == 0 && self.leaked_leases == 0
    }
}
