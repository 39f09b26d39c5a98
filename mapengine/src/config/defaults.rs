//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants, the CPU-aware thread default and the
//! `ConfigFile::default()` implementation.

use std::path::PathBuf;
use std::time::Duration;

use super::settings::*;
use crate::backend::ConnectionPolicy;

// =============================================================================
// CPU helpers
// =============================================================================

/// Get the number of available CPU cores.
pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

// =============================================================================
// Defaults
// =============================================================================

/// Reclamation pass every N work cycles.
pub const DEFAULT_RECLAIM_EVERY: usize = 10;

/// Query timeout in milliseconds; 0 means no deadline.
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 0;

/// Teardown grace period for outstanding leases.
pub const DEFAULT_LEAK_GRACE_MS: u64 = 100;

/// Work cycles per worker thread.
pub const DEFAULT_WORKER_CYCLES: usize = 100;

/// Buffer distance used by work cycles, in map units.
pub const DEFAULT_BUFFER_DISTANCE: f64 = 1.0;

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "mapengine.log";

/// Convert a millisecond timeout where 0 means "none".
pub fn timeout_from_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl Default for ConfigFile {
    fn default() -> Self {
        let config_dir = super::file::config_directory();

        Self {
            pool: PoolSettings {
                default_policy: ConnectionPolicy::Normal,
                reclaim_every: DEFAULT_RECLAIM_EVERY,
            },
            query: QuerySettings {
                timeout: timeout_from_millis(DEFAULT_QUERY_TIMEOUT_MS),
            },
            context: ContextSettings {
                leak_grace: Duration::from_millis(DEFAULT_LEAK_GRACE_MS),
            },
            workers: WorkerSettings {
                threads: num_cpus(),
                cycles: DEFAULT_WORKER_CYCLES,
                buffer_distance: DEFAULT_BUFFER_DISTANCE,
            },
            logging: LoggingSettings {
                directory: config_dir.join("logs"),
                file: DEFAULT_LOG_FILE.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_zero_is_none() {
        assert_eq!(timeout_from_millis(0), None);
        assert_eq!(timeout_from_millis(250), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_defaults() {
        let config = ConfigFile::default();
        assert_eq!(config.pool.default_policy, ConnectionPolicy::Normal);
        assert_eq!(config.pool.reclaim_every, DEFAULT_RECLAIM_EVERY);
        assert!(config.query.timeout.is_none());
        assert_eq!(config.context.leak_grace, Duration::from_millis(100));
        assert!(config.workers.threads >= 1);
        assert_eq!(config.logging.file, "mapengine.log");
        assert!(config.logging.directory.ends_with("logs"));
    }

    #[test]
    fn test_num_cpus_positive() {
        assert!(num_cpus() > 0);
    }
}
