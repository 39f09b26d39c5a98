//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing logic.

use crate::backend::ConnectionPolicy;
use std::path::PathBuf;
use std::time::Duration;

/// Complete engine configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// Connection pool settings
    pub pool: PoolSettings,
    /// Query settings
    pub query: QuerySettings,
    /// Map context settings
    pub context: ContextSettings,
    /// Worker runner settings
    pub workers: WorkerSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Connection pool configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolSettings {
    /// Policy for layers whose definition does not set `close_connection`
    pub default_policy: ConnectionPolicy,
    /// Run a reclamation pass every this many work cycles
    pub reclaim_every: usize,
}

/// Query configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySettings {
    /// Per-query deadline; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

/// Map context configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextSettings {
    /// How long teardown waits for outstanding leases before reporting a leak
    pub leak_grace: Duration,
}

/// Worker runner configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    /// Number of worker threads
    pub threads: usize,
    /// Work cycles per thread
    pub cycles: usize,
    /// Distance passed to the geometry engine's buffer operation
    pub buffer_distance: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Directory holding the log file
    pub directory: PathBuf,
    /// Log file name
    pub file: String,
}
