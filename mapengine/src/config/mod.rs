//! Engine configuration.
//!
//! The config file groups settings by concern, one INI section each:
//!
//! ```ini
//! [pool]
//! default_policy = normal
//! reclaim_every = 10
//!
//! [query]
//! timeout_ms = 0
//!
//! [context]
//! leak_grace_ms = 100
//!
//! [workers]
//! threads = 8
//! cycles = 100
//! buffer_distance = 1.0
//!
//! [logging]
//! directory = ~/.mapengine/logs
//! file = mapengine.log
//! ```
//!
//! # Example
//!
//! ```
//! use mapengine::config::ConfigFile;
//!
//! let config = ConfigFile::default();
//! let workers = config.worker_config();
//! assert!(workers.threads >= 1);
//! ```

mod defaults;
mod file;
mod parser;
mod settings;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::*;
