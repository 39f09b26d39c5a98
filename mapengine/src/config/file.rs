//! Configuration file handling for ~/.mapengine/config.ini.
//!
//! Loads user configuration with sensible defaults.
//! Settings structs live in [`super::settings`], constants in [`super::defaults`]
//! and parsing in [`super::parser`].

use ini::Ini;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::settings::ConfigFile;
use crate::context::ContextConfig;
use crate::worker::WorkerConfig;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigFile {
    /// Load configuration from the default path (~/.mapengine/config.ini).
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load() -> Result<Self, ConfigFileError> {
        let path = config_file_path();
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Context settings derived from `[query]` and `[context]`.
    pub fn context_config(&self) -> ContextConfig {
        ContextConfig {
            leak_grace: self.context.leak_grace,
            query_timeout: self.query.timeout,
        }
    }

    /// Worker settings derived from `[workers]` and `[pool]`.
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            threads: self.workers.threads,
            cycles: self.workers.cycles,
            reclaim_every: self.pool.reclaim_every,
            buffer_distance: self.workers.buffer_distance,
        }
    }
}

/// Get the path to the config directory (~/.mapengine).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mapengine")
}

/// Get the path to the config file (~/.mapengine/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
