//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use mapengine::config::ConfigFileError;
use mapengine::definition::DefinitionError;
use mapengine::{EngineError, ErrorKind};
use std::fmt;
use std::process;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration file error
    Config(ConfigFileError),
    /// Invalid command-line arguments
    Usage(String),
    /// Map definition or dataset file error
    Definition(DefinitionError),
    /// Engine error while running a command
    Engine(EngineError),
    /// Failed to write output file
    FileWrite { path: String, error: std::io::Error },
    /// Stress run finished with failures
    StressFailed(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Engine(e) = self {
            match e.kind() {
                ErrorKind::BackendUnavailable => {
                    eprintln!();
                    eprintln!("Check that every layer's connection has a matching [dataset.*] section.");
                }
                ErrorKind::LayerNotFound => {
                    eprintln!();
                    eprintln!("Layer names come from the [layer.NAME] sections of the map file.");
                }
                _ => {}
            }
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Usage(msg) => write!(f, "{}", msg),
            CliError::Definition(e) => write!(f, "Failed to load map: {}", e),
            CliError::Engine(e) => write!(f, "{} ({})", e, e.kind()),
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path, error)
            }
            CliError::StressFailed(msg) => write!(f, "Stress run failed: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Definition(e) => Some(e),
            CliError::Engine(e) => Some(e),
            CliError::FileWrite { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<DefinitionError> for CliError {
    fn from(e: DefinitionError) -> Self {
        CliError::Definition(e)
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        CliError::Engine(e)
    }
}
