//! Configuration inspection commands.

use clap::Subcommand;
use mapengine::config::{config_file_path, ConfigFile};
use std::path::PathBuf;

use super::common::load_config;
use crate::error::CliError;

/// Config action subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the default config file location
    Path,
    /// Print the effective configuration
    Show {
        /// Config file (default: ~/.mapengine/config.ini)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Run a config subcommand.
pub fn run(action: ConfigAction) -> Result<(), CliError> {
    match action {
        ConfigAction::Path => {
            println!("{}", config_file_path().display());
            Ok(())
        }
        ConfigAction::Show { config } => {
            let config = load_config(config.as_deref())?;
            print_config(&config);
            Ok(())
        }
    }
}

fn print_config(config: &ConfigFile) {
    println!("[pool]");
    println!("default_policy = {}", config.pool.default_policy);
    println!("reclaim_every = {}", config.pool.reclaim_every);
    println!();
    println!("[query]");
    println!(
        "timeout_ms = {}",
        config.query.timeout.map_or(0, |t| t.as_millis())
    );
    println!();
    println!("[context]");
    println!("leak_grace_ms = {}", config.context.leak_grace.as_millis());
    println!();
    println!("[workers]");
    println!("threads = {}", config.workers.threads);
    println!("cycles = {}", config.workers.cycles);
    println!("buffer_distance = {}", config.workers.buffer_distance);
    println!();
    println!("[logging]");
    println!("directory = {}", config.logging.directory.display());
    println!("file = {}", config.logging.file);
}
