//! MapEngine CLI - Command-line interface
//!
//! This binary provides a command-line interface to the MapEngine library:
//! one-off layer queries and concurrent stress runs against a map file.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use commands::config::ConfigAction;
use commands::query::QueryArgs;
use commands::stress::StressArgs;

#[derive(Parser)]
#[command(name = "mapengine")]
#[command(version = mapengine::VERSION)]
#[command(about = "Query and stress-test map definitions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query one layer and print the matching features
    Query(QueryArgs),
    /// Run concurrent work cycles and report pool health
    Stress(StressArgs),
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Query(args) => commands::query::run(args),
        Commands::Stress(args) => commands::stress::run(args),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        e.exit();
    }
}
