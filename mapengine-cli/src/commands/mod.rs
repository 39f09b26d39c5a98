//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration inspection (path, show)
//! - [`query`] - Open a layer, query it and print or draw the results
//! - [`stress`] - Concurrent work cycles against one map

pub mod common;
pub mod config;
pub mod query;
pub mod stress;
