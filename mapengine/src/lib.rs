//! MapEngine - concurrent map-serving core
//!
//! This library provides the resource and query core of a map server: map
//! definitions, pooled backend connections shared between worker threads,
//! layer queries with cached result sets, and rendering/dispatch contracts.
//!
//! # High-Level API
//!
//! Most callers drive a [`context::ConcurrentMapContext`] per thread:
//!
//! ```ignore
//! use mapengine::context::{ConcurrentMapContext, ContextConfig, EngineServices};
//! use mapengine::query::MatchMode;
//!
//! let services = EngineServices::new(pool, logger);
//! let mut context = ConcurrentMapContext::from_definition(definition, services, ContextConfig::default())?;
//! context.open_layer("POINT")?;
//! context.query_by_attribute("POINT", "FNAME", "A Point", MatchMode::Multiple)?;
//! let image = context.draw()?;
//! context.teardown();
//! ```
//!
//! For many threads repeating the same cycle, see [`worker::WorkerRunner`].

pub mod backend;
pub mod config;
pub mod context;
pub mod definition;
pub mod dispatch;
pub mod error;
pub mod geometry;
pub mod handle;
pub mod log;
pub mod logging;
pub mod map;
pub mod pool;
pub mod query;
pub mod render;
pub mod worker;

pub use error::{EngineError, ErrorKind};

/// Version of the MapEngine library and CLI.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
