//! Logging abstraction layer.
//!
//! Core components (the connection pool, the query engine, map contexts and
//! the worker runner) log through the [`Logger`] trait rather than calling
//! `tracing` directly, so tests can run them silently and embedders can route
//! pool events wherever they like.
//!
//! # Architecture
//!
//! - `Logger` trait: the interface every component receives as `Arc<dyn Logger>`
//! - `TracingLogger`: production adapter that delegates to the `tracing` crate
//! - `NoOpLogger`: silent logger for tests and benchmarks
//!
//! # Usage
//!
//! ```
//! use mapengine::log::{Logger, NoOpLogger};
//! use mapengine::{log_debug, log_info};
//! use std::sync::Arc;
//!
//! struct Reclaimer {
//!     logger: Arc<dyn Logger>,
//! }
//!
//! impl Reclaimer {
//!     fn pass(&self, closed: usize) {
//!         log_info!(self.logger, "reclaim pass closed {} connections", closed);
//!         log_debug!(self.logger, "reclaim pass finished");
//!     }
//! }
//!
//! Reclaimer { logger: Arc::new(NoOpLogger) }.pass(2);
//! ```

mod noop;
mod tracing_adapter;
mod r#trait;

pub use noop::NoOpLogger;
pub use r#trait::{LogLevel, Logger};
pub use tracing_adapter::TracingLogger;

#[cfg(test)]
pub(crate) use r#trait::testing;
