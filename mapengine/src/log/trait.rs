//! Logger trait definition.

use std::fmt::Arguments;

/// Log level for filtering messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Verbose debugging information
    Trace,
    /// Debugging information
    Debug,
    /// General information
    Info,
    /// Warning messages
    Warn,
    /// Error messages
    Error,
}

/// Logging interface for engine components.
///
/// Implementations must be `Send + Sync`: the pool and the worker runner share
/// one logger between every thread that touches them.
///
/// # Example
///
/// ```
/// use mapengine::log::{Logger, NoOpLogger};
/// use mapengine::log_warn;
/// use std::sync::Arc;
///
/// let logger: Arc<dyn Logger> = Arc::new(NoOpLogger);
/// log_warn!(logger, "ResourceLeak: {} leases outstanding", 1);
/// ```
pub trait Logger: Send + Sync {
    /// Log a message at the specified level.
    ///
    /// The convenience methods below delegate here.
    fn log(&self, level: LogLevel, args: Arguments<'_>);

    /// Log a trace-level message.
    fn trace(&self, args: Arguments<'_>) {
        self.log(LogLevel::Trace, args);
    }

    /// Log a debug-level message.
    fn debug(&self, args: Arguments<'_>) {
        self.log(LogLevel::Debug, args);
    }

    /// Log an info-level message.
    fn info(&self, args: Arguments<'_>) {
        self.log(LogLevel::Info, args);
    }

    /// Log a warning-level message.
    fn warn(&self, args: Arguments<'_>) {
        self.log(LogLevel::Warn, args);
    }

    /// Log an error-level message.
    fn error(&self, args: Arguments<'_>) {
        self.log(LogLevel::Error, args);
    }
}

#[macro_export]
macro_rules! log_trace {
    ($logger:expr, $($arg:tt)*) => {
        $logger.trace(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.info(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.warn(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)*) => {
        $logger.error(format_args!($($arg)*))
    };
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// Logger that keeps every message, for asserting on leak and underflow reports.
    #[derive(Debug, Default)]
    pub struct CapturingLogger {
        records: Mutex<Vec<(LogLevel, String)>>,
    }

    impl CapturingLogger {
        pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
            self.records
                .lock()
                .iter()
                .filter(|(l, _)| *l == level)
                .map(|(_, m)| m.clone())
                .collect()
        }
    }

    impl Logger for CapturingLogger {
        fn log(&self, level: LogLevel, args: Arguments<'_>) {
            self.records.lock().push((level, args.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::CapturingLogger;
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn test_macros_route_to_levels() {
        let logger = CapturingLogger::default();
        log_warn!(logger, "leak on {}", "local:a");
        log_error!(logger, "underflow");
        log_debug!(logger, "noise");

        assert_eq!(logger.messages_at(LogLevel::Warn), vec!["leak on local:a"]);
        assert_eq!(logger.messages_at(LogLevel::Error), vec!["underflow"]);
        assert_eq!(logger.messages_at(LogLevel::Debug).len(), 1);
        assert!(logger.messages_at(LogLevel::Info).is_empty());
    }
}
