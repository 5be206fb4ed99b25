// Service logger
//
// Formatting happens at the call site but the actual write to stderr is
// handed to a background thread over a channel, so connection handling
// never blocks on terminal I/O. Dropping the logger drains the channel
// and joins the writer.

use crate::time;
use crate::types::Timestamp;

use std::io::Write;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl LogLevel {
    /// Returns the string representation of the log level
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single log entry, timestamped at the call site
struct LogEntry {
    timestamp: Timestamp,
    level: LogLevel,
    name: &'static str,
    message: String,
}

/// Named logger with a background writer thread
///
/// # Example
/// ```ignore
/// let logger = Logger::new("risk_service");
/// log_info!(logger, "listening on port {}", port);
/// ```
pub struct Logger {
    tx: Option<Sender<LogEntry>>,
    writer_thread: Option<JoinHandle<()>>,
    name: &'static str,
    min_level: LogLevel,
}

impl Logger {
    /// Creates a logger that records Info and above
    pub fn new(name: &'static str) -> Self {
        Self::with_level(name, LogLevel::Info)
    }

    /// Creates a logger with a specified minimum log level
    pub fn with_level(name: &'static str, min_level: LogLevel) -> Self {
        let (tx, rx) = mpsc::channel::<LogEntry>();

        let writer_thread = thread::spawn(move || {
            let mut stderr = std::io::stderr().lock();
            // recv fails once every sender is gone, which drains the
            // channel before the thread exits.
            while let Ok(entry) = rx.recv() {
                let _ = writeln!(
                    stderr,
                    "[{:010}] {:5} {}: {}",
                    entry.timestamp,
                    entry.level.as_str(),
                    entry.name,
                    entry.message
                );
            }
            let _ = stderr.flush();
        });

        Self {
            tx: Some(tx),
            writer_thread: Some(writer_thread),
            name,
            min_level,
        }
    }

    /// Queue one message for the writer thread
    ///
    /// Entries below the minimum level are discarded before the message
    /// crosses the channel.
    #[inline]
    pub fn log(&self, level: LogLevel, message: String) {
        if level < self.min_level {
            return;
        }
        if let Some(tx) = &self.tx {
            let _ = tx.send(LogEntry {
                timestamp: time::now(),
                level,
                name: self.name,
                message,
            });
        }
    }

    /// Get the current minimum log level
    #[inline]
    pub fn level(&self) -> LogLevel {
        self.min_level
    }

    /// Set the minimum log level
    #[inline]
    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        // Closing the channel stops the writer after it drains.
        drop(self.tx.take());
        if let Some(handle) = self.writer_thread.take() {
            let _ = handle.join();
        }
    }
}

// Convenience macros, taking format! style arguments.

/// Log a debug message
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log($crate::logging::LogLevel::Debug, format!($($arg)*))
    };
}

/// Log an info message
#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log($crate::logging::LogLevel::Info, format!($($arg)*))
    };
}

/// Log a warning message
#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log($crate::logging::LogLevel::Warn, format!($($arg)*))
    };
}

/// Log an error message
#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)*) => {
        $logger.log($crate::logging::LogLevel::Error, format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Debug.as_str(), "DEBUG");
        assert_eq!(LogLevel::Info.as_str(), "INFO");
        assert_eq!(LogLevel::Warn.as_str(), "WARN");
        assert_eq!(LogLevel::Error.as_str(), "ERROR");
        assert_eq!(LogLevel::Warn.to_string(), "WARN");
    }

    #[test]
    fn test_logger_with_level() {
        let logger = Logger::with_level("test", LogLevel::Warn);
        assert_eq!(logger.level(), LogLevel::Warn);
    }

    #[test]
    fn test_logger_set_level() {
        let mut logger = Logger::new("test");
        assert_eq!(logger.level(), LogLevel::Info);
        logger.set_level(LogLevel::Error);
        assert_eq!(logger.level(), LogLevel::Error);
    }

    #[test]
    fn test_log_level_filtering() {
        let logger = Logger::with_level("test", LogLevel::Warn);

        // Filtered out before the channel
        logger.log(LogLevel::Debug, "debug message".to_string());
        logger.log(LogLevel::Info, "info message".to_string());

        // Pass through
        logger.log(LogLevel::Warn, "warn message".to_string());
        logger.log(LogLevel::Error, "error message".to_string());
    }

    #[test]
    fn test_logger_drop_joins_writer() {
        {
            let logger = Logger::new("test");
            for i in 0..100 {
                logger.log(LogLevel::Info, format!("message {i}"));
            }
        }
        // Logger dropped: channel drained and writer thread joined
    }

    #[test]
    fn test_macros() {
        let logger = Logger::with_level("test", LogLevel::Debug);

        log_debug!(logger, "debug test");
        log_info!(logger, "info test with value {}", 42);
        log_warn!(logger, "warn test {} {}", "a", "b");
        log_error!(logger, "error test {:?}", vec![1, 2, 3]);
    }
}
