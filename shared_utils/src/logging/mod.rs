//! Logging setup for the seed server.
//!
//! Installs a `tracing` subscriber writing to stderr and, optionally, to a
//! daily rolling file. `log` records are bridged into `tracing`.

use std::path::PathBuf;
use tracing::Level;
use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{RollingFileAppender, Rotation},
};
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Log initialization options.
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Log level (default: INFO)
    pub level: Level,

    /// Whether to log to stderr (default: true)
    pub log_to_stderr: bool,

    /// Directory for rolling log files; file logging is off when unset
    pub log_dir: Option<PathBuf>,

    /// Base filename for log files (default: "seed-server")
    pub log_file_name: String,

    /// Whether to use JSON format for logs (default: false)
    pub json_format: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        LogOptions {
            level: Level::INFO,
            log_to_stderr: true,
            log_dir: None,
            log_file_name: "seed-server".to_string(),
            json_format: false,
        }
    }
}

/// Map a textual level to a [`Level`], falling back to INFO.
pub fn parse_level(level: &str) -> Level {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging with the given options.
///
/// Returns a guard that must be kept alive while file logging is active so
/// buffered records are flushed on exit.
pub fn init_logging(options: LogOptions) -> Option<WorkerGuard> {
    let _ = LogTracer::init();

    let filter = EnvFilter::from_default_env().add_directive(options.level.into());

    let mut layers = Vec::new();
    let mut guard = None;

    if options.log_to_stderr {
        let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
        let stderr_layer = if options.json_format {
            stderr_layer.json().boxed()
        } else {
            stderr_layer.boxed()
        };
        layers.push(stderr_layer);
    }

    if let Some(dir) = &options.log_dir {
        let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, &options.log_file_name);
        let (non_blocking, worker_guard) = NonBlocking::new(file_appender);
        guard = Some(worker_guard);

        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(non_blocking);
        let file_layer = if options.json_format {
            file_layer.json().boxed()
        } else {
            file_layer.boxed()
        };
        layers.push(file_layer);
    }

    // Ignore repeated initialization within one process
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init();

    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use tracing::info;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("WARN"), Level::WARN);
        assert_eq!(parse_level("bogus"), Level::INFO);
    }

    #[test]
    fn test_init_logging_to_file() {
        let dir = tempdir().unwrap();

        let options = LogOptions {
            level: Level::DEBUG,
            log_to_stderr: false,
            log_dir: Some(dir.path().to_path_buf()),
            log_file_name: "test.log".to_string(),
            ..Default::default()
        };

        let guard = init_logging(options);
        assert!(guard.is_some());

        info!(artifact = "server", "logging initialized");

        // The rolling appender creates its file eagerly
        let entries = fs::read_dir(dir.path()).unwrap();
        assert!(entries.count() > 0);
    }
}
