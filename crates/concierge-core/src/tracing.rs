//! Tracing setup for concierge
//!
//! Provides unified logging configuration for the library crates and the CLI.
//! Console output is always enabled; a daily-rotated log file can be added by
//! setting [`TracingConfig::log_directory`].
//!
//! # Usage
//!
//! ```ignore
//! use concierge_core::tracing::{init_tracing, TracingConfig};
//!
//! let _guard = init_tracing(TracingConfig::default()).expect("failed to initialize tracing");
//! ```
//!
//! Keep the returned [`LogGuard`] alive for the lifetime of the process;
//! dropping it flushes and stops the background file writer.

use std::path::PathBuf;

use thiserror::Error;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

/// File name prefix for rotated log files.
const LOG_FILE_NAME: &str = "concierge.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Errors that can occur during tracing initialization
#[derive(Debug, Error)]
pub enum TracingError {
    /// Failed to set global subscriber
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    /// Failed to parse env filter directive
    #[error("failed to parse env filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),

    /// Failed to create the log directory
    #[error("failed to create log directory {path}: {source}")]
    LogDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Output format for tracing logs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingOutputFormat {
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format (default)
    #[default]
    Compact,
    /// JSON format (useful for structured logging in service mode)
    Json,
}

impl TracingOutputFormat {
    /// Parses a format name (`pretty`, `compact`, `json`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "compact" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Configuration for tracing initialization
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// The default log level when RUST_LOG is not set
    pub default_level: Level,
    /// Output format for console messages
    pub output_format: TracingOutputFormat,
    /// Whether to include file/line information in logs
    pub include_location: bool,
    /// Whether to include target (module path) in logs
    pub include_target: bool,
    /// Whether to include timestamps
    pub include_timestamp: bool,
    /// Whether to include span events (enter/exit)
    pub include_span_events: bool,
    /// Custom env filter directive (overrides default_level if set)
    pub env_filter: Option<String>,
    /// Directory for daily-rotated log files; console only when unset
    pub log_directory: Option<PathBuf>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: Level::INFO,
            output_format: TracingOutputFormat::Compact,
            include_location: false,
            include_target: true,
            include_timestamp: true,
            include_span_events: false,
            env_filter: None,
            log_directory: None,
        }
    }
}

impl TracingConfig {
    /// Create a config suitable for CLI usage with debug mode
    #[must_use]
    pub fn cli_debug() -> Self {
        Self {
            default_level: Level::DEBUG,
            output_format: TracingOutputFormat::Compact,
            include_location: true,
            include_target: true,
            include_timestamp: false,
            include_span_events: false,
            env_filter: None,
            log_directory: None,
        }
    }

    /// Set the default log level
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    /// Set the output format
    #[must_use]
    pub fn with_format(mut self, format: TracingOutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Set a custom env filter directive
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Also write logs to daily-rotated files in `dir`
    #[must_use]
    pub fn with_log_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_directory = Some(dir.into());
        self
    }

    fn build_env_filter(&self) -> Result<EnvFilter, TracingError> {
        if let Some(ref filter) = self.env_filter {
            return Ok(EnvFilter::try_new(filter)?);
        }
        Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("concierge={}", self.default_level))))
    }

    fn console_layer(&self) -> BoxedLayer {
        let span_events = if self.include_span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        match self.output_format {
            TracingOutputFormat::Pretty => fmt::layer()
                .pretty()
                .with_writer(std::io::stderr)
                .with_file(self.include_location)
                .with_line_number(self.include_location)
                .with_target(self.include_target)
                .with_span_events(span_events)
                .boxed(),
            TracingOutputFormat::Compact => {
                let layer = fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr)
                    .with_file(self.include_location)
                    .with_line_number(self.include_location)
                    .with_target(self.include_target)
                    .with_span_events(span_events);

                if self.include_timestamp {
                    layer.boxed()
                } else {
                    layer.without_time().boxed()
                }
            }
            TracingOutputFormat::Json => fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_file(self.include_location)
                .with_line_number(self.include_location)
                .with_target(self.include_target)
                .with_span_events(span_events)
                .boxed(),
        }
    }
}

/// Keeps the background log file writer alive.
///
/// Holds nothing when file logging is disabled.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug, Default)]
pub struct LogGuard {
    worker: Option<WorkerGuard>,
}

impl LogGuard {
    /// Returns true if a file writer is attached.
    pub fn is_writing_file(&self) -> bool {
        self.worker.is_some()
    }
}

/// Initialize tracing with the given configuration.
///
/// This should be called once at the start of the application.
/// The `RUST_LOG` environment variable can be used to override the default level.
///
/// # Errors
///
/// Returns an error if the global subscriber has already been set, if
/// the env filter directive is invalid, or if the log directory cannot be
/// created.
pub fn init_tracing(config: TracingConfig) -> Result<LogGuard, TracingError> {
    let env_filter = config.build_env_filter()?;

    let mut layers: Vec<BoxedLayer> = vec![config.console_layer()];
    let mut guard = LogGuard::default();

    if let Some(ref dir) = config.log_directory {
        std::fs::create_dir_all(dir).map_err(|source| TracingError::LogDirectory {
            path: dir.clone(),
            source,
        })?;

        let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
        let (writer, worker) = tracing_appender::non_blocking(appender);
        layers.push(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .boxed(),
        );
        guard.worker = Some(worker);
    }

    let subscriber = tracing_subscriber::registry().with(layers).with(env_filter);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.default_level, Level::INFO);
        assert_eq!(config.output_format, TracingOutputFormat::Compact);
        assert!(!config.include_location);
        assert!(config.include_target);
        assert!(config.include_timestamp);
        assert!(!config.include_span_events);
        assert!(config.env_filter.is_none());
        assert!(config.log_directory.is_none());
    }

    #[test]
    fn test_cli_debug_config() {
        let config = TracingConfig::cli_debug();
        assert_eq!(config.default_level, Level::DEBUG);
        assert_eq!(config.output_format, TracingOutputFormat::Compact);
        assert!(config.include_location);
    }

    #[test]
    fn test_builder_methods() {
        let config = TracingConfig::default()
            .with_level(Level::WARN)
            .with_format(TracingOutputFormat::Json)
            .with_env_filter("concierge=trace")
            .with_log_directory("/var/log/concierge");

        assert_eq!(config.default_level, Level::WARN);
        assert_eq!(config.output_format, TracingOutputFormat::Json);
        assert_eq!(config.env_filter, Some("concierge=trace".to_string()));
        assert_eq!(
            config.log_directory,
            Some(PathBuf::from("/var/log/concierge"))
        );
    }

    #[test]
    fn test_format_names() {
        assert_eq!(
            TracingOutputFormat::from_name("JSON"),
            Some(TracingOutputFormat::Json)
        );
        assert_eq!(
            TracingOutputFormat::from_name("pretty"),
            Some(TracingOutputFormat::Pretty)
        );
        assert_eq!(TracingOutputFormat::from_name("xml"), None);
    }

    #[test]
    fn test_invalid_env_filter() {
        let config = TracingConfig::default().with_env_filter("concierge=verbose");
        assert!(matches!(
            config.build_env_filter(),
            Err(TracingError::EnvFilter(_))
        ));
    }

    #[test]
    fn test_log_directory_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();

        let config = TracingConfig::default().with_log_directory(blocker.join("logs"));
        let err = init_tracing(config).unwrap_err();
        assert!(matches!(err, TracingError::LogDirectory { .. }));
    }
}
