//! Logging infrastructure - structured tracing for the bridge
//!
//! The library only emits `tracing` events; nothing is printed until a binary
//! installs a subscriber through [`init`] or [`init_with_config`]. Events carry
//! an `event` field naming what happened (`context_spawn`, `job_queued`,
//! `foreign_exception`, ...) so they can be filtered in JSON output.

use once_cell::sync::OnceCell;
use std::io;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

pub use tracing::{debug, error, info, trace, warn};

/// Set once the global subscriber is installed; holds the file writer guard.
static LOGGER: OnceCell<Option<WorkerGuard>> = OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default log level
    pub level: Level,
    /// Log file path; stderr when unset
    pub log_path: Option<String>,
    /// Enable JSON format (vs human-readable)
    pub json_format: bool,
    /// Show span events (enter/exit)
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            log_path: None,
            json_format: false,
            show_spans: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // PYBRIDGE_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level) = std::env::var("PYBRIDGE_LOG_LEVEL") {
            config.level = parse_level(&level).unwrap_or(Level::INFO);
        }

        if let Ok(path) = std::env::var("PYBRIDGE_LOG_FILE") {
            config.log_path = Some(path);
        }

        config.json_format = std::env::var("PYBRIDGE_LOG_JSON").is_ok();
        config.show_spans = std::env::var("PYBRIDGE_LOG_SPANS").is_ok();

        config
    }

    /// Verbose config for chasing lock handoff problems
    pub fn debug() -> Self {
        Self {
            level: Level::TRACE,
            log_path: None,
            json_format: false,
            show_spans: true,
        }
    }
}

fn parse_level(level: &str) -> Option<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Initialize logging from the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration. Later calls are no-ops.
pub fn init_with_config(config: LogConfig) {
    LOGGER.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("pybridge={}", config.level.as_str().to_lowercase()))
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let (writer, guard) = match &config.log_path {
            Some(path) => {
                let path = std::path::Path::new(path);
                let directory = path.parent().filter(|p| !p.as_os_str().is_empty());
                let prefix = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "pybridge.log".to_string());
                let appender = tracing_appender::rolling::never(
                    directory.unwrap_or_else(|| std::path::Path::new(".")),
                    prefix,
                );
                let (writer, guard) = tracing_appender::non_blocking(appender);
                (writer, Some(guard))
            }
            None => {
                let (writer, guard) = tracing_appender::non_blocking(io::stderr());
                (writer, Some(guard))
            }
        };

        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(span_events)
            .with_target(true)
            .with_thread_names(true)
            .with_line_number(cfg!(debug_assertions));

        let layer = if config.json_format {
            layer.json().with_filter(filter).boxed()
        } else {
            layer.with_filter(filter).boxed()
        };

        // A host application may already own the global subscriber.
        let _ = tracing_subscriber::registry().with(layer).try_init();

        guard
    });
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER.get().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = LogConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(config.log_path.is_none());

        let debug_config = LogConfig::debug();
        assert_eq!(debug_config.level, Level::TRACE);
        assert!(debug_config.show_spans);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Some(Level::DEBUG));
        assert_eq!(parse_level("warn"), Some(Level::WARN));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn test_init_idempotent() {
        init();
        init();
        assert!(is_initialized());
    }
}
