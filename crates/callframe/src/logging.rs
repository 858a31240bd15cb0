//! Process-wide `tracing` subscriber setup
//!
//! Library crates only emit events; hosts that don't bring their own
//! subscriber can install one here.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The level string isn't one of trace, debug, info, warn, error
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),

    /// Another global subscriber is already installed
    #[error("Failed to install subscriber: {0}")]
    Install(String),
}

/// Configuration for the logging system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level, e.g. `"info"`; `RUST_LOG` directives are applied on top
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Include file and line information
    pub file_info: bool,
    /// Log span enter and exit
    pub log_spans: bool,
    /// Application name logged at startup
    pub app_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file_info: false,
            log_spans: false,
            app_name: "callframe".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Configuration with the given level and application name
    pub fn new(level: Level, app_name: impl Into<String>) -> Self {
        Self {
            level: level.to_string().to_lowercase(),
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    /// Enable JSON formatting
    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    /// Enable file and line information in logs
    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }

    /// Enable span logging
    pub fn with_spans(mut self) -> Self {
        self.log_spans = true;
        self
    }

    /// The configured level
    pub fn parsed_level(&self) -> Result<Level, LoggingError> {
        parse_log_level(&self.level)
    }

    fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        let level = self.parsed_level()?;
        Ok(EnvFilter::from_default_env().add_directive(level.into()))
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn setup_logging(config: LoggingConfig) -> Result<(), LoggingError> {
    let filter = config.env_filter()?;
    let span_events = if config.log_spans { FmtSpan::ACTIVE } else { FmtSpan::NONE };

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let installed = if config.json {
        builder.with_writer(std::io::stdout).json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| LoggingError::Install(e.to_string()))?;

    log_welcome(&config.app_name, crate::VERSION);
    Ok(())
}

/// Parse a log level from a string
pub fn parse_log_level(level: &str) -> Result<Level, LoggingError> {
    Level::from_str(level).map_err(|_| LoggingError::InvalidLevel(level.to_string()))
}

/// Log a startup message with version info
pub fn log_welcome(app_name: &str, version: &str) {
    tracing::info!(app = app_name, version, "Starting {} v{}", app_name, version);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_levels() {
        assert_eq!(parse_log_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("WARN").unwrap(), Level::WARN);
        assert!(matches!(parse_log_level("loud"), Err(LoggingError::InvalidLevel(_))));
    }

    #[test]
    fn test_config_builders() {
        let config = LoggingConfig::new(Level::DEBUG, "host").with_json().with_file_info();
        assert_eq!(config.level, "debug");
        assert_eq!(config.parsed_level().unwrap(), Level::DEBUG);
        assert!(config.json && config.file_info && !config.log_spans);
    }

    #[test]
    fn test_bad_level_is_rejected_before_install() {
        let config = LoggingConfig {
            level: "chatty".to_string(),
            ..Default::default()
        };
        assert!(matches!(setup_logging(config), Err(LoggingError::InvalidLevel(_))));
    }
}
