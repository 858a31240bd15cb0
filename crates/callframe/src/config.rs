//! Host configuration file
//!
//! One TOML document carries both the `tracing` setup and the call client
//! settings:
//!
//! ```rust
//! use callframe::config::HostConfig;
//! use callframe::prelude::*;
//!
//! let config = HostConfig::from_toml_str(r#"
//!     [logging]
//!     level = "debug"
//!     app_name = "kiosk"
//!
//!     [client]
//!     mode = "embedded"
//!     request_timeout_ms = 5000
//! "#).unwrap();
//!
//! assert_eq!(config.logging.app_name, "kiosk");
//! assert_eq!(config.client.mode, CallMode::Embedded);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client_core::{ClientConfig, ClientError};
use crate::logging::{setup_logging, LoggingConfig, LoggingError};

/// Errors raised while reading a [`HostConfig`]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document isn't valid TOML or has unknown value types
    #[error("Invalid host configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The `[client]` table failed validation
    #[error(transparent)]
    Client(#[from] ClientError),

    /// The `[logging]` table failed validation
    #[error(transparent)]
    Logging(#[from] LoggingError),
}

/// Everything a host reads from its configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Subscriber settings, see [`setup_logging`]
    pub logging: LoggingConfig,
    /// Call client settings, including the `[client.loader]` table
    pub client: ClientConfig,
}

impl HostConfig {
    /// Parse and validate both tables. Missing tables take their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: HostConfig = toml::from_str(raw)?;
        config.client.validate()?;
        config.logging.parsed_level()?;
        Ok(config)
    }

    /// Install the global subscriber from the `[logging]` table
    pub fn init_logging(&self) -> Result<(), LoggingError> {
        setup_logging(self.logging.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_core::CallMode;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(HostConfig::from_toml_str("").unwrap(), HostConfig::default());
    }

    #[test]
    fn test_tables_are_read_independently() {
        let config = HostConfig::from_toml_str(
            r#"
            [logging]
            json = true

            [client]
            mode = "call-object"

            [client.loader]
            max_attempts = 2
            "#,
        )
        .unwrap();

        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.client.mode, CallMode::CallObject);
        assert_eq!(config.client.loader.max_attempts, 2);
    }

    #[test]
    fn test_invalid_tables_are_rejected() {
        let err = HostConfig::from_toml_str("[logging]\nlevel = \"chatty\"").unwrap_err();
        assert!(matches!(err, ConfigError::Logging(LoggingError::InvalidLevel(_))));

        let err = HostConfig::from_toml_str("[client]\nrequest_timeout_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Client(_)));

        let err = HostConfig::from_toml_str("[client]\nrequest_timeout_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
