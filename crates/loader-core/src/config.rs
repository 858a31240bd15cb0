//! Loader timing configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LoaderBuildError;

/// Attempt budget and timers for one load operation
///
/// Durations are carried as milliseconds so the struct maps directly onto
/// configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Attempts per load operation, including the first
    pub max_attempts: u32,
    /// Pause between a failed attempt and the next one
    pub retry_delay_ms: u64,
    /// Per-attempt network timeout
    pub attempt_timeout_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 3_000,
            attempt_timeout_ms: 20_000,
        }
    }
}

impl LoaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), LoaderBuildError> {
        if self.max_attempts == 0 {
            return Err(LoaderBuildError::invalid_config("max_attempts must be at least 1"));
        }
        if self.attempt_timeout_ms == 0 {
            return Err(LoaderBuildError::invalid_config("attempt_timeout_ms must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoaderConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retry_delay(), Duration::from_secs(3));
        assert_eq!(config.attempt_timeout(), Duration::from_secs(20));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        assert!(LoaderConfig::new().with_max_attempts(0).validate().is_err());
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: LoaderConfig = serde_json::from_str(r#"{ "max_attempts": 5 }"#).unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.retry_delay_ms, 3_000);
    }
}
