//! Error types for bundle loading

use thiserror::Error;

/// Why a single load attempt failed
///
/// These are never returned to the caller of `load()`; they are handed to the
/// failure callback together with a `will_retry` flag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The attempt outlived its network timeout
    #[error("timed out after {millis}ms")]
    TimedOut { millis: u64 },

    /// The bundle server answered with a non-2xx status
    #[error("received non-OK HTTP status {status}")]
    HttpStatus { status: u16 },

    /// The script-tag strategy ran without a DOM to inject into
    #[error("must run in a DOM context")]
    NoDomContext,

    /// No tokio runtime was available to drive the load
    #[error("must run inside a tokio runtime")]
    NoAsyncRuntime,

    /// The request itself failed (DNS, connection, body read...)
    #[error("fetch failed: {reason}")]
    Fetch { reason: String },

    /// The injected script fired its error handler
    #[error("script failed to load: {reason}")]
    Script { reason: String },

    /// The downloaded code failed while running
    #[error("bundle execution failed: {reason}")]
    Execution { reason: String },
}

impl LoadError {
    /// Environment errors are surfaced at once; transport errors are retried
    pub fn is_retryable(&self) -> bool {
        !matches!(self, LoadError::NoDomContext | LoadError::NoAsyncRuntime)
    }

    pub fn category(&self) -> &'static str {
        match self {
            LoadError::TimedOut { .. } | LoadError::HttpStatus { .. } | LoadError::Fetch { .. } => "network",
            LoadError::NoDomContext | LoadError::NoAsyncRuntime => "environment",
            LoadError::Script { .. } | LoadError::Execution { .. } => "bundle",
        }
    }
}

/// Errors detected while assembling a [`BundleLoader`](crate::BundleLoader)
#[derive(Debug, Error)]
pub enum LoaderBuildError {
    /// The selected strategy needs a collaborator that wasn't supplied
    #[error("{strategy} strategy requires a {collaborator}")]
    MissingCollaborator {
        strategy: &'static str,
        collaborator: &'static str,
    },

    /// Configuration values out of range
    #[error("Invalid loader configuration: {message}")]
    InvalidConfig { message: String },
}

impl LoaderBuildError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
