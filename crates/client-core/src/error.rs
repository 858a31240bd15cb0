//! Error types for the call client
//!
//! Validation errors are returned synchronously and are never retried. Load
//! failures surface here only once the loader has given up; intermediate
//! attempts are reported as [`CallEvent::LoadAttemptFailed`] events.
//!
//! [`CallEvent::LoadAttemptFailed`]: crate::CallEvent::LoadAttemptFailed

use callframe_channel_core::ChannelError;
use callframe_loader_core::{LoadError, LoaderBuildError};
use callframe_participant_core::ParticipantError;
use thiserror::Error;

use crate::state::MeetingState;

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// A public API argument was rejected
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    /// The operation isn't allowed in the current meeting state
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: MeetingState,
    },

    #[error("Invalid configuration: {field} - {reason}")]
    Configuration { field: String, reason: String },

    /// The bundle loader gave up
    #[error("Failed to load call machine: {source}")]
    LoadFailed { source: LoadError },

    #[error("Call machine load was cancelled")]
    LoadCancelled,

    /// The call machine didn't answer a request in time
    #[error("{operation} timed out after {duration_ms}ms")]
    Timeout { operation: &'static str, duration_ms: u64 },

    /// The call machine answered with an error
    #[error("Call machine error: {message}")]
    CallMachine { message: String },

    /// A message from the call machine couldn't be decoded
    #[error("Protocol error: {reason}")]
    Protocol { reason: String },

    #[error("Call client has been destroyed")]
    Destroyed,
}

impl ClientError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn call_machine(message: impl Into<String>) -> Self {
        Self::CallMachine {
            message: message.into(),
        }
    }

    pub fn protocol(reason: impl Into<String>) -> Self {
        Self::Protocol { reason: reason.into() }
    }

    pub fn invalid_state(operation: &'static str, state: MeetingState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Whether retrying the same call later may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            ClientError::LoadFailed { source } => source.is_retryable(),
            ClientError::Timeout { .. } | ClientError::LoadCancelled | ClientError::InvalidState { .. } => true,
            ClientError::Validation { .. }
            | ClientError::Configuration { .. }
            | ClientError::CallMachine { .. }
            | ClientError::Protocol { .. }
            | ClientError::Destroyed => false,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            ClientError::Validation { .. } => "validation",
            ClientError::InvalidState { .. } | ClientError::Destroyed => "state",
            ClientError::Configuration { .. } => "configuration",
            ClientError::LoadFailed { .. } | ClientError::LoadCancelled => "load",
            ClientError::Timeout { .. } => "timeout",
            ClientError::CallMachine { .. } | ClientError::Protocol { .. } => "protocol",
        }
    }
}

impl From<ChannelError> for ClientError {
    fn from(err: ChannelError) -> Self {
        ClientError::protocol(err.to_string())
    }
}

impl From<ParticipantError> for ClientError {
    fn from(err: ParticipantError) -> Self {
        ClientError::protocol(err.to_string())
    }
}

impl From<LoaderBuildError> for ClientError {
    fn from(err: LoaderBuildError) -> Self {
        ClientError::configuration("loader", err.to_string())
    }
}

impl From<toml::de::Error> for ClientError {
    fn from(err: toml::de::Error) -> Self {
        ClientError::configuration("toml", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(ClientError::validation("url", "bad").category(), "validation");
        assert_eq!(ClientError::Destroyed.category(), "state");
        assert_eq!(ClientError::LoadCancelled.category(), "load");
    }

    #[test]
    fn test_recoverability() {
        assert!(!ClientError::validation("url", "bad").is_recoverable());
        assert!(ClientError::LoadFailed {
            source: LoadError::TimedOut { millis: 20_000 }
        }
        .is_recoverable());
        assert!(!ClientError::LoadFailed {
            source: LoadError::NoDomContext
        }
        .is_recoverable());
    }

    #[test]
    fn test_display() {
        let err = ClientError::invalid_state("send app message", MeetingState::New);
        assert_eq!(err.to_string(), "Cannot send app message while new");
    }
}
