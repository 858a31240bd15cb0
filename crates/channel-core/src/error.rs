//! Error types for the message channel

use thiserror::Error;

/// Result type for channel payload operations
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors raised while building or decoding message payloads
///
/// Delivery itself never fails: unaddressed or malformed messages are dropped
/// silently by the listeners.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Payload could not be converted to or from JSON
    #[error("Payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Payload serialized to something other than a JSON object
    #[error("Payload for '{action}' must serialize to a JSON object")]
    PayloadNotAnObject { action: String },

    /// A required payload field is absent
    #[error("Message '{action}' is missing field '{field}'")]
    MissingField { action: String, field: String },
}
