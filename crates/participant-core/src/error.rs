use thiserror::Error;

pub type ParticipantResult<T> = Result<T, ParticipantError>;

/// Errors decoding participant data received from the call machine
#[derive(Debug, Error)]
pub enum ParticipantError {
    #[error("Malformed participant data: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Participant data is missing a session id")]
    MissingSessionId,

    #[error("Participants payload must be an object keyed by session id")]
    NotAMap,
}
