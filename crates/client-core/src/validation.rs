//! Argument checks for the public API

use callframe_participant_core::LOCAL_KEY;
use serde_json::Value;
use url::Url;

use crate::error::{ClientError, ClientResult};
use crate::protocol::{JoinOptions, ParticipantUpdate};

/// Largest serialized app message payload
pub const MAX_APP_MESSAGE_BYTES: usize = 4096;

pub const MAX_USER_NAME_CHARS: usize = 128;

/// Meeting URLs must be absolute http(s) URLs
pub fn validate_meeting_url(raw: &str) -> ClientResult<Url> {
    let url = Url::parse(raw).map_err(|e| ClientError::validation("url", e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(ClientError::validation("url", format!("unsupported scheme '{other}'"))),
    }
    if url.host_str().is_none() {
        return Err(ClientError::validation("url", "missing host"));
    }
    Ok(url)
}

pub fn validate_user_name(name: &str) -> ClientResult<()> {
    if name.trim().is_empty() {
        return Err(ClientError::validation("user_name", "must not be blank"));
    }
    if name.chars().count() > MAX_USER_NAME_CHARS {
        return Err(ClientError::validation(
            "user_name",
            format!("longer than {MAX_USER_NAME_CHARS} characters"),
        ));
    }
    Ok(())
}

pub fn validate_join(request: &JoinOptions) -> ClientResult<()> {
    if let Some(url) = &request.url {
        validate_meeting_url(url)?;
    }
    if let Some(token) = &request.token {
        if token.trim().is_empty() || token.chars().any(char::is_whitespace) {
            return Err(ClientError::validation("token", "must be a non-empty string without whitespace"));
        }
    }
    if let Some(name) = &request.user_name {
        validate_user_name(name)?;
    }
    Ok(())
}

pub fn validate_participant_update(session_id: &str, update: &ParticipantUpdate) -> ClientResult<()> {
    if session_id.trim().is_empty() {
        return Err(ClientError::validation("session_id", "must not be blank"));
    }
    if update.is_empty() {
        return Err(ClientError::validation("update", "no properties to change"));
    }
    if update.eject && session_id == LOCAL_KEY {
        return Err(ClientError::validation("update", "cannot eject the local participant"));
    }
    Ok(())
}

/// Returns the serialized size
pub fn validate_app_message(data: &Value, to: Option<&str>) -> ClientResult<usize> {
    if data.is_null() {
        return Err(ClientError::validation("data", "must not be null"));
    }
    let size = serde_json::to_vec(data)
        .map_err(|e| ClientError::validation("data", e.to_string()))?
        .len();
    if size > MAX_APP_MESSAGE_BYTES {
        return Err(ClientError::validation(
            "data",
            format!("{size} bytes exceeds the {MAX_APP_MESSAGE_BYTES} byte limit"),
        ));
    }
    if matches!(to, Some(recipient) if recipient.trim().is_empty()) {
        return Err(ClientError::validation("to", "must not be blank"));
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_meeting_url() {
        assert!(validate_meeting_url("https://acme.example.com/standup").is_ok());
        assert!(validate_meeting_url("ftp://acme.example.com/standup").is_err());
        assert!(validate_meeting_url("standup").is_err());
    }

    #[test]
    fn test_user_name() {
        assert!(validate_user_name("Ada").is_ok());
        assert!(validate_user_name("   ").is_err());
        assert!(validate_user_name(&"x".repeat(MAX_USER_NAME_CHARS + 1)).is_err());
    }

    #[test]
    fn test_join_token() {
        let request = JoinOptions {
            token: Some("abc def".to_string()),
            ..Default::default()
        };
        assert_eq!(validate_join(&request).unwrap_err().category(), "validation");
        assert!(validate_join(&JoinOptions::default()).is_ok());
    }

    #[test]
    fn test_app_message_limit() {
        assert_eq!(validate_app_message(&json!({ "a": 1 }), None).unwrap(), 7);
        let big = json!({ "blob": "x".repeat(MAX_APP_MESSAGE_BYTES) });
        assert!(validate_app_message(&big, None).is_err());
        assert!(validate_app_message(&Value::Null, None).is_err());
        assert!(validate_app_message(&json!(1), Some("")).is_err());
    }

    #[test]
    fn test_participant_update() {
        assert!(validate_participant_update("abc", &ParticipantUpdate::default().set_audio(false)).is_ok());
        assert!(validate_participant_update("abc", &ParticipantUpdate::default()).is_err());
        assert!(validate_participant_update(LOCAL_KEY, &ParticipantUpdate::default().eject()).is_err());
        assert!(validate_participant_update(" ", &ParticipantUpdate::default().eject()).is_err());
    }
}
