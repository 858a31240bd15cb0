//! Messages exchanged with the call machine
//!
//! Outbound requests are built from typed payloads; inbound messages are
//! decoded into [`MachineEvent`]. Replies to correlated requests carry the
//! request's action name and are consumed by the waiting caller, so the
//! inbound decoder ignores them.

use callframe_channel_core::ChannelMessage;
use callframe_participant_core::{Participant, ParticipantsSnapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, ClientResult};

/// Requests understood by the call machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodAction {
    JoinMeeting,
    LeaveMeeting,
    LocalAudio,
    LocalVideo,
    SetUserName,
    UpdateParticipant,
    SendAppMessage,
}

impl MethodAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodAction::JoinMeeting => "join-meeting",
            MethodAction::LeaveMeeting => "leave-meeting",
            MethodAction::LocalAudio => "local-audio",
            MethodAction::LocalVideo => "local-video",
            MethodAction::SetUserName => "set-user-name",
            MethodAction::UpdateParticipant => "update-participant",
            MethodAction::SendAppMessage => "send-app-msg",
        }
    }

    pub fn message(&self) -> ChannelMessage {
        ChannelMessage::new(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    pub start_audio_off: bool,
    pub start_video_off: bool,
}

impl JoinOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self
    }

    pub fn with_audio_off(mut self, off: bool) -> Self {
        self.start_audio_off = off;
        self
    }

    pub fn with_video_off(mut self, off: bool) -> Self {
        self.start_video_off = off;
        self
    }
}

/// Changes requested for one participant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_audio: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set_video: Option<bool>,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub eject: bool,
}

impl ParticipantUpdate {
    pub fn set_audio(mut self, on: bool) -> Self {
        self.set_audio = Some(on);
        self
    }

    pub fn set_video(mut self, on: bool) -> Self {
        self.set_video = Some(on);
        self
    }

    pub fn eject(mut self) -> Self {
        self.eject = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set_audio.is_none() && self.set_video.is_none() && !self.eject
    }
}

/// An event pushed by the call machine
#[derive(Debug, Clone, PartialEq)]
pub enum MachineEvent {
    JoinedMeeting { participants: ParticipantsSnapshot },
    LeftMeeting,
    ParticipantJoined { participant: Participant },
    ParticipantUpdated { participant: Participant },
    ParticipantLeft { participant: Participant },
    AppMessage { data: Value, from_id: String },
    Error { error_msg: String },
}

impl MachineEvent {
    /// Decode an inbound message. `Ok(None)` for actions the client doesn't
    /// handle.
    pub fn decode(message: &ChannelMessage) -> ClientResult<Option<Self>> {
        let event = match message.action.as_str() {
            "joined-meeting" => MachineEvent::JoinedMeeting {
                participants: participants_field(message)?,
            },
            "left-meeting" => MachineEvent::LeftMeeting,
            "participant-joined" => MachineEvent::ParticipantJoined {
                participant: participant_field(message)?,
            },
            "participant-updated" => MachineEvent::ParticipantUpdated {
                participant: participant_field(message)?,
            },
            "participant-left" => MachineEvent::ParticipantLeft {
                participant: participant_field(message)?,
            },
            "app-message" => MachineEvent::AppMessage {
                data: message.field("data").cloned().unwrap_or(Value::Null),
                from_id: message.decode_field("fromId")?,
            },
            "error" => MachineEvent::Error {
                error_msg: message.decode_field("errorMsg")?,
            },
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

fn participant_field(message: &ChannelMessage) -> ClientResult<Participant> {
    let raw = message
        .field("participant")
        .cloned()
        .ok_or_else(|| ClientError::protocol(format!("{} without participant", message.action)))?;
    Ok(Participant::from_value(raw)?)
}

pub(crate) fn participants_field(message: &ChannelMessage) -> ClientResult<ParticipantsSnapshot> {
    match message.field("participants") {
        Some(raw) => Ok(ParticipantsSnapshot::from_value(raw.clone())?),
        None => Ok(ParticipantsSnapshot::new()),
    }
}

/// Error string carried by a reply, if the request failed
pub(crate) fn reply_error(reply: &ChannelMessage) -> Option<String> {
    match reply.field("error") {
        Some(Value::String(msg)) => Some(msg.clone()),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_join_request_wire_shape() {
        let request = JoinOptions {
            url: Some("https://acme.example.com/standup".to_string()),
            user_name: Some("Ada".to_string()),
            ..Default::default()
        };
        let message = ChannelMessage::from_payload(MethodAction::JoinMeeting.as_str(), &request).unwrap();
        assert_eq!(message.action, "join-meeting");
        assert_eq!(message.field("userName"), Some(&json!("Ada")));
        assert_eq!(message.field("startAudioOff"), Some(&json!(false)));
        assert!(message.field("token").is_none());
    }

    #[test]
    fn test_participant_update_shape() {
        let update = ParticipantUpdate::default().set_audio(false);
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({ "setAudio": false }));
        assert!(ParticipantUpdate::default().is_empty());
        assert!(!ParticipantUpdate::default().eject().is_empty());
    }

    #[test]
    fn test_decode_events() {
        let joined = ChannelMessage::new("participant-joined").with_field("participant", json!({ "session_id": "abc" }));
        match MachineEvent::decode(&joined).unwrap() {
            Some(MachineEvent::ParticipantJoined { participant }) => assert_eq!(participant.session_id, "abc"),
            other => panic!("unexpected {other:?}"),
        }

        let app = ChannelMessage::new("app-message")
            .with_field("data", json!({ "hello": 1 }))
            .with_field("fromId", "abc");
        assert_eq!(
            MachineEvent::decode(&app).unwrap(),
            Some(MachineEvent::AppMessage {
                data: json!({ "hello": 1 }),
                from_id: "abc".to_string()
            })
        );

        let left = ChannelMessage::new("left-meeting");
        assert_eq!(MachineEvent::decode(&left).unwrap(), Some(MachineEvent::LeftMeeting));
    }

    #[test]
    fn test_unknown_and_malformed() {
        assert_eq!(MachineEvent::decode(&ChannelMessage::new("network-quality-change")).unwrap(), None);
        assert_eq!(MachineEvent::decode(&ChannelMessage::new("join-meeting")).unwrap(), None);
        assert!(MachineEvent::decode(&ChannelMessage::new("participant-left")).is_err());
        assert!(MachineEvent::decode(&ChannelMessage::new("error")).is_err());
    }

    #[test]
    fn test_reply_error() {
        assert_eq!(reply_error(&ChannelMessage::new("x").with_field("error", "nope")).as_deref(), Some("nope"));
        assert_eq!(reply_error(&ChannelMessage::new("x")), None);
    }
}
