//! One call member as mirrored on the host side

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ParticipantError, ParticipantResult};
use crate::track::{ParticipantTracks, TrackSlot};

/// Reserved snapshot key of the local participant
pub const LOCAL_KEY: &str = "local";

/// Rendered size of a participant's video element
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub session_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub owner: bool,
    #[serde(default)]
    pub audio: bool,
    #[serde(default)]
    pub video: bool,
    #[serde(default)]
    pub screen: bool,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub will_eject_at: Option<DateTime<Utc>>,
    /// Embedded-frame mode only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_size: Option<VideoSize>,
    #[serde(skip)]
    pub tracks: ParticipantTracks,
}

impl Participant {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    pub fn local(session_id: impl Into<String>) -> Self {
        Self {
            local: true,
            ..Self::new(session_id)
        }
    }

    pub fn with_user_name(mut self, user_name: impl Into<String>) -> Self {
        self.user_name = user_name.into();
        self
    }

    /// Set the audio, video, and screen flags at once
    pub fn with_media(mut self, audio: bool, video: bool, screen: bool) -> Self {
        self.audio = audio;
        self.video = video;
        self.screen = screen;
        self
    }

    pub fn from_value(value: Value) -> ParticipantResult<Self> {
        let participant: Participant = serde_json::from_value(value)?;
        if participant.session_id.is_empty() {
            return Err(ParticipantError::MissingSessionId);
        }
        Ok(participant)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Key under which this participant is stored in a snapshot
    pub fn key(&self) -> &str {
        if self.local {
            LOCAL_KEY
        } else {
            &self.session_id
        }
    }

    /// Media flag that advertises `slot`
    pub fn flag(&self, slot: TrackSlot) -> bool {
        match slot {
            TrackSlot::CameraAudio => self.audio,
            TrackSlot::CameraVideo => self.video,
            TrackSlot::ScreenAudio | TrackSlot::ScreenVideo => self.screen,
        }
    }

    /// Clear the flag of a camera slot. Screen slots share one flag, which is
    /// only cleared once neither screen track resolved.
    pub fn demote(&mut self, slot: TrackSlot) {
        match slot {
            TrackSlot::CameraAudio => self.audio = false,
            TrackSlot::CameraVideo => self.video = false,
            TrackSlot::ScreenAudio | TrackSlot::ScreenVideo => {}
        }
    }

    pub fn clear_media(&mut self) {
        self.audio = false;
        self.video = false;
        self.screen = false;
        self.tracks.clear();
    }

    /// Equality ignoring track references
    pub fn same_attributes(&self, other: &Participant) -> bool {
        self.session_id == other.session_id
            && self.user_id == other.user_id
            && self.user_name == other.user_name
            && self.local == other.local
            && self.owner == other.owner
            && self.audio == other.audio
            && self.video == other.video
            && self.screen == other.screen
            && self.joined_at == other.joined_at
            && self.will_eject_at == other.will_eject_at
            && self.video_size == other.video_size
    }
}
