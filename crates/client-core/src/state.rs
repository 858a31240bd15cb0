use std::fmt;

use serde::{Deserialize, Serialize};

/// Where the client is in its lifecycle
///
/// `New → Loading → Loaded → JoiningMeeting → JoinedMeeting → LeftMeeting`,
/// with `Error` reached on terminal failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeetingState {
    New,
    Loading,
    Loaded,
    JoiningMeeting,
    JoinedMeeting,
    LeftMeeting,
    Error,
}

impl MeetingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingState::New => "new",
            MeetingState::Loading => "loading",
            MeetingState::Loaded => "loaded",
            MeetingState::JoiningMeeting => "joining-meeting",
            MeetingState::JoinedMeeting => "joined-meeting",
            MeetingState::LeftMeeting => "left-meeting",
            MeetingState::Error => "error",
        }
    }

    /// Joining or joined
    pub fn is_in_meeting(&self) -> bool {
        matches!(self, MeetingState::JoiningMeeting | MeetingState::JoinedMeeting)
    }
}

impl fmt::Display for MeetingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
