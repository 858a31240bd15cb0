//! Media track handles
//!
//! The runtime owns every track; the reconciler only holds references. A
//! [`MediaTrack`] is a cheap-clone handle whose identity is the identity of
//! the underlying runtime object, not its id.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    #[serde(alias = "cam")]
    Camera,
    Screen,
}

/// One of the four track positions a participant can fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackSlot {
    #[serde(rename = "audio")]
    CameraAudio,
    #[serde(rename = "video")]
    CameraVideo,
    ScreenAudio,
    ScreenVideo,
}

impl TrackSlot {
    pub const ALL: [TrackSlot; 4] = [
        TrackSlot::CameraAudio,
        TrackSlot::CameraVideo,
        TrackSlot::ScreenAudio,
        TrackSlot::ScreenVideo,
    ];

    pub fn kind(&self) -> TrackKind {
        match self {
            TrackSlot::CameraAudio | TrackSlot::ScreenAudio => TrackKind::Audio,
            TrackSlot::CameraVideo | TrackSlot::ScreenVideo => TrackKind::Video,
        }
    }

    pub fn stream_type(&self) -> StreamType {
        match self {
            TrackSlot::CameraAudio | TrackSlot::CameraVideo => StreamType::Camera,
            TrackSlot::ScreenAudio | TrackSlot::ScreenVideo => StreamType::Screen,
        }
    }

    pub fn is_screen(&self) -> bool {
        self.stream_type() == StreamType::Screen
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackSlot::CameraAudio => "audio",
            TrackSlot::CameraVideo => "video",
            TrackSlot::ScreenAudio => "screenAudio",
            TrackSlot::ScreenVideo => "screenVideo",
        }
    }
}

impl fmt::Display for TrackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct TrackInner {
    id: String,
    kind: TrackKind,
    muted: AtomicBool,
    enabled: AtomicBool,
}

/// Handle to a runtime-owned media track
#[derive(Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

/// The parts of a track that matter for change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackFingerprint {
    pub id: String,
    pub muted: bool,
    pub enabled: bool,
}

impl MediaTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            inner: Arc::new(TrackInner {
                id: id.into(),
                kind,
                muted: AtomicBool::new(false),
                enabled: AtomicBool::new(true),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    pub fn is_muted(&self) -> bool {
        self.inner.muted.load(Ordering::SeqCst)
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Runtime-side mute (no media flowing)
    pub fn set_muted(&self, muted: bool) {
        self.inner.muted.store(muted, Ordering::SeqCst);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
    }

    /// True if both handles refer to the same runtime track
    pub fn same_track(&self, other: &MediaTrack) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn fingerprint(&self) -> TrackFingerprint {
        TrackFingerprint {
            id: self.inner.id.clone(),
            muted: self.is_muted(),
            enabled: self.is_enabled(),
        }
    }
}

impl PartialEq for MediaTrack {
    fn eq(&self, other: &Self) -> bool {
        self.same_track(other)
    }
}

impl Eq for MediaTrack {}

impl fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("muted", &self.is_muted())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Track references for the four slots of one participant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParticipantTracks {
    pub camera_audio: Option<MediaTrack>,
    pub camera_video: Option<MediaTrack>,
    pub screen_audio: Option<MediaTrack>,
    pub screen_video: Option<MediaTrack>,
}

impl ParticipantTracks {
    pub fn get(&self, slot: TrackSlot) -> Option<&MediaTrack> {
        match slot {
            TrackSlot::CameraAudio => self.camera_audio.as_ref(),
            TrackSlot::CameraVideo => self.camera_video.as_ref(),
            TrackSlot::ScreenAudio => self.screen_audio.as_ref(),
            TrackSlot::ScreenVideo => self.screen_video.as_ref(),
        }
    }

    pub fn set(&mut self, slot: TrackSlot, track: Option<MediaTrack>) {
        let entry = match slot {
            TrackSlot::CameraAudio => &mut self.camera_audio,
            TrackSlot::CameraVideo => &mut self.camera_video,
            TrackSlot::ScreenAudio => &mut self.screen_audio,
            TrackSlot::ScreenVideo => &mut self.screen_video,
        };
        *entry = track;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        TrackSlot::ALL.iter().all(|slot| self.get(*slot).is_none())
    }

    pub fn iter(&self) -> impl Iterator<Item = (TrackSlot, &MediaTrack)> + '_ {
        TrackSlot::ALL
            .into_iter()
            .filter_map(move |slot| self.get(slot).map(|track| (slot, track)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_reference_identity() {
        let a = MediaTrack::new("t1", TrackKind::Audio);
        let b = MediaTrack::new("t1", TrackKind::Audio);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_mute_is_shared_between_clones() {
        let track = MediaTrack::new("t1", TrackKind::Video);
        let handle = track.clone();
        handle.set_muted(true);
        assert!(track.is_muted());
        assert!(track.is_enabled());
    }

    #[test]
    fn test_slot_shape() {
        assert_eq!(TrackSlot::ScreenAudio.kind(), TrackKind::Audio);
        assert_eq!(TrackSlot::ScreenAudio.stream_type(), StreamType::Screen);
        assert_eq!(TrackSlot::CameraVideo.as_str(), "video");
        assert_eq!(serde_json::to_string(&TrackSlot::ScreenVideo).unwrap(), "\"screenVideo\"");
        assert_eq!(serde_json::from_str::<StreamType>("\"cam\"").unwrap(), StreamType::Camera);
    }

    #[test]
    fn test_tracks_iter_and_clear() {
        let mut tracks = ParticipantTracks::default();
        tracks.set(TrackSlot::ScreenVideo, Some(MediaTrack::new("s", TrackKind::Video)));
        tracks.set(TrackSlot::CameraAudio, Some(MediaTrack::new("a", TrackKind::Audio)));

        let slots: Vec<_> = tracks.iter().map(|(slot, _)| slot).collect();
        assert_eq!(slots, vec![TrackSlot::CameraAudio, TrackSlot::ScreenVideo]);

        tracks.clear();
        assert!(tracks.is_empty());
    }
}
