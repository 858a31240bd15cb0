//! Read-only view of runtime call state consumed by the reconciler

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::participant::VideoSize;
use crate::track::{MediaTrack, StreamType, TrackKind, TrackSlot};

/// A track received from a remote participant
#[derive(Debug, Clone)]
pub struct InboundTrack {
    pub session_id: String,
    pub stream_type: StreamType,
    pub track: MediaTrack,
    pub started_at: DateTime<Utc>,
}

impl InboundTrack {
    pub fn new(session_id: impl Into<String>, stream_type: StreamType, track: MediaTrack) -> Self {
        Self {
            session_id: session_id.into(),
            stream_type,
            track,
            started_at: Utc::now(),
        }
    }

    pub fn started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    pub fn matches(&self, session_id: &str, stream_type: StreamType, kind: TrackKind) -> bool {
        self.session_id == session_id && self.stream_type == stream_type && self.track.kind() == kind
    }
}

/// Local subscription to one remote slot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    #[default]
    Subscribed,
    /// Negotiated but not flowing
    Staged,
    Unsubscribed,
}

impl SubscriptionState {
    pub fn receives_media(&self) -> bool {
        matches!(self, SubscriptionState::Subscribed)
    }
}

/// Signaling state of a peer-to-peer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalingState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl SignalingState {
    pub fn is_established(&self) -> bool {
        matches!(self, SignalingState::Connected | SignalingState::Completed)
    }
}

/// How media from a remote participant reaches us
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PeerTransportState {
    /// Routed through a media server
    #[default]
    Sfu,
    PeerToPeer(SignalingState),
}

/// Call state owned by the runtime. The reconciler never mutates it.
pub trait CallStateStore: Send + Sync {
    /// Track the local media stream holds for `slot`
    fn local_track(&self, slot: TrackSlot) -> Option<MediaTrack>;

    fn inbound_tracks(&self, session_id: &str, stream_type: StreamType, kind: TrackKind) -> Vec<InboundTrack>;

    fn subscription(&self, session_id: &str, slot: TrackSlot) -> SubscriptionState;

    fn transport(&self, session_id: &str) -> PeerTransportState;
}

/// Rendered video element sizes, available in embedded-frame mode
pub trait VideoElementMetrics: Send + Sync {
    fn rendered_size(&self, session_id: &str) -> Option<VideoSize>;
}

impl<F> VideoElementMetrics for F
where
    F: Fn(&str) -> Option<VideoSize> + Send + Sync,
{
    fn rendered_size(&self, session_id: &str) -> Option<VideoSize> {
        self(session_id)
    }
}

/// [`CallStateStore`] backed by concurrent maps, fed by the runtime glue
#[derive(Debug, Default)]
pub struct InMemoryCallState {
    local_tracks: DashMap<TrackSlot, MediaTrack>,
    inbound: DashMap<String, Vec<InboundTrack>>,
    subscriptions: DashMap<(String, TrackSlot), SubscriptionState>,
    transports: DashMap<String, PeerTransportState>,
}

impl InMemoryCallState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_local_track(&self, slot: TrackSlot, track: Option<MediaTrack>) {
        match track {
            Some(track) => {
                self.local_tracks.insert(slot, track);
            }
            None => {
                self.local_tracks.remove(&slot);
            }
        }
    }

    pub fn add_inbound_track(&self, inbound: InboundTrack) {
        trace!(session_id = %inbound.session_id, track_id = inbound.track.id(), "Inbound track added");
        self.inbound.entry(inbound.session_id.clone()).or_default().push(inbound);
    }

    /// Drop an ended inbound track by id
    pub fn remove_inbound_track(&self, session_id: &str, track_id: &str) -> bool {
        let Some(mut tracks) = self.inbound.get_mut(session_id) else {
            return false;
        };
        let before = tracks.len();
        tracks.retain(|t| t.track.id() != track_id);
        before != tracks.len()
    }

    pub fn set_subscription(&self, session_id: impl Into<String>, slot: TrackSlot, state: SubscriptionState) {
        self.subscriptions.insert((session_id.into(), slot), state);
    }

    pub fn set_transport(&self, session_id: impl Into<String>, transport: PeerTransportState) {
        self.transports.insert(session_id.into(), transport);
    }

    /// Forget everything known about a remote participant
    pub fn remove_participant(&self, session_id: &str) {
        self.inbound.remove(session_id);
        self.transports.remove(session_id);
        self.subscriptions.retain(|(id, _), _| id != session_id);
    }

    pub fn clear(&self) {
        self.local_tracks.clear();
        self.inbound.clear();
        self.subscriptions.clear();
        self.transports.clear();
    }
}

impl CallStateStore for InMemoryCallState {
    fn local_track(&self, slot: TrackSlot) -> Option<MediaTrack> {
        self.local_tracks.get(&slot).map(|t| t.value().clone())
    }

    fn inbound_tracks(&self, session_id: &str, stream_type: StreamType, kind: TrackKind) -> Vec<InboundTrack> {
        self.inbound
            .get(session_id)
            .map(|tracks| {
                tracks
                    .iter()
                    .filter(|t| t.matches(session_id, stream_type, kind))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn subscription(&self, session_id: &str, slot: TrackSlot) -> SubscriptionState {
        self.subscriptions
            .get(&(session_id.to_string(), slot))
            .map(|s| *s.value())
            .unwrap_or_default()
    }

    fn transport(&self, session_id: &str) -> PeerTransportState {
        self.transports
            .get(session_id)
            .map(|t| *t.value())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_lookup_filters() {
        let state = InMemoryCallState::new();
        state.add_inbound_track(InboundTrack::new("a", StreamType::Camera, MediaTrack::new("a1", TrackKind::Audio)));
        state.add_inbound_track(InboundTrack::new("a", StreamType::Screen, MediaTrack::new("a2", TrackKind::Video)));
        state.add_inbound_track(InboundTrack::new("b", StreamType::Camera, MediaTrack::new("b1", TrackKind::Audio)));

        let found = state.inbound_tracks("a", StreamType::Camera, TrackKind::Audio);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].track.id(), "a1");

        assert!(state.remove_inbound_track("a", "a1"));
        assert!(!state.remove_inbound_track("a", "a1"));
        assert!(state.inbound_tracks("a", StreamType::Camera, TrackKind::Audio).is_empty());
    }

    #[test]
    fn test_defaults() {
        let state = InMemoryCallState::new();
        assert_eq!(state.subscription("x", TrackSlot::CameraVideo), SubscriptionState::Subscribed);
        assert_eq!(state.transport("x"), PeerTransportState::Sfu);
        assert!(state.local_track(TrackSlot::CameraAudio).is_none());
    }

    #[test]
    fn test_remove_participant() {
        let state = InMemoryCallState::new();
        state.set_subscription("a", TrackSlot::CameraVideo, SubscriptionState::Unsubscribed);
        state.set_transport("a", PeerTransportState::PeerToPeer(SignalingState::Checking));
        state.remove_participant("a");
        assert_eq!(state.subscription("a", TrackSlot::CameraVideo), SubscriptionState::Subscribed);
        assert_eq!(state.transport("a"), PeerTransportState::Sfu);
    }

    #[test]
    fn test_closure_metrics() {
        let metrics = |id: &str| (id == "a").then_some(VideoSize { width: 640, height: 360 });
        assert_eq!(metrics.rendered_size("a").unwrap().width, 640);
        assert!(metrics.rendered_size("b").is_none());
    }
}
