use std::sync::Arc;

use callframe_participant_core::{
    track_transitions, InMemoryCallState, InboundTrack, MediaTrack, Participant, ParticipantReconciler,
    PeerTransportState, SignalingState, StreamType, SubscriptionState, TrackKind, TrackSlot, TransitionKind,
    VideoElementMetrics, VideoSize,
};
use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

fn at(seconds: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(seconds)
}

fn remote() -> Participant {
    Participant::new("remote-1")
        .with_user_name("Grace")
        .with_media(true, true, false)
}

#[test]
fn test_same_id_keeps_previous_reference() {
    let state = InMemoryCallState::new();
    let t1 = MediaTrack::new("audio-1", TrackKind::Audio);
    state.add_inbound_track(InboundTrack::new("remote-1", StreamType::Camera, t1.clone()).started_at(at(0)));
    let reconciler = ParticipantReconciler::call_object(state.clone());

    let first = reconciler.reconcile(remote(), None);
    assert!(first.participant.tracks.camera_audio.as_ref().unwrap().same_track(&t1));

    // Renegotiation produces a new object carrying the same id, currently muted
    let t2 = MediaTrack::new("audio-1", TrackKind::Audio);
    t2.set_muted(true);
    state.remove_inbound_track("remote-1", "audio-1");
    state.add_inbound_track(InboundTrack::new("remote-1", StreamType::Camera, t2.clone()).started_at(at(5)));

    let second = reconciler.reconcile(remote(), Some(&first.participant));
    let kept = second.participant.tracks.camera_audio.as_ref().unwrap();
    assert!(kept.same_track(&t1));
    assert!(!kept.same_track(&t2));
    assert!(second.participant.audio);
}

#[test]
fn test_muted_candidate_without_previous_is_dropped() {
    let state = InMemoryCallState::new();
    let muted = MediaTrack::new("video-1", TrackKind::Video);
    muted.set_muted(true);
    state.add_inbound_track(InboundTrack::new("remote-1", StreamType::Camera, muted));
    let reconciler = ParticipantReconciler::call_object(state);

    let result = reconciler.reconcile(remote(), None);
    assert!(!result.participant.video);
    assert!(result.participant.tracks.camera_video.is_none());
    assert!(result.changed);
}

#[test]
fn test_newest_inbound_track_wins() {
    let state = InMemoryCallState::new();
    let old = MediaTrack::new("video-old", TrackKind::Video);
    let new = MediaTrack::new("video-new", TrackKind::Video);
    state.add_inbound_track(InboundTrack::new("remote-1", StreamType::Camera, new.clone()).started_at(at(10)));
    state.add_inbound_track(InboundTrack::new("remote-1", StreamType::Camera, old).started_at(at(1)));
    let reconciler = ParticipantReconciler::call_object(state);

    let result = reconciler.reconcile(remote(), None);
    assert!(result.participant.tracks.camera_video.as_ref().unwrap().same_track(&new));
}

#[test]
fn test_reconciling_twice_is_stable() {
    let state = InMemoryCallState::new();
    state.add_inbound_track(InboundTrack::new(
        "remote-1",
        StreamType::Camera,
        MediaTrack::new("audio-1", TrackKind::Audio),
    ));
    state.add_inbound_track(InboundTrack::new(
        "remote-1",
        StreamType::Camera,
        MediaTrack::new("video-1", TrackKind::Video),
    ));
    let reconciler = ParticipantReconciler::call_object(state);

    let first = reconciler.reconcile(remote(), None);
    assert!(first.changed);

    let second = reconciler.reconcile(remote(), Some(&first.participant));
    assert_eq!(second.participant, first.participant);
    assert!(!second.changed);
}

#[test]
fn test_local_tracks_come_from_local_stream() {
    let state = InMemoryCallState::new();
    let mic = MediaTrack::new("mic", TrackKind::Audio);
    state.set_local_track(TrackSlot::CameraAudio, Some(mic.clone()));
    // Inbound tracks are never consulted for the local participant
    state.add_inbound_track(InboundTrack::new("me", StreamType::Camera, MediaTrack::new("cam", TrackKind::Video)));
    let reconciler = ParticipantReconciler::call_object(state);

    let local = Participant::local("me").with_media(true, true, true);
    let result = reconciler.reconcile(local, None);

    assert!(result.participant.audio);
    assert!(result.participant.tracks.camera_audio.as_ref().unwrap().same_track(&mic));
    assert!(!result.participant.video);
    assert!(!result.participant.screen);
}

#[test]
fn test_screen_flag_follows_screen_tracks() {
    let state = InMemoryCallState::new();
    let screen = MediaTrack::new("screen-1", TrackKind::Video);
    state.add_inbound_track(InboundTrack::new("remote-1", StreamType::Screen, screen.clone()));
    let reconciler = ParticipantReconciler::call_object(state.clone());

    let sharing = Participant::new("remote-1").with_media(false, false, true);
    let result = reconciler.reconcile(sharing.clone(), None);
    assert!(result.participant.screen);
    assert!(result.participant.tracks.screen_audio.is_none());

    state.remove_inbound_track("remote-1", "screen-1");
    let result = reconciler.reconcile(sharing, Some(&result.participant));
    assert!(!result.participant.screen);
    assert!(result.changed);
}

#[test]
fn test_unsubscribed_slot_is_skipped() {
    let state = InMemoryCallState::new();
    state.add_inbound_track(InboundTrack::new(
        "remote-1",
        StreamType::Camera,
        MediaTrack::new("video-1", TrackKind::Video),
    ));
    state.set_subscription("remote-1", TrackSlot::CameraVideo, SubscriptionState::Staged);
    let reconciler = ParticipantReconciler::call_object(state);

    let result = reconciler.reconcile(remote(), None);
    assert!(result.participant.tracks.camera_video.is_none());
    // Flag is left as the call machine reported it
    assert!(result.participant.video);
}

#[test]
fn test_unestablished_peer_to_peer_clears_media_last() {
    let state = InMemoryCallState::new();
    let t1 = MediaTrack::new("audio-1", TrackKind::Audio);
    state.add_inbound_track(InboundTrack::new("remote-1", StreamType::Camera, t1.clone()));
    let reconciler = ParticipantReconciler::call_object(state.clone());

    let connected = reconciler.reconcile(remote(), None);
    assert!(connected.participant.audio);

    state.set_transport("remote-1", PeerTransportState::PeerToPeer(SignalingState::Checking));
    let reconnecting = reconciler.reconcile(remote(), Some(&connected.participant));
    assert!(!reconnecting.participant.audio);
    assert!(!reconnecting.participant.video);
    assert!(!reconnecting.participant.screen);
    assert!(reconnecting.participant.tracks.is_empty());
    assert!(reconnecting.changed);

    state.set_transport("remote-1", PeerTransportState::PeerToPeer(SignalingState::Completed));
    let recovered = reconciler.reconcile(remote(), Some(&reconnecting.participant));
    assert!(recovered.participant.audio);
    assert!(recovered.participant.tracks.camera_audio.as_ref().unwrap().same_track(&t1));
}

#[test]
fn test_embedded_mode_uses_metrics_only() {
    let state = InMemoryCallState::new();
    state.add_inbound_track(InboundTrack::new(
        "remote-1",
        StreamType::Camera,
        MediaTrack::new("audio-1", TrackKind::Audio),
    ));
    let metrics: Arc<dyn VideoElementMetrics> =
        Arc::new(|_: &str| Some(VideoSize { width: 1280, height: 720 }));
    let reconciler = ParticipantReconciler::embedded(state, Some(metrics));

    let result = reconciler.reconcile(remote(), None);
    assert!(result.participant.tracks.is_empty());
    assert!(result.participant.audio);
    assert_eq!(result.participant.video_size, Some(VideoSize { width: 1280, height: 720 }));
}

#[test]
fn test_transitions_follow_reconciliation() {
    let state = InMemoryCallState::new();
    let reconciler = ParticipantReconciler::call_object(state.clone());
    let before = reconciler.reconcile(remote(), None);

    let video = MediaTrack::new("video-1", TrackKind::Video);
    state.add_inbound_track(InboundTrack::new("remote-1", StreamType::Camera, video.clone()));
    let after = reconciler.reconcile(remote(), Some(&before.participant));

    let transitions = track_transitions(Some(&before.participant), Some(&after.participant));
    assert_eq!(transitions.len(), 1);
    assert_eq!(transitions[0].slot, TrackSlot::CameraVideo);
    assert_eq!(transitions[0].kind, TransitionKind::Started);
    assert_eq!(transitions[0].track, video);
}

proptest! {
    #[test]
    fn prop_second_pass_never_notifies(
        audio in any::<bool>(),
        video in any::<bool>(),
        screen in any::<bool>(),
        audio_track in any::<bool>(),
        video_muted in any::<bool>(),
        p2p_state in prop::sample::select(vec![
            None,
            Some(SignalingState::Connected),
            Some(SignalingState::New),
            Some(SignalingState::Failed),
        ]),
    ) {
        let state = InMemoryCallState::new();
        if audio_track {
            state.add_inbound_track(InboundTrack::new("p", StreamType::Camera, MediaTrack::new("a", TrackKind::Audio)));
        }
        let video_track = MediaTrack::new("v", TrackKind::Video);
        video_track.set_muted(video_muted);
        state.add_inbound_track(InboundTrack::new("p", StreamType::Camera, video_track));
        if let Some(signaling) = p2p_state {
            state.set_transport("p", PeerTransportState::PeerToPeer(signaling));
        }

        let reconciler = ParticipantReconciler::call_object(state);
        let incoming = Participant::new("p").with_media(audio, video, screen);
        let first = reconciler.reconcile(incoming.clone(), None);
        let second = reconciler.reconcile(incoming, Some(&first.participant));

        prop_assert_eq!(&second.participant, &first.participant);
        prop_assert!(!second.changed);
    }
}
