//! Change detection between two versions of a participant

use crate::participant::Participant;
use crate::track::{MediaTrack, TrackSlot};

/// Whether replacing `old` with `new` is worth telling the host about.
///
/// Track objects are compared by (id, muted, enabled), never by identity, so
/// a reconciliation that reaches an equivalent result through different
/// references stays silent.
pub fn is_observable_change(old: &Participant, new: &Participant) -> bool {
    if !old.same_attributes(new) {
        return true;
    }
    TrackSlot::ALL
        .iter()
        .any(|slot| match (old.tracks.get(*slot), new.tracks.get(*slot)) {
            (None, None) => false,
            (Some(a), Some(b)) => a.fingerprint() != b.fingerprint(),
            _ => true,
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Started,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackTransition {
    pub slot: TrackSlot,
    pub kind: TransitionKind,
    pub track: MediaTrack,
}

/// Tracks that stopped or started between `old` and `new`, compared by id.
///
/// Pass `None` for a participant that just joined or just left. Stops are
/// listed before starts.
pub fn track_transitions(old: Option<&Participant>, new: Option<&Participant>) -> Vec<TrackTransition> {
    let mut stopped = Vec::new();
    let mut started = Vec::new();

    for slot in TrackSlot::ALL {
        let before = old.and_then(|p| p.tracks.get(slot));
        let after = new.and_then(|p| p.tracks.get(slot));
        if before.map(MediaTrack::id) == after.map(MediaTrack::id) {
            continue;
        }
        if let Some(track) = before {
            stopped.push(TrackTransition {
                slot,
                kind: TransitionKind::Stopped,
                track: track.clone(),
            });
        }
        if let Some(track) = after {
            started.push(TrackTransition {
                slot,
                kind: TransitionKind::Started,
                track: track.clone(),
            });
        }
    }

    stopped.extend(started);
    stopped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackKind;

    fn with_track(slot: TrackSlot, track: &MediaTrack) -> Participant {
        let mut participant = Participant::new("p").with_media(true, true, false);
        participant.tracks.set(slot, Some(track.clone()));
        participant
    }

    #[test]
    fn test_equivalent_tracks_are_silent() {
        let a = MediaTrack::new("t1", TrackKind::Audio);
        let b = MediaTrack::new("t1", TrackKind::Audio);
        let old = with_track(TrackSlot::CameraAudio, &a);
        let new = with_track(TrackSlot::CameraAudio, &b);
        assert!(!is_observable_change(&old, &new));
    }

    #[test]
    fn test_mute_difference_is_observable() {
        let a = MediaTrack::new("t1", TrackKind::Audio);
        let b = MediaTrack::new("t1", TrackKind::Audio);
        b.set_muted(true);
        let old = with_track(TrackSlot::CameraAudio, &a);
        let new = with_track(TrackSlot::CameraAudio, &b);
        assert!(is_observable_change(&old, &new));
    }

    #[test]
    fn test_presence_and_field_differences() {
        let track = MediaTrack::new("t1", TrackKind::Video);
        let old = with_track(TrackSlot::CameraVideo, &track);
        let mut new = old.clone();
        new.tracks.clear();
        assert!(is_observable_change(&old, &new));

        let mut renamed = old.clone();
        renamed.user_name = "Grace".to_string();
        assert!(is_observable_change(&old, &renamed));
        assert!(!is_observable_change(&old, &old.clone()));
    }

    #[test]
    fn test_transitions_on_swap_join_and_leave() {
        let first = MediaTrack::new("v1", TrackKind::Video);
        let second = MediaTrack::new("v2", TrackKind::Video);
        let old = with_track(TrackSlot::CameraVideo, &first);
        let new = with_track(TrackSlot::CameraVideo, &second);

        let transitions = track_transitions(Some(&old), Some(&new));
        assert_eq!(transitions.len(), 2);
        assert_eq!(transitions[0].kind, TransitionKind::Stopped);
        assert_eq!(transitions[0].track, first);
        assert_eq!(transitions[1].kind, TransitionKind::Started);
        assert_eq!(transitions[1].track, second);

        let joined = track_transitions(None, Some(&new));
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].kind, TransitionKind::Started);

        let left = track_transitions(Some(&old), None);
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].kind, TransitionKind::Stopped);

        assert!(track_transitions(Some(&old), Some(&old)).is_empty());
    }
}
