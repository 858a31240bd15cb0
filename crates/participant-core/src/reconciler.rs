//! Participant reconciliation
//!
//! Merges a participant received from the call machine with the cached one,
//! attaching live track references from the [`CallStateStore`]. For each slot
//! in call object mode:
//!
//! 1. local participant: take the local stream's track, demote if missing
//! 2. remote participant: skip slots that aren't subscribed
//! 3. pick the most recently started inbound track as candidate
//! 4. keep the cached reference when the candidate has the same id, otherwise
//!    adopt the candidate only while unmuted
//!
//! Then `screen` is cleared when no screen track resolved, and finally a
//! peer-to-peer participant whose signaling isn't established loses all
//! media.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::diff::is_observable_change;
use crate::participant::Participant;
use crate::store::{CallStateStore, PeerTransportState, VideoElementMetrics};
use crate::track::{MediaTrack, TrackSlot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// Call machine runs in-process; tracks are local objects
    CallObject,
    /// Call machine runs in an embedded frame; tracks stay on its side
    Embedded,
}

/// Outcome of one reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub participant: Participant,
    /// False when the host needn't hear about it
    pub changed: bool,
}

pub struct ParticipantReconciler {
    mode: ReconcileMode,
    store: Arc<dyn CallStateStore>,
    metrics: Option<Arc<dyn VideoElementMetrics>>,
}

impl ParticipantReconciler {
    pub fn call_object(store: Arc<dyn CallStateStore>) -> Self {
        Self {
            mode: ReconcileMode::CallObject,
            store,
            metrics: None,
        }
    }

    pub fn embedded(store: Arc<dyn CallStateStore>, metrics: Option<Arc<dyn VideoElementMetrics>>) -> Self {
        Self {
            mode: ReconcileMode::Embedded,
            store,
            metrics,
        }
    }

    pub fn mode(&self) -> ReconcileMode {
        self.mode
    }

    pub fn store(&self) -> &Arc<dyn CallStateStore> {
        &self.store
    }

    pub fn reconcile(&self, incoming: Participant, previous: Option<&Participant>) -> Reconciliation {
        let mut participant = incoming;

        match self.mode {
            ReconcileMode::CallObject => {
                // Tracks never arrive over the wire; start from a clean slate
                participant.tracks.clear();
                participant.video_size = None;
                for slot in TrackSlot::ALL {
                    self.resolve_slot(&mut participant, previous, slot);
                }
                if participant.tracks.screen_audio.is_none() && participant.tracks.screen_video.is_none() {
                    participant.screen = false;
                }
                self.apply_transport_override(&mut participant);
            }
            ReconcileMode::Embedded => {
                participant.tracks.clear();
                if let Some(metrics) = &self.metrics {
                    participant.video_size = metrics.rendered_size(&participant.session_id);
                }
            }
        }

        let changed = previous.map_or(true, |prev| is_observable_change(prev, &participant));
        trace!(session_id = %participant.session_id, changed, "Participant reconciled");
        Reconciliation { participant, changed }
    }

    fn resolve_slot(&self, participant: &mut Participant, previous: Option<&Participant>, slot: TrackSlot) {
        if participant.local {
            let track = self.store.local_track(slot);
            if track.is_none() {
                participant.demote(slot);
            }
            participant.tracks.set(slot, track);
            return;
        }

        if !self.store.subscription(&participant.session_id, slot).receives_media() {
            trace!(session_id = %participant.session_id, %slot, "Slot not subscribed, skipping");
            return;
        }

        let candidate = self
            .store
            .inbound_tracks(&participant.session_id, slot.stream_type(), slot.kind())
            .into_iter()
            .max_by_key(|inbound| inbound.started_at)
            .map(|inbound| inbound.track);

        let resolved = retain_or_adopt(previous.and_then(|p| p.tracks.get(slot)), candidate);
        if resolved.is_none() {
            participant.demote(slot);
        }
        participant.tracks.set(slot, resolved);
    }

    fn apply_transport_override(&self, participant: &mut Participant) {
        if participant.local {
            return;
        }
        if let PeerTransportState::PeerToPeer(signaling) = self.store.transport(&participant.session_id) {
            if !signaling.is_established() {
                debug!(
                    session_id = %participant.session_id,
                    ?signaling,
                    "Peer-to-peer connection not established, clearing media"
                );
                participant.clear_media();
            }
        }
    }
}

/// Prefer the cached reference for the same track id; a fresh candidate is
/// only usable while unmuted.
fn retain_or_adopt(previous: Option<&MediaTrack>, candidate: Option<MediaTrack>) -> Option<MediaTrack> {
    let candidate = candidate?;
    match previous {
        Some(previous) if previous.id() == candidate.id() => Some(previous.clone()),
        _ if candidate.is_muted() => None,
        _ => Some(candidate),
    }
}

impl std::fmt::Debug for ParticipantReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParticipantReconciler")
            .field("mode", &self.mode)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackKind;

    #[test]
    fn test_retain_or_adopt() {
        let previous = MediaTrack::new("t1", TrackKind::Audio);
        let same_id = MediaTrack::new("t1", TrackKind::Audio);
        same_id.set_muted(true);
        let kept = retain_or_adopt(Some(&previous), Some(same_id)).unwrap();
        assert!(kept.same_track(&previous));

        let muted = MediaTrack::new("t2", TrackKind::Audio);
        muted.set_muted(true);
        assert!(retain_or_adopt(Some(&previous), Some(muted)).is_none());

        let fresh = MediaTrack::new("t3", TrackKind::Audio);
        assert!(retain_or_adopt(None, Some(fresh.clone())).unwrap().same_track(&fresh));
        assert!(retain_or_adopt(Some(&previous), None).is_none());
    }
}
