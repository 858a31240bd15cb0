//! # callframe-participant-core
//!
//! Host-side mirror of the participants in a call.
//!
//! Participants arrive from the call machine as plain data. The
//! [`ParticipantReconciler`] attaches live track references from a read-only
//! [`CallStateStore`], keeps flags consistent with the tracks it found, and
//! decides whether the result differs observably from what the host already
//! saw.
//!
//! ```rust
//! use callframe_participant_core::{InMemoryCallState, Participant, ParticipantReconciler};
//!
//! let reconciler = ParticipantReconciler::call_object(InMemoryCallState::new());
//! let incoming = Participant::new("abc").with_media(true, false, false);
//!
//! let first = reconciler.reconcile(incoming.clone(), None);
//! // No inbound audio track is known yet, so the flag is demoted
//! assert!(!first.participant.audio);
//!
//! let second = reconciler.reconcile(incoming, Some(&first.participant));
//! assert!(!second.changed);
//! ```

pub mod diff;
pub mod error;
pub mod participant;
pub mod reconciler;
pub mod snapshot;
pub mod store;
pub mod track;

pub use diff::{is_observable_change, track_transitions, TrackTransition, TransitionKind};
pub use error::{ParticipantError, ParticipantResult};
pub use participant::{Participant, VideoSize, LOCAL_KEY};
pub use reconciler::{ParticipantReconciler, ReconcileMode, Reconciliation};
pub use snapshot::ParticipantsSnapshot;
pub use store::{
    CallStateStore, InMemoryCallState, InboundTrack, PeerTransportState, SignalingState, SubscriptionState,
    VideoElementMetrics,
};
pub use track::{MediaTrack, ParticipantTracks, StreamType, TrackFingerprint, TrackKind, TrackSlot};
