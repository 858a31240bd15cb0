//! Typed call events
//!
//! Every event the client emits is a [`CallEvent`] variant with its own
//! payload. Subscribers get an [`EventStream`], optionally filtered by
//! [`CallEventKind`], backed by a tokio broadcast channel: a subscriber that
//! falls behind skips the oldest events instead of slowing the client down.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use callframe_participant_core::{MediaTrack, Participant, ParticipantsSnapshot, TrackSlot};
use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallEventKind {
    Loading,
    LoadAttemptFailed,
    Loaded,
    JoiningMeeting,
    JoinedMeeting,
    LeftMeeting,
    ParticipantJoined,
    ParticipantUpdated,
    ParticipantLeft,
    TrackStarted,
    TrackStopped,
    AppMessage,
    Error,
    CallInstanceDestroyed,
}

impl CallEventKind {
    pub const ALL: [CallEventKind; 14] = [
        CallEventKind::Loading,
        CallEventKind::LoadAttemptFailed,
        CallEventKind::Loaded,
        CallEventKind::JoiningMeeting,
        CallEventKind::JoinedMeeting,
        CallEventKind::LeftMeeting,
        CallEventKind::ParticipantJoined,
        CallEventKind::ParticipantUpdated,
        CallEventKind::ParticipantLeft,
        CallEventKind::TrackStarted,
        CallEventKind::TrackStopped,
        CallEventKind::AppMessage,
        CallEventKind::Error,
        CallEventKind::CallInstanceDestroyed,
    ];

    /// Wire name of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            CallEventKind::Loading => "loading",
            CallEventKind::LoadAttemptFailed => "load-attempt-failed",
            CallEventKind::Loaded => "loaded",
            CallEventKind::JoiningMeeting => "joining-meeting",
            CallEventKind::JoinedMeeting => "joined-meeting",
            CallEventKind::LeftMeeting => "left-meeting",
            CallEventKind::ParticipantJoined => "participant-joined",
            CallEventKind::ParticipantUpdated => "participant-updated",
            CallEventKind::ParticipantLeft => "participant-left",
            CallEventKind::TrackStarted => "track-started",
            CallEventKind::TrackStopped => "track-stopped",
            CallEventKind::AppMessage => "app-message",
            CallEventKind::Error => "error",
            CallEventKind::CallInstanceDestroyed => "call-instance-destroyed",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for CallEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent {
    Loading,
    LoadAttemptFailed {
        error_msg: String,
        will_retry: bool,
    },
    Loaded {
        was_no_op: bool,
    },
    JoiningMeeting,
    JoinedMeeting {
        participants: ParticipantsSnapshot,
    },
    LeftMeeting,
    ParticipantJoined {
        participant: Participant,
    },
    ParticipantUpdated {
        participant: Participant,
    },
    ParticipantLeft {
        participant: Participant,
    },
    TrackStarted {
        session_id: String,
        slot: TrackSlot,
        track: MediaTrack,
    },
    TrackStopped {
        session_id: String,
        slot: TrackSlot,
        track: MediaTrack,
    },
    AppMessage {
        data: Value,
        from_id: String,
    },
    Error {
        error_msg: String,
    },
    CallInstanceDestroyed,
}

impl CallEvent {
    pub fn kind(&self) -> CallEventKind {
        match self {
            CallEvent::Loading => CallEventKind::Loading,
            CallEvent::LoadAttemptFailed { .. } => CallEventKind::LoadAttemptFailed,
            CallEvent::Loaded { .. } => CallEventKind::Loaded,
            CallEvent::JoiningMeeting => CallEventKind::JoiningMeeting,
            CallEvent::JoinedMeeting { .. } => CallEventKind::JoinedMeeting,
            CallEvent::LeftMeeting => CallEventKind::LeftMeeting,
            CallEvent::ParticipantJoined { .. } => CallEventKind::ParticipantJoined,
            CallEvent::ParticipantUpdated { .. } => CallEventKind::ParticipantUpdated,
            CallEvent::ParticipantLeft { .. } => CallEventKind::ParticipantLeft,
            CallEvent::TrackStarted { .. } => CallEventKind::TrackStarted,
            CallEvent::TrackStopped { .. } => CallEventKind::TrackStopped,
            CallEvent::AppMessage { .. } => CallEventKind::AppMessage,
            CallEvent::Error { .. } => CallEventKind::Error,
            CallEvent::CallInstanceDestroyed => CallEventKind::CallInstanceDestroyed,
        }
    }

    /// Session id of the participant the event is about, if any
    pub fn session_id(&self) -> Option<&str> {
        match self {
            CallEvent::ParticipantJoined { participant }
            | CallEvent::ParticipantUpdated { participant }
            | CallEvent::ParticipantLeft { participant } => Some(&participant.session_id),
            CallEvent::TrackStarted { session_id, .. } | CallEvent::TrackStopped { session_id, .. } => {
                Some(session_id)
            }
            _ => None,
        }
    }
}

/// Which event kinds a subscriber wants; empty means all
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    kinds: HashSet<CallEventKind>,
}

impl EventFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn kinds(kinds: impl IntoIterator<Item = CallEventKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }

    pub fn matches(&self, event: &CallEvent) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&event.kind())
    }
}

/// Sending half shared by the client and its callbacks
#[derive(Clone)]
pub(crate) struct EventEmitter {
    tx: broadcast::Sender<CallEvent>,
}

impl EventEmitter {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub(crate) fn emit(&self, event: CallEvent) {
        let kind = event.kind();
        // No receivers is fine
        let receivers = self.tx.send(event).unwrap_or(0);
        trace!(event = %kind, receivers, "Emitted call event");
    }

    pub(crate) fn subscribe(&self, filter: EventFilter) -> EventStream {
        EventStream {
            rx: self.tx.subscribe(),
            filter,
        }
    }
}

/// Receiving end of the client's events
pub struct EventStream {
    rx: broadcast::Receiver<CallEvent>,
    filter: EventFilter,
}

impl EventStream {
    /// Next matching event; `None` once the client is gone
    pub async fn recv(&mut self) -> Option<CallEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event subscriber lagged, dropped oldest events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event that is already queued
    pub fn try_recv(&mut self) -> Option<CallEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event subscriber lagged, dropped oldest events");
                }
                Err(_) => return None,
            }
        }
    }

    /// Adapt into a `futures::Stream`
    pub fn into_stream(self) -> impl Stream<Item = CallEvent> + Send + 'static {
        let filter = self.filter;
        BroadcastStream::new(self.rx).filter_map(move |item| {
            let event = match item {
                Ok(event) if filter.matches(&event) => Some(event),
                Ok(_) => None,
                Err(err) => {
                    warn!(error = %err, "Event subscriber lagged");
                    None
                }
            };
            futures::future::ready(event)
        })
    }

    /// Feed every matching event to `handler` on a background task
    pub fn dispatch_to(mut self, handler: Arc<dyn CallEventHandler>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = self.recv().await {
                handler.on_event(event).await;
            }
        })
    }
}

/// Callback-style consumer of call events
#[async_trait]
pub trait CallEventHandler: Send + Sync {
    async fn on_event(&self, event: CallEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_round_trip() {
        for kind in CallEventKind::ALL {
            assert_eq!(CallEventKind::from_wire(kind.as_str()), Some(kind));
        }
        assert_eq!(CallEventKind::from_wire("nonsense"), None);
    }

    #[test]
    fn test_filter() {
        let filter = EventFilter::kinds([CallEventKind::Loaded]);
        assert!(filter.matches(&CallEvent::Loaded { was_no_op: false }));
        assert!(!filter.matches(&CallEvent::Loading));
        assert!(EventFilter::all().matches(&CallEvent::Loading));
    }

    #[tokio::test]
    async fn test_filtered_stream_skips_other_kinds() {
        let emitter = EventEmitter::new(16);
        let mut loaded_only = emitter.subscribe(EventFilter::kinds([CallEventKind::Loaded]));
        let mut everything = emitter.subscribe(EventFilter::all());

        emitter.emit(CallEvent::Loading);
        emitter.emit(CallEvent::Loaded { was_no_op: true });

        assert_eq!(loaded_only.recv().await, Some(CallEvent::Loaded { was_no_op: true }));
        assert_eq!(everything.recv().await, Some(CallEvent::Loading));
        assert!(loaded_only.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagging_subscriber_keeps_newest() {
        let emitter = EventEmitter::new(2);
        let mut stream = emitter.subscribe(EventFilter::all());
        for _ in 0..5 {
            emitter.emit(CallEvent::Loading);
        }
        emitter.emit(CallEvent::CallInstanceDestroyed);

        let mut last = None;
        while let Some(event) = stream.try_recv() {
            last = Some(event);
        }
        assert_eq!(last, Some(CallEvent::CallInstanceDestroyed));
    }

    #[tokio::test]
    async fn test_into_stream() {
        let emitter = EventEmitter::new(8);
        let stream = emitter.subscribe(EventFilter::kinds([CallEventKind::Error]));
        emitter.emit(CallEvent::Loading);
        emitter.emit(CallEvent::Error {
            error_msg: "boom".to_string(),
        });
        drop(emitter);

        let events: Vec<CallEvent> = stream.into_stream().collect().await;
        assert_eq!(
            events,
            vec![CallEvent::Error {
                error_msg: "boom".to_string()
            }]
        );
    }
}
