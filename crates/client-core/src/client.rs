//! The call client
//!
//! [`CallClient`] turns API calls into channel messages and channel messages
//! into [`CallEvent`]s. It keeps two participant views: what the call machine
//! last sent (so a later resync starts from the reported flags) and the
//! reconciled snapshot handed to the host.
//!
//! Locks are short and never held across an await or a channel send; the
//! in-process channel delivers synchronously, so a reply can arrive before
//! `send_to_peer` returns.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use callframe_channel_core::{CallFrameId, ChannelListener, ChannelMessage, MessageChannel, ResponseCallback};
use callframe_loader_core::{BundleLoader, LoadError};
use callframe_participant_core::{
    track_transitions, Participant, ParticipantReconciler, ParticipantsSnapshot, TrackTransition, TransitionKind,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, info, trace, warn};

use crate::builder::CallClientBuilder;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::events::{CallEvent, CallEventKind, EventEmitter, EventFilter, EventStream};
use crate::protocol::{participants_field, reply_error, JoinOptions, MachineEvent, MethodAction, ParticipantUpdate};
use crate::state::MeetingState;
use crate::validation::{
    validate_app_message, validate_join, validate_meeting_url, validate_participant_update, validate_user_name,
};

/// Handle to one embedded call. Clones share the same call.
#[derive(Clone)]
pub struct CallClient {
    inner: Arc<ClientInner>,
}

#[derive(Default)]
struct Roster {
    /// Participants as last reported, before reconciliation
    received: HashMap<String, Participant>,
    snapshot: ParticipantsSnapshot,
}

pub(crate) struct ClientInner {
    config: ClientConfig,
    call_frame_id: CallFrameId,
    channel: Arc<dyn MessageChannel>,
    loader: Option<Arc<BundleLoader>>,
    reconciler: ParticipantReconciler,
    state: RwLock<MeetingState>,
    roster: RwLock<Roster>,
    events: EventEmitter,
    listener: Mutex<Option<Arc<dyn ChannelListener>>>,
    destroyed: AtomicBool,
}

impl CallClient {
    pub fn builder(channel: Arc<dyn MessageChannel>) -> CallClientBuilder {
        CallClientBuilder::new(channel)
    }

    pub(crate) fn start(
        config: ClientConfig,
        call_frame_id: CallFrameId,
        channel: Arc<dyn MessageChannel>,
        loader: Option<Arc<BundleLoader>>,
        reconciler: ParticipantReconciler,
    ) -> Self {
        let inner = Arc::new(ClientInner {
            events: EventEmitter::new(config.event_buffer_size),
            config,
            call_frame_id,
            channel,
            loader,
            reconciler,
            state: RwLock::new(MeetingState::New),
            roster: RwLock::new(Roster::default()),
            listener: Mutex::new(None),
            destroyed: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&inner);
        let listener: Arc<dyn ChannelListener> = Arc::new(move |message: &ChannelMessage| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_inbound(message);
            }
        });
        inner
            .channel
            .add_listener(listener.clone(), Some(inner.call_frame_id.clone()));
        *inner.listener.lock() = Some(listener);

        info!(
            call_frame_id = %inner.call_frame_id,
            mode = ?inner.config.mode,
            reconcile = ?inner.reconciler.mode(),
            "Call client created"
        );
        Self { inner }
    }

    pub fn call_frame_id(&self) -> &CallFrameId {
        &self.inner.call_frame_id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn meeting_state(&self) -> MeetingState {
        *self.inner.state.read()
    }

    pub fn participants(&self) -> ParticipantsSnapshot {
        self.inner.roster.read().snapshot.clone()
    }

    pub fn local_participant(&self) -> Option<Participant> {
        self.inner.roster.read().snapshot.local().cloned()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// All events from now on
    pub fn subscribe(&self) -> EventStream {
        self.inner.events.subscribe(EventFilter::all())
    }

    /// Only events of the given kinds
    pub fn subscribe_to(&self, kinds: impl IntoIterator<Item = CallEventKind>) -> EventStream {
        self.inner.events.subscribe(EventFilter::kinds(kinds))
    }

    /// Load the call machine bundle.
    ///
    /// Resolves once the bundle runs. Intermediate failures are reported as
    /// `LoadAttemptFailed` events; only the final one is returned. In embedded
    /// mode the frame loads its own bundle and this only advances the state.
    pub async fn load(&self, meeting_or_base_url: Option<&str>) -> ClientResult<()> {
        self.ensure_alive()?;
        if let Some(url) = meeting_or_base_url {
            validate_meeting_url(url)?;
        }
        let inner = &self.inner;

        let Some(loader) = inner.loader.clone() else {
            inner.mark_loaded();
            inner.events.emit(CallEvent::Loaded { was_no_op: true });
            return Ok(());
        };

        let state = self.meeting_state();
        if state == MeetingState::Loading {
            return Err(ClientError::invalid_state("load", state));
        }
        if !loader.is_loaded() {
            inner.set_state(MeetingState::Loading);
            inner.events.emit(CallEvent::Loading);
        }

        let (tx, rx) = oneshot::channel::<Result<bool, LoadError>>();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let success_tx = tx.clone();
        let events = inner.events.clone();

        loader.load(
            inner.call_frame_id.clone(),
            meeting_or_base_url,
            move |was_no_op| {
                if let Some(tx) = success_tx.lock().take() {
                    let _ = tx.send(Ok(was_no_op));
                }
            },
            move |error, will_retry| {
                events.emit(CallEvent::LoadAttemptFailed {
                    error_msg: error.to_string(),
                    will_retry,
                });
                if !will_retry {
                    if let Some(tx) = tx.lock().take() {
                        let _ = tx.send(Err(error.clone()));
                    }
                }
            },
        );

        match rx.await {
            Ok(Ok(was_no_op)) => {
                inner.mark_loaded();
                inner.events.emit(CallEvent::Loaded { was_no_op });
                Ok(())
            }
            Ok(Err(source)) => {
                let error = ClientError::LoadFailed { source };
                inner.fail(&error);
                Err(error)
            }
            Err(_) => {
                // Both callbacks were dropped: the load was cancelled
                inner.transition(MeetingState::Loading, MeetingState::New);
                Err(ClientError::LoadCancelled)
            }
        }
    }

    /// Join a meeting, loading the bundle first if needed
    pub async fn join(&self, options: JoinOptions) -> ClientResult<ParticipantsSnapshot> {
        self.ensure_alive()?;
        validate_join(&options)?;

        let state = self.meeting_state();
        if state.is_in_meeting() || state == MeetingState::Loading {
            return Err(ClientError::invalid_state("join", state));
        }
        if state != MeetingState::Loaded {
            self.load(options.url.as_deref()).await?;
        }

        let inner = &self.inner;
        inner.set_state(MeetingState::JoiningMeeting);
        inner.events.emit(CallEvent::JoiningMeeting);

        let message = ChannelMessage::from_payload(MethodAction::JoinMeeting.as_str(), &options)?;
        let outcome = self.request(message, "join").await.and_then(|reply| {
            if let Some(msg) = reply_error(&reply) {
                return Err(ClientError::call_machine(msg));
            }
            participants_field(&reply)
        });
        if self.is_destroyed() {
            debug!("Client destroyed while joining, dropping join outcome");
            return Err(ClientError::Destroyed);
        }

        match outcome {
            Ok(participants) => Ok(inner.complete_join(participants)),
            Err(error) => {
                inner.fail(&error);
                Err(error)
            }
        }
    }

    /// Leave the meeting. The participants snapshot is emptied even if the
    /// call machine doesn't acknowledge.
    pub async fn leave(&self) -> ClientResult<()> {
        self.ensure_alive()?;
        if !self.meeting_state().is_in_meeting() {
            debug!(state = %self.meeting_state(), "Not in a meeting, nothing to leave");
            return Ok(());
        }

        match self.request(MethodAction::LeaveMeeting.message(), "leave").await {
            Ok(reply) => {
                if let Some(msg) = reply_error(&reply) {
                    warn!(error = %msg, "Call machine reported an error while leaving");
                }
            }
            Err(error) => warn!(error = %error, "Leave was not acknowledged"),
        }

        self.inner.finalize_leave();
        Ok(())
    }

    pub fn set_local_audio(&self, enabled: bool) -> ClientResult<()> {
        self.ensure_alive()?;
        self.inner
            .post(MethodAction::LocalAudio.message().with_field("enable", enabled));
        Ok(())
    }

    pub fn set_local_video(&self, enabled: bool) -> ClientResult<()> {
        self.ensure_alive()?;
        self.inner
            .post(MethodAction::LocalVideo.message().with_field("enable", enabled));
        Ok(())
    }

    pub async fn set_user_name(&self, name: &str) -> ClientResult<()> {
        self.ensure_alive()?;
        validate_user_name(name)?;

        let reply = self
            .request(MethodAction::SetUserName.message().with_field("name", name), "set user name")
            .await?;
        match reply_error(&reply) {
            Some(msg) => Err(ClientError::call_machine(msg)),
            None => Ok(()),
        }
    }

    /// Ask the call machine to change another participant, or the local one
    /// via `"local"`
    pub fn update_participant(&self, session_id: &str, update: ParticipantUpdate) -> ClientResult<()> {
        self.ensure_alive()?;
        validate_participant_update(session_id, &update)?;

        let state = self.meeting_state();
        if state != MeetingState::JoinedMeeting {
            return Err(ClientError::invalid_state("update participant", state));
        }
        let known = {
            let roster = self.inner.roster.read();
            roster.snapshot.get(session_id).is_some() || roster.snapshot.find_session(session_id).is_some()
        };
        if !known {
            return Err(ClientError::validation("session_id", format!("no participant '{session_id}'")));
        }

        let properties = serde_json::to_value(&update).map_err(|e| ClientError::validation("update", e.to_string()))?;
        self.inner.post(
            MethodAction::UpdateParticipant
                .message()
                .with_field("id", session_id)
                .with_field("properties", properties),
        );
        Ok(())
    }

    /// Broadcast `data` to everyone (`to = None`) or one session
    pub fn send_app_message(&self, data: Value, to: Option<&str>) -> ClientResult<()> {
        self.ensure_alive()?;
        let size = validate_app_message(&data, to)?;

        let state = self.meeting_state();
        if state != MeetingState::JoinedMeeting {
            return Err(ClientError::invalid_state("send app message", state));
        }

        trace!(bytes = size, to = to.unwrap_or("*"), "Sending app message");
        self.inner.post(
            MethodAction::SendAppMessage
                .message()
                .with_field("data", data)
                .with_field("to", to.unwrap_or("*")),
        );
        Ok(())
    }

    /// Reconcile every participant again against the current call state.
    /// Returns how many changed observably.
    pub fn resync_tracks(&self) -> usize {
        if self.is_destroyed() {
            return 0;
        }
        self.inner.resync_tracks()
    }

    /// Tear the client down. Later calls fail with [`ClientError::Destroyed`].
    pub fn destroy(&self) {
        let inner = &self.inner;
        if inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(loader) = &inner.loader {
            loader.cancel();
        }
        if self.meeting_state().is_in_meeting() {
            inner.post(MethodAction::LeaveMeeting.message());
            inner.finalize_leave();
        }
        inner.detach_listener();

        info!(call_frame_id = %inner.call_frame_id, "Call client destroyed");
        inner.events.emit(CallEvent::CallInstanceDestroyed);
    }

    fn ensure_alive(&self) -> ClientResult<()> {
        if self.is_destroyed() {
            Err(ClientError::Destroyed)
        } else {
            Ok(())
        }
    }

    /// Send a correlated request and wait for its reply.
    ///
    /// On timeout the pending callback stays registered; a late reply is
    /// dropped by the closed oneshot.
    async fn request(&self, message: ChannelMessage, operation: &'static str) -> ClientResult<ChannelMessage> {
        let (tx, rx) = oneshot::channel();
        let callback: ResponseCallback = Box::new(move |reply| {
            let _ = tx.send(reply);
        });

        let inner = &self.inner;
        inner
            .channel
            .send_to_peer(message, Some(callback), None, Some(&inner.call_frame_id));

        let timeout = inner.config.request_timeout();
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(ClientError::protocol(format!("{operation} reply was discarded"))),
            Err(_) => Err(ClientError::Timeout {
                operation,
                duration_ms: inner.config.request_timeout_ms,
            }),
        }
    }
}

impl std::fmt::Debug for CallClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallClient")
            .field("call_frame_id", &self.inner.call_frame_id)
            .field("state", &self.meeting_state())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl ClientInner {
    fn set_state(&self, state: MeetingState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            debug!(from = %previous, to = %state, "Meeting state changed");
        }
    }

    /// Move to `to` only if currently in `from`
    fn transition(&self, from: MeetingState, to: MeetingState) -> bool {
        let mut state = self.state.write();
        if *state != from {
            return false;
        }
        *state = to;
        debug!(from = %from, to = %to, "Meeting state changed");
        true
    }

    /// Loading never moves a client that is already in or past a meeting
    fn mark_loaded(&self) {
        let mut state = self.state.write();
        if matches!(
            *state,
            MeetingState::New | MeetingState::Loading | MeetingState::LeftMeeting | MeetingState::Error
        ) {
            *state = MeetingState::Loaded;
        }
    }

    /// No-op once destroyed; `CallInstanceDestroyed` is the last event
    fn fail(&self, error: &ClientError) {
        if self.destroyed.load(Ordering::SeqCst) {
            return;
        }
        warn!(error = %error, category = error.category(), "Call client error");
        self.set_state(MeetingState::Error);
        self.events.emit(CallEvent::Error {
            error_msg: error.to_string(),
        });
    }

    /// Fire-and-forget send
    fn post(&self, message: ChannelMessage) {
        self.channel.send_to_peer(message, None, None, Some(&self.call_frame_id));
    }

    fn detach_listener(&self) {
        if let Some(listener) = self.listener.lock().take() {
            self.channel.remove_listener(&listener);
        }
    }

    fn handle_inbound(&self, message: &ChannelMessage) {
        if self.destroyed.load(Ordering::SeqCst) {
            return;
        }

        let event = match MachineEvent::decode(message) {
            Ok(Some(event)) => event,
            Ok(None) => {
                trace!(action = %message.action, "Ignoring unhandled call machine message");
                return;
            }
            Err(error) => {
                trace!(action = %message.action, error = %error, "Dropping malformed call machine message");
                return;
            }
        };

        match event {
            MachineEvent::JoinedMeeting { participants } => {
                self.complete_join(participants);
            }
            MachineEvent::LeftMeeting => self.finalize_leave(),
            MachineEvent::ParticipantJoined { participant } => self.upsert_participant(participant, true),
            MachineEvent::ParticipantUpdated { participant } => self.upsert_participant(participant, false),
            MachineEvent::ParticipantLeft { participant } => self.remove_participant(participant),
            MachineEvent::AppMessage { data, from_id } => {
                self.events.emit(CallEvent::AppMessage { data, from_id });
            }
            MachineEvent::Error { error_msg } => {
                warn!(error = %error_msg, "Call machine reported a fatal error");
                self.set_state(MeetingState::Error);
                self.events.emit(CallEvent::Error { error_msg });
            }
        }
    }

    /// Install the joined participants. Idempotent: the join reply and the
    /// `joined-meeting` event may both arrive.
    fn complete_join(&self, participants: ParticipantsSnapshot) -> ParticipantsSnapshot {
        let mut transitions = Vec::new();
        let snapshot = {
            let mut state = self.state.write();
            if *state == MeetingState::JoinedMeeting {
                return self.roster.read().snapshot.clone();
            }
            *state = MeetingState::JoinedMeeting;

            let mut roster = self.roster.write();
            for participant in participants.values() {
                let key = participant.key().to_string();
                roster.received.insert(key.clone(), participant.clone());
                let previous = roster.snapshot.get(&key).cloned();
                let result = self.reconciler.reconcile(participant.clone(), previous.as_ref());
                transitions.extend(with_session(
                    &result.participant,
                    track_transitions(previous.as_ref(), Some(&result.participant)),
                ));
                roster.snapshot.upsert(result.participant);
            }
            roster.snapshot.clone()
        };

        info!(participants = snapshot.len(), "Joined meeting");
        self.events.emit(CallEvent::JoinedMeeting {
            participants: snapshot.clone(),
        });
        self.emit_transitions(transitions);
        snapshot
    }

    fn finalize_leave(&self) {
        {
            let mut state = self.state.write();
            if *state == MeetingState::LeftMeeting {
                return;
            }
            *state = MeetingState::LeftMeeting;
        }

        let previous = std::mem::take(&mut *self.roster.write());
        let transitions: Vec<_> = previous
            .snapshot
            .values()
            .flat_map(|p| with_session(p, track_transitions(Some(p), None)))
            .collect();

        info!("Left meeting");
        self.emit_transitions(transitions);
        self.events.emit(CallEvent::LeftMeeting);
    }

    fn upsert_participant(&self, participant: Participant, joined: bool) {
        let key = participant.key().to_string();
        let (result, previous) = {
            let mut roster = self.roster.write();
            roster.received.insert(key.clone(), participant.clone());
            let previous = roster.snapshot.get(&key).cloned();
            let result = self.reconciler.reconcile(participant, previous.as_ref());
            roster.snapshot.upsert(result.participant.clone());
            (result, previous)
        };

        let transitions = with_session(
            &result.participant,
            track_transitions(previous.as_ref(), Some(&result.participant)),
        );
        if joined && previous.is_none() {
            self.events.emit(CallEvent::ParticipantJoined {
                participant: result.participant,
            });
        } else if result.changed {
            self.events.emit(CallEvent::ParticipantUpdated {
                participant: result.participant,
            });
        } else {
            trace!(key = %key, "Participant update not observable, suppressed");
        }
        self.emit_transitions(transitions);
    }

    fn remove_participant(&self, participant: Participant) {
        let removed = {
            let mut roster = self.roster.write();
            let key = participant.key().to_string();
            roster.received.remove(&key);
            roster.snapshot.remove(&key)
        };

        let left = removed.unwrap_or(participant);
        let transitions = with_session(&left, track_transitions(Some(&left), None));
        self.emit_transitions(transitions);
        self.events.emit(CallEvent::ParticipantLeft { participant: left });
    }

    fn resync_tracks(&self) -> usize {
        let mut updates = Vec::new();
        {
            let mut roster = self.roster.write();
            let keys: Vec<String> = roster.snapshot.keys().map(str::to_string).collect();
            for key in keys {
                let Some(previous) = roster.snapshot.get(&key).cloned() else {
                    continue;
                };
                let incoming = roster.received.get(&key).cloned().unwrap_or_else(|| previous.clone());
                let result = self.reconciler.reconcile(incoming, Some(&previous));
                if result.changed {
                    roster.snapshot.upsert(result.participant.clone());
                    updates.push((previous, result.participant));
                }
            }
        }

        let changed = updates.len();
        for (previous, participant) in updates {
            let transitions = with_session(&participant, track_transitions(Some(&previous), Some(&participant)));
            self.events.emit(CallEvent::ParticipantUpdated { participant });
            self.emit_transitions(transitions);
        }
        debug!(changed, "Resynced participant tracks");
        changed
    }

    fn emit_transitions(&self, transitions: Vec<(String, TrackTransition)>) {
        for (session_id, transition) in transitions {
            let event = match transition.kind {
                TransitionKind::Started => CallEvent::TrackStarted {
                    session_id,
                    slot: transition.slot,
                    track: transition.track,
                },
                TransitionKind::Stopped => CallEvent::TrackStopped {
                    session_id,
                    slot: transition.slot,
                    track: transition.track,
                },
            };
            self.events.emit(event);
        }
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            self.channel.remove_listener(&listener);
        }
    }
}

fn with_session(participant: &Participant, transitions: Vec<TrackTransition>) -> Vec<(String, TrackTransition)> {
    transitions
        .into_iter()
        .map(|t| (participant.session_id.clone(), t))
        .collect()
}
