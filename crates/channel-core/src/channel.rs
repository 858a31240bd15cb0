//! Message channel contract and the filtering logic shared by all bindings

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};

use crate::bus::{BusHandler, MessageBus, SubscriptionId};
use crate::envelope::{CallFrameId, CallbackStamp, ChannelMessage, Envelope, SenderTag};
use crate::registry::{PendingCallbacks, ResponseCallback};

/// Receives messages accepted by a channel
pub trait ChannelListener: Send + Sync {
    fn on_message(&self, message: &ChannelMessage);
}

impl<F> ChannelListener for F
where
    F: Fn(&ChannelMessage) + Send + Sync,
{
    fn on_message(&self, message: &ChannelMessage) {
        self(message)
    }
}

/// Two-way message passing between the host and the call machine
///
/// Sends are fire-and-forget: there is no delivery guarantee and no queueing,
/// a message posted while the peer isn't listening is lost.
pub trait MessageChannel: Send + Sync {
    /// The sender tag stamped on outgoing messages and used for echo suppression
    fn own_tag(&self) -> SenderTag;

    /// Send a message to the other side.
    ///
    /// With a `callback`, a correlation stamp is registered and attached; the
    /// callback runs once when a response carrying the stamp arrives on a
    /// listener of this channel. Returns the stamp, if one was minted.
    fn send_to_peer(
        &self,
        message: ChannelMessage,
        callback: Option<ResponseCallback>,
        routing_target: Option<&Arc<MessageBus>>,
        channel_id: Option<&CallFrameId>,
    ) -> Option<CallbackStamp>;

    /// Start delivering messages addressed to `channel_id` to `listener`.
    ///
    /// Registering the same listener twice delivers every message twice;
    /// remove it first.
    fn add_listener(&self, listener: Arc<dyn ChannelListener>, channel_id: Option<CallFrameId>);

    /// Stop delivering to `listener`. No-op if it isn't registered.
    fn remove_listener(&self, listener: &Arc<dyn ChannelListener>);

    /// Number of correlated requests still waiting for a response
    fn pending_callbacks(&self) -> usize;
}

/// Decide whether a channel with `own_tag` listening on `channel_id` accepts
/// an envelope.
///
/// A missing channel id on either side accepts anything, for peers that
/// predate channel ids.
pub fn accepts(envelope: &Envelope, own_tag: SenderTag, channel_id: Option<&CallFrameId>) -> bool {
    if !envelope.has_marker() {
        return false;
    }
    if let (Some(ours), Some(theirs)) = (channel_id, envelope.call_frame_id.as_ref()) {
        if ours != theirs {
            return false;
        }
    }
    !envelope.is_from(own_tag)
}

struct Registration {
    listener: Arc<dyn ChannelListener>,
    subscription: SubscriptionId,
}

fn same_listener(a: &Arc<dyn ChannelListener>, b: &Arc<dyn ChannelListener>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// State and behavior common to every binding
pub(crate) struct ChannelCore {
    tag: SenderTag,
    callbacks: Arc<PendingCallbacks>,
    registrations: Mutex<Vec<Registration>>,
}

impl ChannelCore {
    pub(crate) fn new(tag: SenderTag) -> Self {
        Self {
            tag,
            callbacks: Arc::new(PendingCallbacks::new()),
            registrations: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn tag(&self) -> SenderTag {
        self.tag
    }

    pub(crate) fn pending(&self) -> usize {
        self.callbacks.len()
    }

    /// Tag a message and register its callback. Returns the wire value.
    pub(crate) fn seal(
        &self,
        mut message: ChannelMessage,
        callback: Option<ResponseCallback>,
        channel_id: Option<&CallFrameId>,
    ) -> (Value, Option<CallbackStamp>) {
        let stamp = callback.map(|cb| self.callbacks.register(cb));
        if let Some(stamp) = &stamp {
            message.callback_stamp = Some(stamp.clone());
        }

        debug!(
            from = %self.tag,
            action = %message.action,
            call_frame_id = channel_id.map(|c| c.as_str()).unwrap_or("-"),
            stamped = stamp.is_some(),
            "Sending message to peer"
        );

        (Envelope::seal(message, self.tag, channel_id).to_value(), stamp)
    }

    fn wrap(&self, listener: Arc<dyn ChannelListener>, channel_id: Option<CallFrameId>) -> BusHandler {
        let tag = self.tag;
        let callbacks = self.callbacks.clone();

        Arc::new(move |raw: &Value| {
            let Some(envelope) = Envelope::open(raw) else {
                return;
            };
            if !accepts(&envelope, tag, channel_id.as_ref()) {
                trace!(own_tag = %tag, action = %envelope.action, "Dropping unaddressed message");
                return;
            }

            let message = envelope.into_message();
            if let Some(stamp) = &message.callback_stamp {
                if let Some(callback) = callbacks.take(stamp) {
                    trace!(stamp = %stamp, action = %message.action, "Invoking correlated callback");
                    callback(message.clone());
                }
            }
            listener.on_message(&message);
        })
    }

    pub(crate) fn register(
        &self,
        bus: &MessageBus,
        listener: Arc<dyn ChannelListener>,
        channel_id: Option<CallFrameId>,
    ) {
        let handler = self.wrap(listener.clone(), channel_id);
        let subscription = bus.subscribe(handler);
        self.registrations.lock().push(Registration { listener, subscription });
    }

    pub(crate) fn unregister(&self, bus: &MessageBus, listener: &Arc<dyn ChannelListener>) {
        let removed: Vec<SubscriptionId> = {
            let mut registrations = self.registrations.lock();
            let mut removed = Vec::new();
            registrations.retain(|r| {
                if same_listener(&r.listener, listener) {
                    removed.push(r.subscription);
                    false
                } else {
                    true
                }
            });
            removed
        };

        for subscription in removed {
            bus.unsubscribe(subscription);
        }
    }
}
