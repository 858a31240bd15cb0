//! In-process binding
//!
//! Used when the call machine runs inside the same process as the host (no
//! frame boundary). Each direction gets its own bus; filtering is identical
//! to the page binding.

use std::sync::Arc;

use tracing::trace;

use crate::bus::MessageBus;
use crate::channel::{ChannelCore, ChannelListener, MessageChannel};
use crate::envelope::{CallFrameId, CallbackStamp, ChannelMessage, SenderTag};
use crate::registry::ResponseCallback;

pub struct InProcessMessageChannel {
    core: ChannelCore,
    outbound: Arc<MessageBus>,
    inbound: Arc<MessageBus>,
}

impl InProcessMessageChannel {
    pub fn new(tag: SenderTag, outbound: Arc<MessageBus>, inbound: Arc<MessageBus>) -> Self {
        Self {
            core: ChannelCore::new(tag),
            outbound,
            inbound,
        }
    }

    /// Create the host-side and call-machine-side ends of one connection
    pub fn pair() -> (Self, Self) {
        let to_embedded = MessageBus::new("module-to-embedded");
        let to_module = MessageBus::new("embedded-to-module");
        let module = Self::new(SenderTag::Module, to_embedded.clone(), to_module.clone());
        let embedded = Self::new(SenderTag::Embedded, to_module, to_embedded);
        (module, embedded)
    }
}

impl MessageChannel for InProcessMessageChannel {
    fn own_tag(&self) -> SenderTag {
        self.core.tag()
    }

    fn send_to_peer(
        &self,
        message: ChannelMessage,
        callback: Option<ResponseCallback>,
        routing_target: Option<&Arc<MessageBus>>,
        channel_id: Option<&CallFrameId>,
    ) -> Option<CallbackStamp> {
        if let Some(target) = routing_target {
            trace!(target = target.name(), "Routing target ignored by in-process channel");
        }
        let (value, stamp) = self.core.seal(message, callback, channel_id);
        self.outbound.post(&value);
        stamp
    }

    fn add_listener(&self, listener: Arc<dyn ChannelListener>, channel_id: Option<CallFrameId>) {
        self.core.register(&self.inbound, listener, channel_id);
    }

    fn remove_listener(&self, listener: &Arc<dyn ChannelListener>) {
        self.core.unregister(&self.inbound, listener);
    }

    fn pending_callbacks(&self) -> usize {
        self.core.pending()
    }
}
