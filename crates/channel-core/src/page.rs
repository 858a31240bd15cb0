//! Page-level binding
//!
//! Both sides share a single page-level bus, like a window's message events.
//! Every message on that bus reaches every listener, so addressing relies
//! entirely on the tags carried in the payload.

use std::sync::Arc;

use crate::bus::MessageBus;
use crate::channel::{ChannelCore, ChannelListener, MessageChannel};
use crate::envelope::{CallFrameId, CallbackStamp, ChannelMessage, SenderTag};
use crate::registry::ResponseCallback;

pub struct PageMessageChannel {
    core: ChannelCore,
    page: Arc<MessageBus>,
}

impl PageMessageChannel {
    /// Host-side channel on a page bus
    pub fn module(page: Arc<MessageBus>) -> Self {
        Self::new(SenderTag::Module, page)
    }

    /// Call-machine-side channel on a page bus
    pub fn embedded(page: Arc<MessageBus>) -> Self {
        Self::new(SenderTag::Embedded, page)
    }

    pub fn new(tag: SenderTag, page: Arc<MessageBus>) -> Self {
        Self {
            core: ChannelCore::new(tag),
            page,
        }
    }

    pub fn page(&self) -> &Arc<MessageBus> {
        &self.page
    }
}

impl MessageChannel for PageMessageChannel {
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
        let (value, stamp) = self.core.seal(message, callback, channel_id);
        routing_target.unwrap_or(&self.page).post(&value);
        stamp
    }

    fn add_listener(&self, listener: Arc<dyn ChannelListener>, channel_id: Option<CallFrameId>) {
        self.core.register(&self.page, listener, channel_id);
    }

    fn remove_listener(&self, listener: &Arc<dyn ChannelListener>) {
        self.core.unregister(&self.page, listener);
    }

    fn pending_callbacks(&self) -> usize {
        self.core.pending()
    }
}
