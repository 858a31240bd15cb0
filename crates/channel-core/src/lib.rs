//! # callframe-channel-core
//!
//! Transport-agnostic message passing between a host application and an
//! embedded call machine.
//!
//! The channel stamps every outgoing message with a protocol marker, the
//! sender's tag and an optional call frame id, and filters incoming messages
//! on the same tags. Requests that expect an answer carry a correlation stamp;
//! the matching response triggers a one-shot callback.
//!
//! Two bindings implement [`MessageChannel`]:
//!
//! - [`PageMessageChannel`]: both sides share one page-level [`MessageBus`]
//! - [`InProcessMessageChannel`]: one bus per direction, for a call machine
//!   living in the same process
//!
//! ```rust
//! use std::sync::Arc;
//! use callframe_channel_core::{ChannelListener, ChannelMessage, InProcessMessageChannel, MessageChannel};
//!
//! let (module, embedded) = InProcessMessageChannel::pair();
//!
//! // The call machine answers every request with the same stamp
//! let responder = Arc::new(embedded);
//! let replier = responder.clone();
//! let listener: Arc<dyn ChannelListener> = Arc::new(move |msg: &ChannelMessage| {
//!     replier.send_to_peer(msg.reply("pong"), None, None, None);
//! });
//! responder.add_listener(listener, None);
//!
//! let (tx, rx) = std::sync::mpsc::channel();
//! module.add_listener(Arc::new(|_msg: &ChannelMessage| {}), None);
//! module.send_to_peer(
//!     ChannelMessage::new("ping"),
//!     Some(Box::new(move |reply| tx.send(reply.action).unwrap())),
//!     None,
//!     None,
//! );
//! assert_eq!(rx.recv().unwrap(), "pong");
//! ```

pub mod bus;
pub mod channel;
pub mod envelope;
pub mod error;
pub mod in_process;
pub mod page;
pub mod registry;

pub use bus::{BusHandler, MessageBus, SubscriptionId};
pub use channel::{accepts, ChannelListener, MessageChannel};
pub use envelope::{CallFrameId, CallbackStamp, ChannelMessage, Envelope, SenderTag, MESSAGE_MARKER};
pub use error::{ChannelError, ChannelResult};
pub use in_process::InProcessMessageChannel;
pub use page::PageMessageChannel;
pub use registry::{PendingCallbacks, ResponseCallback};
