//! # callframe - embed a video call machine in a Rust host
//!
//! The call machine is a separately shipped bundle that owns the media
//! connection. This crate gives the host everything around it:
//!
//! - **Channel Core**: tagged, correlated messages between host and call machine
//! - **Loader Core**: fetches and runs the bundle with retries, timeouts and cancellation
//! - **Participant Core**: merges participant updates with live track state
//! - **Client Core**: the typed [`CallClient`](client_core::CallClient) API and its events
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use callframe::prelude::*;
//!
//! let (module, _call_machine) = InProcessMessageChannel::pair();
//! let client = CallClient::builder(Arc::new(module))
//!     .config(ClientConfig::embedded())
//!     .build()
//!     .unwrap();
//! assert_eq!(client.meeting_state(), MeetingState::New);
//! ```

#![deny(missing_docs)]
#![warn(rust_2018_idioms)]

pub use callframe_channel_core as channel_core;
pub use callframe_client_core as client_core;
pub use callframe_loader_core as loader_core;
pub use callframe_participant_core as participant_core;

pub mod config;
pub mod logging;

pub mod prelude {
    //! Common imports for callframe hosts

    pub use crate::channel_core::{
        CallFrameId, ChannelListener, ChannelMessage, InProcessMessageChannel, MessageBus, MessageChannel,
        PageMessageChannel,
    };
    pub use crate::client_core::*;
    pub use crate::loader_core::{
        BundleLoader, BundleUrlConfig, CallMachineRuntime, LoadError, LoaderConfig, LoaderContext, Platform,
        ScriptHost,
    };
    pub use crate::config::HostConfig;
    pub use crate::logging::{setup_logging, LoggingConfig};
    pub use crate::participant_core::{
        CallStateStore, InMemoryCallState, MediaTrack, Participant, ParticipantsSnapshot, TrackKind, TrackSlot,
    };
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate description
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
