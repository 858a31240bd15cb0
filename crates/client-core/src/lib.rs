//! # callframe-client-core
//!
//! The host-facing call client. A [`CallClient`] talks to the call machine
//! over a [`MessageChannel`](callframe_channel_core::MessageChannel), loads
//! the bundle through a [`BundleLoader`](callframe_loader_core::BundleLoader)
//! in call-object mode, and reports everything as typed [`CallEvent`]s.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use callframe_channel_core::InProcessMessageChannel;
//! use callframe_client_core::{CallClient, ClientConfig, JoinOptions};
//!
//! # async fn run() -> Result<(), callframe_client_core::ClientError> {
//! let (module, _embedded) = InProcessMessageChannel::pair();
//! let client = CallClient::builder(Arc::new(module))
//!     .config(ClientConfig::embedded())
//!     .build()?;
//!
//! let mut events = client.subscribe();
//! client
//!     .join(JoinOptions::new().with_url("https://acme.example.com/standup"))
//!     .await?;
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event.kind());
//! }
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod protocol;
pub mod state;
pub mod validation;

pub use builder::CallClientBuilder;
pub use client::CallClient;
pub use config::{CallMode, ClientConfig};
pub use error::{ClientError, ClientResult};
pub use events::{CallEvent, CallEventHandler, CallEventKind, EventFilter, EventStream};
pub use protocol::{JoinOptions, MachineEvent, MethodAction, ParticipantUpdate};
pub use state::MeetingState;
pub use validation::{MAX_APP_MESSAGE_BYTES, MAX_USER_NAME_CHARS};
