use std::sync::Arc;

use callframe_channel_core::{CallFrameId, MessageChannel};
use callframe_loader_core::BundleLoader;
use callframe_participant_core::{CallStateStore, InMemoryCallState, ParticipantReconciler, VideoElementMetrics};

use crate::client::CallClient;
use crate::config::{CallMode, ClientConfig};
use crate::error::{ClientError, ClientResult};

/// Builder for [`CallClient`]
///
/// Call-object clients need a [`BundleLoader`]; embedded clients don't,
/// the frame loads its own bundle.
///
/// ```rust
/// use std::sync::Arc;
/// use callframe_channel_core::InProcessMessageChannel;
/// use callframe_client_core::{CallClient, ClientConfig, MeetingState};
///
/// # tokio_test::block_on(async {
/// let (module, _machine) = InProcessMessageChannel::pair();
/// let client = CallClient::builder(Arc::new(module))
///     .config(ClientConfig::embedded())
///     .build()
///     .unwrap();
///
/// client.load(None).await.unwrap();
/// assert_eq!(client.meeting_state(), MeetingState::Loaded);
/// # });
/// ```
pub struct CallClientBuilder {
    channel: Arc<dyn MessageChannel>,
    config: ClientConfig,
    loader: Option<Arc<BundleLoader>>,
    store: Option<Arc<dyn CallStateStore>>,
    metrics: Option<Arc<dyn VideoElementMetrics>>,
}

impl CallClientBuilder {
    pub fn new(channel: Arc<dyn MessageChannel>) -> Self {
        Self {
            channel,
            config: ClientConfig::default(),
            loader: None,
            store: None,
            metrics: None,
        }
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn loader(self, loader: BundleLoader) -> Self {
        self.shared_loader(Arc::new(loader))
    }

    /// Several clients may share one loader; the bundle loads once
    pub fn shared_loader(mut self, loader: Arc<BundleLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Where live tracks and transport state are read from during reconciliation
    pub fn state_store(mut self, store: Arc<dyn CallStateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Rendered video sizes for embedded mode
    pub fn video_metrics(mut self, metrics: Arc<dyn VideoElementMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> ClientResult<CallClient> {
        self.config.validate()?;

        if self.config.mode == CallMode::CallObject && self.loader.is_none() {
            return Err(ClientError::configuration("loader", "call-object mode needs a bundle loader"));
        }

        let call_frame_id = match &self.config.call_frame_id {
            Some(id) => CallFrameId::new(id.clone()),
            None => CallFrameId::generate(),
        };

        let store = self
            .store
            .unwrap_or_else(|| InMemoryCallState::new() as Arc<dyn CallStateStore>);
        let reconciler = match self.config.mode {
            CallMode::CallObject => ParticipantReconciler::call_object(store),
            CallMode::Embedded => ParticipantReconciler::embedded(store, self.metrics),
        };

        Ok(CallClient::start(self.config, call_frame_id, self.channel, self.loader, reconciler))
    }
}
