//! Client configuration
//!
//! ```rust
//! use callframe_client_core::{CallMode, ClientConfig};
//!
//! let config = ClientConfig::from_toml_str(r#"
//!     mode = "call-object"
//!     platform = "react-native"
//!     request_timeout_ms = 5000
//!
//!     [loader]
//!     max_attempts = 5
//! "#).unwrap();
//!
//! assert_eq!(config.mode, CallMode::CallObject);
//! assert_eq!(config.loader.max_attempts, 5);
//! assert_eq!(config.loader.retry_delay_ms, 3000);
//! ```

use std::sync::Arc;
use std::time::Duration;

use callframe_loader_core::{BundleLoaderBuilder, BundleUrlConfig, CallMachineRuntime, LoaderConfig, Platform};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Where the call machine runs relative to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallMode {
    /// In-process; the client loads the bundle and sees live tracks
    CallObject,
    /// Inside an embedded frame that loads its own bundle
    Embedded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub mode: CallMode,
    pub platform: Platform,
    /// Prefer script injection over executing downloaded code
    pub avoid_eval: bool,
    /// Fixed call frame id; generated when absent
    pub call_frame_id: Option<String>,
    /// How long to wait for the call machine to answer a request
    pub request_timeout_ms: u64,
    /// Capacity of the event broadcast channel
    pub event_buffer_size: usize,
    pub loader: LoaderConfig,
    pub bundle_url: BundleUrlConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            mode: CallMode::CallObject,
            platform: Platform::Web,
            avoid_eval: false,
            call_frame_id: None,
            request_timeout_ms: 10_000,
            event_buffer_size: 256,
            loader: LoaderConfig::default(),
            bundle_url: BundleUrlConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn embedded() -> Self {
        Self {
            mode: CallMode::Embedded,
            ..Self::default()
        }
    }

    pub fn from_toml_str(raw: &str) -> ClientResult<Self> {
        let config: ClientConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_mode(mut self, mode: CallMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_avoid_eval(mut self, avoid_eval: bool) -> Self {
        self.avoid_eval = avoid_eval;
        self
    }

    pub fn with_call_frame_id(mut self, id: impl Into<String>) -> Self {
        self.call_frame_id = Some(id.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size;
        self
    }

    pub fn with_loader(mut self, loader: LoaderConfig) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_bundle_url(mut self, bundle_url: BundleUrlConfig) -> Self {
        self.bundle_url = bundle_url;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> ClientResult<()> {
        if self.request_timeout_ms == 0 {
            return Err(ClientError::configuration("request_timeout_ms", "must be positive"));
        }
        if self.event_buffer_size == 0 {
            return Err(ClientError::configuration("event_buffer_size", "must be positive"));
        }
        if matches!(&self.call_frame_id, Some(id) if id.trim().is_empty()) {
            return Err(ClientError::configuration("call_frame_id", "must not be blank"));
        }
        self.loader.validate()?;
        Ok(())
    }

    /// Loader builder carrying this configuration's loader settings
    pub fn loader_builder(&self, runtime: Arc<dyn CallMachineRuntime>) -> BundleLoaderBuilder {
        BundleLoaderBuilder::new(runtime)
            .config(self.loader.clone())
            .bundle_url(self.bundle_url.clone())
            .platform(self.platform)
            .avoid_eval(self.avoid_eval)
    }
}
