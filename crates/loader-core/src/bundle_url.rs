//! Where the call-machine bundle is downloaded from

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

/// File name of the regular bundle
pub const BUNDLE_FILE: &str = "call-machine-object-bundle.js";

/// File name of the bundle variant for runtimes without SFU support
pub const NO_SFU_BUNDLE_FILE: &str = "call-machine-object-nosfu-bundle.js";

/// Default CDN serving versioned bundles
pub const DEFAULT_CDN_BASE_URL: &str = "https://cdn.callframe.io";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildProfile {
    Production,
    Development,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleUrlConfig {
    pub profile: BuildProfile,
    pub cdn_base_url: String,
    /// Bundle version pinned in the CDN path
    pub version: String,
    /// Development fallback when `load()` gets no meeting URL
    pub base_url: Option<String>,
}

impl Default for BundleUrlConfig {
    fn default() -> Self {
        Self {
            profile: BuildProfile::Production,
            cdn_base_url: DEFAULT_CDN_BASE_URL.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            base_url: None,
        }
    }
}

impl BundleUrlConfig {
    pub fn development(base_url: Option<String>) -> Self {
        Self {
            profile: BuildProfile::Development,
            base_url,
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_cdn_base_url(mut self, url: impl Into<String>) -> Self {
        self.cdn_base_url = url.into();
        self
    }
}

/// Capability probe: does this runtime support SFU connections?
pub type SfuProbe = Arc<dyn Fn() -> bool + Send + Sync>;

#[derive(Clone)]
pub struct BundleUrlResolver {
    config: BundleUrlConfig,
    sfu_probe: SfuProbe,
}

impl BundleUrlResolver {
    pub fn new(config: BundleUrlConfig) -> Self {
        Self {
            config,
            sfu_probe: Arc::new(|| true),
        }
    }

    pub fn with_sfu_probe(mut self, probe: SfuProbe) -> Self {
        self.sfu_probe = probe;
        self
    }

    pub fn config(&self) -> &BundleUrlConfig {
        &self.config
    }

    /// Resolve the bundle URL for a meeting URL or base URL
    pub fn resolve(&self, meeting_or_base_url: Option<&str>) -> String {
        match self.config.profile {
            BuildProfile::Production => self.cdn_url(),
            BuildProfile::Development => {
                let candidate = meeting_or_base_url.or(self.config.base_url.as_deref());
                match candidate.and_then(origin_of) {
                    Some(origin) => format!("{}/static/{}", origin, BUNDLE_FILE),
                    None => {
                        warn!(
                            candidate = candidate.unwrap_or("-"),
                            "No usable base URL for the call machine bundle, falling back to the CDN"
                        );
                        self.cdn_url()
                    }
                }
            }
        }
    }

    fn cdn_url(&self) -> String {
        let file = if (self.sfu_probe)() { BUNDLE_FILE } else { NO_SFU_BUNDLE_FILE };
        format!(
            "{}/call-machine/versioned/{}/static/{}",
            self.config.cdn_base_url.trim_end_matches('/'),
            self.config.version,
            file
        )
    }
}

impl std::fmt::Debug for BundleUrlResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleUrlResolver").field("config", &self.config).finish()
    }
}

/// `scheme://host[:port]` of a URL, if it has one
fn origin_of(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let origin = url.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}
