//! Bundle loader
//!
//! ```text
//! Idle ──load()──▶ Loading(attempt k of N) ──▶ Succeeded (sticky)
//!                        │  ▲                 ──▶ ExhaustedRetries
//!                 failure│  │retry delay      ──▶ Cancelled
//!                        ▼  │
//!                   failure callback(will_retry)
//! ```
//!
//! Success is sticky for the lifetime of the [`LoaderContext`]: the bundle
//! sets up process-wide state, so later `load()` calls only point the running
//! call machine at a new call frame.

use std::sync::Arc;

use callframe_channel_core::CallFrameId;
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::bundle_url::{BundleUrlConfig, BundleUrlResolver, SfuProbe};
use crate::config::LoaderConfig;
use crate::context::LoaderContext;
use crate::error::{LoadError, LoaderBuildError};
use crate::operation::{LoadOperation, LoaderState};
use crate::runtime::CallMachineRuntime;
use crate::strategy::{
    BundleFetcher, FetchExecuteStrategy, LoadStrategy, Platform, ResponseCache, ScriptHost, ScriptTagStrategy,
    StrategyKind,
};

pub struct BundleLoader {
    config: LoaderConfig,
    context: Arc<LoaderContext>,
    strategy: Arc<LoadStrategy>,
    runtime: Arc<dyn CallMachineRuntime>,
    resolver: BundleUrlResolver,
    avoid_eval: bool,
    current: Mutex<Option<Arc<LoadOperation>>>,
}

impl BundleLoader {
    pub fn builder(runtime: Arc<dyn CallMachineRuntime>) -> BundleLoaderBuilder {
        BundleLoaderBuilder::new(runtime)
    }

    /// Load the bundle for `call_frame_id`.
    ///
    /// Callbacks run on the loader's task, never after [`cancel`](Self::cancel)
    /// returns. `on_success(true)` means the bundle was already running and
    /// this call was a no-op.
    pub fn load<S, F>(&self, call_frame_id: CallFrameId, meeting_or_base_url: Option<&str>, on_success: S, on_failure: F)
    where
        S: FnOnce(bool) + Send + 'static,
        F: Fn(&LoadError, bool) + Send + Sync + 'static,
    {
        if self.context.is_loaded() {
            debug!(call_frame_id = %call_frame_id, "Call machine already loaded, setting up new call frame");
            self.context.configure(call_frame_id.clone(), self.avoid_eval);
            self.runtime.setup_call_frame(&call_frame_id);
            on_success(true);
            return;
        }

        self.cancel();
        self.context.configure(call_frame_id.clone(), self.avoid_eval);

        let url = self.resolver.resolve(meeting_or_base_url);
        let operation = LoadOperation::new(self.config.clone(), self.context.clone(), Box::new(on_success), Arc::new(on_failure));
        *self.current.lock() = Some(operation.clone());

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(call_frame_id = %call_frame_id, url = %url, strategy = %self.strategy.kind(), "Starting bundle load");
                handle.spawn(operation.run(self.strategy.clone(), self.runtime.clone(), url));
            }
            Err(_) => {
                error!("Bundle load requested outside of a tokio runtime");
                operation.fail_immediately(LoadError::NoAsyncRuntime);
            }
        }
    }

    /// Cancel the in-flight load, if any
    pub fn cancel(&self) {
        let current = self.current.lock().clone();
        if let Some(operation) = current {
            operation.cancel();
        }
    }

    pub fn state(&self) -> LoaderState {
        if self.context.is_loaded() {
            return LoaderState::Succeeded;
        }
        self.current
            .lock()
            .as_ref()
            .map(|op| op.state())
            .unwrap_or(LoaderState::Idle)
    }

    pub fn is_loaded(&self) -> bool {
        self.context.is_loaded()
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state(), LoaderState::Loading { .. })
    }

    pub fn context(&self) -> &Arc<LoaderContext> {
        &self.context
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn resolver(&self) -> &BundleUrlResolver {
        &self.resolver
    }
}

impl std::fmt::Debug for BundleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleLoader")
            .field("strategy", &self.strategy.kind())
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}

/// Assembles a [`BundleLoader`] for one platform
///
/// ```rust
/// use std::sync::Arc;
/// use callframe_channel_core::CallFrameId;
/// use callframe_loader_core::{BundleLoader, CallMachineRuntime, LoaderContext, Platform, StrategyKind};
///
/// struct NoopRuntime;
///
/// impl CallMachineRuntime for NoopRuntime {
///     fn execute(&self, _code: &str, _context: &LoaderContext) -> Result<(), String> { Ok(()) }
///     fn setup_call_frame(&self, _id: &CallFrameId) {}
/// }
///
/// // Web without a script host: attempts will report "must run in a DOM context"
/// let loader = BundleLoader::builder(Arc::new(NoopRuntime))
///     .platform(Platform::Web)
///     .avoid_eval(true)
///     .build()
///     .unwrap();
/// assert_eq!(loader.strategy_kind(), StrategyKind::ScriptTag);
/// ```
pub struct BundleLoaderBuilder {
    runtime: Arc<dyn CallMachineRuntime>,
    config: LoaderConfig,
    url_config: BundleUrlConfig,
    sfu_probe: Option<SfuProbe>,
    platform: Platform,
    avoid_eval: bool,
    script_host: Option<Arc<dyn ScriptHost>>,
    fetcher: Option<Arc<dyn BundleFetcher>>,
    cache: Option<Arc<dyn ResponseCache>>,
    context: Option<Arc<LoaderContext>>,
}

impl BundleLoaderBuilder {
    pub fn new(runtime: Arc<dyn CallMachineRuntime>) -> Self {
        Self {
            runtime,
            config: LoaderConfig::default(),
            url_config: BundleUrlConfig::default(),
            sfu_probe: None,
            platform: Platform::Web,
            avoid_eval: false,
            script_host: None,
            fetcher: None,
            cache: None,
            context: None,
        }
    }

    pub fn config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bundle_url(mut self, config: BundleUrlConfig) -> Self {
        self.url_config = config;
        self
    }

    pub fn sfu_probe(mut self, probe: SfuProbe) -> Self {
        self.sfu_probe = Some(probe);
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn avoid_eval(mut self, avoid_eval: bool) -> Self {
        self.avoid_eval = avoid_eval;
        self
    }

    pub fn script_host(mut self, host: Arc<dyn ScriptHost>) -> Self {
        self.script_host = Some(host);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn BundleFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn response_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Share an existing context, e.g. across loaders for several call frames
    pub fn context(mut self, context: Arc<LoaderContext>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn build(self) -> Result<BundleLoader, LoaderBuildError> {
        self.config.validate()?;

        let strategy = match StrategyKind::select(self.platform, self.avoid_eval) {
            StrategyKind::ScriptTag => LoadStrategy::ScriptTag(ScriptTagStrategy::new(self.script_host)),
            StrategyKind::FetchExecute => {
                let fetcher = match self.fetcher {
                    Some(fetcher) => fetcher,
                    None => default_fetcher()?,
                };
                LoadStrategy::FetchExecute(FetchExecuteStrategy::new(fetcher, self.cache))
            }
        };

        let mut resolver = BundleUrlResolver::new(self.url_config);
        if let Some(probe) = self.sfu_probe {
            resolver = resolver.with_sfu_probe(probe);
        }

        Ok(BundleLoader {
            config: self.config,
            context: self.context.unwrap_or_else(LoaderContext::new),
            strategy: Arc::new(strategy),
            runtime: self.runtime,
            resolver,
            avoid_eval: self.avoid_eval,
            current: Mutex::new(None),
        })
    }
}

#[cfg(feature = "http")]
fn default_fetcher() -> Result<Arc<dyn BundleFetcher>, LoaderBuildError> {
    Ok(Arc::new(crate::http::ReqwestFetcher::new()))
}

#[cfg(not(feature = "http"))]
fn default_fetcher() -> Result<Arc<dyn BundleFetcher>, LoaderBuildError> {
    Err(LoaderBuildError::MissingCollaborator {
        strategy: "fetch-execute",
        collaborator: "bundle fetcher",
    })
}
