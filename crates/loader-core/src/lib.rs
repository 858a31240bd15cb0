//! # callframe-loader-core
//!
//! Retrying, cancellable loader for the call-machine bundle.
//!
//! A [`BundleLoader`] turns `load()` into up to `max_attempts` attempts, each
//! bounded by `attempt_timeout` and separated by `retry_delay`. The failure
//! callback runs after every failed attempt with a `will_retry` flag; the
//! success callback runs once. `cancel()` silences both.
//!
//! Two strategies exist, chosen from the [`Platform`] when the loader is built:
//!
//! - [`ScriptTagStrategy`] injects a script through a [`ScriptHost`]
//! - [`FetchExecuteStrategy`] downloads the code through a [`BundleFetcher`]
//!   and runs it with [`CallMachineRuntime::execute`]
//!
//! With the `http` feature, fetch-execute defaults to a reqwest client.

pub mod attempt;
pub mod bundle_url;
pub mod config;
pub mod context;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod loader;
pub mod operation;
pub mod runtime;
pub mod strategy;

pub use attempt::{AttemptOutcome, LoadAttempt};
pub use bundle_url::{BuildProfile, BundleUrlConfig, BundleUrlResolver, SfuProbe, BUNDLE_FILE, DEFAULT_CDN_BASE_URL, NO_SFU_BUNDLE_FILE};
pub use config::LoaderConfig;
pub use context::{AttemptId, CallMachineConfig, LoaderContext};
pub use error::{LoadError, LoaderBuildError};
#[cfg(feature = "http")]
pub use http::ReqwestFetcher;
pub use loader::{BundleLoader, BundleLoaderBuilder};
pub use operation::{FailureCallback, LoaderState, SuccessCallback};
pub use runtime::CallMachineRuntime;
pub use strategy::{
    BundleFetcher, CachedBundle, FetchExecuteStrategy, FetchResponse, LoadStrategy, Platform, ResponseCache, ScriptHost,
    ScriptTagStrategy, StrategyKind,
};
