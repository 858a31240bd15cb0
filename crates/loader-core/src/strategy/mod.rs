//! Attempt strategies
//!
//! How one attempt turns a URL into a running call machine depends on the
//! platform. The choice is made once, when the loader is built:
//!
//! | Platform      | avoid_eval | Strategy       |
//! |---------------|------------|----------------|
//! | React Native  | any        | fetch-execute  |
//! | Web           | true       | script-tag     |
//! | Web           | false      | fetch-execute  |

pub mod fetch_execute;
pub mod script_tag;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::attempt::{AttemptOutcome, LoadAttempt};
use crate::runtime::CallMachineRuntime;

pub use fetch_execute::{BundleFetcher, CachedBundle, FetchExecuteStrategy, FetchResponse, ResponseCache};
pub use script_tag::{ScriptHost, ScriptTagStrategy};

/// Runtime environment the SDK is embedded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    Web,
    ReactNative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    ScriptTag,
    FetchExecute,
}

impl StrategyKind {
    pub fn select(platform: Platform, avoid_eval: bool) -> Self {
        match (platform, avoid_eval) {
            (Platform::ReactNative, _) => StrategyKind::FetchExecute,
            (Platform::Web, true) => StrategyKind::ScriptTag,
            (Platform::Web, false) => StrategyKind::FetchExecute,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::ScriptTag => "script-tag",
            StrategyKind::FetchExecute => "fetch-execute",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub enum LoadStrategy {
    ScriptTag(ScriptTagStrategy),
    FetchExecute(FetchExecuteStrategy),
}

impl LoadStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            LoadStrategy::ScriptTag(_) => StrategyKind::ScriptTag,
            LoadStrategy::FetchExecute(_) => StrategyKind::FetchExecute,
        }
    }

    /// Run one attempt to completion, timeout, or cancellation
    pub async fn attempt(
        &self,
        attempt: &LoadAttempt,
        url: &str,
        timeout: Duration,
        runtime: &dyn CallMachineRuntime,
    ) -> AttemptOutcome {
        match self {
            LoadStrategy::ScriptTag(strategy) => strategy.attempt(attempt, url, timeout).await,
            LoadStrategy::FetchExecute(strategy) => strategy.attempt(attempt, url, timeout, runtime).await,
        }
    }
}

impl fmt::Debug for LoadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LoadStrategy").field(&self.kind()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_selection() {
        assert_eq!(StrategyKind::select(Platform::ReactNative, true), StrategyKind::FetchExecute);
        assert_eq!(StrategyKind::select(Platform::ReactNative, false), StrategyKind::FetchExecute);
        assert_eq!(StrategyKind::select(Platform::Web, true), StrategyKind::ScriptTag);
        assert_eq!(StrategyKind::select(Platform::Web, false), StrategyKind::FetchExecute);
    }
}
