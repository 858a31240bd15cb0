//! Script-tag strategy
//!
//! Injects a script element pointing at the bundle and lets the host's
//! script loader run it. A started script download can't be aborted, so the
//! attempt advertises its interest in the waitlist while it waits; the bundle
//! checks the waitlist before doing expensive setup.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::attempt::{AttemptOutcome, LoadAttempt};
use crate::error::LoadError;

/// The DOM side of script injection
#[async_trait]
pub trait ScriptHost: Send + Sync {
    /// Inject a script for `url`. Resolves `Ok` when its load handler fires,
    /// `Err` when its error handler fires.
    async fn load_script(&self, url: &str) -> Result<(), String>;
}

pub struct ScriptTagStrategy {
    host: Option<Arc<dyn ScriptHost>>,
}

impl ScriptTagStrategy {
    /// `None` means there is no DOM; every attempt fails at once.
    pub fn new(host: Option<Arc<dyn ScriptHost>>) -> Self {
        Self { host }
    }

    pub(crate) async fn attempt(&self, attempt: &LoadAttempt, url: &str, timeout: Duration) -> AttemptOutcome {
        let Some(host) = &self.host else {
            return AttemptOutcome::Failed(LoadError::NoDomContext);
        };

        let result = {
            let _interest = attempt.wait_for_bundle();
            debug!(attempt = %attempt.id(), url, "Injecting call machine script");
            tokio::time::timeout(timeout, host.load_script(url)).await
        };

        if attempt.is_cancelled() {
            return AttemptOutcome::Cancelled;
        }

        match result {
            Ok(Ok(())) => AttemptOutcome::Succeeded,
            Ok(Err(reason)) => {
                warn!(attempt = %attempt.id(), %reason, "Call machine script failed to load");
                AttemptOutcome::Failed(LoadError::Script { reason })
            }
            Err(_) => AttemptOutcome::Failed(LoadError::TimedOut {
                millis: timeout.as_millis() as u64,
            }),
        }
    }
}
