//! One logical "load the bundle" request spanning several attempts

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::attempt::{AttemptOutcome, LoadAttempt};
use crate::config::LoaderConfig;
use crate::context::LoaderContext;
use crate::error::LoadError;
use crate::runtime::CallMachineRuntime;
use crate::strategy::LoadStrategy;

/// Invoked once when the bundle is running; `true` means nothing was loaded
pub type SuccessCallback = Box<dyn FnOnce(bool) + Send + 'static>;

/// Invoked after every failed attempt with `will_retry`
pub type FailureCallback = Arc<dyn Fn(&LoadError, bool) + Send + Sync + 'static>;

/// Observable state of the loader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Idle,
    Loading { attempt: u32, max_attempts: u32 },
    Succeeded,
    Cancelled,
    ExhaustedRetries,
}

pub struct LoadOperation {
    config: LoaderConfig,
    context: Arc<LoaderContext>,
    started_attempts: AtomicU32,
    attempts_remaining: AtomicU32,
    current_attempt: Mutex<Option<Arc<LoadAttempt>>>,
    state: Mutex<LoaderState>,
    on_success: Mutex<Option<SuccessCallback>>,
    on_failure: Mutex<Option<FailureCallback>>,
    /// Held while a callback runs and while cancelling. Reentrant so a
    /// callback may cancel its own operation.
    dispatch: ReentrantMutex<()>,
    cancel_token: CancellationToken,
}

impl LoadOperation {
    pub(crate) fn new(
        config: LoaderConfig,
        context: Arc<LoaderContext>,
        on_success: SuccessCallback,
        on_failure: FailureCallback,
    ) -> Arc<Self> {
        Arc::new(Self {
            attempts_remaining: AtomicU32::new(config.max_attempts),
            started_attempts: AtomicU32::new(0),
            config,
            context,
            current_attempt: Mutex::new(None),
            state: Mutex::new(LoaderState::Idle),
            on_success: Mutex::new(Some(on_success)),
            on_failure: Mutex::new(Some(on_failure)),
            dispatch: ReentrantMutex::new(()),
            cancel_token: CancellationToken::new(),
        })
    }

    pub fn state(&self) -> LoaderState {
        *self.state.lock()
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.attempts_remaining.load(Ordering::SeqCst)
    }

    pub fn current_attempt(&self) -> Option<Arc<LoadAttempt>> {
        self.current_attempt.lock().clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Stop the operation. No callback fires after this returns.
    pub fn cancel(&self) {
        let _dispatch = self.dispatch.lock();
        {
            let mut state = self.state.lock();
            if matches!(*state, LoaderState::Succeeded | LoaderState::ExhaustedRetries | LoaderState::Cancelled) {
                return;
            }
            *state = LoaderState::Cancelled;
        }

        self.cancel_token.cancel();
        self.on_success.lock().take();
        self.on_failure.lock().take();
        if let Some(attempt) = self.current_attempt.lock().as_ref() {
            attempt.cancel();
        }
        info!("Bundle load cancelled");
    }

    /// Start a fresh attempt, replacing the previous one
    fn begin_attempt(&self, strategy: &LoadStrategy) -> Arc<LoadAttempt> {
        let number = self.started_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let attempt = LoadAttempt::new(self.context.clone(), number, strategy.kind());

        if let Some(previous) = self.current_attempt.lock().replace(attempt.clone()) {
            previous.cancel();
        }
        {
            let mut state = self.state.lock();
            if *state != LoaderState::Cancelled {
                *state = LoaderState::Loading {
                    attempt: number,
                    max_attempts: self.config.max_attempts,
                };
            }
        }
        attempt
    }

    /// Drive attempts until success, exhaustion, or cancellation
    pub(crate) async fn run(self: Arc<Self>, strategy: Arc<LoadStrategy>, runtime: Arc<dyn CallMachineRuntime>, url: String) {
        loop {
            if self.is_cancelled() {
                return;
            }

            let attempt = self.begin_attempt(&strategy);
            info!(
                attempt = attempt.number(),
                max_attempts = self.config.max_attempts,
                strategy = %strategy.kind(),
                url = %url,
                "Starting bundle load attempt"
            );

            let outcome = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => AttemptOutcome::Cancelled,
                outcome = strategy.attempt(&attempt, &url, self.config.attempt_timeout(), runtime.as_ref()) => outcome,
            };

            if self.is_cancelled() || attempt.is_cancelled() {
                debug!(attempt = attempt.number(), "Ignoring outcome of cancelled attempt");
                return;
            }

            match outcome {
                AttemptOutcome::Succeeded => {
                    attempt.mark_succeeded();
                    self.succeed(attempt.number());
                    return;
                }
                AttemptOutcome::Cancelled => return,
                AttemptOutcome::Failed(error) => {
                    let remaining = self.consume_attempt();
                    let will_retry = remaining > 0 && error.is_retryable();
                    self.fail(&error, attempt.number(), will_retry);
                    if !will_retry {
                        return;
                    }

                    tokio::select! {
                        biased;
                        _ = self.cancel_token.cancelled() => return,
                        _ = tokio::time::sleep(self.config.retry_delay()) => {}
                    }
                }
            }
        }
    }

    fn consume_attempt(&self) -> u32 {
        let previous = self
            .attempts_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)))
            .unwrap_or(0);
        previous.saturating_sub(1)
    }

    fn succeed(&self, attempt: u32) {
        let _dispatch = self.dispatch.lock();
        {
            let mut state = self.state.lock();
            if *state == LoaderState::Cancelled {
                return;
            }
            *state = LoaderState::Succeeded;
        }

        // Mark before notifying so a nested load() sees the bundle as loaded
        self.context.mark_loaded();
        self.on_failure.lock().take();
        let callback = self.on_success.lock().take();

        info!(attempt, "Call machine bundle loaded");
        if let Some(callback) = callback {
            callback(false);
        }
    }

    /// Abort without running any attempt
    pub(crate) fn fail_immediately(&self, error: LoadError) {
        self.consume_attempt();
        self.fail(&error, 0, false);
    }

    fn fail(&self, error: &LoadError, attempt: u32, will_retry: bool) {
        let _dispatch = self.dispatch.lock();
        let callback = {
            let mut state = self.state.lock();
            if *state == LoaderState::Cancelled {
                return;
            }
            if will_retry {
                self.on_failure.lock().clone()
            } else {
                *state = LoaderState::ExhaustedRetries;
                self.on_success.lock().take();
                self.on_failure.lock().take()
            }
        };

        if will_retry {
            warn!(attempt, error = %error, category = error.category(), next_delay_ms = self.config.retry_delay_ms, "Bundle load attempt failed, will retry");
        } else {
            error!(attempt, error = %error, category = error.category(), "Bundle load failed, giving up");
        }

        if let Some(callback) = callback {
            callback(error, will_retry);
        }
    }
}

impl std::fmt::Debug for LoadOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadOperation")
            .field("state", &self.state())
            .field("attempts_remaining", &self.attempts_remaining())
            .finish()
    }
}
