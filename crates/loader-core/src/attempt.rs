//! A single try at retrieving and running the bundle

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::context::{AttemptId, LoaderContext};
use crate::error::LoadError;
use crate::strategy::StrategyKind;

/// How an attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed(LoadError),
    Cancelled,
}

pub struct LoadAttempt {
    id: AttemptId,
    number: u32,
    strategy: StrategyKind,
    cancelled: AtomicBool,
    succeeded: AtomicBool,
    context: Arc<LoaderContext>,
}

impl LoadAttempt {
    pub(crate) fn new(context: Arc<LoaderContext>, number: u32, strategy: StrategyKind) -> Arc<Self> {
        Arc::new(Self {
            id: context.next_attempt_id(),
            number,
            strategy,
            cancelled: AtomicBool::new(false),
            succeeded: AtomicBool::new(false),
            context,
        })
    }

    pub fn id(&self) -> AttemptId {
        self.id
    }

    /// 1-based position within its operation
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy
    }

    pub fn context(&self) -> &LoaderContext {
        &self.context
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn has_succeeded(&self) -> bool {
        self.succeeded.load(Ordering::SeqCst)
    }

    /// Withdraw interest in the bundle. The underlying download may still
    /// finish; its result is ignored.
    pub fn cancel(&self) {
        if self.has_succeeded() || self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.context.leave_waitlist(self.id);
        debug!(attempt = %self.id, number = self.number, "Load attempt cancelled");
    }

    pub(crate) fn mark_succeeded(&self) {
        self.succeeded.store(true, Ordering::SeqCst);
    }

    /// Register interest for the lifetime of the returned guard
    pub(crate) fn wait_for_bundle(&self) -> WaitlistGuard<'_> {
        self.context.join_waitlist(self.id);
        WaitlistGuard { attempt: self }
    }
}

impl std::fmt::Debug for LoadAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadAttempt")
            .field("id", &self.id)
            .field("number", &self.number)
            .field("strategy", &self.strategy)
            .field("cancelled", &self.is_cancelled())
            .field("succeeded", &self.has_succeeded())
            .finish()
    }
}

/// Leaves the waitlist on completion, timeout, or when the attempt's future
/// is dropped mid-flight
pub(crate) struct WaitlistGuard<'a> {
    attempt: &'a LoadAttempt,
}

impl Drop for WaitlistGuard<'_> {
    fn drop(&mut self) {
        self.attempt.context.leave_waitlist(self.attempt.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_withdraws_from_waitlist() {
        let context = LoaderContext::new();
        let attempt = LoadAttempt::new(context.clone(), 1, StrategyKind::ScriptTag);

        let guard = attempt.wait_for_bundle();
        assert!(context.is_waiting(attempt.id()));

        attempt.cancel();
        assert!(attempt.is_cancelled());
        assert!(!context.has_interest());
        drop(guard);
        assert!(!context.has_interest());
    }

    #[test]
    fn test_succeeded_attempt_ignores_cancel() {
        let context = LoaderContext::new();
        let attempt = LoadAttempt::new(context, 2, StrategyKind::FetchExecute);
        attempt.mark_succeeded();
        attempt.cancel();
        assert!(!attempt.is_cancelled());
    }

    #[test]
    fn test_attempt_ids_are_unique() {
        let context = LoaderContext::new();
        let a = LoadAttempt::new(context.clone(), 1, StrategyKind::ScriptTag);
        let b = LoadAttempt::new(context, 1, StrategyKind::ScriptTag);
        assert_ne!(a.id(), b.id());
    }
}
