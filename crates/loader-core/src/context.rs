//! Lifecycle-scoped loader state
//!
//! One [`LoaderContext`] lives as long as the loaded call machine does. It
//! carries the configuration the bundle reads on startup, the waitlist of
//! attempts still interested in the bundle, and the sticky `loaded` flag.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use callframe_channel_core::CallFrameId;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

/// Identifier of one load attempt, unique within a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt-{}", self.0)
    }
}

/// Settings the call machine reads when it starts executing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallMachineConfig {
    pub call_frame_id: Option<CallFrameId>,
    pub avoid_eval: bool,
}

pub struct LoaderContext {
    machine_config: RwLock<CallMachineConfig>,
    waitlist: Mutex<HashSet<AttemptId>>,
    next_attempt: AtomicU64,
    loaded: AtomicBool,
}

impl LoaderContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            machine_config: RwLock::new(CallMachineConfig::default()),
            waitlist: Mutex::new(HashSet::new()),
            next_attempt: AtomicU64::new(1),
            loaded: AtomicBool::new(false),
        })
    }

    /// Populate the configuration before the bundle starts executing
    pub fn configure(&self, call_frame_id: CallFrameId, avoid_eval: bool) {
        let mut config = self.machine_config.write();
        config.call_frame_id = Some(call_frame_id);
        config.avoid_eval = avoid_eval;
    }

    pub fn call_machine_config(&self) -> CallMachineConfig {
        self.machine_config.read().clone()
    }

    pub(crate) fn next_attempt_id(&self) -> AttemptId {
        AttemptId(self.next_attempt.fetch_add(1, Ordering::SeqCst))
    }

    pub fn join_waitlist(&self, id: AttemptId) {
        self.waitlist.lock().insert(id);
        debug!(attempt = %id, "Joined bundle waitlist");
    }

    /// Withdraw interest. Returns false if the attempt wasn't waiting.
    pub fn leave_waitlist(&self, id: AttemptId) -> bool {
        let removed = self.waitlist.lock().remove(&id);
        if removed {
            debug!(attempt = %id, "Left bundle waitlist");
        }
        removed
    }

    pub fn is_waiting(&self, id: AttemptId) -> bool {
        self.waitlist.lock().contains(&id)
    }

    /// Whether any attempt still wants the bundle. A lagging bundle checks
    /// this before doing expensive setup.
    pub fn has_interest(&self) -> bool {
        !self.waitlist.lock().is_empty()
    }

    pub fn waitlist_len(&self) -> usize {
        self.waitlist.lock().len()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_loaded(&self) {
        self.loaded.store(true, Ordering::SeqCst);
    }
}

impl fmt::Debug for LoaderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderContext")
            .field("machine_config", &*self.machine_config.read())
            .field("waitlist", &self.waitlist_len())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
