//! Pending callback registry
//!
//! Maps correlation stamps to one-shot response callbacks. Entries are
//! inserted when a correlated request is sent and removed exactly once when
//! the matching response arrives. Nothing else ever removes them: a caller
//! that gives up on a response owns the leak.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::envelope::{CallbackStamp, ChannelMessage};

/// One-shot callback invoked with the response message
pub type ResponseCallback = Box<dyn FnOnce(ChannelMessage) + Send + 'static>;

/// Per-channel registry of outstanding correlated requests
pub struct PendingCallbacks {
    /// Distinguishes stamps of channels sharing one bus
    prefix: String,
    next_stamp: AtomicU64,
    entries: Mutex<HashMap<CallbackStamp, ResponseCallback>>,
}

impl PendingCallbacks {
    pub fn new() -> Self {
        Self {
            prefix: uuid::Uuid::new_v4().simple().to_string(),
            next_stamp: AtomicU64::new(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Store a callback under a freshly minted stamp
    pub fn register(&self, callback: ResponseCallback) -> CallbackStamp {
        let sequence = self.next_stamp.fetch_add(1, Ordering::SeqCst);
        let stamp = CallbackStamp::new(format!("{}-{}", self.prefix, sequence));
        self.entries.lock().insert(stamp.clone(), callback);
        stamp
    }

    /// Remove and return the callback for a stamp
    pub fn take(&self, stamp: &CallbackStamp) -> Option<ResponseCallback> {
        self.entries.lock().remove(stamp)
    }

    pub fn contains(&self, stamp: &CallbackStamp) -> bool {
        self.entries.lock().contains_key(stamp)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for PendingCallbacks {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PendingCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCallbacks")
            .field("prefix", &self.prefix)
            .field("pending", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_stamps_are_unique_and_increasing() {
        let registry = PendingCallbacks::new();
        let a = registry.register(Box::new(|_| {}));
        let b = registry.register(Box::new(|_| {}));

        assert_ne!(a, b);
        let seq = |s: &CallbackStamp| s.as_str().rsplit('-').next().unwrap().parse::<u64>().unwrap();
        assert!(seq(&b) > seq(&a));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_take_is_one_shot() {
        let registry = PendingCallbacks::new();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = hits.clone();
        let stamp = registry.register(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let callback = registry.take(&stamp).expect("registered");
        callback(ChannelMessage::new("reply"));
        assert!(registry.take(&stamp).is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registries_do_not_share_stamps() {
        let first = PendingCallbacks::new();
        let second = PendingCallbacks::new();
        let stamp = first.register(Box::new(|_| {}));
        assert!(!second.contains(&stamp));
    }
}
