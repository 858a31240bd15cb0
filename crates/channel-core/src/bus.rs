//! In-memory message bus
//!
//! A bus stands in for one delivery surface: a page's message event target,
//! or one direction of an in-process event emitter. Posting dispatches
//! synchronously to every subscriber, in subscription order. Handlers may post
//! or (un)subscribe from inside a dispatch.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::trace;

/// Handler receiving raw bus values
pub type BusHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Handle returned by [`MessageBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    active: Arc<AtomicBool>,
    handler: BusHandler,
}

pub struct MessageBus {
    name: String,
    next_id: AtomicU64,
    subscribers: RwLock<Vec<Subscription>>,
}

impl MessageBus {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            next_id: AtomicU64::new(1),
            subscribers: RwLock::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deliver a value to every current subscriber
    pub fn post(&self, value: &Value) {
        // Snapshot so handlers can touch the subscriber list re-entrantly
        let snapshot: Vec<(Arc<AtomicBool>, BusHandler)> = self
            .subscribers
            .read()
            .iter()
            .map(|s| (s.active.clone(), s.handler.clone()))
            .collect();

        trace!(bus = %self.name, subscribers = snapshot.len(), "Posting message");

        for (active, handler) in snapshot {
            if active.load(Ordering::SeqCst) {
                handler(value);
            }
        }
    }

    pub fn subscribe(&self, handler: BusHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.subscribers.write().push(Subscription {
            id,
            active: Arc::new(AtomicBool::new(true)),
            handler,
        });
        id
    }

    /// Remove a subscription. Returns false when it was not present.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        match subscribers.iter().position(|s| s.id == id) {
            Some(index) => {
                let removed = subscribers.remove(index);
                // A dispatch holding a snapshot must skip it too
                removed.active.store(false, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("name", &self.name)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn test_post_reaches_all_subscribers() {
        let bus = MessageBus::new("page");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["a", "b"] {
            let seen = seen.clone();
            bus.subscribe(Arc::new(move |v: &Value| seen.lock().push(format!("{}:{}", tag, v))));
        }

        bus.post(&json!(1));
        assert_eq!(*seen.lock(), vec!["a:1".to_string(), "b:1".to_string()]);
    }

    #[test]
    fn test_unsubscribe_during_dispatch_stops_delivery() {
        let bus = MessageBus::new("page");
        let hits = Arc::new(AtomicU64::new(0));
        let victim: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let bus_for_first = bus.clone();
        let victim_for_first = victim.clone();
        bus.subscribe(Arc::new(move |_v: &Value| {
            if let Some(id) = victim_for_first.lock().take() {
                bus_for_first.unsubscribe(id);
            }
        }));

        let counter = hits.clone();
        let second = bus.subscribe(Arc::new(move |_v: &Value| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        *victim.lock() = Some(second);

        bus.post(&json!("first"));
        bus.post(&json!("second"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_unsubscribe_unknown_is_noop() {
        let bus = MessageBus::new("page");
        let id = bus.subscribe(Arc::new(|_v: &Value| {}));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
    }
}
