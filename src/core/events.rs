//! Topic-based listener registry.
//!
//! [`EventHub`] is the notification primitive shared by entities (`change`,
//! `change:<property>`) and data services (`fetched:<alias>`, `fetchError:<alias>`).
//! Subscribing returns a [`Subscription`] guard; dropping the guard removes the
//! listener, which is how owners "stop listening" to an entity they no longer hold.
//!
//! Callbacks are cloned out of the registry before they run, so a callback may
//! freely subscribe, unsubscribe, or emit on the same hub.

use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Callback invoked with the emitted event payload.
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registration<E> {
    topic: String,
    callback: Listener<E>,
}

type Registry<E> = DashMap<u64, Registration<E>>;

/// A set of listeners keyed by topic name.
pub struct EventHub<E> {
    listeners: Arc<Registry<E>>,
    next_id: AtomicU64,
}

impl<E: 'static> EventHub<E> {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register `callback` for `topic`.
    ///
    /// The listener stays registered for as long as the returned guard lives.
    #[must_use = "dropping the subscription immediately removes the listener"]
    pub fn subscribe<F>(&self, topic: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let topic = topic.into();
        tracing::trace!(topic = %topic, id, "listener registered");
        self.listeners.insert(
            id,
            Registration {
                topic,
                callback: Arc::new(callback),
            },
        );

        let registry: Weak<Registry<E>> = Arc::downgrade(&self.listeners);
        Subscription {
            id,
            cancel: Some(Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    registry.remove(&id);
                }
            })),
        }
    }

    /// Invoke every listener registered for `topic`, in subscription order.
    ///
    /// Returns the number of listeners that were called.
    pub fn emit(&self, topic: &str, event: &E) -> usize {
        let mut matching: Vec<(u64, Listener<E>)> = self
            .listeners
            .iter()
            .filter(|entry| entry.value().topic == topic)
            .map(|entry| (*entry.key(), Arc::clone(&entry.value().callback)))
            .collect();
        matching.sort_by_key(|(id, _)| *id);

        for (_, callback) in &matching {
            callback(event);
        }
        matching.len()
    }

    /// Number of listeners registered for `topic`.
    pub fn listener_count(&self, topic: &str) -> usize {
        self.listeners.iter().filter(|entry| entry.value().topic == topic).count()
    }

    /// Total number of live listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl<E: 'static> Default for EventHub<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventHub<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub").field("listeners", &self.listeners.len()).finish()
    }
}

/// Guard for a registered listener. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Registry id of this listener.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the listener now. Equivalent to dropping the guard.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_emit_reaches_only_matching_topic() {
        let hub: EventHub<i32> = EventHub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_a = Arc::clone(&seen);
        let _a = hub.subscribe("a", move |v| seen_a.lock().unwrap().push(("a", *v)));
        let seen_b = Arc::clone(&seen);
        let _b = hub.subscribe("b", move |v| seen_b.lock().unwrap().push(("b", *v)));

        assert_eq!(hub.emit("a", &1), 1);
        assert_eq!(hub.emit("c", &2), 0);
        assert_eq!(*seen.lock().unwrap(), vec![("a", 1)]);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let hub: EventHub<()> = EventHub::new();
        let sub = hub.subscribe("change", |_| {});
        assert_eq!(hub.listener_count("change"), 1);
        drop(sub);
        assert_eq!(hub.listener_count("change"), 0);
        assert!(hub.is_empty());
    }

    #[test]
    fn test_listeners_run_in_subscription_order() {
        let hub: EventHub<()> = EventHub::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut subs = Vec::new();
        for i in 0..5 {
            let order = Arc::clone(&order);
            subs.push(hub.subscribe("t", move |_| order.lock().unwrap().push(i)));
        }
        hub.emit("t", &());
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_listener_may_unsubscribe_itself_during_emit() {
        let hub: Arc<EventHub<()>> = Arc::new(EventHub::new());
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let slot_inner = Arc::clone(&slot);
        let sub = hub.subscribe("t", move |_| {
            slot_inner.lock().unwrap().take();
        });
        *slot.lock().unwrap() = Some(sub);

        assert_eq!(hub.emit("t", &()), 1);
        assert_eq!(hub.emit("t", &()), 0);
    }
}
