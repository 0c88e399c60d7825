//! Subscriber lists shared by the stores.

use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::error;

/// Subscriber callback receiving the notification payload.
pub type Listener<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// Ordered list of subscribers.
///
/// With isolation on (the default) a panicking subscriber is logged and the
/// remaining subscribers still run.
pub struct ListenerSet<A> {
    listeners: RwLock<Vec<Listener<A>>>,
    isolate: AtomicBool,
}

impl<A> ListenerSet<A> {
    /// Create an empty set with panic isolation enabled.
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            isolate: AtomicBool::new(true),
        }
    }

    /// Toggle per-subscriber panic isolation.
    pub fn set_isolation(&self, isolate: bool) {
        self.isolate.store(isolate, Ordering::Relaxed);
    }

    /// Append a subscriber.
    pub fn attach<F>(&self, listener: F)
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        self.listeners.write().push(Arc::new(listener));
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Whether nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Call every subscriber in attach order.
    pub fn notify(&self, payload: &A) {
        let listeners = self.listeners.read().clone();
        let isolate = self.isolate.load(Ordering::Relaxed);

        for (index, listener) in listeners.iter().enumerate() {
            if !isolate {
                listener(payload);
                continue;
            }

            if catch_unwind(AssertUnwindSafe(|| listener(payload))).is_err() {
                error!(subscriber = index, "subscriber panicked during notification");
            }
        }
    }
}

impl<A> Default for ListenerSet<A> {
    fn default() -> Self {
        Self::new()
    }
}
