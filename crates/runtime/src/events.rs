//! Named-channel publish/subscribe bus.
//!
//! Used for commands that cross component boundaries, e.g. the shell
//! broadcasting `clear` with a panel name.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Handler invoked with the trigger arguments.
pub type EventHandler = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Token identifying a registered handler, used to remove it again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Channel name used for clear commands.
pub const CLEAR: &str = "clear";

/// Event bus.
#[derive(Default)]
pub struct EventBus {
    channels: RwLock<HashMap<String, Vec<(HandlerId, EventHandler)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` on channel `name`.
    pub fn on<F>(&self, name: &str, handler: F) -> HandlerId
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.channels
            .write()
            .entry(name.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove one handler, or every handler of the channel when `handler` is `None`.
    pub fn off(&self, name: &str, handler: Option<HandlerId>) {
        let mut channels = self.channels.write();
        let Some(handlers) = channels.get_mut(name) else {
            return;
        };

        match handler {
            Some(id) => handlers.retain(|(h, _)| *h != id),
            None => handlers.clear(),
        }
    }

    /// Run the channel's handlers in registration order. Returns how many ran.
    ///
    /// Handlers run on a snapshot of the channel, so they may register or
    /// remove handlers without deadlocking.
    pub fn trigger(&self, name: &str, args: &[Value]) -> usize {
        let handlers: Vec<EventHandler> = match self.channels.read().get(name) {
            Some(handlers) => handlers.iter().map(|(_, h)| h.clone()).collect(),
            None => return 0,
        };

        trace!(channel = name, handlers = handlers.len(), "trigger");
        for handler in &handlers {
            handler(args);
        }
        handlers.len()
    }

    /// Number of handlers on a channel.
    pub fn handler_count(&self, name: &str) -> usize {
        self.channels.read().get(name).map(Vec::len).unwrap_or(0)
    }
}
