//! Panels reacting to shell commands on the event bus.

use devtools_console::LogStore;
use devtools_network::RequestStore;
use devtools_runtime::{EventBus, HandlerId, CLEAR};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Name of the console panel.
pub const LOG_PANEL: &str = "Log";

/// Name of the network panel.
pub const NETWORK_PANEL: &str = "Network";

/// A panel owning one store.
pub trait Panel: Send + Sync {
    /// Name the shell addresses the panel by.
    fn name(&self) -> &str;

    /// Drop everything the panel shows.
    fn clear(&self);
}

/// Console panel.
pub struct LogPanel {
    store: LogStore,
}

impl LogPanel {
    pub fn new(store: LogStore) -> Self {
        Self { store }
    }
}

impl Panel for LogPanel {
    fn name(&self) -> &str {
        LOG_PANEL
    }

    fn clear(&self) {
        self.store.clear();
    }
}

/// Network panel.
pub struct NetworkPanel {
    store: RequestStore,
}

impl NetworkPanel {
    pub fn new(store: RequestStore) -> Self {
        Self { store }
    }
}

impl Panel for NetworkPanel {
    fn name(&self) -> &str {
        NETWORK_PANEL
    }

    fn clear(&self) {
        self.store.clear_requests();
    }
}

/// Subscribe `panel` to `clear` commands addressed to it by name.
pub fn register_clear(bus: &EventBus, panel: Arc<dyn Panel>) -> HandlerId {
    bus.on(CLEAR, move |args: &[Value]| {
        if args.first().and_then(Value::as_str) == Some(panel.name()) {
            debug!(panel = panel.name(), "clear");
            panel.clear();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    struct Counting {
        name: &'static str,
        clears: Mutex<usize>,
    }

    impl Panel for Counting {
        fn name(&self) -> &str {
            self.name
        }

        fn clear(&self) {
            *self.clears.lock() += 1;
        }
    }

    #[test]
    fn test_clear_is_routed_by_name() {
        let bus = EventBus::new();
        let a = Arc::new(Counting { name: "A", clears: Mutex::new(0) });
        let b = Arc::new(Counting { name: "B", clears: Mutex::new(0) });
        register_clear(&bus, a.clone());
        register_clear(&bus, b.clone());

        assert_eq!(bus.trigger(CLEAR, &[json!("A")]), 2);
        assert_eq!(*a.clears.lock(), 1);
        assert_eq!(*b.clears.lock(), 0);
    }

    #[test]
    fn test_clear_without_name_is_ignored() {
        let bus = EventBus::new();
        let a = Arc::new(Counting { name: "A", clears: Mutex::new(0) });
        register_clear(&bus, a.clone());

        bus.trigger(CLEAR, &[]);
        bus.trigger(CLEAR, &[json!(1)]);
        assert_eq!(*a.clears.lock(), 0);
    }
}
