//! DevTools coordinator: owns the stores and wires them into the host.

use crate::config::DevToolsConfig;
use crate::panels::{register_clear, LogPanel, NetworkPanel, Panel};
use common::{DevToolsError, DevToolsResult};
use devtools_console::{interceptor as console, CaptureLayer, LogStore};
use devtools_network::{InterceptingFactory, RequestStore, TransportFactory};
use devtools_runtime::{EventBus, HandlerId, Scheduler, CLEAR};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// DevTools instance.
pub struct DevTools {
    config: DevToolsConfig,
    scheduler: Scheduler,
    events: Arc<EventBus>,
    logs: LogStore,
    requests: RequestStore,
    panel_handlers: RwLock<Vec<HandlerId>>,
    installed: Mutex<bool>,
}

impl DevTools {
    /// Create the stores and subscribe both panels to `clear`.
    pub fn new(scheduler: Scheduler, config: DevToolsConfig) -> Self {
        let logs = LogStore::new(scheduler.clone(), config.log_store());
        let requests = RequestStore::new(scheduler.clone(), config.request_store());
        let events = Arc::new(EventBus::new());

        let panels: [Arc<dyn Panel>; 2] = [
            Arc::new(LogPanel::new(logs.clone())),
            Arc::new(NetworkPanel::new(requests.clone())),
        ];
        let panel_handlers = panels
            .into_iter()
            .map(|panel| register_clear(&events, panel))
            .collect();

        Self {
            config,
            scheduler,
            events,
            logs,
            requests,
            panel_handlers: RwLock::new(panel_handlers),
            installed: Mutex::new(false),
        }
    }

    /// Create an instance with the default configuration.
    pub fn with_defaults(scheduler: Scheduler) -> Self {
        Self::new(scheduler, DevToolsConfig::default())
    }

    /// Hook into the process. Fails if this instance is already installed or
    /// another one owns the console.
    pub fn install(&self) -> DevToolsResult<()> {
        let mut installed = self.installed.lock();
        if *installed {
            return Err(DevToolsError::already_installed("devtools"));
        }

        if self.config.capture_console {
            console::install(self.logs.clone())?;
        }

        *installed = true;
        info!(
            console = self.config.capture_console,
            network = self.config.capture_network,
            "devtools installed"
        );
        Ok(())
    }

    /// Undo [`DevTools::install`].
    pub fn uninstall(&self) -> DevToolsResult<()> {
        let mut installed = self.installed.lock();
        if !*installed {
            return Err(DevToolsError::not_installed("devtools"));
        }

        if self.config.capture_console {
            console::uninstall()?;
        }

        *installed = false;
        info!("devtools uninstalled");
        Ok(())
    }

    /// Whether [`DevTools::install`] is in effect.
    pub fn is_installed(&self) -> bool {
        *self.installed.lock()
    }

    /// Wrap `factory` so its transports record into the request store.
    pub fn intercept<F: TransportFactory>(&self, factory: F) -> InterceptingFactory<F> {
        InterceptingFactory::new(factory, self.requests.clone(), self.scheduler.clone())
            .with_poll_interval(self.config.poll_interval)
    }

    /// Factory the host should create transports from. Wrapped only when
    /// network capture is enabled.
    pub fn transport_factory<F>(&self, factory: F) -> Arc<dyn TransportFactory>
    where
        F: TransportFactory + 'static,
    {
        if self.config.capture_network {
            Arc::new(self.intercept(factory))
        } else {
            Arc::new(factory)
        }
    }

    /// A `tracing` layer feeding the log store.
    pub fn capture_layer(&self) -> CaptureLayer {
        CaptureLayer::new(self.logs.clone())
    }

    /// Broadcast `clear` for the panel called `panel`.
    pub fn clear_panel(&self, panel: &str) -> usize {
        self.events.trigger(CLEAR, &[Value::String(panel.to_string())])
    }

    /// Unsubscribe the built-in panels from the bus.
    pub fn detach_panels(&self) {
        for id in self.panel_handlers.write().drain(..) {
            self.events.off(CLEAR, Some(id));
        }
    }

    pub fn logs(&self) -> &LogStore {
        &self.logs
    }

    pub fn requests(&self) -> &RequestStore {
        &self.requests
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn config(&self) -> &DevToolsConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}
