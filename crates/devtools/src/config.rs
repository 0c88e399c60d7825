//! DevTools configuration.

use devtools_console::LogStoreConfig;
use devtools_network::RequestStoreConfig;
use std::time::Duration;

/// DevTools configuration.
#[derive(Clone, Debug)]
pub struct DevToolsConfig {
    /// Maximum number of console entries kept.
    pub log_capacity: usize,
    /// Debounce window of log panel refreshes.
    pub log_notify_interval: Duration,
    /// Maximum number of requests kept.
    pub request_capacity: usize,
    /// Debounce window of network panel refreshes.
    pub request_notify_interval: Duration,
    /// Period of the missed-transition poller.
    pub poll_interval: Duration,
    /// Whether to route the process console through the log store.
    pub capture_console: bool,
    /// Whether wrapped transport factories record requests.
    pub capture_network: bool,
    /// Whether a panicking subscriber is contained.
    pub isolate_subscriber_panics: bool,
}

impl DevToolsConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set log store capacity.
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    /// Set request store capacity.
    pub fn with_request_capacity(mut self, capacity: usize) -> Self {
        self.request_capacity = capacity;
        self
    }

    /// Set both notification windows.
    pub fn with_notify_intervals(mut self, logs: Duration, requests: Duration) -> Self {
        self.log_notify_interval = logs;
        self.request_notify_interval = requests;
        self
    }

    /// Set the poll period.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set console capture.
    pub fn with_console_capture(mut self, enabled: bool) -> Self {
        self.capture_console = enabled;
        self
    }

    /// Set network capture.
    pub fn with_network_capture(mut self, enabled: bool) -> Self {
        self.capture_network = enabled;
        self
    }

    /// Set subscriber panic isolation.
    pub fn with_subscriber_isolation(mut self, enabled: bool) -> Self {
        self.isolate_subscriber_panics = enabled;
        self
    }

    pub(crate) fn log_store(&self) -> LogStoreConfig {
        LogStoreConfig {
            capacity: self.log_capacity,
            notify_interval: self.log_notify_interval,
            isolate_subscriber_panics: self.isolate_subscriber_panics,
        }
    }

    pub(crate) fn request_store(&self) -> RequestStoreConfig {
        RequestStoreConfig {
            capacity: self.request_capacity,
            notify_interval: self.request_notify_interval,
            isolate_subscriber_panics: self.isolate_subscriber_panics,
        }
    }
}

impl Default for DevToolsConfig {
    fn default() -> Self {
        Self {
            log_capacity: 100,
            log_notify_interval: Duration::from_millis(350),
            request_capacity: 200,
            request_notify_interval: Duration::from_millis(10),
            poll_interval: Duration::from_millis(10),
            capture_console: true,
            capture_network: true,
            isolate_subscriber_panics: true,
        }
    }
}
