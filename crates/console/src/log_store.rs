//! Bounded buffer of captured console entries.
//!
//! The store keeps the most recent entries in insertion order and tells its
//! subscribers about changes through a trailing debounce, so a burst of logs
//! produces a single refresh.

use crate::entry::{LogEntry, LogLevel};
use crate::format::format_args;
use common::{DevToolsError, DevToolsResult};
use devtools_runtime::{debounce, ListenerSet, RateLimiter, Scheduler};
use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Log store settings.
#[derive(Clone, Debug)]
pub struct LogStoreConfig {
    /// Maximum number of retained entries.
    pub capacity: usize,
    /// Debounce window for change notifications.
    pub notify_interval: Duration,
    /// Keep notifying remaining subscribers when one panics.
    pub isolate_subscriber_panics: bool,
}

impl Default for LogStoreConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            notify_interval: Duration::from_millis(350),
            isolate_subscriber_panics: true,
        }
    }
}

struct LogBuffer {
    entries: VecDeque<LogEntry>,
    max_entries: usize,
    next_index: u64,
}

impl LogBuffer {
    fn push(&mut self, level: LogLevel, payload: Vec<Value>) {
        self.next_index += 1;
        self.entries.push_back(LogEntry {
            index: self.next_index,
            level,
            payload,
            time: common::log_time_now(),
            id: common::short_id(),
        });

        // Trimmed after the push, so the buffer briefly holds one extra entry.
        if self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.next_index = 0;
    }
}

struct StoreInner {
    buffer: RwLock<LogBuffer>,
    listeners: Arc<ListenerSet<()>>,
    notifier: RateLimiter<()>,
}

/// Console log store. Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct LogStore {
    inner: Arc<StoreInner>,
}

impl LogStore {
    /// Create a store whose notifications run on `scheduler`.
    pub fn new(scheduler: Scheduler, config: LogStoreConfig) -> Self {
        let listeners = Arc::new(ListenerSet::new());
        listeners.set_isolation(config.isolate_subscriber_panics);

        let fan_out = listeners.clone();
        let notifier = debounce(scheduler, config.notify_interval, false, move |()| {
            fan_out.notify(&());
        });

        Self {
            inner: Arc::new(StoreInner {
                buffer: RwLock::new(LogBuffer {
                    entries: VecDeque::with_capacity(config.capacity + 1),
                    max_entries: config.capacity,
                    next_index: 0,
                }),
                listeners,
                notifier,
            }),
        }
    }

    /// Store with default capacity and notification window.
    pub fn with_defaults(scheduler: Scheduler) -> Self {
        Self::new(scheduler, LogStoreConfig::default())
    }

    /// Record a console call.
    pub fn add_log(&self, level: LogLevel, payload: Vec<Value>) {
        self.inner.buffer.write().push(level, payload);
        self.notify();
    }

    /// Entries, oldest first.
    pub fn get_logs(&self) -> Vec<LogEntry> {
        self.inner.buffer.read().entries.iter().cloned().collect()
    }

    /// Entries matching `filter`, oldest first.
    pub fn filter_logs(&self, filter: &LogFilter) -> Vec<LogEntry> {
        self.inner
            .buffer
            .read()
            .entries
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.inner.buffer.write().clear();
        self.notify();
    }

    /// Subscribe to change notifications.
    pub fn attach<F>(&self, listener: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.listeners.attach(move |_: &()| listener());
    }

    /// Schedule a notification through the debounce window.
    pub fn notify(&self) {
        self.inner.notifier.call(());
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.inner.buffer.read().entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.buffer.read().entries.is_empty()
    }

    /// Maximum number of retained entries.
    pub fn capacity(&self) -> usize {
        self.inner.buffer.read().max_entries
    }
}

/// Level tab plus search box of the log panel.
#[derive(Clone, Debug, Default)]
pub struct LogFilter {
    level: Option<LogLevel>,
    pattern: Option<Regex>,
}

impl LogFilter {
    /// Filter that matches everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Only keep entries of `level`.
    pub fn level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }

    /// Only keep entries whose rendered payload matches `pattern`, ignoring case.
    pub fn pattern(mut self, pattern: &str) -> DevToolsResult<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| DevToolsError::pattern(e.to_string()))?;
        self.pattern = Some(regex);
        Ok(self)
    }

    /// Whether `entry` passes the filter.
    pub fn matches(&self, entry: &LogEntry) -> bool {
        if let Some(level) = self.level {
            if entry.level != level {
                return false;
            }
        }

        match &self.pattern {
            Some(regex) => regex.is_match(&format_args(&entry.payload)),
            None => true,
        }
    }
}
