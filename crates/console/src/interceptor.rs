//! Console decoration and the process-wide console slot.
//!
//! Application code logs through [`global()`]. [`install`] swaps the slot for
//! an [`InterceptedConsole`] that records every call into a [`LogStore`] before
//! handing it to the console that was there before; [`uninstall`] puts the
//! original back.

use crate::entry::LogLevel;
use crate::format::format_args;
use crate::log_store::LogStore;
use common::{DevToolsError, DevToolsResult};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Logging sink with the four console methods.
pub trait Console: Send + Sync {
    /// Emit `args` at `level`.
    fn write(&self, level: LogLevel, args: &[Value]);

    /// console.log()
    fn log(&self, args: &[Value]) {
        self.write(LogLevel::Log, args);
    }

    /// console.info()
    fn info(&self, args: &[Value]) {
        self.write(LogLevel::Info, args);
    }

    /// console.warn()
    fn warn(&self, args: &[Value]) {
        self.write(LogLevel::Warn, args);
    }

    /// console.error()
    fn error(&self, args: &[Value]) {
        self.write(LogLevel::Error, args);
    }
}

impl Console for Arc<dyn Console> {
    fn write(&self, level: LogLevel, args: &[Value]) {
        (**self).write(level, args);
    }
}

/// Platform console: `log`/`info` on stdout, `warn`/`error` on stderr.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn write(&self, level: LogLevel, args: &[Value]) {
        let message = format_args(args);
        match level {
            LogLevel::Log | LogLevel::Info => println!("{}{}", level.prefix(), message),
            LogLevel::Warn | LogLevel::Error => eprintln!("{}{}", level.prefix(), message),
        }
    }
}

/// Console that records each call before forwarding it unchanged.
pub struct InterceptedConsole<C> {
    inner: C,
    store: LogStore,
}

impl<C: Console> InterceptedConsole<C> {
    /// Decorate `inner`, recording into `store`.
    pub fn new(inner: C, store: LogStore) -> Self {
        Self { inner, store }
    }

    /// The decorated console.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Store receiving the recorded calls.
    pub fn store(&self) -> &LogStore {
        &self.store
    }
}

impl<C: Console> Console for InterceptedConsole<C> {
    fn write(&self, level: LogLevel, args: &[Value]) {
        self.store.add_log(level, args.to_vec());
        self.inner.write(level, args);
    }
}

static GLOBAL_CONSOLE: Lazy<RwLock<Arc<dyn Console>>> = Lazy::new(|| RwLock::new(Arc::new(StdConsole)));

/// Console in the slot before [`install`]; `Some` while installed.
static ORIGINAL: Lazy<Mutex<Option<Arc<dyn Console>>>> = Lazy::new(|| Mutex::new(None));

/// Current process console.
pub fn global() -> Arc<dyn Console> {
    GLOBAL_CONSOLE.read().clone()
}

/// Replace the process console, returning the previous one.
pub fn set_global(console: Arc<dyn Console>) -> Arc<dyn Console> {
    std::mem::replace(&mut *GLOBAL_CONSOLE.write(), console)
}

/// Route the process console through `store`.
pub fn install(store: LogStore) -> DevToolsResult<()> {
    let mut original = ORIGINAL.lock();
    if original.is_some() {
        return Err(DevToolsError::already_installed("console"));
    }

    let current = global();
    set_global(Arc::new(InterceptedConsole::new(current.clone(), store)));
    *original = Some(current);

    debug!("console interceptor installed");
    Ok(())
}

/// Restore the console that was active before [`install`].
pub fn uninstall() -> DevToolsResult<()> {
    let original = ORIGINAL
        .lock()
        .take()
        .ok_or_else(|| DevToolsError::not_installed("console"))?;

    set_global(original);
    debug!("console interceptor removed");
    Ok(())
}

/// Whether [`install`] is in effect.
pub fn is_installed() -> bool {
    ORIGINAL.lock().is_some()
}

/// `console.log(...)` on the process console.
pub fn log(args: &[Value]) {
    global().log(args);
}

/// `console.info(...)` on the process console.
pub fn info(args: &[Value]) {
    global().info(args);
}

/// `console.warn(...)` on the process console.
pub fn warn(args: &[Value]) {
    global().warn(args);
}

/// `console.error(...)` on the process console.
pub fn error(args: &[Value]) {
    global().error(args);
}
