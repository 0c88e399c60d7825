//! Console capture.
//!
//! Wraps the process console so every `log`/`info`/`warn`/`error` call is
//! recorded into a bounded [`LogStore`] and still reaches the original sink.

pub mod entry;
pub mod format;
pub mod interceptor;
pub mod layer;
pub mod log_store;

pub use entry::{LogEntry, LogLevel};
pub use interceptor::{Console, InterceptedConsole, StdConsole};
pub use layer::CaptureLayer;
pub use log_store::{LogFilter, LogStore, LogStoreConfig};
