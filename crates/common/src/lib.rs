//! Common utilities and types shared by the diagnostics crates.

pub mod error;
pub mod id;
pub mod time;

pub use error::{DevToolsError, DevToolsResult};
pub use id::{short_id, unique_id};
pub use time::{epoch_millis, log_time_now};
