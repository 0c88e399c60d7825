//! In-app DevTools.
//!
//! Ties the console and network interceptors to their stores and exposes
//! the panel commands a DevTools shell sends over the event bus.

pub mod config;
pub mod engine;
pub mod panels;

pub use config::DevToolsConfig;
pub use engine::DevTools;
pub use panels::{register_clear, LogPanel, NetworkPanel, Panel, LOG_PANEL, NETWORK_PANEL};

/// DevTools version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
