//! Common error types.

use thiserror::Error;

/// Main error type for the diagnostics layer.
#[derive(Error, Debug)]
pub enum DevToolsError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid transport state: {0}")]
    InvalidState(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Interceptor already installed: {0}")]
    AlreadyInstalled(String),

    #[error("Interceptor not installed: {0}")]
    NotInstalled(String),

    #[error("Invalid pattern: {0}")]
    Pattern(String),
}

pub type DevToolsResult<T> = Result<T, DevToolsError>;

impl DevToolsError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn already_installed(what: impl Into<String>) -> Self {
        Self::AlreadyInstalled(what.into())
    }

    pub fn not_installed(what: impl Into<String>) -> Self {
        Self::NotInstalled(what.into())
    }

    pub fn pattern(msg: impl Into<String>) -> Self {
        Self::Pattern(msg.into())
    }
}
