//! Captured console entries.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Console method a log was emitted through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Log,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Every level, in panel tab order.
    pub const ALL: [LogLevel; 4] = [LogLevel::Log, LogLevel::Info, LogLevel::Warn, LogLevel::Error];

    /// Method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Log => "log",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Prefix used when echoing to a terminal.
    pub fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Log => "",
            LogLevel::Info => "[INFO] ",
            LogLevel::Warn => "[WARN] ",
            LogLevel::Error => "[ERROR] ",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "log" => Ok(LogLevel::Log),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

/// One captured console call. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogEntry {
    /// Sequence number within the store, starting at 1.
    pub index: u64,
    /// Console method.
    pub level: LogLevel,
    /// Arguments exactly as passed.
    pub payload: Vec<Value>,
    /// Local time, `YYYY-M-D HH:mm:ss SSS`.
    pub time: String,
    /// Short random id.
    pub id: String,
}

impl LogEntry {
    /// Payload rendered as one line.
    pub fn message(&self) -> String {
        crate::format::format_args(&self.payload)
    }
}
