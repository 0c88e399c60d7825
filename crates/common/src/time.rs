//! Wall-clock helpers.

use chrono::{DateTime, Local, TimeZone};

/// Milliseconds since the Unix epoch.
pub fn epoch_millis() -> u64 {
    Local::now().timestamp_millis().max(0) as u64
}

/// Format a timestamp the way the log panel shows it, e.g. `2024-3-7 09:05:01 042`.
pub fn format_log_time<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.format("%Y-%-m-%-d %H:%M:%S %3f").to_string()
}

/// Current local time in log format.
pub fn log_time_now() -> String {
    format_log_time(&Local::now())
}
