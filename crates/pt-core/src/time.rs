//! Time utilities for experiment bookkeeping

use chrono::{DateTime, Utc};

/// Layout of recorded start/end timestamps
pub const TIMESTAMP_FORMAT: &str = "%a, %d %b %Y %H:%M:%S:%6f";

/// Format a UTC instant the way stats files record it
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Current UTC time formatted for a stats file
pub fn format_time() -> String {
    format_timestamp(Utc::now())
}
