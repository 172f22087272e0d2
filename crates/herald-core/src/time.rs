//! Timestamp encoding shared by every SQLite table.
//!
//! Timestamps are stored as RFC 3339 UTC text with a fixed millisecond
//! precision and a `Z` suffix, so string comparison in SQL (`<=`, `ORDER BY`)
//! agrees with chronological order.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::{HeraldError, Result};

pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| HeraldError::InvalidTimestamp(format!("{s}: {e}")))
}
