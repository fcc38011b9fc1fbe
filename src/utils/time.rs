use chrono::{DateTime, Utc};

pub const HOUR_MS: i64 = 60 * 60 * 1000;
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// Truncate a millisecond timestamp down to its containing UTC hour.
pub fn floor_to_hour(ms: i64) -> i64 {
    ms - ms.rem_euclid(HOUR_MS)
}

/// Start of the wall-clock hour containing `now`, in milliseconds.
pub fn current_hour_ms(now: DateTime<Utc>) -> i64 {
    floor_to_hour(now.timestamp_millis())
}

/// Render a millisecond timestamp as `YYYY-MM-DD HH:MM:SS UTC`.
pub fn format_ms(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| format_utc(&dt))
        .unwrap_or_else(|| ms.to_string())
}

pub fn format_utc(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Comma-separated list of hour boundaries, for log lines.
pub fn format_hours(hours: &[i64]) -> String {
    hours
        .iter()
        .map(|&h| format_ms(h))
        .collect::<Vec<_>>()
        .join(", ")
}
