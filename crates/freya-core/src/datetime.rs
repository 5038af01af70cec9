//! Timestamp normalization into the canonical `YYYY-MM-DD HH:MM:SS` layout.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

use crate::sanitize::NOT_AVAILABLE;

pub const CANONICAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Days added to `last_seen` when a source publishes no expiry.
pub const APPLY_WINDOW_DAYS: i64 = 30;

/// Epoch values at or above this are treated as milliseconds.
const EPOCH_MILLIS_THRESHOLD: u64 = 100_000_000_000;

const NAIVE_DATETIME_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const OFFSET_DATETIME_LAYOUTS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

const DATE_LAYOUTS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%B %d, %Y", "%b %d, %Y"];

pub fn format_canonical(dt: NaiveDateTime) -> String {
    dt.format(CANONICAL_FORMAT).to_string()
}

/// Strict parse of the canonical layout only.
pub fn parse_canonical(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), CANONICAL_FORMAT).ok()
}

/// Parse any known layout. Offset-bearing inputs are converted to UTC wall
/// time; date-only inputs resolve to midnight.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Some(dt) = parse_canonical(value) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    for layout in OFFSET_DATETIME_LAYOUTS {
        if let Ok(dt) = DateTime::parse_from_str(value, layout) {
            return Some(dt.naive_utc());
        }
    }
    for layout in NAIVE_DATETIME_LAYOUTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, layout) {
            return Some(dt);
        }
    }
    DATE_LAYOUTS
        .iter()
        .filter_map(|layout| NaiveDate::parse_from_str(value, layout).ok())
        .find_map(|date| date.and_hms_opt(0, 0, 0))
}

/// Canonical form of `value`, or `value` unchanged when no layout matches.
///
/// Callers must not assume the result is canonical; check with
/// [`parse_canonical`] when it matters.
pub fn normalize_datetime(value: &str) -> String {
    match parse_datetime(value) {
        Some(dt) => format_canonical(dt),
        None => value.to_string(),
    }
}

/// Canonical form of a Unix timestamp in seconds or milliseconds (UTC).
pub fn normalize_epoch(value: i64) -> String {
    let dt = if value.unsigned_abs() >= EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    };
    match dt {
        Some(dt) => format_canonical(dt.naive_utc()),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// `last_seen + 30 days` in canonical form, `"N/A"` when `last_seen` is not
/// canonical.
pub fn compute_apply_end_date(last_seen: &str) -> String {
    parse_canonical(last_seen)
        .and_then(|dt| dt.checked_add_signed(Duration::days(APPLY_WINDOW_DAYS)))
        .map(format_canonical)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}
