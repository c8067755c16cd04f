//! Time utility functions

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Convert milliseconds since Unix epoch to `DateTime<Utc>`.
///
/// Returns `None` for values chrono cannot represent.
pub fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// Convert milliseconds since Unix epoch to wall-clock time in `tz`
pub fn millis_to_local(millis: i64, tz: Tz) -> Option<DateTime<Tz>> {
    millis_to_datetime(millis).map(|dt| tz.from_utc_datetime(&dt.naive_utc()))
}

/// Format optional epoch milliseconds as RFC 3339 (millisecond precision, UTC)
pub fn millis_to_iso(millis: Option<i64>) -> Option<String> {
    millis
        .and_then(millis_to_datetime)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
}

/// Parse a timestamp as written by warehouse exports.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]` (read as UTC, `T` separator
/// allowed) and integer epoch milliseconds.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    value.parse::<i64>().ok().and_then(millis_to_datetime)
}

/// Parse an IANA timezone name (e.g. "America/New_York")
pub fn parse_timezone(name: &str) -> Result<Tz, String> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| format!("Unknown timezone '{}'. Use an IANA name such as UTC or Europe/Berlin", name))
}
