//! Race time parsing and formatting
//!
//! Official race times travel through the system as milliseconds;
//! operators enter and read them as `MM:SS.cc` strings (minutes, seconds,
//! centiseconds).

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse an `MM:SS.cc` time string into total milliseconds.
///
/// Returns `None` for malformed input; callers reject the request without
/// mutating anything.
///
/// # Examples
///
/// ```
/// use bibtrack_common::time::time_string_to_ms;
///
/// assert_eq!(time_string_to_ms("02:15.34"), Some(135_340));
/// assert_eq!(time_string_to_ms("01:00.00"), Some(60_000));
/// assert_eq!(time_string_to_ms("abc"), None);
/// ```
pub fn time_string_to_ms(s: &str) -> Option<u64> {
    let (minutes, rest) = s.split_once(':')?;
    let (seconds, centis) = rest.split_once('.')?;

    let minutes: u64 = minutes.parse().ok()?;
    let seconds: u64 = seconds.parse().ok()?;
    let centis: u64 = centis.parse().ok()?;

    Some(minutes * 60_000 + seconds * 1_000 + centis * 10)
}

/// Format milliseconds as an `MM:SS.cc` string for display and logs.
pub fn format_race_time(ms: f64) -> String {
    let total_seconds = ms.max(0.0) / 1000.0;
    let minutes = (total_seconds / 60.0) as u64;
    let seconds = (total_seconds % 60.0) as u64;
    let centis = ((total_seconds - total_seconds.floor()) * 100.0) as u64;
    format!("{:02}:{:02}.{:02}", minutes, seconds, centis)
}
