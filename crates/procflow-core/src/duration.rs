//! Compact human-readable durations for tooltips.

const SECS_PER_MIN: u64 = 60;
const SECS_PER_HOUR: u64 = 3_600;
const SECS_PER_DAY: u64 = 86_400;
const SECS_PER_WEEK: u64 = 604_800;

/// Format a duration in seconds as `"1w 2d 03h 04m 05s"`.
///
/// Missing or non-finite input yields an empty string; zero yields `"0s"`.
/// Fractional seconds are truncated.
pub fn format_duration(seconds: Option<f64>) -> String {
    let Some(seconds) = seconds.filter(|s| s.is_finite()) else {
        return String::new();
    };
    let mut remaining = seconds.max(0.0) as u64;
    if remaining == 0 {
        return "0s".to_string();
    }

    let mut parts = Vec::new();
    let weeks = remaining / SECS_PER_WEEK;
    if weeks > 0 {
        parts.push(format!("{weeks}w"));
        remaining %= SECS_PER_WEEK;
    }
    let days = remaining / SECS_PER_DAY;
    if days > 0 {
        parts.push(format!("{days}d"));
        remaining %= SECS_PER_DAY;
    }
    let hours = remaining / SECS_PER_HOUR;
    if hours > 0 {
        parts.push(format!("{hours:02}h"));
        remaining %= SECS_PER_HOUR;
    }
    let minutes = remaining / SECS_PER_MIN;
    if minutes > 0 {
        parts.push(format!("{minutes:02}m"));
        remaining %= SECS_PER_MIN;
    }
    if remaining > 0 || parts.is_empty() {
        parts.push(format!("{remaining:02}s"));
    }
    parts.join(" ")
}
