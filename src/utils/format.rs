//! Human-readable rendering of durations.

use chrono::TimeDelta;

/// Format a remaining cooldown as `Xh Ym`, rounding partial minutes up.
///
/// A cooldown with 30 seconds left still reads `0h 1m`, never `0h 0m`.
///
/// # Examples
///
/// ```
/// use chrono::TimeDelta;
/// use rolltracker::utils::format::format_remaining;
///
/// assert_eq!(format_remaining(TimeDelta::minutes(119)), "1h 59m");
/// assert_eq!(format_remaining(TimeDelta::seconds(30)), "0h 1m");
/// ```
pub fn format_remaining(remaining: TimeDelta) -> String {
    let secs = remaining.num_seconds().max(0);
    let minutes = (secs + 59) / 60;
    format!("{}h {}m", minutes / 60, minutes % 60)
}

/// Format process uptime as `Xd Yh Zm`.
pub fn format_uptime(uptime: TimeDelta) -> String {
    let minutes = uptime.num_minutes().max(0);
    format!("{}d {}h {}m", minutes / (24 * 60), (minutes / 60) % 24, minutes % 60)
}
