//! Validation utilities for configuration and user input.

use crate::error::{RollTrackerError, Result};

/// Parse a Discord snowflake id.
///
/// Ids must be non-zero unsigned integers. `name` is only used in the error
/// message.
///
/// # Examples
///
/// ```
/// use rolltracker::utils::validation::parse_discord_id;
///
/// assert_eq!(parse_discord_id("OWNER_ID", "123456789").unwrap(), 123456789);
/// assert!(parse_discord_id("OWNER_ID", "0").is_err());
/// assert!(parse_discord_id("OWNER_ID", "abc").is_err());
/// ```
pub fn parse_discord_id(name: &str, value: &str) -> Result<u64> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err(RollTrackerError::Config(format!("{} must not be 0", name))),
        Ok(id) => Ok(id),
        Err(_) => Err(RollTrackerError::Config(format!(
            "Invalid {}: '{}'. Expected a numeric Discord id.",
            name, value
        ))),
    }
}

/// Parse a comma-separated list of Discord ids, skipping empty entries.
pub fn parse_discord_id_list(name: &str, value: &str) -> Result<Vec<u64>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| parse_discord_id(name, part))
        .collect()
}

/// Upper bound for any configured duration (one year).
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Parse a strictly positive number of seconds, at most [`MAX_DURATION_SECS`].
///
/// # Examples
///
/// ```
/// use rolltracker::utils::validation::{parse_positive_secs, MAX_DURATION_SECS};
///
/// assert_eq!(parse_positive_secs("ROLL_COOLDOWN_SECS", "7200").unwrap(), 7200);
/// assert!(parse_positive_secs("ROLL_COOLDOWN_SECS", &(MAX_DURATION_SECS + 1).to_string()).is_err());
/// ```
pub fn parse_positive_secs(name: &str, value: &str) -> Result<u64> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err(RollTrackerError::Config(format!("{} must be greater than 0", name))),
        Ok(secs) if secs > MAX_DURATION_SECS => Err(RollTrackerError::Config(format!(
            "{} must be at most {} seconds, got {}",
            name, MAX_DURATION_SECS, secs
        ))),
        Ok(secs) => Ok(secs),
        Err(_) => Err(RollTrackerError::Config(format!(
            "Invalid {}: '{}'. Expected a whole number of seconds.",
            name, value
        ))),
    }
}

/// Parse a TCP port.
pub fn parse_port(name: &str, value: &str) -> Result<u16> {
    value.trim().parse::<u16>().map_err(|_| {
        RollTrackerError::Config(format!("Invalid {}: '{}'. Expected a port number.", name, value))
    })
}
