//! Configuration management for the roll tracker.
//!
//! This module handles loading and validating environment variables and application settings.

use std::env;
use std::time::Duration;

use chrono::TimeDelta;
use tracing::warn;

use crate::error::{RollTrackerError, Result};
use crate::utils::validation::{
    parse_discord_id, parse_discord_id_list, parse_port, parse_positive_secs, MAX_DURATION_SECS,
};

const DEFAULT_STATS_USER: &str = "admin";
const DEFAULT_STATS_PASS: &str = "changeme";

/// Configuration for the application, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Discord bot token
    pub discord_token: String,
    /// Path to SQLite database file
    pub db_path: String,
    /// Channel that receives roll broadcasts and reminders
    pub notification_channel_id: u64,
    /// Discord user allowed to run operator commands
    pub owner_id: Option<u64>,
    /// Basic auth user for the stats dashboard
    pub stats_user: String,
    /// Basic auth password for the stats dashboard
    pub stats_pass: String,
    /// Port for the health/stats HTTP server
    pub port: u16,
    pub roll_cooldown_secs: u64,
    pub sweep_interval_secs: u64,
    pub selection_timeout_secs: u64,
    /// Users greeted in the notification channel once the bot is connected
    pub announce_user_ids: Vec<u64>,
    /// Fallback log filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This will attempt to load a .env file if present using dotenv,
    /// then read required environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required environment variable is missing or invalid.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rolltracker::config::Config;
    ///
    /// let config = Config::from_env().expect("Failed to load configuration");
    /// println!("Dashboard port: {}", config.port);
    /// ```
    pub fn from_env() -> Result<Self> {
        // Optional; the environment may already carry everything
        dotenv::dotenv().ok();

        let discord_token = env::var("DISCORD_TOKEN").map_err(|_| {
            RollTrackerError::Config(
                "Missing DISCORD_TOKEN environment variable. Set it in your environment or create a .env file (never commit this file).".to_string(),
            )
        })?;

        let db_path = Self::get_db_path()?;

        let notification_channel_id = env::var("NOTIFICATION_CHANNEL_ID")
            .map_err(|_| {
                RollTrackerError::Config(
                    "Missing NOTIFICATION_CHANNEL_ID environment variable. Set it to the id of the channel that receives roll results and reminders.".to_string(),
                )
            })
            .and_then(|value| parse_discord_id("NOTIFICATION_CHANNEL_ID", &value))?;

        let owner_id = optional_var("OWNER_ID")
            .map(|value| parse_discord_id("OWNER_ID", &value))
            .transpose()?;

        let stats_user = optional_var("STATS_USER").unwrap_or_else(|| DEFAULT_STATS_USER.to_string());
        let stats_pass = optional_var("STATS_PASS").unwrap_or_else(|| DEFAULT_STATS_PASS.to_string());

        let port = optional_var("PORT")
            .map(|value| parse_port("PORT", &value))
            .transpose()?
            .unwrap_or(10000);

        let roll_cooldown_secs = Self::get_secs("ROLL_COOLDOWN_SECS", 2 * 60 * 60)?;
        let sweep_interval_secs = Self::get_secs("SWEEP_INTERVAL_SECS", 60)?;
        let selection_timeout_secs = Self::get_secs("SELECTION_TIMEOUT_SECS", 180)?;

        let announce_user_ids = optional_var("ANNOUNCE_USER_IDS")
            .map(|value| parse_discord_id_list("ANNOUNCE_USER_IDS", &value))
            .transpose()?
            .unwrap_or_default();

        let log_level = optional_var("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let config = Self {
            discord_token,
            db_path,
            notification_channel_id,
            owner_id,
            stats_user,
            stats_pass,
            port,
            roll_cooldown_secs,
            sweep_interval_secs,
            selection_timeout_secs,
            announce_user_ids,
            log_level,
        };
        config.roll_cooldown()?;
        Ok(config)
    }

    /// Log a warning for settings that are insecure but allowed.
    ///
    /// Called after logging is initialized, since `from_env` runs before it.
    pub fn warn_on_insecure_defaults(&self) {
        if self.stats_user == DEFAULT_STATS_USER || self.stats_pass == DEFAULT_STATS_PASS {
            warn!("Stats dashboard is using default credentials; set STATS_USER and STATS_PASS");
        }
        if self.owner_id.is_none() {
            warn!("OWNER_ID is not set; operator commands are limited to the application owner");
        }
    }

    /// Cooldown applied after each committed roll.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if `roll_cooldown_secs` is zero or above
    /// [`MAX_DURATION_SECS`].
    pub fn roll_cooldown(&self) -> Result<TimeDelta> {
        let out_of_range = || {
            RollTrackerError::Config(format!(
                "ROLL_COOLDOWN_SECS must be between 1 and {} seconds, got {}",
                MAX_DURATION_SECS, self.roll_cooldown_secs
            ))
        };

        if self.roll_cooldown_secs == 0 || self.roll_cooldown_secs > MAX_DURATION_SECS {
            return Err(out_of_range());
        }
        let secs = i64::try_from(self.roll_cooldown_secs).map_err(|_| out_of_range())?;
        TimeDelta::try_seconds(secs).ok_or_else(out_of_range)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn selection_timeout(&self) -> Duration {
        Duration::from_secs(self.selection_timeout_secs)
    }

    /// Get the database path from environment or use default.
    fn get_db_path() -> Result<String> {
        match env::var("DB_PATH") {
            Ok(path) => Ok(path),
            Err(_) => {
                let mut path = env::current_dir().map_err(|e| {
                    RollTrackerError::Config(format!("Failed to determine current directory: {}", e))
                })?;

                path.push("data");
                path.push("rolltracker.db");

                path.into_os_string().into_string().map_err(|os_str| {
                    RollTrackerError::Config(format!("Database path contains invalid Unicode: {:?}", os_str))
                })
            }
        }
    }

    fn get_secs(name: &str, default: u64) -> Result<u64> {
        match optional_var(name) {
            Some(value) => parse_positive_secs(name, &value),
            None => Ok(default),
        }
    }
}

/// Read an env var, treating empty values as unset.
fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_get_db_path_with_env_var() {
        // Save original value (if any)
        let original_value = env::var("DB_PATH").ok();

        let custom_path = "/custom/path/to/rolls.db";
        env::set_var("DB_PATH", custom_path);

        let result = Config::get_db_path();
        assert_eq!(result.unwrap(), custom_path);

        match original_value {
            Some(val) => env::set_var("DB_PATH", val),
            None => env::remove_var("DB_PATH"),
        }
    }

    #[test]
    fn test_get_secs_default_and_override() {
        let name = "ROLLTRACKER_TEST_SECS";

        env::remove_var(name);
        assert_eq!(Config::get_secs(name, 60).unwrap(), 60);

        env::set_var(name, "90");
        assert_eq!(Config::get_secs(name, 60).unwrap(), 90);

        env::set_var(name, "0");
        assert!(Config::get_secs(name, 60).is_err());

        // Blank counts as unset
        env::set_var(name, "  ");
        assert_eq!(Config::get_secs(name, 60).unwrap(), 60);

        env::remove_var(name);
    }

    fn config_with_cooldown(roll_cooldown_secs: u64) -> Config {
        Config {
            discord_token: "token".to_string(),
            db_path: "rolls.db".to_string(),
            notification_channel_id: 1,
            owner_id: None,
            stats_user: "admin".to_string(),
            stats_pass: "changeme".to_string(),
            port: 10000,
            roll_cooldown_secs,
            sweep_interval_secs: 60,
            selection_timeout_secs: 180,
            announce_user_ids: Vec::new(),
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_durations() {
        let config = config_with_cooldown(7200);

        assert_eq!(config.roll_cooldown().unwrap(), TimeDelta::hours(2));
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
        assert_eq!(config.selection_timeout(), Duration::from_secs(180));
    }

    #[test]
    fn test_roll_cooldown_rejects_out_of_range_values() {
        assert_eq!(
            config_with_cooldown(MAX_DURATION_SECS).roll_cooldown().unwrap(),
            TimeDelta::days(365)
        );

        // Would wrap to a negative cooldown if cast
        assert!(matches!(
            config_with_cooldown(u64::MAX).roll_cooldown(),
            Err(RollTrackerError::Config(_))
        ));
        // Out of range for TimeDelta
        assert!(matches!(
            config_with_cooldown(10_000_000_000_000_000).roll_cooldown(),
            Err(RollTrackerError::Config(_))
        ));
        assert!(config_with_cooldown(MAX_DURATION_SECS + 1).roll_cooldown().is_err());
        assert!(config_with_cooldown(0).roll_cooldown().is_err());
    }

    #[test]
    fn test_get_secs_rejects_huge_values() {
        let name = "ROLLTRACKER_TEST_HUGE_SECS";

        for value in ["18446744073709551615", "10000000000000000", "31536001"] {
            env::set_var(name, value);
            assert!(
                matches!(Config::get_secs(name, 60), Err(RollTrackerError::Config(_))),
                "{} should be rejected",
                value
            );
        }

        env::set_var(name, "31536000");
        assert_eq!(Config::get_secs(name, 60).unwrap(), MAX_DURATION_SECS);

        env::remove_var(name);
    }
}
