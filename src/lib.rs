//! Fruit roll tracker library.
//!
//! This library provides the core functionality for the roll tracker Discord bot:
//! per-user roll cooldowns, the roll ledger, cooldown reminders and the
//! health/stats web pages.

pub mod bot;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod cooldown;
pub mod database;
pub mod error;
pub mod logging;
pub mod notify;
pub mod selection;
pub mod stats;
pub mod sweeper;
pub mod types;
pub mod utils;
pub mod web;

pub use config::Config;
pub use error::{RollTrackerError, Result};
