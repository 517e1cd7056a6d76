//! Type definitions and aliases for the bot.
//!
//! This module contains shared types used throughout the application.

use std::sync::Arc;

use crate::config::Config;
use crate::cooldown::CooldownEngine;
use crate::database::UsageLog;
use crate::notify::ChannelNotifier;
use crate::selection::PendingSelections;
use crate::stats::BotStats;

/// Bot application data shared across all commands.
///
/// This data is accessible in all command handlers through the context.
pub struct Data {
    pub engine: Arc<CooldownEngine>,
    /// Open roll menus, one per user
    pub selections: PendingSelections,
    pub usage: UsageLog,
    pub stats: Arc<BotStats>,
    /// Posts roll results to the notification channel
    pub notifier: ChannelNotifier,
    pub config: Config,
}

/// Error type for bot commands (maintains compatibility with poise).
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// Command context type alias for easier usage.
pub type Context<'a> = poise::Context<'a, Data, Error>;
