//! Messages posted to the notification channel.
//!
//! Roll broadcasts, cooldown reminders and the startup announcement all go to
//! a single configured channel. Sends are fire-and-forget from the caller's
//! point of view: failures come back as `Delivery` errors to be logged.

use std::sync::Arc;

use async_trait::async_trait;
use poise::serenity_prelude::{self as serenity, ChannelId, CreateEmbed, CreateEmbedFooter, CreateMessage, Http};
use tracing::info;

use crate::catalog::Fruit;
use crate::error::{RollTrackerError, Result};
use crate::sweeper::{ReminderEvent, ReminderNotifier};

const COLOUR_GOLD: u32 = 0xF1C40F;
const COLOUR_GREEN: u32 = 0x2ECC71;
const COLOUR_GREY: u32 = 0x95A5A6;

/// Rendered reminder, independent of the Discord builders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderMessage {
    pub title: String,
    pub description: String,
    pub footer: String,
    pub colour: u32,
}

impl ReminderMessage {
    fn to_embed(&self) -> CreateEmbed {
        CreateEmbed::new()
            .title(&self.title)
            .description(&self.description)
            .colour(self.colour)
            .footer(CreateEmbedFooter::new(&self.footer))
    }
}

/// Pick the reminder text for a user from their record's attributes.
pub fn reminder_template(event: &ReminderEvent) -> ReminderMessage {
    let mention = format!("<@{}>", event.user_id);

    if event.suspended {
        return ReminderMessage {
            title: "🎲 Cooldown Complete".to_string(),
            description: format!(
                "{}'s cooldown is complete, but rolling is currently suspended for this account.",
                mention
            ),
            footer: "Ask a bot operator if you think this is a mistake".to_string(),
            colour: COLOUR_GREY,
        };
    }

    if event.total_roll_count <= 1 {
        return ReminderMessage {
            title: "🎲 Your Next Roll Is Ready!".to_string(),
            description: format!(
                "{}'s first cooldown is complete! Use `/fruit-roll` to log your next fruit roll.",
                mention
            ),
            footer: "Reminders arrive here after every cooldown. Use /sleep to turn them off".to_string(),
            colour: COLOUR_GREEN,
        };
    }

    ReminderMessage {
        title: "🎲 Fruit Roll Ready!".to_string(),
        description: format!(
            "{}'s fruit roll cooldown is complete! Use `/fruit-roll` to log your next fruit roll.",
            mention
        ),
        footer: "Use /sleep to disable these reminders".to_string(),
        colour: COLOUR_GOLD,
    }
}

/// Public announcement text for a committed roll.
pub fn roll_broadcast(user_id: u64, fruit: &Fruit) -> String {
    format!(
        "🎲 <@{}> just rolled {} **{}** {} ({})!",
        user_id,
        fruit.rarity.marker(),
        fruit.name,
        fruit.emoji,
        fruit.rarity
    )
}

fn startup_embed(cooldown_hours: i64) -> CreateEmbed {
    CreateEmbed::new()
        .title("🎲 Fruit Roll Tracker is Online!")
        .description("Log your fruit rolls and get reminded when your next roll is ready!")
        .colour(COLOUR_GREEN)
        .field("📝 Get Started", "Use `/fruit-roll` to log your first fruit roll!", false)
        .field(
            "⏰ Reminders",
            format!(
                "You'll be pinged in this channel every {} hours when your next roll is ready!",
                cooldown_hours
            ),
            false,
        )
        .field("💤 Sleep Mode", "`/sleep` - Disable roll reminders\n`/awake` - Enable roll reminders", false)
        .field("📊 View Your Rolls", "Use `/fruits` to see all your rolled fruits!", false)
}

/// Posts to the configured notification channel.
#[derive(Clone)]
pub struct ChannelNotifier {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl ChannelNotifier {
    pub fn new(http: Arc<Http>, channel_id: u64) -> Self {
        Self {
            http,
            channel_id: ChannelId::new(channel_id),
        }
    }

    async fn send(&self, message: CreateMessage) -> Result<()> {
        self.channel_id
            .send_message(&self.http, message)
            .await
            .map(|_| ())
            .map_err(|e: serenity::Error| RollTrackerError::Delivery(e.to_string()))
    }

    pub async fn broadcast_roll_result(&self, user_id: u64, fruit: &Fruit) -> Result<()> {
        self.send(CreateMessage::new().content(roll_broadcast(user_id, fruit))).await
    }

    /// Greet `user_ids` once the bot is connected. Does nothing for an empty list.
    pub async fn announce_startup(&self, user_ids: &[u64], cooldown_hours: i64) -> Result<()> {
        if user_ids.is_empty() {
            return Ok(());
        }

        let mentions = user_ids
            .iter()
            .map(|id| format!("<@{}>", id))
            .collect::<Vec<_>>()
            .join(" ");

        self.send(CreateMessage::new().content(mentions).embed(startup_embed(cooldown_hours)))
            .await?;
        info!(channel_id = %self.channel_id, users = user_ids.len(), "Sent startup announcement");
        Ok(())
    }
}

#[async_trait]
impl ReminderNotifier for ChannelNotifier {
    async fn deliver_reminder(&self, event: &ReminderEvent) -> Result<()> {
        let message = reminder_template(event);
        self.send(
            CreateMessage::new()
                .content(format!("<@{}>", event.user_id))
                .embed(message.to_embed()),
        )
        .await?;
        info!(user_id = event.user_id, name = %event.display_name, "Sent roll reminder");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, Rarity};

    fn event(suspended: bool, total_roll_count: u32) -> ReminderEvent {
        ReminderEvent {
            user_id: 42,
            display_name: "tester".to_string(),
            suspended,
            total_roll_count,
        }
    }

    #[test]
    fn test_reminder_template_by_attributes() {
        let regular = reminder_template(&event(false, 5));
        assert_eq!(regular.title, "🎲 Fruit Roll Ready!");
        assert!(regular.description.starts_with("<@42>"));

        let first = reminder_template(&event(false, 1));
        assert_ne!(first, regular);
        assert!(first.description.contains("first cooldown"));

        // Suspension takes priority over the first-roll variant
        let suspended = reminder_template(&event(true, 1));
        assert!(suspended.description.contains("suspended"));
        assert_eq!(suspended.colour, COLOUR_GREY);
    }

    #[test]
    fn test_roll_broadcast() {
        let catalog = Catalog::standard();
        let dragon = catalog.lookup("Dragon").unwrap();
        assert_eq!(dragon.rarity, Rarity::Mythic);

        let text = roll_broadcast(7, dragon);
        assert!(text.starts_with("🎲 <@7> just rolled"));
        assert!(text.contains("**Dragon**"));
        assert!(text.ends_with("(Mythic)!"));
    }
}
