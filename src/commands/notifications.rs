//! Reminder opt-out and opt-in commands.

use chrono::Utc;
use poise::serenity_prelude::CreateEmbed;
use poise::CreateReply;
use tracing::error;

use crate::commands::{display_name, reply_unavailable};
use crate::types::{Context, Error};

async fn set_reminders(context: Context<'_>, enabled: bool) -> Result<(), Error> {
    let user_id = context.author().id.get();
    let name = display_name(context.author());

    if let Err(e) = context
        .data()
        .engine
        .toggle_notifications(user_id, &name, enabled, Utc::now())
        .await
    {
        error!(user_id, enabled, error = %e, "Failed to update reminder preference");
        return reply_unavailable(context).await;
    }

    let embed = if enabled {
        CreateEmbed::new()
            .title("☀️ Awake Mode Enabled")
            .description("You will now receive fruit roll reminder pings!")
            .field("Sleep Mode", "Use `/sleep` to disable reminder pings", false)
            .colour(0x2ECC71u32)
    } else {
        CreateEmbed::new()
            .title("💤 Sleep Mode Enabled")
            .description("You will no longer receive fruit roll reminder pings.")
            .field("Wake Up", "Use `/awake` to re-enable reminder pings", false)
            .colour(0x3498DBu32)
    };

    context.send(CreateReply::default().embed(embed).ephemeral(true)).await?;
    Ok(())
}

/// Disable fruit roll reminders
#[poise::command(slash_command)]
pub async fn sleep(context: Context<'_>) -> Result<(), Error> {
    set_reminders(context, false).await
}

/// Enable fruit roll reminders
#[poise::command(slash_command)]
pub async fn awake(context: Context<'_>) -> Result<(), Error> {
    set_reminders(context, true).await
}
