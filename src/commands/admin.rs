//! Operator commands.
//!
//! Restricted to the framework's owners (`OWNER_ID` plus the application owner).

use chrono::Utc;
use poise::serenity_prelude::{self as serenity, CreateEmbed, UserId};
use poise::CreateReply;
use tracing::{error, info};

use crate::commands::reply_unavailable;
use crate::error::RollTrackerError;
use crate::types::{Context, Error};

/// Page size for the guild member listing endpoint.
const MEMBER_PAGE_SIZE: u64 = 1000;

/// [OWNER] Get the stats page credentials
#[poise::command(slash_command, rename = "stats-link", owners_only)]
pub async fn stats_link(context: Context<'_>) -> Result<(), Error> {
    let config = &context.data().config;

    let embed = CreateEmbed::new()
        .title("📊 Stats Page Access")
        .description("Here are your stats page credentials:")
        .field("Username", format!("`{}`", config.stats_user), false)
        .field("Password", format!("`{}`", config.stats_pass), false)
        .field("URL", format!("Go to `/stats` on your bot URL (port {})", config.port), false)
        .colour(0x3498DBu32);

    context.send(CreateReply::default().embed(embed).ephemeral(true)).await?;
    Ok(())
}

/// [OWNER] Suspend or unsuspend a user from rolling
#[poise::command(slash_command, owners_only)]
pub async fn suspend(
    context: Context<'_>,
    #[description = "User to update"] user: serenity::User,
    #[description = "True to suspend, false to lift the suspension"] suspended: bool,
) -> Result<(), Error> {
    let message = match context.data().engine.suspend_user(user.id.get(), suspended).await {
        Ok(record) if record.suspended => format!("🚫 **{}** can no longer log rolls.", record.display_name),
        Ok(record) => format!("✅ **{}** can log rolls again.", record.display_name),
        Err(RollTrackerError::NotFound(_)) => {
            format!("❌ <@{}> has never used the bot, so there is nothing to update.", user.id)
        }
        Err(e) => {
            error!(user_id = user.id.get(), error = %e, "Failed to update suspension");
            return reply_unavailable(context).await;
        }
    };

    context.send(CreateReply::default().content(message).ephemeral(true)).await?;
    Ok(())
}

/// [OWNER] Create records for every member of this server
#[poise::command(slash_command, rename = "sync-members", owners_only, guild_only)]
pub async fn sync_members(context: Context<'_>) -> Result<(), Error> {
    let Some(guild_id) = context.guild_id() else {
        return Ok(());
    };
    context.defer_ephemeral().await?;

    let mut members = Vec::new();
    let mut after: Option<UserId> = None;
    loop {
        let page = guild_id.members(context.http(), Some(MEMBER_PAGE_SIZE), after).await?;
        let fetched = page.len() as u64;
        after = page.last().map(|member| member.user.id);

        members.extend(
            page.iter()
                .filter(|member| !member.user.bot)
                .map(|member| (member.user.id.get(), member.display_name().to_string())),
        );

        if fetched < MEMBER_PAGE_SIZE {
            break;
        }
    }

    let total = members.len();
    info!(guild_id = %guild_id, total, "Syncing guild members");

    let message = match context.data().engine.sync_members(members, Utc::now()).await {
        Ok(created) => format!("✅ Synced {} members ({} new records).", total, created),
        Err(e) => {
            error!(guild_id = %guild_id, error = %e, "Member sync failed");
            "❌ Member sync failed. Please try again later.".to_string()
        }
    };

    context.send(CreateReply::default().content(message).ephemeral(true)).await?;
    Ok(())
}
