//! Discord bot commands.
//!
//! This module contains all available bot commands organized by functionality.

pub mod admin;
pub mod fruits;
pub mod notifications;
pub mod rarity;
pub mod roll;

pub use admin::{stats_link, suspend, sync_members};
pub use fruits::fruits;
pub use notifications::{awake, sleep};
pub use rarity::rarity_stats;
pub use roll::fruit_roll;

use poise::serenity_prelude::User;

use crate::types::{Context, Error};

/// Every command the framework registers.
pub fn all() -> Vec<poise::Command<crate::types::Data, Error>> {
    vec![
        fruit_roll(),
        fruits(),
        sleep(),
        awake(),
        rarity_stats(),
        stats_link(),
        suspend(),
        sync_members(),
    ]
}

/// Name stored on the user record: global display name, falling back to the username.
pub(crate) fn display_name(user: &User) -> String {
    user.global_name.clone().unwrap_or_else(|| user.name.clone())
}

/// Ephemeral "try again later" reply for storage failures.
pub(crate) async fn reply_unavailable(context: Context<'_>) -> Result<(), Error> {
    context
        .send(
            poise::CreateReply::default()
                .content("❌ Something went wrong on our side. Please try again later.")
                .ephemeral(true),
        )
        .await?;
    Ok(())
}
