//! Roll history command.

use std::collections::BTreeMap;

use poise::serenity_prelude::{CreateEmbed, CreateEmbedFooter};
use poise::CreateReply;
use tracing::error;

use crate::catalog::{Catalog, Rarity};
use crate::commands::reply_unavailable;
use crate::database::{count_by_rarity, RollEvent};
use crate::types::{Context, Error};

/// Discord's limit on embed fields.
const MAX_FIELDS: usize = 25;

/// `⚪ Common: 2 | 🔵 Uncommon: 0 ...` on two lines.
fn rarity_summary(counts: &BTreeMap<Rarity, u64>) -> String {
    let entry = |rarity: Rarity| {
        format!(
            "{} {}: {}",
            rarity.marker(),
            rarity,
            counts.get(&rarity).copied().unwrap_or(0)
        )
    };
    format!(
        "{} | {} | {}\n{} | {}",
        entry(Rarity::Common),
        entry(Rarity::Uncommon),
        entry(Rarity::Rare),
        entry(Rarity::Legendary),
        entry(Rarity::Mythic)
    )
}

fn history_embed(rolls: &[RollEvent], catalog: &Catalog) -> CreateEmbed {
    let counts = count_by_rarity(rolls);
    let mut embed = CreateEmbed::new()
        .title("🍎 Your Fruit Roll History")
        .description(format!(
            "**Total Rolls:** {}\n\n**By Rarity:**\n{}",
            rolls.len(),
            rarity_summary(&counts)
        ))
        .colour(0x9B59B6u32);

    for (index, roll) in rolls.iter().take(MAX_FIELDS).enumerate() {
        let emoji = catalog.lookup(&roll.item_name).map(|f| f.emoji.as_str()).unwrap_or("🍎");
        embed = embed.field(
            format!("{}. {} {} {}", index + 1, roll.rarity_tier.marker(), emoji, roll.item_name),
            format!("<t:{}:R>", roll.rolled_at.timestamp()),
            true,
        );
    }

    if rolls.len() > MAX_FIELDS {
        embed = embed.footer(CreateEmbedFooter::new(format!(
            "Showing {} of {} rolls",
            MAX_FIELDS,
            rolls.len()
        )));
    }

    embed
}

/// View all your rolled fruits
#[poise::command(slash_command)]
pub async fn fruits(context: Context<'_>) -> Result<(), Error> {
    let data = context.data();
    let user_id = context.author().id.get();

    let rolls = match data.engine.user_history(user_id).await {
        Ok(rolls) => rolls,
        Err(e) => {
            error!(user_id, error = %e, "Failed to load roll history");
            return reply_unavailable(context).await;
        }
    };

    let embed = if rolls.is_empty() {
        CreateEmbed::new()
            .title("📊 Your Fruit Rolls")
            .description("You haven't logged any fruit rolls yet!\n\nUse `/fruit-roll` to log your first roll.")
            .colour(0x3498DBu32)
    } else {
        history_embed(&rolls, data.engine.catalog())
    };

    context.send(CreateReply::default().embed(embed).ephemeral(true)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rarity_summary_lists_every_tier() {
        let mut counts = BTreeMap::new();
        counts.insert(Rarity::Mythic, 3);
        let summary = rarity_summary(&counts);
        assert!(summary.contains("🔴 Mythic: 3"));
        assert!(summary.contains("⚪ Common: 0"));
        assert_eq!(summary.lines().count(), 2);
    }
}
