//! Global rarity distribution command.

use poise::serenity_prelude::CreateEmbed;
use poise::CreateReply;
use tracing::error;

use crate::catalog::Rarity;
use crate::commands::reply_unavailable;
use crate::types::{Context, Error};

/// Share of `count` in `total` as a percentage, one decimal.
fn percentage(count: u64, total: u64) -> String {
    if total == 0 {
        return "0.0%".to_string();
    }
    format!("{:.1}%", count as f64 * 100.0 / total as f64)
}

/// Show how often each rarity has been rolled
#[poise::command(slash_command, rename = "rarity-stats")]
pub async fn rarity_stats(context: Context<'_>) -> Result<(), Error> {
    let distribution = match context.data().engine.rarity_distribution().await {
        Ok(distribution) => distribution,
        Err(e) => {
            error!(error = %e, "Failed to load rarity distribution");
            return reply_unavailable(context).await;
        }
    };

    let total: u64 = distribution.values().sum();
    let mut embed = CreateEmbed::new()
        .title("📈 Rarity Distribution")
        .description(format!("**Total Rolls:** {}", total))
        .colour(0x9B59B6u32);

    for rarity in Rarity::ALL {
        let count = distribution.get(&rarity).copied().unwrap_or(0);
        embed = embed.field(
            format!("{} {}", rarity.marker(), rarity),
            format!("{} ({})", count, percentage(count, total)),
            true,
        );
    }

    context.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(0, 0), "0.0%");
        assert_eq!(percentage(1, 3), "33.3%");
        assert_eq!(percentage(4, 4), "100.0%");
    }
}
