//! Fruit roll command.
//!
//! Checks eligibility, walks the user through an ephemeral button menu to
//! pick the fruit they rolled, then commits the roll and announces it in the
//! notification channel.

use std::time::Duration;

use chrono::Utc;
use poise::serenity_prelude::{
    ButtonStyle, ComponentInteractionCollector, CreateActionRow, CreateButton, CreateEmbed,
    CreateEmbedFooter, CreateInteractionResponse, CreateInteractionResponseMessage,
};
use poise::{CreateReply, ReplyHandle};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::catalog::{Catalog, Rarity};
use crate::commands::{display_name, reply_unavailable};
use crate::cooldown::{RejectReason, RollDecision};
use crate::error::RollTrackerError;
use crate::selection::{ItemSource, MenuAction, SelectionFlow, SelectionStep, SelectionTicket};
use crate::types::{Context, Error};
use crate::utils::format::format_remaining;

const COLOUR_MENU: u32 = 0x3498DB;
const COLOUR_WARNING: u32 = 0xE67E22;
const COLOUR_BLOCKED: u32 = 0xE74C3C;

const BUTTONS_PER_ROW: usize = 5;
const FALLBACK_EMOJI: &str = "🍎";

/// Log your fruit roll
#[poise::command(slash_command, rename = "fruit-roll")]
pub async fn fruit_roll(context: Context<'_>) -> Result<(), Error> {
    let data = context.data();
    let user_id = context.author().id.get();
    let name = display_name(context.author());

    match data.engine.attempt_roll(user_id, &name, Utc::now()).await {
        Ok(RollDecision::Accepted) => {}
        Ok(RollDecision::Rejected(reason)) => {
            context
                .send(CreateReply::default().embed(rejection_embed(reason)).ephemeral(true))
                .await?;
            return Ok(());
        }
        Err(e) => {
            // Fail closed
            error!(user_id, error = %e, "Roll attempt failed");
            return reply_unavailable(context).await;
        }
    }

    let ticket = data.selections.begin(user_id).await;
    let outcome = run_selection(context, ticket).await;
    data.selections.finish(ticket).await;

    let (reply, selection) = outcome?;
    let Some(item_name) = selection else {
        return Ok(());
    };

    match data.engine.commit_roll(user_id, &name, &item_name, Utc::now()).await {
        Ok(event) => {
            let fruit = data.engine.catalog().lookup(&event.item_name);
            let emoji = fruit.map(|f| f.emoji.as_str()).unwrap_or(FALLBACK_EMOJI);
            let embed = CreateEmbed::new()
                .title("✅ Roll Logged!")
                .description(format!(
                    "You rolled {} **{}** {} ({})",
                    event.rarity_tier.marker(),
                    event.item_name,
                    emoji,
                    event.rarity_tier
                ))
                .field(
                    "⏰ Next Roll",
                    format!("Available in {}", format_remaining(data.engine.cooldown())),
                    false,
                )
                .colour(event.rarity_tier.colour());
            reply.edit(context, CreateReply::default().embed(embed).components(Vec::new())).await?;

            if let Some(fruit) = fruit {
                if let Err(e) = data.notifier.broadcast_roll_result(user_id, fruit).await {
                    warn!(user_id, error = %e, "Failed to broadcast roll result");
                }
            }
        }
        Err(RollTrackerError::RollRejected(reason)) => {
            reply
                .edit(context, CreateReply::default().embed(rejection_embed(reason)).components(Vec::new()))
                .await?;
        }
        Err(e) => {
            error!(user_id, item = %item_name, error = %e, "Roll commit failed");
            reply
                .edit(
                    context,
                    CreateReply::default()
                        .embed(
                            CreateEmbed::new()
                                .title("❌ Roll Not Saved")
                                .description("Your roll could not be saved. Please try again later.")
                                .colour(COLOUR_BLOCKED),
                        )
                        .components(Vec::new()),
                )
                .await?;
        }
    }

    Ok(())
}

/// Drive the menu until the user picks a fruit, the deadline passes or a
/// newer menu supersedes this one.
async fn run_selection<'a>(
    context: Context<'a>,
    ticket: SelectionTicket,
) -> Result<(ReplyHandle<'a>, Option<String>), Error> {
    let data = context.data();
    let catalog = data.engine.catalog();
    let timeout = data.config.selection_timeout();
    let deadline = Instant::now() + timeout;
    let prefix = format!("roll:{}:", ticket.session_id);

    let mut flow = SelectionFlow::new(catalog);
    let reply = context
        .send(
            CreateReply::default()
                .embed(menu_embed(&flow, timeout))
                .components(menu_components(&flow, catalog, &prefix))
                .ephemeral(true),
        )
        .await?;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            flow.abandon();
            break;
        }

        let filter_prefix = prefix.clone();
        let press = ComponentInteractionCollector::new(context.serenity_context())
            .author_id(context.author().id)
            .timeout(remaining)
            .filter(move |press| press.data.custom_id.starts_with(&filter_prefix))
            .await;

        let Some(press) = press else {
            flow.abandon();
            break;
        };

        if !data.selections.is_current(ticket).await {
            debug!(user_id = ticket.user_id, "Click on superseded roll menu");
            flow.abandon();
            press
                .create_response(
                    context.serenity_context(),
                    CreateInteractionResponse::UpdateMessage(
                        CreateInteractionResponseMessage::new()
                            .embed(
                                CreateEmbed::new()
                                    .title("🎲 Menu Closed")
                                    .description("You opened a newer roll menu. Use that one instead.")
                                    .colour(COLOUR_WARNING),
                            )
                            .components(Vec::new()),
                    ),
                )
                .await?;
            return Ok((reply, None));
        }

        if let Some(action) = press.data.custom_id.strip_prefix(&prefix).and_then(MenuAction::decode) {
            flow.click(action);
        }

        if flow.is_finished() {
            press
                .create_response(context.serenity_context(), CreateInteractionResponse::Acknowledge)
                .await?;
            break;
        }

        press
            .create_response(
                context.serenity_context(),
                CreateInteractionResponse::UpdateMessage(
                    CreateInteractionResponseMessage::new()
                        .embed(menu_embed(&flow, timeout))
                        .components(menu_components(&flow, catalog, &prefix)),
                ),
            )
            .await?;
    }

    if flow.step() == &SelectionStep::Abandoned {
        debug!(user_id = ticket.user_id, "Roll menu timed out");
        reply
            .edit(context, CreateReply::default().embed(menu_embed(&flow, timeout)).components(Vec::new()))
            .await?;
    }

    Ok((reply, flow.selection().map(str::to_string)))
}

fn rejection_embed(reason: RejectReason) -> CreateEmbed {
    match reason {
        RejectReason::Suspended => CreateEmbed::new()
            .title("🚫 Rolling Suspended")
            .description("Your account is currently suspended from logging rolls.")
            .colour(COLOUR_BLOCKED),
        RejectReason::OnCooldown { remaining } => CreateEmbed::new()
            .title("⏰ Roll On Cooldown")
            .description(format!("Your next roll is available in **{}**.", format_remaining(remaining)))
            .field("💤 Reminders", "You'll be pinged when it's ready unless you used `/sleep`.", false)
            .colour(COLOUR_WARNING),
    }
}

fn menu_embed(flow: &SelectionFlow, timeout: Duration) -> CreateEmbed {
    let minutes = timeout.as_secs().div_ceil(60).max(1);
    let footer = CreateEmbedFooter::new(format!("⏱️ You have {} minutes to select your fruit", minutes));

    let embed = match flow.step() {
        SelectionStep::ChooseMode => CreateEmbed::new()
            .title("🎲 Log Your Fruit Roll")
            .description("How would you like to browse fruits?")
            .field("🔤 Alphabetical", "Browse all fruits A-Z", true)
            .field("⭐ By Rarity", "Browse by rarity tier", true)
            .colour(COLOUR_MENU),
        SelectionStep::ChoosePage => CreateEmbed::new()
            .title("🎲 Select Your Fruit Roll - Alphabetical")
            .description("Choose a page to view fruits in alphabetical order:")
            .colour(COLOUR_MENU),
        SelectionStep::ChooseRarity => CreateEmbed::new()
            .title("🎲 Select Your Fruit Roll - By Rarity")
            .description("Choose a rarity category:")
            .colour(COLOUR_MENU),
        SelectionStep::ChooseItem { source, items } => {
            let (title, colour) = match source {
                ItemSource::Page(page) => (
                    format!("🎲 Select Your Fruit - Page {}/{}", page + 1, flow.pages().len()),
                    COLOUR_MENU,
                ),
                ItemSource::Rarity(rarity) => (format!("🎲 {} {} Fruits", rarity.marker(), rarity), rarity.colour()),
            };
            CreateEmbed::new()
                .title(title)
                .description(format!("Choose the fruit you rolled:\n\n{}", items.join(", ")))
                .colour(colour)
        }
        SelectionStep::Selected(name) => {
            return CreateEmbed::new()
                .title("🎲 Logging Roll")
                .description(format!("Saving **{}**...", name))
                .colour(COLOUR_MENU)
        }
        SelectionStep::Abandoned => {
            return CreateEmbed::new()
                .title("⏱️ Selection Timed Out")
                .description("No fruit was logged. Run `/fruit-roll` again when you're ready.")
                .colour(COLOUR_WARNING)
        }
    };

    embed.footer(footer)
}

fn menu_button(prefix: &str, action: MenuAction, label: String, style: ButtonStyle) -> CreateButton {
    CreateButton::new(format!("{}{}", prefix, action.encode()))
        .label(label)
        .style(style)
}

/// Label like `Page 1 (Blade-Gas)`.
fn page_label(index: usize, page: &[String]) -> String {
    match (page.first(), page.last()) {
        (Some(first), Some(last)) => format!("Page {} ({}-{})", index + 1, first, last),
        _ => format!("Page {}", index + 1),
    }
}

fn menu_components(flow: &SelectionFlow, catalog: &Catalog, prefix: &str) -> Vec<CreateActionRow> {
    let buttons: Vec<CreateButton> = match flow.step() {
        SelectionStep::ChooseMode => vec![
            menu_button(prefix, MenuAction::Alphabetical, "🔤 Alphabetical".to_string(), ButtonStyle::Primary),
            menu_button(prefix, MenuAction::ByRarity, "⭐ By Rarity".to_string(), ButtonStyle::Primary),
        ],
        SelectionStep::ChoosePage => flow
            .pages()
            .iter()
            .enumerate()
            .map(|(index, page)| {
                menu_button(prefix, MenuAction::Page(index), page_label(index, page), ButtonStyle::Primary)
            })
            .collect(),
        SelectionStep::ChooseRarity => Rarity::ALL
            .into_iter()
            .filter(|rarity| !catalog.by_rarity(*rarity).is_empty())
            .map(|rarity| {
                let label = format!("{} {}", rarity.marker(), rarity);
                menu_button(prefix, MenuAction::Tier(rarity), label, ButtonStyle::Primary)
            })
            .collect(),
        SelectionStep::ChooseItem { items, .. } => items
            .iter()
            .map(|name| {
                let emoji = catalog.lookup(name).map(|f| f.emoji.as_str()).unwrap_or(FALLBACK_EMOJI);
                let label = format!("{} {}", emoji, name);
                menu_button(prefix, MenuAction::Pick(name.clone()), label, ButtonStyle::Secondary)
            })
            .collect(),
        SelectionStep::Selected(_) | SelectionStep::Abandoned => return Vec::new(),
    };

    let mut rows: Vec<CreateActionRow> = buttons
        .chunks(BUTTONS_PER_ROW)
        .map(|chunk| CreateActionRow::Buttons(chunk.to_vec()))
        .collect();

    if flow.step() != &SelectionStep::ChooseMode {
        rows.push(CreateActionRow::Buttons(vec![menu_button(
            prefix,
            MenuAction::Back,
            "⬅️ Back".to_string(),
            ButtonStyle::Danger,
        )]));
    }

    rows
}
