use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use poise::serenity_prelude::{self as serenity, FullEvent, UserId};
use tracing::{error, info, warn};

use crate::catalog::Catalog;
use crate::commands;
use crate::config::Config;
use crate::cooldown::CooldownEngine;
use crate::database::{init_db, RollLedger, UsageLog, UserRepository};
use crate::logging;
use crate::notify::ChannelNotifier;
use crate::selection::PendingSelections;
use crate::stats::BotStats;
use crate::sweeper::ReminderSweeper;
use crate::types::{Data, Error};
use crate::web::{self, Credentials, WebState};

pub async fn run() -> Result<(), Error> {
    let config = Config::from_env()?;
    logging::init(&config.log_level)?;
    config.warn_on_insecure_defaults();

    // Creates the file and tables if needed
    init_db(&config.db_path).await?;

    let stats = Arc::new(BotStats::new(Utc::now()));
    stats.seed_total_rolls(RollLedger::new(config.db_path.clone()).total_rolls().await?);

    let web_state = WebState::new(
        &config.db_path,
        stats.clone(),
        Credentials {
            user: config.stats_user.clone(),
            pass: config.stats_pass.clone(),
        },
    );
    let port = config.port;
    tokio::spawn(async move {
        if let Err(e) = web::serve(web_state, port).await {
            error!(port, error = %e, "HTTP server stopped");
        }
    });

    let roll_cooldown = config.roll_cooldown()?;
    let owners: HashSet<UserId> = config.owner_id.map(UserId::new).into_iter().collect();
    let token = config.discord_token.clone();
    // Member sync needs the privileged members intent
    let intents = serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::GUILD_MEMBERS;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            owners,
            pre_command: |context| {
                Box::pin(async move {
                    let user_id = context.author().id.get();
                    let command = context.command().name.clone();
                    info!(user_id, command = %command, "Command invoked");
                    if let Err(e) = context.data().usage.record(&command, user_id, Utc::now()).await {
                        warn!(user_id, command = %command, error = %e, "Failed to record command usage");
                    }
                })
            },
            event_handler: |context, event, _framework, data| {
                Box::pin(async move {
                    if let FullEvent::GuildCreate { .. } | FullEvent::GuildDelete { .. } = event {
                        data.stats.set_guild_count(context.cache.guild_count());
                    }
                    Ok(())
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    error!("Poise error: {}", error);
                    if let Err(e) = poise::builtins::on_error(error).await {
                        error!("Error while handling error: {:?}", e);
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |context, ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(context, &framework.options().commands).await?;
                stats.set_guild_count(ready.guilds.len());
                info!(user = %ready.user.name, guilds = ready.guilds.len(), "Connected to Discord");

                let notifier = ChannelNotifier::new(context.http.clone(), config.notification_channel_id);

                let sweeper = Arc::new(ReminderSweeper::new(
                    UserRepository::new(config.db_path.clone()),
                    Arc::new(notifier.clone()),
                ));
                sweeper.spawn(config.sweep_interval());

                if let Err(e) = notifier
                    .announce_startup(&config.announce_user_ids, roll_cooldown.num_hours())
                    .await
                {
                    warn!(error = %e, "Failed to send startup announcement");
                }

                let engine = CooldownEngine::new(
                    &config.db_path,
                    Catalog::standard(),
                    roll_cooldown,
                    stats.clone(),
                );

                Ok(Data {
                    engine: Arc::new(engine),
                    selections: PendingSelections::default(),
                    usage: UsageLog::new(config.db_path.clone()),
                    stats,
                    notifier,
                    config,
                })
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(token, intents).framework(framework).await?;

    info!("Starting Discord client");
    client.start().await?;

    Ok(())
}
