//! Discord gateway entry point
//!
//! Wires the event ingestors (messages, reactions, voice sessions) to the
//! counter store and dispatches slash commands, component presses, and
//! modal submits to their handlers.

use anyhow::Result;
use dotenvy::dotenv;
use log::{error, info, warn};
use once_cell::sync::OnceCell;
use serenity::async_trait;
use serenity::model::application::interaction::Interaction;
use serenity::model::channel::{Message, Reaction};
use serenity::model::gateway::Ready;
use serenity::model::guild::Member;
use serenity::model::id::GuildId;
use serenity::model::voice::VoiceState;
use serenity::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use waypoint::command_handler::CommandHandler;
use waypoint::commands::{register_global_commands, register_guild_commands};
use waypoint::message_components::MessageComponentHandler;
use waypoint::views::restore_views;
use waypoint::{shop_gateway_from, Catalog, Config, Database, SignatureService, VoiceTracker};

/// Our own user id, set on the first Ready; reactions from the bot itself
/// are not counted
static BOT_USER_ID: OnceCell<u64> = OnceCell::new();

/// Guards command registration and view restore against gateway reconnects
static STARTUP_DONE: AtomicBool = AtomicBool::new(false);

struct Handler {
    database: Database,
    voice_tracker: VoiceTracker,
    command_handler: Arc<CommandHandler>,
    component_handler: Arc<MessageComponentHandler>,
    guild_id: Option<GuildId>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, _ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        if let Err(e) = self.database.record_message(&msg.author.id.to_string()).await {
            error!("Failed to record message for user {}: {e}", msg.author.id);
        }
    }

    async fn reaction_add(&self, _ctx: Context, reaction: Reaction) {
        let user_id = match reaction.user_id {
            Some(user_id) => user_id,
            None => return,
        };
        if BOT_USER_ID.get() == Some(&user_id.0) {
            return;
        }

        if let Err(e) = self.database.record_reaction(&user_id.to_string()).await {
            error!("Failed to record reaction for user {user_id}: {e}");
        }
    }

    async fn voice_state_update(&self, _ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        if let Err(e) = self.voice_tracker.handle_update(old.as_ref(), &new).await {
            error!("Failed to handle voice update for user {}: {e}", new.user_id);
        }
    }

    async fn guild_member_addition(&self, _ctx: Context, new_member: Member) {
        // Counter rows are created lazily on first activity; nothing to do yet
        info!("Member {} joined guild {}", new_member.user.id, new_member.guild_id);
    }

    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("{} is connected and ready!", ready.user.name);
        info!("Connected to {} guilds", ready.guilds.len());
        let _ = BOT_USER_ID.set(ready.user.id.0);

        if STARTUP_DONE.swap(true, Ordering::SeqCst) {
            info!("Skipping startup tasks (reconnect)");
            return;
        }

        // Register slash commands
        if let Some(guild_id) = self.guild_id {
            info!("Development mode: Registering commands for guild {guild_id}");
            if let Err(e) = register_guild_commands(&ctx, guild_id).await {
                error!("Failed to register guild slash commands: {e}");
            }
        } else {
            info!("Production mode: Registering commands globally");
            if let Err(e) = register_global_commands(&ctx).await {
                error!("Failed to register global slash commands: {e}");
            }
        }

        // Verify persisted panels, pruning the ones whose messages are gone
        if let Err(e) = restore_views(&ctx.http, &self.database).await {
            error!("Failed to restore persisted views: {e}");
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::ApplicationCommand(command) => {
                if let Err(e) = self
                    .command_handler
                    .handle_slash_command(&ctx, &command)
                    .await
                {
                    error!(
                        "Error handling slash command '{}': {}",
                        command.data.name, e
                    );

                    let error_message =
                        "Sorry, I encountered an error processing your command. Please try again.";

                    #[allow(clippy::redundant_pattern_matching)]
                    if let Err(_) = command
                        .edit_original_interaction_response(&ctx.http, |response| {
                            response.content(error_message)
                        })
                        .await
                    {
                        let _ = command
                            .create_interaction_response(&ctx.http, |response| {
                                response
                                    .kind(serenity::model::application::interaction::InteractionResponseType::ChannelMessageWithSource)
                                    .interaction_response_data(|message| {
                                        message.content(error_message).ephemeral(true)
                                    })
                            })
                            .await;
                    }
                }
            }
            Interaction::MessageComponent(component) => {
                if let Err(e) = self
                    .component_handler
                    .handle_component_interaction(&ctx, &component)
                    .await
                {
                    error!(
                        "Error handling component interaction '{}': {}",
                        component.data.custom_id, e
                    );

                    let _ = component
                        .create_interaction_response(&ctx.http, |response| {
                            response
                                .kind(serenity::model::application::interaction::InteractionResponseType::ChannelMessageWithSource)
                                .interaction_response_data(|message| {
                                    message
                                        .content("Sorry, I encountered an error processing your interaction. Please try again.")
                                        .ephemeral(true)
                                })
                        })
                        .await;
                }
            }
            Interaction::ModalSubmit(modal) => {
                if let Err(e) = self
                    .component_handler
                    .handle_modal_submit(&ctx, &modal)
                    .await
                {
                    error!(
                        "Error handling modal submit '{}': {}",
                        modal.data.custom_id, e
                    );

                    let _ = modal
                        .create_interaction_response(&ctx.http, |response| {
                            response
                                .kind(serenity::model::application::interaction::InteractionResponseType::ChannelMessageWithSource)
                                .interaction_response_data(|message| {
                                    message
                                        .content("Sorry, I encountered an error processing your submission. Please try again.")
                                        .ephemeral(true)
                                })
                        })
                        .await;
                }
            }
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.log_level),
    )
    .init();

    info!("Starting Waypoint Discord Bot...");

    let database = Database::new(&config.database_path).await?;
    let catalog = Arc::new(Catalog::load(&config.catalog_path)?);
    let shop = shop_gateway_from(config.shop_api_url.as_deref());
    let signature = SignatureService::new(database.clone(), catalog.signature.clone());

    let command_handler = CommandHandler::new(
        database.clone(),
        catalog.clone(),
        shop.clone(),
        signature.clone(),
    );
    let component_handler = MessageComponentHandler::new(
        database.clone(),
        catalog.clone(),
        shop.clone(),
        signature.clone(),
    );

    // Parse guild ID for dev mode
    let guild_id = config
        .discord_guild_id
        .as_ref()
        .and_then(|id| id.parse::<u64>().ok())
        .map(GuildId);

    let handler = Handler {
        database: database.clone(),
        voice_tracker: VoiceTracker::new(database),
        command_handler: Arc::new(command_handler),
        component_handler: Arc::new(component_handler),
        guild_id,
    };

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MEMBERS;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .await
        .map_err(|e| {
            error!("Failed to create Discord client: {e}");
            anyhow::anyhow!("Client creation failed: {}", e)
        })?;

    // Graceful shutdown on Ctrl+C
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down...");
                shard_manager.lock().await.shutdown_all().await;
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {e}");
            }
        }
    });

    info!("Connecting to Discord gateway...");

    client.start().await.map_err(|e| {
        error!("Gateway connection failed: {e}");
        anyhow::anyhow!("Gateway connection failed: {}", e)
    })?;

    warn!("Gateway loop exited");
    Ok(())
}
