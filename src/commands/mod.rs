//! Slash command registration

pub mod slash;

use anyhow::Result;
use log::info;
use serenity::model::application::command::Command;
use serenity::model::id::GuildId;
use serenity::prelude::*;

/// Register commands for a single guild (development mode; updates apply
/// immediately)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    let definitions = slash::create_all_commands();
    let count = definitions.len();

    guild_id
        .set_application_commands(&ctx.http, |commands| {
            for definition in definitions {
                commands.add_application_command(definition);
            }
            commands
        })
        .await?;

    info!("Registered {count} commands for guild {guild_id}");
    Ok(())
}

/// Register commands globally (production mode; Discord may take up to an
/// hour to propagate)
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    let definitions = slash::create_all_commands();
    let count = definitions.len();

    Command::set_global_application_commands(&ctx.http, |commands| {
        for definition in definitions {
            commands.add_application_command(definition);
        }
        commands
    })
    .await?;

    info!("Registered {count} commands globally");
    Ok(())
}
