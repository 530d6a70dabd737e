//! Slash command definitions, grouped by area

pub mod activity;
pub mod admin;
pub mod utility;

use serenity::builder::CreateApplicationCommand;

/// All command definitions the bot registers
pub fn create_all_commands() -> Vec<CreateApplicationCommand> {
    let mut commands = Vec::new();
    commands.extend(activity::create_commands());
    commands.extend(admin::create_commands());
    commands.extend(utility::create_commands());
    commands
}
