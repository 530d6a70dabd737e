//! Utility slash commands: /ping, /help, /version

use serenity::builder::CreateApplicationCommand;

/// Creates utility commands
pub fn create_commands() -> Vec<CreateApplicationCommand> {
    vec![
        create_ping_command(),
        create_help_command(),
        create_version_command(),
    ]
}

/// Creates the ping command
fn create_ping_command() -> CreateApplicationCommand {
    CreateApplicationCommand::default()
        .name("ping")
        .description("Test bot responsiveness")
        .to_owned()
}

/// Creates the help command
fn create_help_command() -> CreateApplicationCommand {
    CreateApplicationCommand::default()
        .name("help")
        .description("Show available commands and usage information")
        .to_owned()
}

/// Creates the version command
fn create_version_command() -> CreateApplicationCommand {
    CreateApplicationCommand::default()
        .name("version")
        .description("Show bot version and recent changes")
        .to_owned()
}
