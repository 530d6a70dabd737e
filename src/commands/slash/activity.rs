//! Activity slash commands: /progress, /leaderboard

use serenity::builder::CreateApplicationCommand;
use serenity::model::application::command::CommandOptionType;

/// Creates activity commands
pub fn create_commands() -> Vec<CreateApplicationCommand> {
    vec![create_progress_command(), create_leaderboard_command()]
}

/// Creates the progress command
fn create_progress_command() -> CreateApplicationCommand {
    CreateApplicationCommand::default()
        .name("progress")
        .description("Show achievement progress for yourself or another member")
        .create_option(|option| {
            option
                .name("user")
                .description("Member to inspect (defaults to you)")
                .kind(CommandOptionType::User)
                .required(false)
        })
        .to_owned()
}

/// Creates the leaderboard command
fn create_leaderboard_command() -> CreateApplicationCommand {
    CreateApplicationCommand::default()
        .name("leaderboard")
        .description("Show the top 10 members for a metric")
        .create_option(|option| {
            option
                .name("metric")
                .description("Which metric to rank by")
                .kind(CommandOptionType::String)
                .required(true)
                .add_string_choice("Messages", "messages")
                .add_string_choice("Reactions", "reactions")
                .add_string_choice("Voice minutes", "voice_minutes")
        })
        .to_owned()
}
