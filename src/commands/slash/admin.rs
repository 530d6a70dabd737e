//! Admin slash commands: /adjust, /panel, /signature_admin, /signature_cooldown

use serenity::builder::CreateApplicationCommand;
use serenity::model::application::command::CommandOptionType;
use serenity::model::permissions::Permissions;

/// Creates admin commands
pub fn create_commands() -> Vec<CreateApplicationCommand> {
    vec![
        create_adjust_command(),
        create_panel_command(),
        create_signature_admin_command(),
        create_signature_cooldown_command(),
    ]
}

/// Creates the adjust command (admin) - signed counter deltas with a confirm step
fn create_adjust_command() -> CreateApplicationCommand {
    CreateApplicationCommand::default()
        .name("adjust")
        .description("Increase or decrease a member's activity counters (Admin)")
        .default_member_permissions(Permissions::MANAGE_GUILD)
        .create_option(|option| {
            option
                .name("user")
                .description("Member whose counters to adjust")
                .kind(CommandOptionType::User)
                .required(true)
        })
        .create_option(|option| {
            option
                .name("messages")
                .description("Signed message-count delta")
                .kind(CommandOptionType::Integer)
                .required(false)
        })
        .create_option(|option| {
            option
                .name("reactions")
                .description("Signed reaction-count delta")
                .kind(CommandOptionType::Integer)
                .required(false)
        })
        .create_option(|option| {
            option
                .name("seconds")
                .description("Signed voice-time delta in seconds")
                .kind(CommandOptionType::Integer)
                .required(false)
        })
        .to_owned()
}

/// Creates the panel command (admin) - posts an interactive picker panel
fn create_panel_command() -> CreateApplicationCommand {
    CreateApplicationCommand::default()
        .name("panel")
        .description("Post an interactive panel and persist it across restarts (Admin)")
        .default_member_permissions(Permissions::MANAGE_GUILD)
        .create_option(|option| {
            option
                .name("category")
                .description("Which panel to post")
                .kind(CommandOptionType::String)
                .required(true)
                .add_string_choice("Achievement roles", "achievement_roles")
                .add_string_choice("Star sign", "star_sign")
                .add_string_choice("MBTI", "mbti")
                .add_string_choice("Gender", "gender")
                .add_string_choice("Signature", "signature")
        })
        .create_option(|option| {
            option
                .name("channel")
                .description("Target channel (defaults to current channel)")
                .kind(CommandOptionType::Channel)
                .required(false)
        })
        .to_owned()
}

/// Creates the signature_admin command (admin)
fn create_signature_admin_command() -> CreateApplicationCommand {
    CreateApplicationCommand::default()
        .name("signature_admin")
        .description("Inspect or manage a member's signature (Admin)")
        .default_member_permissions(Permissions::MANAGE_GUILD)
        .create_option(|option| {
            option
                .name("action")
                .description("What to do")
                .kind(CommandOptionType::String)
                .required(true)
                .add_string_choice("Inspect", "inspect")
                .add_string_choice("Clear text", "clear")
                .add_string_choice("Disable changes", "disable")
                .add_string_choice("Enable changes", "enable")
        })
        .create_option(|option| {
            option
                .name("user")
                .description("Member to act on")
                .kind(CommandOptionType::User)
                .required(true)
        })
        .to_owned()
}

/// Creates the signature_cooldown command (admin) - takes effect without restart
fn create_signature_cooldown_command() -> CreateApplicationCommand {
    CreateApplicationCommand::default()
        .name("signature_cooldown")
        .description("Set the signature change cooldown in minutes (Admin)")
        .default_member_permissions(Permissions::MANAGE_GUILD)
        .create_option(|option| {
            option
                .name("minutes")
                .description("Cooldown window per change slot")
                .kind(CommandOptionType::Integer)
                .required(true)
                .min_int_value(1)
        })
        .to_owned()
}
