//! Slash command dispatch: progress queries, leaderboards, admin counter
//! adjustments (with a confirm step), panel management, and signature
//! administration.

use crate::catalog::{Catalog, PickerCategory};
use crate::database::{ActivityMetric, Database};
use crate::message_components::ADJUST_PREFIX;
use crate::progress::{evaluate, progress_count, ShopGateway};
use crate::roles::{is_not_found, is_permission_denied};
use crate::signature::SignatureService;
use crate::views;
use anyhow::Result;
use log::{error, info};
use serenity::model::application::component::ButtonStyle;
use serenity::model::application::interaction::application_command::{
    ApplicationCommandInteraction, CommandDataOptionValue,
};
use serenity::model::application::interaction::InteractionResponseType;
use serenity::model::id::{ChannelId, UserId};
use serenity::prelude::*;
use std::sync::Arc;

pub struct CommandHandler {
    database: Database,
    catalog: Arc<Catalog>,
    shop: Arc<dyn ShopGateway>,
    signature: SignatureService,
}

impl CommandHandler {
    pub fn new(
        database: Database,
        catalog: Arc<Catalog>,
        shop: Arc<dyn ShopGateway>,
        signature: SignatureService,
    ) -> Self {
        CommandHandler {
            database,
            catalog,
            shop,
            signature,
        }
    }

    pub async fn handle_slash_command(
        &self,
        ctx: &Context,
        command: &ApplicationCommandInteraction,
    ) -> Result<()> {
        info!(
            "Slash command '{}' from user {}",
            command.data.name, command.user.id
        );

        match command.data.name.as_str() {
            "progress" => self.handle_progress(ctx, command).await,
            "leaderboard" => self.handle_leaderboard(ctx, command).await,
            "adjust" => self.handle_adjust(ctx, command).await,
            "panel" => self.handle_panel(ctx, command).await,
            "signature_admin" => self.handle_signature_admin(ctx, command).await,
            "signature_cooldown" => self.handle_signature_cooldown(ctx, command).await,
            "ping" => reply(ctx, command, "Pong!", false).await,
            "help" => reply(ctx, command, HELP_TEXT, true).await,
            "version" => reply(ctx, command, &version_text(), true).await,
            other => {
                reply(ctx, command, &format!("Unknown command: {other}"), true).await
            }
        }
    }

    /// /progress [user] - achievement progress as an embed
    async fn handle_progress(
        &self,
        ctx: &Context,
        command: &ApplicationCommandInteraction,
    ) -> Result<()> {
        let target = user_option(command, "user").unwrap_or(command.user.id);
        let target_str = target.to_string();

        let mut fields: Vec<(String, String)> = Vec::new();
        for kind in self.catalog.kinds() {
            let count = progress_count(&self.database, self.shop.as_ref(), &target_str, kind).await?;
            let defs: Vec<_> = self.catalog.defs_for(kind).collect();
            let reports = evaluate(&defs, count);

            let mut lines = Vec::new();
            for report in reports {
                let marker = if report.completed { "✅" } else { "▫️" };
                lines.push(format!(
                    "{} {} - {}/{} ({:.0}%)",
                    marker,
                    report.def.name,
                    report.count,
                    report.def.threshold,
                    report.ratio * 100.0
                ));
            }
            fields.push((kind.display_name().to_string(), lines.join("\n")));
        }

        command
            .create_interaction_response(&ctx.http, |response| {
                response
                    .kind(InteractionResponseType::ChannelMessageWithSource)
                    .interaction_response_data(|message| {
                        message.embed(|e| {
                            e.title("Achievement Progress")
                                .description(format!("Progress for <@{target}>"));
                            for (name, value) in &fields {
                                e.field(name, value, false);
                            }
                            e
                        })
                    })
            })
            .await?;
        Ok(())
    }

    /// /leaderboard metric - top 10 for one metric
    async fn handle_leaderboard(
        &self,
        ctx: &Context,
        command: &ApplicationCommandInteraction,
    ) -> Result<()> {
        let metric = match str_option(command, "metric").as_deref() {
            Some("messages") => ActivityMetric::Messages,
            Some("reactions") => ActivityMetric::Reactions,
            Some("voice_minutes") => ActivityMetric::VoiceMinutes,
            _ => return reply(ctx, command, "Unknown metric.", true).await,
        };

        let rows = self.database.top_by(metric, 10).await?;

        let body = if rows.is_empty() {
            "No activity recorded yet.".to_string()
        } else {
            rows.iter()
                .enumerate()
                .map(|(i, (user_id, score))| format!("**{}.** <@{}> - {}", i + 1, user_id, score))
                .collect::<Vec<_>>()
                .join("\n")
        };

        command
            .create_interaction_response(&ctx.http, |response| {
                response
                    .kind(InteractionResponseType::ChannelMessageWithSource)
                    .interaction_response_data(|message| {
                        message.embed(|e| {
                            e.title(format!("Top 10 by {}", metric.label()))
                                .description(body)
                        })
                    })
            })
            .await?;
        Ok(())
    }

    /// /adjust user deltas - two-step: show the pending change with
    /// confirm/cancel buttons, apply only on confirm by the same admin
    async fn handle_adjust(
        &self,
        ctx: &Context,
        command: &ApplicationCommandInteraction,
    ) -> Result<()> {
        let target = match user_option(command, "user") {
            Some(user) => user,
            None => return reply(ctx, command, "A target user is required.", true).await,
        };
        let d_messages = int_option(command, "messages").unwrap_or(0);
        let d_reactions = int_option(command, "reactions").unwrap_or(0);
        let d_seconds = int_option(command, "seconds").unwrap_or(0);

        if d_messages == 0 && d_reactions == 0 && d_seconds == 0 {
            return reply(ctx, command, "Nothing to adjust; all deltas are zero.", true).await;
        }

        let invoker = command.user.id;
        let confirm_id = format!(
            "{ADJUST_PREFIX}ok:{invoker}:{target}:{d_messages}:{d_reactions}:{d_seconds}"
        );
        let cancel_id = format!("{ADJUST_PREFIX}no:{invoker}");

        command
            .create_interaction_response(&ctx.http, |response| {
                response
                    .kind(InteractionResponseType::ChannelMessageWithSource)
                    .interaction_response_data(|message| {
                        message
                            .content(format!(
                                "Adjust counters for <@{target}>?\n\
                                 messages {d_messages:+}, reactions {d_reactions:+}, \
                                 voice seconds {d_seconds:+}"
                            ))
                            .ephemeral(true)
                            .components(|c| {
                                c.create_action_row(|row| {
                                    row.create_button(|b| {
                                        b.custom_id(&confirm_id)
                                            .label("Confirm")
                                            .style(ButtonStyle::Danger)
                                    })
                                    .create_button(|b| {
                                        b.custom_id(&cancel_id)
                                            .label("Cancel")
                                            .style(ButtonStyle::Secondary)
                                    })
                                })
                            })
                    })
            })
            .await?;
        Ok(())
    }

    /// /panel category [channel] - post a picker panel
    async fn handle_panel(
        &self,
        ctx: &Context,
        command: &ApplicationCommandInteraction,
    ) -> Result<()> {
        let category = str_option(command, "category")
            .as_deref()
            .and_then(PickerCategory::from_str);
        let category = match category {
            Some(category) => category,
            None => return reply(ctx, command, "Unknown panel category.", true).await,
        };

        let channel_id = channel_option(command, "channel").unwrap_or(command.channel_id);

        match views::post_panel(&ctx.http, &self.database, &self.catalog, category, channel_id).await
        {
            Ok(()) => {
                reply(
                    ctx,
                    command,
                    &format!("Posted the {} panel in <#{}>.", category.title(), channel_id),
                    true,
                )
                .await
            }
            Err(e) => {
                let notice = match e.downcast_ref::<serenity::Error>() {
                    Some(se) if is_permission_denied(se) => {
                        "I can't post in that channel; check my permissions there.".to_string()
                    }
                    Some(se) if is_not_found(se) => {
                        "That channel no longer exists.".to_string()
                    }
                    _ => {
                        error!("Failed to post panel: {e}");
                        format!("Could not post the panel: {e}")
                    }
                };
                reply(ctx, command, &notice, true).await
            }
        }
    }

    /// /signature_admin action user
    async fn handle_signature_admin(
        &self,
        ctx: &Context,
        command: &ApplicationCommandInteraction,
    ) -> Result<()> {
        let target = match user_option(command, "user") {
            Some(user) => user,
            None => return reply(ctx, command, "A target user is required.", true).await,
        };
        let target_str = target.to_string();

        let notice = match str_option(command, "action").as_deref() {
            Some("inspect") => match self.database.get_signature(&target_str).await? {
                Some(row) => {
                    let slots = row
                        .change_times
                        .iter()
                        .enumerate()
                        .map(|(i, t)| {
                            format!("slot {}: {}", i + 1, t.as_deref().unwrap_or("empty"))
                        })
                        .collect::<Vec<_>>()
                        .join("\n");
                    format!(
                        "Signature for <@{target}>: {}\nDisabled: {}\n{slots}",
                        row.signature.as_deref().unwrap_or("(none)"),
                        row.is_disabled
                    )
                }
                None => format!("<@{target}> has no signature record."),
            },
            Some("clear") => {
                self.database.clear_signature(&target_str).await?;
                format!("Cleared the signature text for <@{target}>.")
            }
            Some("disable") => {
                self.database.set_signature_disabled(&target_str, true).await?;
                format!("Signature changes disabled for <@{target}>.")
            }
            Some("enable") => {
                self.database.set_signature_disabled(&target_str, false).await?;
                format!("Signature changes enabled for <@{target}>.")
            }
            _ => "Unknown action.".to_string(),
        };

        reply(ctx, command, &notice, true).await
    }

    /// /signature_cooldown minutes - applies without restart
    async fn handle_signature_cooldown(
        &self,
        ctx: &Context,
        command: &ApplicationCommandInteraction,
    ) -> Result<()> {
        let minutes = match int_option(command, "minutes") {
            Some(m) if m > 0 => m,
            _ => return reply(ctx, command, "Cooldown must be a positive number of minutes.", true).await,
        };

        self.signature.set_cooldown_minutes(minutes).await?;
        info!("Signature cooldown set to {minutes} minutes");
        reply(
            ctx,
            command,
            &format!("Signature cooldown set to {minutes} minutes."),
            true,
        )
        .await
    }
}

// ============================================================================
// Option Extraction
// ============================================================================

fn user_option(command: &ApplicationCommandInteraction, name: &str) -> Option<UserId> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.resolved.as_ref())
        .and_then(|value| match value {
            CommandDataOptionValue::User(user, _) => Some(user.id),
            _ => None,
        })
}

fn int_option(command: &ApplicationCommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.resolved.as_ref())
        .and_then(|value| match value {
            CommandDataOptionValue::Integer(i) => Some(*i),
            _ => None,
        })
}

fn str_option(command: &ApplicationCommandInteraction, name: &str) -> Option<String> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.resolved.as_ref())
        .and_then(|value| match value {
            CommandDataOptionValue::String(s) => Some(s.clone()),
            _ => None,
        })
}

fn channel_option(command: &ApplicationCommandInteraction, name: &str) -> Option<ChannelId> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.resolved.as_ref())
        .and_then(|value| match value {
            CommandDataOptionValue::Channel(channel) => Some(channel.id),
            _ => None,
        })
}

// ============================================================================
// Replies
// ============================================================================

async fn reply(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    content: &str,
    ephemeral: bool,
) -> Result<()> {
    command
        .create_interaction_response(&ctx.http, |response| {
            response
                .kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|message| message.content(content).ephemeral(ephemeral))
        })
        .await?;
    Ok(())
}

const HELP_TEXT: &str = "\
**Commands**
• `/progress [user]` - achievement progress
• `/leaderboard metric` - top 10 by messages, reactions, or voice minutes
• `/adjust user ...` - admin: signed counter deltas with a confirm step
• `/panel category [channel]` - admin: post an interactive panel
• `/signature_admin action user` - admin: inspect/clear/disable a signature
• `/signature_cooldown minutes` - admin: change the signature cooldown
• `/ping`, `/version`";

fn version_text() -> String {
    let mut text = format!("waypoint v{}", env!("CARGO_PKG_VERSION"));

    let commits = env!("GIT_RECENT_COMMITS");
    if !commits.is_empty() {
        text.push_str("\n**Recent changes**");
        for line in commits.lines().take(5) {
            if let Some((hash, message)) = line.split_once('|') {
                text.push_str(&format!("\n`{hash}` {message}"));
            }
        }
    }

    text
}
