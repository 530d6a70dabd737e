//! Component and modal dispatch: achievement ladder buttons, categorical
//! pickers, signature edit/view, and the admin adjust confirm step. Role
//! state is fetched fresh from Discord on every press, so a retried press
//! recomputes the full transition instead of replaying a stale one.

use crate::catalog::{AchievementKind, Catalog, PickerCategory};
use crate::database::Database;
use crate::progress::{progress_count, ShopGateway};
use crate::roles::{
    ensure_participation_role, is_permission_denied, reconcile_tier_roles, toggle_exclusive_role,
    PickOutcome, TierOutcome,
};
use crate::signature::{RotateOutcome, SignatureService, ViewOutcome};
use crate::views::{ACHV_PREFIX, PICK_PREFIX, SIG_EDIT, SIG_INPUT, SIG_MODAL, SIG_VIEW};
use anyhow::Result;
use log::{error, warn};
use serenity::model::application::component::{ActionRowComponent, InputTextStyle};
use serenity::model::application::interaction::message_component::MessageComponentInteraction;
use serenity::model::application::interaction::modal::ModalSubmitInteraction;
use serenity::model::application::interaction::InteractionResponseType;
use serenity::model::id::{GuildId, UserId};
use serenity::prelude::*;
use std::sync::Arc;

/// Prefix for the admin adjust confirm/cancel buttons.
/// Format: `adjust:ok:<invoker>:<target>:<Δmsg>:<Δreact>:<Δsec>` / `adjust:no:<invoker>`
pub const ADJUST_PREFIX: &str = "adjust:";

pub struct MessageComponentHandler {
    database: Database,
    catalog: Arc<Catalog>,
    shop: Arc<dyn ShopGateway>,
    signature: SignatureService,
}

impl MessageComponentHandler {
    pub fn new(
        database: Database,
        catalog: Arc<Catalog>,
        shop: Arc<dyn ShopGateway>,
        signature: SignatureService,
    ) -> Self {
        MessageComponentHandler {
            database,
            catalog,
            shop,
            signature,
        }
    }

    pub async fn handle_component_interaction(
        &self,
        ctx: &Context,
        component: &MessageComponentInteraction,
    ) -> Result<()> {
        let custom_id = component.data.custom_id.clone();

        if let Some(kind_str) = custom_id.strip_prefix(ACHV_PREFIX) {
            return self.handle_achievement_press(ctx, component, kind_str).await;
        }
        if let Some(rest) = custom_id.strip_prefix(PICK_PREFIX) {
            return self.handle_pick_press(ctx, component, rest).await;
        }
        if custom_id == SIG_EDIT {
            return self.handle_signature_edit(ctx, component).await;
        }
        if custom_id == SIG_VIEW {
            return self.handle_signature_view(ctx, component).await;
        }
        if let Some(rest) = custom_id.strip_prefix(ADJUST_PREFIX) {
            return self.handle_adjust_decision(ctx, component, rest).await;
        }

        warn!("Unknown component custom_id: {custom_id}");
        ephemeral_reply(ctx, component, "That control is no longer supported.").await
    }

    /// Tiered achievement ladder press
    async fn handle_achievement_press(
        &self,
        ctx: &Context,
        component: &MessageComponentInteraction,
        kind_str: &str,
    ) -> Result<()> {
        let guild_id = require_guild(component)?;
        let user_id = component.user.id;

        let kind = match AchievementKind::from_str(kind_str) {
            Some(kind) => kind,
            None => {
                warn!("Achievement press with unknown kind '{kind_str}'");
                return ephemeral_reply(ctx, component, "That achievement category no longer exists.")
                    .await;
            }
        };

        // Fresh role state every press; no local copy is kept
        let member = guild_id.member(&ctx.http, user_id).await?;

        if let Err(e) = ensure_participation_role(
            &ctx.http,
            guild_id,
            user_id,
            &member.roles,
            self.catalog.participation_role,
        )
        .await
        {
            // Opt-in marker only; the press itself still proceeds
            warn!("Could not grant participation role to {user_id}: {e}");
        }

        let count = progress_count(
            &self.database,
            self.shop.as_ref(),
            &user_id.to_string(),
            kind,
        )
        .await?;

        let ladder = self.catalog.ladder(kind);
        let declared = self.catalog.ladder_role_ids(kind);

        let notice = match reconcile_tier_roles(
            &ctx.http,
            guild_id,
            user_id,
            &member.roles,
            &ladder,
            &declared,
            count,
        )
        .await
        {
            Ok(outcome) => tier_notice(kind, &outcome),
            Err(e) => permission_or_bubble(e, user_id, "achievement role update")?,
        };

        ephemeral_reply(ctx, component, &notice).await
    }

    /// Categorical picker press: `<category>:<option_id>`
    async fn handle_pick_press(
        &self,
        ctx: &Context,
        component: &MessageComponentInteraction,
        rest: &str,
    ) -> Result<()> {
        let guild_id = require_guild(component)?;
        let user_id = component.user.id;

        let (category_str, option_id) = match rest.split_once(':') {
            Some(parts) => parts,
            None => {
                warn!("Malformed pick custom_id: {rest}");
                return ephemeral_reply(ctx, component, "That control is no longer supported.").await;
            }
        };

        let set = PickerCategory::from_str(category_str)
            .and_then(|category| self.catalog.picker(category));
        let set = match set {
            Some(set) => set,
            None => {
                return ephemeral_reply(ctx, component, "That picker is no longer configured.").await
            }
        };

        let member = guild_id.member(&ctx.http, user_id).await?;

        if set.grants_participation {
            if let Err(e) = ensure_participation_role(
                &ctx.http,
                guild_id,
                user_id,
                &member.roles,
                self.catalog.participation_role,
            )
            .await
            {
                warn!("Could not grant participation role to {user_id}: {e}");
            }
        }

        let notice = match toggle_exclusive_role(
            &ctx.http,
            guild_id,
            user_id,
            &member.roles,
            &set.options,
            option_id,
        )
        .await
        {
            Ok(outcome) => pick_notice(&outcome),
            Err(e) => permission_or_bubble(e, user_id, "picker role update")?,
        };

        ephemeral_reply(ctx, component, &notice).await
    }

    /// Signature edit button: gate first, then show the input modal
    async fn handle_signature_edit(
        &self,
        ctx: &Context,
        component: &MessageComponentInteraction,
    ) -> Result<()> {
        let guild_id = require_guild(component)?;
        let user_id = component.user.id;
        let member = guild_id.member(&ctx.http, user_id).await?;

        if let Some(rejection) = self
            .signature
            .gate(&user_id.to_string(), &member.roles)
            .await?
        {
            return ephemeral_reply(ctx, component, &rotate_notice(&rejection)).await;
        }

        component
            .create_interaction_response(&ctx.http, |response| {
                response
                    .kind(InteractionResponseType::Modal)
                    .interaction_response_data(|data| {
                        data.custom_id(SIG_MODAL)
                            .title("Edit signature")
                            .components(|c| {
                                c.create_action_row(|row| {
                                    row.create_input_text(|input| {
                                        input
                                            .custom_id(SIG_INPUT)
                                            .label("Signature")
                                            .style(InputTextStyle::Paragraph)
                                            .max_length(200)
                                            .required(true)
                                    })
                                })
                            })
                    })
            })
            .await?;
        Ok(())
    }

    async fn handle_signature_view(
        &self,
        ctx: &Context,
        component: &MessageComponentInteraction,
    ) -> Result<()> {
        let outcome = self
            .signature
            .view(&component.user.id.to_string())
            .await?;

        let notice = match outcome {
            ViewOutcome::Disabled => "Signature changes are disabled for your account.".to_string(),
            ViewOutcome::Signature { text, remaining } => match text {
                Some(text) => format!(
                    "Your signature: {text}\n{remaining} change(s) available in this window."
                ),
                None => format!(
                    "You have no signature yet. {remaining} change(s) available in this window."
                ),
            },
        };

        ephemeral_reply(ctx, component, &notice).await
    }

    /// Modal submit carrying the new signature text
    pub async fn handle_modal_submit(
        &self,
        ctx: &Context,
        modal: &ModalSubmitInteraction,
    ) -> Result<()> {
        if modal.data.custom_id != SIG_MODAL {
            warn!("Unknown modal custom_id: {}", modal.data.custom_id);
            return Ok(());
        }

        let guild_id = modal
            .guild_id
            .ok_or_else(|| anyhow::anyhow!("Modal submitted outside a guild"))?;
        let user_id = modal.user.id;

        let mut text = None;
        for row in &modal.data.components {
            for input in &row.components {
                if let ActionRowComponent::InputText(input) = input {
                    if input.custom_id == SIG_INPUT {
                        text = Some(input.value.clone());
                    }
                }
            }
        }
        let text = text.ok_or_else(|| anyhow::anyhow!("Signature modal missing text input"))?;

        let member = guild_id.member(&ctx.http, user_id).await?;
        let outcome = self
            .signature
            .rotate(&user_id.to_string(), &member.roles, text.trim())
            .await?;

        let notice = rotate_notice(&outcome);
        modal
            .create_interaction_response(&ctx.http, |response| {
                response
                    .kind(InteractionResponseType::ChannelMessageWithSource)
                    .interaction_response_data(|message| message.content(notice).ephemeral(true))
            })
            .await?;
        Ok(())
    }

    /// Confirm/cancel step of the admin adjust command
    async fn handle_adjust_decision(
        &self,
        ctx: &Context,
        component: &MessageComponentInteraction,
        rest: &str,
    ) -> Result<()> {
        let parts: Vec<&str> = rest.split(':').collect();

        let (verdict, invoker) = match parts.as_slice() {
            ["ok", invoker, ..] | ["no", invoker] => (parts[0], *invoker),
            _ => {
                warn!("Malformed adjust custom_id: {rest}");
                return ephemeral_reply(ctx, component, "That control is no longer supported.").await;
            }
        };

        if component.user.id.to_string() != invoker {
            return ephemeral_reply(
                ctx,
                component,
                "Only the admin who initiated this adjustment can confirm it.",
            )
            .await;
        }

        if verdict == "no" {
            return update_message(ctx, component, "Adjustment cancelled.").await;
        }

        let (target, d_messages, d_reactions, d_seconds) = match parts.as_slice() {
            ["ok", _, target, dm, dr, ds] => {
                match (dm.parse::<i64>(), dr.parse::<i64>(), ds.parse::<i64>()) {
                    (Ok(dm), Ok(dr), Ok(ds)) => (target.to_string(), dm, dr, ds),
                    _ => {
                        warn!("Unparseable adjust deltas in custom_id: {rest}");
                        return ephemeral_reply(ctx, component, "That control is no longer supported.")
                            .await;
                    }
                }
            }
            _ => {
                warn!("Malformed adjust confirm custom_id: {rest}");
                return ephemeral_reply(ctx, component, "That control is no longer supported.").await;
            }
        };

        self.database
            .adjust_activity(&target, d_messages, d_reactions, d_seconds)
            .await?;

        // Echo post-adjust values so a decrement below zero is visible
        let activity = self.database.activity(&target).await?;
        let summary = format!(
            "Adjusted <@{target}>: messages {:+}, reactions {:+}, voice seconds {:+}.\n\
             Now at {} messages, {} reactions, {} voice minutes.",
            d_messages,
            d_reactions,
            d_seconds,
            activity.message_count,
            activity.reaction_count,
            activity.voice_minutes()
        );

        update_message(ctx, component, &summary).await
    }
}

// ============================================================================
// Notices
// ============================================================================

fn tier_notice(kind: AchievementKind, outcome: &TierOutcome) -> String {
    match outcome {
        TierOutcome::NoProgress => {
            format!("No recorded progress for {} yet.", kind.display_name())
        }
        TierOutcome::NotYetEligible { count, next_threshold } => format!(
            "No achievement yet - {} of {} needed for the first {} tier.",
            count,
            next_threshold,
            kind.display_name()
        ),
        TierOutcome::Removed { name } => format!("Removed **{name}**."),
        TierOutcome::Upgraded { name } => format!("Upgraded to **{name}**."),
        TierOutcome::Awarded { name } => format!("Awarded **{name}**!"),
    }
}

fn pick_notice(outcome: &PickOutcome) -> String {
    match outcome {
        PickOutcome::Cleared { label } => format!("Cleared **{label}**."),
        PickOutcome::Switched { label } => format!("Switched to **{label}**."),
        PickOutcome::Selected { label } => format!("Selected **{label}**."),
    }
}

fn rotate_notice(outcome: &RotateOutcome) -> String {
    match outcome {
        RotateOutcome::Updated { remaining } => format!(
            "Signature updated. {remaining} change(s) available in this window."
        ),
        RotateOutcome::Disabled => "Signature changes are disabled for your account.".to_string(),
        RotateOutcome::NotEligible { minutes, required } => format!(
            "You need {required} voice minutes to change your signature; you have {minutes}."
        ),
        RotateOutcome::NoSlot { current } => match current {
            Some(text) => format!(
                "All three change slots are still cooling down. Your signature stays: {text}"
            ),
            None => "All three change slots are still cooling down.".to_string(),
        },
    }
}

// ============================================================================
// Reply Helpers
// ============================================================================

fn require_guild(component: &MessageComponentInteraction) -> Result<GuildId> {
    component
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Component pressed outside a guild"))
}

/// Permission errors become an actionable notice; everything else bubbles
fn permission_or_bubble(err: anyhow::Error, user_id: UserId, operation: &str) -> Result<String> {
    match err.downcast::<serenity::Error>() {
        Ok(se) if is_permission_denied(&se) => {
            error!("Permission denied during {operation} for user {user_id}: {se}");
            Ok("I don't have permission to manage that role. Ask an admin to move my role above the managed ones.".to_string())
        }
        Ok(se) => Err(se.into()),
        Err(other) => Err(other),
    }
}

async fn ephemeral_reply(
    ctx: &Context,
    component: &MessageComponentInteraction,
    content: &str,
) -> Result<()> {
    component
        .create_interaction_response(&ctx.http, |response| {
            response
                .kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|message| message.content(content).ephemeral(true))
        })
        .await?;
    Ok(())
}

/// Replace the original message (used to retire the adjust confirm buttons)
async fn update_message(
    ctx: &Context,
    component: &MessageComponentInteraction,
    content: &str,
) -> Result<()> {
    component
        .create_interaction_response(&ctx.http, |response| {
            response
                .kind(InteractionResponseType::UpdateMessage)
                .interaction_response_data(|message| message.content(content).components(|c| c))
        })
        .await?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_notices() {
        let kind = AchievementKind::Message;
        assert!(tier_notice(kind, &TierOutcome::NoProgress).contains("No recorded progress"));
        assert!(tier_notice(
            kind,
            &TierOutcome::NotYetEligible {
                count: 5,
                next_threshold: 10
            }
        )
        .contains("5 of 10"));
        assert!(tier_notice(
            kind,
            &TierOutcome::Awarded {
                name: "Hello!".to_string()
            }
        )
        .contains("Hello!"));
    }

    #[test]
    fn test_rotate_notices() {
        assert!(rotate_notice(&RotateOutcome::Updated { remaining: 2 }).contains("2 change(s)"));
        assert!(rotate_notice(&RotateOutcome::NotEligible {
            minutes: 10,
            required: 600
        })
        .contains("600"));
        // Rejection with a stored signature echoes it back
        assert!(rotate_notice(&RotateOutcome::NoSlot {
            current: Some("o7".to_string())
        })
        .contains("o7"));
    }
}
