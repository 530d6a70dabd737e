//! # Feature: Interactive Panels
//!
//! Builds the picker panel messages (achievement ladder, star sign, MBTI,
//! gender, signature) from the catalog and keeps a persisted
//! `(message_id, channel_id)` reference per category so panels survive a
//! restart. References whose message or channel is gone are pruned on
//! detection.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: Initial release

use crate::catalog::{Catalog, PickerCategory};
use crate::database::Database;
use crate::roles::is_not_found;
use anyhow::Result;
use futures::future::join_all;
use log::{info, warn};
use serenity::http::Http;
use serenity::model::application::component::ButtonStyle;
use serenity::model::id::{ChannelId, MessageId};

// Component custom-id namespace. The component dispatcher parses these.
pub const ACHV_PREFIX: &str = "achv:";
pub const PICK_PREFIX: &str = "pick:";
pub const SIG_EDIT: &str = "sig:edit";
pub const SIG_VIEW: &str = "sig:view";
pub const SIG_MODAL: &str = "sig:modal";
pub const SIG_INPUT: &str = "sig:text";

/// One button of a panel, before rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelButton {
    pub label: String,
    pub custom_id: String,
}

/// Build a panel's text and buttons from the catalog.
///
/// Every panel goes through this one builder: the tiered ladder and the
/// categorical pickers only differ in the option list fed in.
pub fn panel_layout(catalog: &Catalog, category: PickerCategory) -> Result<(String, Vec<PanelButton>)> {
    match category {
        PickerCategory::AchievementRoles => {
            let kinds = catalog.role_kinds();
            if kinds.is_empty() {
                anyhow::bail!("No role-granting achievements in the catalog");
            }
            let mut content = String::from(
                "**Achievement Roles**\nClaim the highest tier you qualify for. \
                 Press again to remove it.\n",
            );
            for kind in &kinds {
                let thresholds: Vec<String> = catalog
                    .defs_for(*kind)
                    .map(|d| d.threshold.to_string())
                    .collect();
                content.push_str(&format!(
                    "\n• {} - tiers at {}",
                    kind.display_name(),
                    thresholds.join(", ")
                ));
            }
            let buttons = kinds
                .iter()
                .map(|kind| PanelButton {
                    label: kind.display_name().to_string(),
                    custom_id: format!("{}{}", ACHV_PREFIX, kind.as_str()),
                })
                .collect();
            Ok((content, buttons))
        }
        PickerCategory::Signature => {
            let content = String::from(
                "**Signature**\nSet a personal signature. Changes are limited \
                 to three per cooldown window.",
            );
            let buttons = vec![
                PanelButton {
                    label: "Edit signature".to_string(),
                    custom_id: SIG_EDIT.to_string(),
                },
                PanelButton {
                    label: "View signature".to_string(),
                    custom_id: SIG_VIEW.to_string(),
                },
            ];
            Ok((content, buttons))
        }
        _ => {
            let set = catalog
                .picker(category)
                .ok_or_else(|| anyhow::anyhow!("No picker set configured for {}", category.as_str()))?;
            let content = format!(
                "**{}**\nPick one. Press the same option again to clear it.",
                category.title()
            );
            let buttons = set
                .options
                .iter()
                .map(|opt| PanelButton {
                    label: opt.label.clone(),
                    custom_id: format!("{}{}:{}", PICK_PREFIX, category.as_str(), opt.id),
                })
                .collect();
            Ok((content, buttons))
        }
    }
}

/// Post a panel to a channel and persist its view reference
pub async fn post_panel(
    http: &Http,
    database: &Database,
    catalog: &Catalog,
    category: PickerCategory,
    channel_id: ChannelId,
) -> Result<()> {
    let (content, buttons) = panel_layout(catalog, category)?;

    let message = channel_id
        .send_message(http, |m| {
            m.content(content).components(|c| {
                // Discord caps rows at five buttons
                for chunk in buttons.chunks(5) {
                    c.create_action_row(|row| {
                        for button in chunk {
                            row.create_button(|b| {
                                b.custom_id(&button.custom_id)
                                    .label(&button.label)
                                    .style(ButtonStyle::Secondary)
                            });
                        }
                        row
                    });
                }
                c
            })
        })
        .await?;

    database
        .save_view(
            category.as_str(),
            &message.id.to_string(),
            &channel_id.to_string(),
        )
        .await?;

    info!(
        "Posted {} panel as message {} in channel {}",
        category.as_str(),
        message.id,
        channel_id
    );
    Ok(())
}

/// Verify persisted view references after a restart, pruning the ones whose
/// message or channel no longer exists. Panels still present keep working
/// without a repost since component interactions arrive by custom id.
pub async fn restore_views(http: &Http, database: &Database) -> Result<()> {
    let views = database.list_views().await?;
    if views.is_empty() {
        info!("No persisted views to restore");
        return Ok(());
    }

    let checks = views.iter().map(|view| async move {
        let channel_id = match view.channel_id.parse::<u64>() {
            Ok(id) => ChannelId(id),
            Err(_) => return (view, false),
        };
        let message_id = match view.message_id.parse::<u64>() {
            Ok(id) => MessageId(id),
            Err(_) => return (view, false),
        };

        match channel_id.message(http, message_id).await {
            Ok(_) => (view, true),
            Err(e) if is_not_found(&e) => (view, false),
            Err(e) => {
                // Transient failure; keep the reference and try again next start
                warn!("Could not verify view '{}': {e}", view.category);
                (view, true)
            }
        }
    });

    for (view, alive) in join_all(checks).await {
        if alive {
            info!("Restored {} panel (message {})", view.category, view.message_id);
        } else {
            warn!(
                "Pruning stale view '{}' (message {} gone)",
                view.category, view.message_id
            );
            database.delete_view(&view.category).await?;
        }
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
