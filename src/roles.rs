//! # Feature: Role Reconciliation
//!
//! Tier-ladder role grants for achievements and the exclusive option picker
//! behind the star-sign / MBTI / gender panels. Role membership is read fresh
//! from Discord on every press; transitions are idempotent under retry and
//! last-write-wins under concurrent edits.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.0: Bulk removals always iterate the full declared role list
//! - 1.1.0: Share the transition planner with the categorical pickers
//! - 1.0.0: Initial release

use crate::catalog::{AchievementDef, PickerOption};
use crate::progress::highest_eligible;
use anyhow::Result;
use log::{info, warn};
use serenity::http::{Http, HttpError};
use serenity::model::id::{GuildId, RoleId, UserId};

// ============================================================================
// Discord Error Classification
// ============================================================================

fn http_status(err: &serenity::Error) -> Option<u16> {
    if let serenity::Error::Http(boxed) = err {
        if let HttpError::UnsuccessfulRequest(resp) = &**boxed {
            return Some(resp.status_code.as_u16());
        }
    }
    None
}

/// Referenced channel/message/member is gone; prune and report, never fatal
pub fn is_not_found(err: &serenity::Error) -> bool {
    http_status(err) == Some(404)
}

/// Discord rejected the operation; report to the user, no retry
pub fn is_permission_denied(err: &serenity::Error) -> bool {
    http_status(err) == Some(403)
}

// ============================================================================
// Tier Ladder Transitions
// ============================================================================

/// Planned transition for one (user, achievement kind) press
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TierPlan<'a> {
    /// No recorded progress at all
    NoProgress,
    /// Progress exists but no tier threshold is met yet
    NotYetEligible { next_threshold: i64 },
    /// Held tier equals the highest eligible one: re-click removes it
    Remove { def: &'a AchievementDef },
    /// A lower tier is held: replace it with the highest eligible one
    Upgrade { def: &'a AchievementDef },
    /// No tier held: grant the highest eligible one
    Award { def: &'a AchievementDef },
}

/// Decide the transition for a press, from fresh role membership.
///
/// `ladder` is sorted by threshold descending; `declared` is the kind's full
/// role-id list in declaration order. Held-role detection scans `declared`
/// in order and takes the first match.
pub fn plan_tier_transition<'a>(
    member_roles: &[RoleId],
    ladder: &[&'a AchievementDef],
    declared: &[u64],
    count: i64,
) -> TierPlan<'a> {
    if count <= 0 {
        return TierPlan::NoProgress;
    }

    let eligible = match highest_eligible(ladder, count) {
        Some(def) => def,
        None => {
            let next_threshold = ladder.last().map(|d| d.threshold).unwrap_or(0);
            return TierPlan::NotYetEligible { next_threshold };
        }
    };

    let held = declared
        .iter()
        .find(|id| member_roles.contains(&RoleId(**id)))
        .copied();

    match held {
        Some(role_id) if Some(role_id) == eligible.role_id => TierPlan::Remove { def: eligible },
        Some(_) => TierPlan::Upgrade { def: eligible },
        None => TierPlan::Award { def: eligible },
    }
}

/// User-visible outcome of a reconciliation
#[derive(Debug, Clone, PartialEq)]
pub enum TierOutcome {
    NoProgress,
    NotYetEligible { count: i64, next_threshold: i64 },
    Removed { name: String },
    Upgraded { name: String },
    Awarded { name: String },
}

/// Apply a press against Discord: plan from fresh membership, then commit
/// the role diff. Removals sweep the full declared list to defend against
/// drift between our scan and Discord's actual state.
pub async fn reconcile_tier_roles(
    http: &Http,
    guild_id: GuildId,
    user_id: UserId,
    member_roles: &[RoleId],
    ladder: &[&AchievementDef],
    declared: &[u64],
    count: i64,
) -> Result<TierOutcome> {
    match plan_tier_transition(member_roles, ladder, declared, count) {
        TierPlan::NoProgress => Ok(TierOutcome::NoProgress),
        TierPlan::NotYetEligible { next_threshold } => Ok(TierOutcome::NotYetEligible {
            count,
            next_threshold,
        }),
        TierPlan::Remove { def } => {
            remove_all_roles(http, guild_id, user_id, declared).await?;
            info!("Removed tier role '{}' from user {}", def.name, user_id);
            Ok(TierOutcome::Removed {
                name: def.name.clone(),
            })
        }
        TierPlan::Upgrade { def } => {
            remove_all_roles(http, guild_id, user_id, declared).await?;
            add_role(http, guild_id, user_id, def.role_id.unwrap_or(0)).await?;
            info!("Upgraded user {} to tier role '{}'", user_id, def.name);
            Ok(TierOutcome::Upgraded {
                name: def.name.clone(),
            })
        }
        TierPlan::Award { def } => {
            add_role(http, guild_id, user_id, def.role_id.unwrap_or(0)).await?;
            info!("Awarded tier role '{}' to user {}", def.name, user_id);
            Ok(TierOutcome::Awarded {
                name: def.name.clone(),
            })
        }
    }
}

/// Grant the participation role if missing. Side effect only; it gates
/// nothing and signals category opt-in.
pub async fn ensure_participation_role(
    http: &Http,
    guild_id: GuildId,
    user_id: UserId,
    member_roles: &[RoleId],
    participation_role: u64,
) -> Result<()> {
    if member_roles.contains(&RoleId(participation_role)) {
        return Ok(());
    }
    add_role(http, guild_id, user_id, participation_role).await
}

// ============================================================================
// Exclusive Option Picker
// ============================================================================

/// Planned transition for one categorical picker press
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PickPlan<'a> {
    /// Re-selected the held option: clear it
    Clear { option: &'a PickerOption },
    /// A different option is held: switch
    Switch { option: &'a PickerOption },
    /// Nothing held: select
    Select { option: &'a PickerOption },
}

pub fn plan_pick<'a>(
    member_roles: &[RoleId],
    options: &'a [PickerOption],
    selected_id: &str,
) -> Option<PickPlan<'a>> {
    let selected = options.iter().find(|o| o.id == selected_id)?;

    let held = options
        .iter()
        .find(|o| member_roles.contains(&RoleId(o.role_id)));

    Some(match held {
        Some(h) if h.id == selected.id => PickPlan::Clear { option: selected },
        Some(_) => PickPlan::Switch { option: selected },
        None => PickPlan::Select { option: selected },
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum PickOutcome {
    Cleared { label: String },
    Switched { label: String },
    Selected { label: String },
}

/// Apply a categorical picker press: select one, re-select to clear,
/// select another to switch
pub async fn toggle_exclusive_role(
    http: &Http,
    guild_id: GuildId,
    user_id: UserId,
    member_roles: &[RoleId],
    options: &[PickerOption],
    selected_id: &str,
) -> Result<PickOutcome> {
    let plan = plan_pick(member_roles, options, selected_id)
        .ok_or_else(|| anyhow::anyhow!("Unknown picker option: {selected_id}"))?;

    let all_role_ids: Vec<u64> = options.iter().map(|o| o.role_id).collect();

    match plan {
        PickPlan::Clear { option } => {
            remove_all_roles(http, guild_id, user_id, &all_role_ids).await?;
            info!("Cleared option '{}' for user {}", option.id, user_id);
            Ok(PickOutcome::Cleared {
                label: option.label.clone(),
            })
        }
        PickPlan::Switch { option } => {
            remove_all_roles(http, guild_id, user_id, &all_role_ids).await?;
            add_role(http, guild_id, user_id, option.role_id).await?;
            info!("Switched user {} to option '{}'", user_id, option.id);
            Ok(PickOutcome::Switched {
                label: option.label.clone(),
            })
        }
        PickPlan::Select { option } => {
            add_role(http, guild_id, user_id, option.role_id).await?;
            info!("Selected option '{}' for user {}", option.id, user_id);
            Ok(PickOutcome::Selected {
                label: option.label.clone(),
            })
        }
    }
}

// ============================================================================
// Role Commit Helpers
// ============================================================================

async fn add_role(http: &Http, guild_id: GuildId, user_id: UserId, role_id: u64) -> Result<()> {
    http.add_member_role(guild_id.0, user_id.0, role_id, None)
        .await?;
    Ok(())
}

/// Remove every role in the declared list. Removing an un-held role is a
/// no-op on Discord's side, so sweeping the whole list is safe and covers
/// membership drift.
async fn remove_all_roles(
    http: &Http,
    guild_id: GuildId,
    user_id: UserId,
    role_ids: &[u64],
) -> Result<()> {
    for role_id in role_ids {
        if let Err(e) = http
            .remove_member_role(guild_id.0, user_id.0, *role_id, None)
            .await
        {
            if is_not_found(&e) {
                // Role deleted on the guild since the catalog was written
                warn!("Role {role_id} not found while sweeping; skipping");
                continue;
            }
            return Err(e.into());
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AchievementKind;

    fn def(name: &str, threshold: i64, role_id: u64) -> AchievementDef {
        AchievementDef {
            name: name.to_string(),
            description: String::new(),
            kind: AchievementKind::Message,
            threshold,
            role_id: Some(role_id),
        }
    }

    fn roles(ids: &[u64]) -> Vec<RoleId> {
        ids.iter().map(|id| RoleId(*id)).collect()
    }

    #[test]
    fn test_plan_no_progress() {
        let a = def("a", 10, 201);
        let ladder = vec![&a];
        let plan = plan_tier_transition(&[], &ladder, &[201], 0);
        assert_eq!(plan, TierPlan::NoProgress);
    }

    #[test]
    fn test_plan_not_yet_eligible_reports_lowest_threshold() {
        let a = def("a", 10, 201);
        let b = def("b", 100, 202);
        let ladder = vec![&b, &a];
        let plan = plan_tier_transition(&[], &ladder, &[201, 202], 5);
        assert_eq!(plan, TierPlan::NotYetEligible { next_threshold: 10 });
    }

    #[test]
    fn test_plan_award_when_nothing_held() {
        let a = def("a", 10, 201);
        let b = def("b", 100, 202);
        let ladder = vec![&b, &a];
        let plan = plan_tier_transition(&[], &ladder, &[201, 202], 150);
        assert_eq!(plan, TierPlan::Award { def: &b });
    }

    #[test]
    fn test_plan_upgrade_from_lower_tier() {
        let a = def("a", 10, 201);
        let b = def("b", 100, 202);
        let ladder = vec![&b, &a];
        let plan = plan_tier_transition(&roles(&[201]), &ladder, &[201, 202], 150);
        assert_eq!(plan, TierPlan::Upgrade { def: &b });
    }

    #[test]
    fn test_plan_reclick_removes() {
        let a = def("a", 10, 201);
        let b = def("b", 100, 202);
        let ladder = vec![&b, &a];
        let plan = plan_tier_transition(&roles(&[202]), &ladder, &[201, 202], 150);
        assert_eq!(plan, TierPlan::Remove { def: &b });
    }

    #[test]
    fn test_two_presses_return_to_original_state() {
        let a = def("a", 10, 201);
        let ladder = vec![&a];
        let declared = [201u64];

        // Press 1: holding the eligible tier -> Remove
        let plan = plan_tier_transition(&roles(&[201]), &ladder, &declared, 50);
        assert_eq!(plan, TierPlan::Remove { def: &a });

        // Press 2: role now gone, counter unchanged -> Award the same tier
        let plan = plan_tier_transition(&[], &ladder, &declared, 50);
        assert_eq!(plan, TierPlan::Award { def: &a });
    }

    #[test]
    fn test_held_detection_uses_declaration_order() {
        // Drifted state: user somehow holds two ladder roles; the scan takes
        // the first declared match
        let a = def("a", 10, 201);
        let b = def("b", 100, 202);
        let ladder = vec![&b, &a];
        let plan = plan_tier_transition(&roles(&[202, 201]), &ladder, &[201, 202], 50);
        // Eligible is tier a (count 50 < 100); held scan finds 201 first
        assert_eq!(plan, TierPlan::Remove { def: &a });
    }

    fn opt(id: &str, role_id: u64) -> PickerOption {
        PickerOption {
            label: id.to_uppercase(),
            id: id.to_string(),
            role_id,
        }
    }

    #[test]
    fn test_pick_select_switch_clear() {
        let options = vec![opt("intj", 301), opt("enfp", 302)];

        let plan = plan_pick(&[], &options, "intj").unwrap();
        assert_eq!(plan, PickPlan::Select { option: &options[0] });

        let plan = plan_pick(&roles(&[301]), &options, "enfp").unwrap();
        assert_eq!(plan, PickPlan::Switch { option: &options[1] });

        let plan = plan_pick(&roles(&[301]), &options, "intj").unwrap();
        assert_eq!(plan, PickPlan::Clear { option: &options[0] });
    }

    #[test]
    fn test_pick_unknown_option() {
        let options = vec![opt("intj", 301)];
        assert!(plan_pick(&[], &options, "nope").is_none());
    }
}
