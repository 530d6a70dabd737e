//! # Feature: Signature Rotation
//!
//! User-editable signature text gated by a 3-slot, time-windowed cooldown.
//! A slot is available when empty or when its timestamp has aged past the
//! cooldown; malformed timestamps count as available (fail-open). One
//! staleness predicate backs both slot selection and the remaining-changes
//! count so the two can never drift apart.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.2.0
//! - **Toggleable**: true
//!
//! ## Changelog
//! - 1.1.0: Cooldown minutes moved to bot_settings, adjustable at runtime
//! - 1.0.0: Initial release with fixed 7-day window

use crate::catalog::SignatureSettings;
use crate::database::{Database, SignatureRow};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use log::warn;
use serenity::model::id::RoleId;

pub const SLOT_COUNT: usize = 3;

/// Runtime-mutable cooldown setting key in `bot_settings`
const COOLDOWN_SETTING: &str = "signature_cooldown_minutes";

/// The single staleness rule: a slot is available when empty, when its
/// timestamp has aged past the cooldown, or when the timestamp does not
/// parse (fail-open rather than locking the user out on bad data).
pub fn slot_available(timestamp: Option<&str>, now: DateTime<Utc>, cooldown: Duration) -> bool {
    match timestamp {
        None => true,
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(t) => now.signed_duration_since(t.with_timezone(&Utc)) >= cooldown,
            Err(_) => {
                warn!("Malformed signature timestamp '{raw}'; treating slot as available");
                true
            }
        },
    }
}

/// Pick the slot to stamp for a rotation, or None when all three are still
/// cooling down.
///
/// No record at all allocates slot 1. Otherwise the first empty slot in
/// fixed order wins; failing that, the available slot with the oldest
/// timestamp (malformed timestamps sort oldest) for fairest rotation under
/// contention.
pub fn pick_slot(record: Option<&SignatureRow>, now: DateTime<Utc>, cooldown: Duration) -> Option<usize> {
    let record = match record {
        None => return Some(0),
        Some(r) => r,
    };

    for (i, slot) in record.change_times.iter().enumerate() {
        if slot.is_none() {
            return Some(i);
        }
    }

    record
        .change_times
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot_available(slot.as_deref(), now, cooldown))
        .min_by_key(|(_, slot)| {
            slot.as_deref()
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or(DateTime::<Utc>::MIN_UTC)
        })
        .map(|(i, _)| i)
}

/// How many rotations the user could still perform right now.
///
/// Counts slots under the same availability rule as [`pick_slot`]; a
/// brand-new user reports all three.
pub fn remaining_changes(record: Option<&SignatureRow>, now: DateTime<Utc>, cooldown: Duration) -> usize {
    match record {
        None => SLOT_COUNT,
        Some(r) => r
            .change_times
            .iter()
            .filter(|slot| slot_available(slot.as_deref(), now, cooldown))
            .count(),
    }
}

/// Outcome of a rotation request
#[derive(Debug, Clone, PartialEq)]
pub enum RotateOutcome {
    Updated { remaining: usize },
    /// Admin-disabled; blocks writes and views alike
    Disabled,
    NotEligible { minutes: i64, required: i64 },
    /// All slots cooling down; carries the stored text for the rejection reply
    NoSlot { current: Option<String> },
}

/// Outcome of a view request
#[derive(Debug, Clone, PartialEq)]
pub enum ViewOutcome {
    Disabled,
    Signature {
        text: Option<String>,
        remaining: usize,
    },
}

/// Signature feature front door: eligibility gate, slot bookkeeping,
/// admin switches.
#[derive(Clone)]
pub struct SignatureService {
    database: Database,
    settings: SignatureSettings,
}

impl SignatureService {
    pub fn new(database: Database, settings: SignatureSettings) -> Self {
        SignatureService { database, settings }
    }

    /// Effective cooldown, read from bot_settings on every call so admin
    /// changes apply without a restart
    pub async fn cooldown(&self) -> Duration {
        let minutes = self
            .database
            .get_bot_setting(COOLDOWN_SETTING)
            .await
            .ok()
            .flatten()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(self.settings.default_cooldown_minutes);
        Duration::minutes(minutes)
    }

    pub async fn set_cooldown_minutes(&self, minutes: i64) -> Result<()> {
        self.database
            .set_bot_setting(COOLDOWN_SETTING, &minutes.to_string())
            .await
    }

    fn is_exempt(&self, member_roles: &[RoleId]) -> bool {
        self.settings
            .exempt_role
            .map(|r| member_roles.contains(&RoleId(r)))
            .unwrap_or(false)
    }

    /// Check the rejection cases without writing: disabled flag, eligibility
    /// gate, slot availability. Returns the rejection, or None when a
    /// rotation may proceed. Used to refuse before showing the input modal;
    /// [`Self::rotate`] re-runs the same checks at write time.
    pub async fn gate(&self, user_id: &str, member_roles: &[RoleId]) -> Result<Option<RotateOutcome>> {
        let record = self.database.get_signature(user_id).await?;

        if record.as_ref().map(|r| r.is_disabled).unwrap_or(false) {
            return Ok(Some(RotateOutcome::Disabled));
        }

        if !self.is_exempt(member_roles) {
            let minutes = self.database.activity(user_id).await?.voice_minutes();
            if minutes < self.settings.required_voice_minutes {
                return Ok(Some(RotateOutcome::NotEligible {
                    minutes,
                    required: self.settings.required_voice_minutes,
                }));
            }
        }

        let now = Utc::now();
        let cooldown = self.cooldown().await;
        if pick_slot(record.as_ref(), now, cooldown).is_none() {
            return Ok(Some(RotateOutcome::NoSlot {
                current: record.and_then(|r| r.signature),
            }));
        }

        Ok(None)
    }

    /// Attempt a rotation for a user holding `member_roles`
    pub async fn rotate(
        &self,
        user_id: &str,
        member_roles: &[RoleId],
        text: &str,
    ) -> Result<RotateOutcome> {
        if let Some(rejection) = self.gate(user_id, member_roles).await? {
            return Ok(rejection);
        }

        let record = self.database.get_signature(user_id).await?;
        let now = Utc::now();
        let cooldown = self.cooldown().await;

        let slot = match pick_slot(record.as_ref(), now, cooldown) {
            Some(slot) => slot,
            None => {
                return Ok(RotateOutcome::NoSlot {
                    current: record.and_then(|r| r.signature),
                })
            }
        };

        self.database
            .write_signature(user_id, text, slot, &now.to_rfc3339())
            .await?;

        // Remaining count reflects the slot just stamped
        let mut updated = record.unwrap_or_default();
        updated.change_times[slot] = Some(now.to_rfc3339());
        let remaining = remaining_changes(Some(&updated), now, cooldown);

        Ok(RotateOutcome::Updated { remaining })
    }

    /// View a user's signature and remaining changes
    pub async fn view(&self, user_id: &str) -> Result<ViewOutcome> {
        let record = self.database.get_signature(user_id).await?;

        if record.as_ref().map(|r| r.is_disabled).unwrap_or(false) {
            return Ok(ViewOutcome::Disabled);
        }

        let now = Utc::now();
        let cooldown = self.cooldown().await;
        let remaining = remaining_changes(record.as_ref(), now, cooldown);

        Ok(ViewOutcome::Signature {
            text: record.and_then(|r| r.signature),
            remaining,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn cooldown() -> Duration {
        Duration::days(7)
    }

    fn row(times: [Option<&str>; 3]) -> SignatureRow {
        SignatureRow {
            signature: Some("o7".to_string()),
            change_times: times.map(|t| t.map(|s| s.to_string())),
            is_disabled: false,
        }
    }

    fn days_ago(now: DateTime<Utc>, days: i64) -> String {
        (now - Duration::days(days)).to_rfc3339()
    }

    #[test]
    fn test_no_record_allocates_first_slot() {
        let now = Utc::now();
        assert_eq!(pick_slot(None, now, cooldown()), Some(0));
    }

    #[test]
    fn test_no_record_has_three_remaining() {
        let now = Utc::now();
        assert_eq!(remaining_changes(None, now, cooldown()), 3);
    }

    #[test]
    fn test_first_empty_slot_in_fixed_order() {
        let now = Utc::now();
        let fresh = days_ago(now, 0);
        let record = row([Some(&fresh), None, None]);
        assert_eq!(pick_slot(Some(&record), now, cooldown()), Some(1));
    }

    #[test]
    fn test_all_slots_six_days_old_rejects() {
        let now = Utc::now();
        let t = days_ago(now, 6);
        let record = row([Some(&t), Some(&t), Some(&t)]);
        assert_eq!(pick_slot(Some(&record), now, cooldown()), None);
        assert_eq!(remaining_changes(Some(&record), now, cooldown()), 0);
    }

    #[test]
    fn test_all_slots_seven_days_old_picks_oldest() {
        let now = Utc::now();
        let exactly = days_ago(now, 7);
        let older = days_ago(now, 8);
        let oldest = days_ago(now, 9);
        let record = row([Some(&exactly), Some(&oldest), Some(&older)]);
        assert_eq!(pick_slot(Some(&record), now, cooldown()), Some(1));
        assert_eq!(remaining_changes(Some(&record), now, cooldown()), 3);
    }

    #[test]
    fn test_exact_boundary_is_available() {
        let now = Utc::now();
        let exactly = days_ago(now, 7);
        assert!(slot_available(Some(&exactly), now, cooldown()));
    }

    #[test]
    fn test_malformed_timestamp_fails_open() {
        let now = Utc::now();
        assert!(slot_available(Some("not-a-timestamp"), now, cooldown()));

        // A malformed slot sorts oldest and wins selection
        let fresh = days_ago(now, 8);
        let record = row([Some(&fresh), Some("garbage"), Some(&fresh)]);
        assert_eq!(pick_slot(Some(&record), now, cooldown()), Some(1));
    }

    #[test]
    fn test_mixed_stale_and_fresh_slots() {
        let now = Utc::now();
        let fresh = days_ago(now, 1);
        let stale = days_ago(now, 10);
        let record = row([Some(&fresh), Some(&stale), Some(&fresh)]);
        assert_eq!(pick_slot(Some(&record), now, cooldown()), Some(1));
        assert_eq!(remaining_changes(Some(&record), now, cooldown()), 1);
    }

    #[test]
    fn test_selection_and_count_share_the_rule() {
        // Whatever pick_slot accepts, remaining_changes counts; exercise a
        // spread of ages around the boundary
        let now = Utc::now();
        for days in [0, 3, 6, 7, 8, 30] {
            let t = days_ago(now, days);
            let record = row([Some(&t), Some(&t), Some(&t)]);
            let picked = pick_slot(Some(&record), now, cooldown()).is_some();
            let counted = remaining_changes(Some(&record), now, cooldown()) > 0;
            assert_eq!(picked, counted, "divergence at {days} days");
        }
    }
}
