//! # Feature: Achievement Catalog
//!
//! Static achievement definitions and picker option sets, loaded from a YAML
//! file with environment variable interpolation and validated at startup.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: Initial release

use crate::config::interpolate_env_vars;
use crate::database::ActivityMetric;
use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// The closed set of achievement kinds.
///
/// Each kind carries its own read strategy (see [`AchievementKind::source`]):
/// a local counter column or a query against the external shop subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementKind {
    Message,
    Reaction,
    TimeSpent,
    CheckinSum,
    CheckinCombo,
    Giveaway,
}

/// Metrics served by the external shop subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShopMetric {
    /// Count of check-in records
    CheckinSum,
    /// Best check-in streak
    CheckinCombo,
    /// Giveaway wins
    GiveawayWins,
}

/// Where a kind's progress count comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressSource {
    Counter(ActivityMetric),
    Shop(ShopMetric),
}

impl AchievementKind {
    pub fn source(&self) -> ProgressSource {
        match self {
            AchievementKind::Message => ProgressSource::Counter(ActivityMetric::Messages),
            AchievementKind::Reaction => ProgressSource::Counter(ActivityMetric::Reactions),
            AchievementKind::TimeSpent => ProgressSource::Counter(ActivityMetric::VoiceMinutes),
            AchievementKind::CheckinSum => ProgressSource::Shop(ShopMetric::CheckinSum),
            AchievementKind::CheckinCombo => ProgressSource::Shop(ShopMetric::CheckinCombo),
            AchievementKind::Giveaway => ProgressSource::Shop(ShopMetric::GiveawayWins),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementKind::Message => "message",
            AchievementKind::Reaction => "reaction",
            AchievementKind::TimeSpent => "time_spent",
            AchievementKind::CheckinSum => "checkin_sum",
            AchievementKind::CheckinCombo => "checkin_combo",
            AchievementKind::Giveaway => "giveaway",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "message" => Some(AchievementKind::Message),
            "reaction" => Some(AchievementKind::Reaction),
            "time_spent" => Some(AchievementKind::TimeSpent),
            "checkin_sum" => Some(AchievementKind::CheckinSum),
            "checkin_combo" => Some(AchievementKind::CheckinCombo),
            "giveaway" => Some(AchievementKind::Giveaway),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AchievementKind::Message => "Messages",
            AchievementKind::Reaction => "Reactions",
            AchievementKind::TimeSpent => "Voice Time",
            AchievementKind::CheckinSum => "Check-ins",
            AchievementKind::CheckinCombo => "Check-in Streak",
            AchievementKind::Giveaway => "Giveaways",
        }
    }

    const ALL: [AchievementKind; 6] = [
        AchievementKind::Message,
        AchievementKind::Reaction,
        AchievementKind::TimeSpent,
        AchievementKind::CheckinSum,
        AchievementKind::CheckinCombo,
        AchievementKind::Giveaway,
    ];
}

/// One achievement definition from the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementDef {
    pub name: String,
    pub description: String,
    pub kind: AchievementKind,
    pub threshold: i64,
    /// Role granted when this tier is the highest eligible one; only
    /// role-granting achievements carry it
    #[serde(default)]
    pub role_id: Option<u64>,
}

/// Picker panel categories; also the persisted-view category keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickerCategory {
    AchievementRoles,
    StarSign,
    Mbti,
    Gender,
    Signature,
}

impl PickerCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickerCategory::AchievementRoles => "achievement_roles",
            PickerCategory::StarSign => "star_sign",
            PickerCategory::Mbti => "mbti",
            PickerCategory::Gender => "gender",
            PickerCategory::Signature => "signature",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "achievement_roles" => Some(PickerCategory::AchievementRoles),
            "star_sign" => Some(PickerCategory::StarSign),
            "mbti" => Some(PickerCategory::Mbti),
            "gender" => Some(PickerCategory::Gender),
            "signature" => Some(PickerCategory::Signature),
            _ => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            PickerCategory::AchievementRoles => "Achievement Roles",
            PickerCategory::StarSign => "Star Sign",
            PickerCategory::Mbti => "MBTI",
            PickerCategory::Gender => "Gender",
            PickerCategory::Signature => "Signature",
        }
    }
}

/// One selectable option of a categorical picker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickerOption {
    pub label: String,
    pub id: String,
    pub role_id: u64,
}

/// A flat exclusive option set backing one categorical picker panel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickerSet {
    pub category: PickerCategory,
    /// Auto-grant the participation role on first press (star sign, MBTI);
    /// gender panels leave it off
    #[serde(default)]
    pub grants_participation: bool,
    pub options: Vec<PickerOption>,
}

/// Signature feature settings from the catalog file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureSettings {
    /// Role exempt from the voice-minutes requirement
    #[serde(default)]
    pub exempt_role: Option<u64>,
    pub required_voice_minutes: i64,
    #[serde(default = "default_cooldown_minutes")]
    pub default_cooldown_minutes: i64,
}

fn default_cooldown_minutes() -> i64 {
    7 * 24 * 60
}

/// The full catalog: achievements, picker sets, signature settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    /// Role auto-granted on first interaction with a category
    pub participation_role: u64,
    pub achievements: Vec<AchievementDef>,
    #[serde(default)]
    pub pickers: Vec<PickerSet>,
    pub signature: SignatureSettings,
}

impl Catalog {
    /// Load the catalog from a YAML file with `${VAR}` interpolation
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;

        let interpolated = interpolate_env_vars(&content)?;

        let catalog: Catalog = serde_yaml::from_str(&interpolated)
            .with_context(|| format!("Failed to parse catalog file: {}", path.display()))?;

        catalog.validate()?;

        info!(
            "Loaded catalog from {} with {} achievement(s), {} picker set(s)",
            path.display(),
            catalog.achievements.len(),
            catalog.pickers.len()
        );

        Ok(catalog)
    }

    pub fn validate(&self) -> Result<()> {
        if self.participation_role == 0 {
            anyhow::bail!("participation_role is required");
        }

        for (i, def) in self.achievements.iter().enumerate() {
            if def.name.is_empty() {
                anyhow::bail!("Achievement {} has empty name", i);
            }
            if def.threshold <= 0 {
                anyhow::bail!("Achievement '{}' has non-positive threshold", def.name);
            }
        }

        // Within one kind, the defs either all grant roles or none do;
        // a mixed ladder would break held-role scanning
        for kind in AchievementKind::ALL {
            let defs: Vec<_> = self.defs_for(kind).collect();
            if !defs.is_empty() {
                let with_role = defs.iter().filter(|d| d.role_id.is_some()).count();
                if with_role != 0 && with_role != defs.len() {
                    anyhow::bail!(
                        "Achievement kind '{}' mixes role-granting and plain definitions",
                        kind.as_str()
                    );
                }
            }
        }

        for set in &self.pickers {
            if set.options.is_empty() {
                anyhow::bail!("Picker '{}' has no options", set.category.as_str());
            }
            for opt in &set.options {
                if opt.id.is_empty() || opt.label.is_empty() {
                    anyhow::bail!("Picker '{}' has an option with empty id or label", set.category.as_str());
                }
                if opt.role_id == 0 {
                    anyhow::bail!(
                        "Picker '{}' option '{}' has no role_id",
                        set.category.as_str(),
                        opt.id
                    );
                }
            }
            let mut ids: Vec<_> = set.options.iter().map(|o| o.id.as_str()).collect();
            ids.sort_unstable();
            ids.dedup();
            if ids.len() != set.options.len() {
                anyhow::bail!("Picker '{}' has duplicate option ids", set.category.as_str());
            }
        }

        if self.signature.required_voice_minutes < 0 {
            anyhow::bail!("signature.required_voice_minutes must be non-negative");
        }

        Ok(())
    }

    /// Definitions of one kind, in declaration order
    pub fn defs_for(&self, kind: AchievementKind) -> impl Iterator<Item = &AchievementDef> {
        self.achievements.iter().filter(move |d| d.kind == kind)
    }

    /// Definitions of one kind sorted by threshold descending.
    ///
    /// The sort is stable, so equal thresholds keep declaration order and
    /// selection stays deterministic.
    pub fn ladder(&self, kind: AchievementKind) -> Vec<&AchievementDef> {
        let mut defs: Vec<_> = self.defs_for(kind).collect();
        defs.sort_by_key(|d| std::cmp::Reverse(d.threshold));
        defs
    }

    /// All role ids declared for a kind, in declaration order.
    ///
    /// Bulk role removal iterates this full list to defend against drift.
    pub fn ladder_role_ids(&self, kind: AchievementKind) -> Vec<u64> {
        self.defs_for(kind).filter_map(|d| d.role_id).collect()
    }

    /// All kinds present in the catalog, in order of first appearance
    pub fn kinds(&self) -> Vec<AchievementKind> {
        let mut kinds = Vec::new();
        for def in &self.achievements {
            if !kinds.contains(&def.kind) {
                kinds.push(def.kind);
            }
        }
        kinds
    }

    /// Kinds that grant roles, in order of first appearance; these become
    /// the buttons of the achievement panel
    pub fn role_kinds(&self) -> Vec<AchievementKind> {
        let mut kinds = Vec::new();
        for def in &self.achievements {
            if def.role_id.is_some() && !kinds.contains(&def.kind) {
                kinds.push(def.kind);
            }
        }
        kinds
    }

    pub fn picker(&self, category: PickerCategory) -> Option<&PickerSet> {
        self.pickers.iter().find(|p| p.category == category)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_catalog() -> Catalog {
        let yaml = r#"
participation_role: 100

achievements:
  - name: "Hello!"
    description: "Send 10 messages"
    kind: message
    threshold: 10
    role_id: 201
  - name: "Chatterbox"
    description: "Send 100 messages"
    kind: message
    threshold: 100
    role_id: 202
  - name: "Town Crier"
    description: "Send 1000 messages"
    kind: message
    threshold: 1000
    role_id: 203
  - name: "First Steps"
    description: "Check in once"
    kind: checkin_sum
    threshold: 1

pickers:
  - category: gender
    options:
      - label: "She/Her"
        id: she
        role_id: 301
      - label: "He/Him"
        id: he
        role_id: 302

signature:
  required_voice_minutes: 600
"#;
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_parse_and_validate() {
        let catalog = sample_catalog();
        assert!(catalog.validate().is_ok());
        assert_eq!(catalog.achievements.len(), 4);
        assert_eq!(catalog.signature.default_cooldown_minutes, 7 * 24 * 60);
    }

    #[test]
    fn test_ladder_sorted_descending() {
        let catalog = sample_catalog();
        let ladder = catalog.ladder(AchievementKind::Message);
        let thresholds: Vec<i64> = ladder.iter().map(|d| d.threshold).collect();
        assert_eq!(thresholds, vec![1000, 100, 10]);
    }

    #[test]
    fn test_ladder_tie_keeps_declaration_order() {
        let mut catalog = sample_catalog();
        catalog.achievements.push(AchievementDef {
            name: "Duplicate".to_string(),
            description: "Same threshold as Chatterbox".to_string(),
            kind: AchievementKind::Message,
            threshold: 100,
            role_id: Some(204),
        });

        let ladder = catalog.ladder(AchievementKind::Message);
        // Stable sort: Chatterbox (declared first) comes before Duplicate
        assert_eq!(ladder[1].name, "Chatterbox");
        assert_eq!(ladder[2].name, "Duplicate");
    }

    #[test]
    fn test_ladder_role_ids_declaration_order() {
        let catalog = sample_catalog();
        assert_eq!(
            catalog.ladder_role_ids(AchievementKind::Message),
            vec![201, 202, 203]
        );
    }

    #[test]
    fn test_role_kinds_excludes_plain_definitions() {
        let catalog = sample_catalog();
        // checkin_sum has no role_id, so it gets no panel button
        assert_eq!(catalog.role_kinds(), vec![AchievementKind::Message]);
    }

    #[test]
    fn test_validate_rejects_mixed_ladder() {
        let mut catalog = sample_catalog();
        catalog.achievements.push(AchievementDef {
            name: "Plain".to_string(),
            description: "No role".to_string(),
            kind: AchievementKind::Message,
            threshold: 50,
            role_id: None,
        });
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_picker_ids() {
        let mut catalog = sample_catalog();
        let opt = catalog.pickers[0].options[0].clone();
        catalog.pickers[0].options.push(opt);
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in AchievementKind::ALL {
            assert_eq!(AchievementKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(AchievementKind::from_str("unknown"), None);
    }

    #[test]
    fn test_kind_sources() {
        use crate::database::ActivityMetric;
        assert_eq!(
            AchievementKind::TimeSpent.source(),
            ProgressSource::Counter(ActivityMetric::VoiceMinutes)
        );
        assert_eq!(
            AchievementKind::Giveaway.source(),
            ProgressSource::Shop(ShopMetric::GiveawayWins)
        );
    }
}
