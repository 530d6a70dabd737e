//! # Feature: Progress Evaluation
//!
//! Maps raw counters + the achievement catalog to completion state and the
//! highest eligible tier per kind. Local kinds read the counter store;
//! check-in and giveaway kinds query the external shop subsystem.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: Initial release

use crate::catalog::{AchievementDef, AchievementKind, ProgressSource, ShopMetric};
use crate::database::{ActivityMetric, Database};
use anyhow::{Context, Result};
use log::info;
use serenity::async_trait;
use std::sync::Arc;

// ============================================================================
// External Shop Collaborator
// ============================================================================

/// Read-only gateway to the shop subsystem (check-ins, giveaways)
#[async_trait]
pub trait ShopGateway: Send + Sync {
    async fn metric(&self, user_id: &str, metric: ShopMetric) -> Result<i64>;
}

/// HTTP implementation against the shop service's REST API
pub struct HttpShopGateway {
    base_url: String,
    client: reqwest::Client,
}

impl HttpShopGateway {
    pub fn new(base_url: String) -> Self {
        HttpShopGateway {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, user_id: &str, metric: ShopMetric) -> String {
        let path = match metric {
            ShopMetric::CheckinSum => "checkins/count",
            ShopMetric::CheckinCombo => "checkins/best_combo",
            ShopMetric::GiveawayWins => "giveaways/wins",
        };
        format!("{}/users/{}/{}", self.base_url, user_id, path)
    }
}

#[async_trait]
impl ShopGateway for HttpShopGateway {
    async fn metric(&self, user_id: &str, metric: ShopMetric) -> Result<i64> {
        let url = self.endpoint(user_id, metric);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to connect to shop API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Shop API error ({}): {}", status, body);
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse shop API response")?;

        payload["value"]
            .as_i64()
            .ok_or_else(|| anyhow::anyhow!("Shop API response missing 'value' field"))
    }
}

/// Stand-in used when no shop endpoint is configured; all metrics read 0
pub struct NullShopGateway;

#[async_trait]
impl ShopGateway for NullShopGateway {
    async fn metric(&self, _user_id: &str, _metric: ShopMetric) -> Result<i64> {
        Ok(0)
    }
}

/// Build the shop gateway from configuration
pub fn shop_gateway_from(shop_api_url: Option<&str>) -> Arc<dyn ShopGateway> {
    match shop_api_url {
        Some(url) => {
            info!("Shop gateway configured at {url}");
            Arc::new(HttpShopGateway::new(url.to_string()))
        }
        None => {
            info!("No shop API configured; check-in and giveaway progress reads 0");
            Arc::new(NullShopGateway)
        }
    }
}

// ============================================================================
// Progress Reads
// ============================================================================

/// A user's current count for one achievement kind.
///
/// Time-based kinds convert stored seconds to whole minutes.
pub async fn progress_count(
    db: &Database,
    shop: &dyn ShopGateway,
    user_id: &str,
    kind: AchievementKind,
) -> Result<i64> {
    match kind.source() {
        ProgressSource::Counter(metric) => {
            let activity = db.activity(user_id).await?;
            Ok(match metric {
                ActivityMetric::Messages => activity.message_count,
                ActivityMetric::Reactions => activity.reaction_count,
                ActivityMetric::VoiceMinutes => activity.voice_minutes(),
            })
        }
        ProgressSource::Shop(metric) => shop.metric(user_id, metric).await,
    }
}

// ============================================================================
// Evaluator
// ============================================================================

/// Evaluation result for one achievement definition
#[derive(Debug, Clone, Copy)]
pub struct ProgressReport<'a> {
    pub def: &'a AchievementDef,
    pub count: i64,
    pub completed: bool,
    /// Normalized progress, capped at 1.0
    pub ratio: f64,
}

/// Evaluate a set of definitions against a count
pub fn evaluate<'a>(defs: &[&'a AchievementDef], count: i64) -> Vec<ProgressReport<'a>> {
    defs.iter()
        .map(|def| ProgressReport {
            def,
            count,
            completed: count >= def.threshold,
            ratio: (count as f64 / def.threshold as f64).min(1.0),
        })
        .collect()
}

/// Highest eligible tier: the first definition of a descending-sorted ladder
/// whose threshold the count meets or exceeds
pub fn highest_eligible<'a>(ladder: &[&'a AchievementDef], count: i64) -> Option<&'a AchievementDef> {
    ladder.iter().find(|def| count >= def.threshold).copied()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AchievementKind;

    fn def(name: &str, threshold: i64) -> AchievementDef {
        AchievementDef {
            name: name.to_string(),
            description: String::new(),
            kind: AchievementKind::Message,
            threshold,
            role_id: Some(threshold as u64),
        }
    }

    #[test]
    fn test_highest_eligible_picks_middle_tier() {
        let a = def("a", 10);
        let b = def("b", 100);
        let c = def("c", 1000);
        // Ladder sorted descending, as Catalog::ladder produces it
        let ladder = vec![&c, &b, &a];

        let eligible = highest_eligible(&ladder, 150).unwrap();
        assert_eq!(eligible.threshold, 100);
    }

    #[test]
    fn test_highest_eligible_none_below_lowest() {
        let a = def("a", 10);
        let b = def("b", 100);
        let ladder = vec![&b, &a];

        assert!(highest_eligible(&ladder, 9).is_none());
    }

    #[test]
    fn test_highest_eligible_exact_threshold() {
        let a = def("a", 10);
        let ladder = vec![&a];

        assert_eq!(highest_eligible(&ladder, 10).unwrap().threshold, 10);
    }

    #[test]
    fn test_evaluate_completion_and_ratio() {
        let a = def("Hello!", 10);
        let reports = evaluate(&[&a], 10);
        assert!(reports[0].completed);
        assert!((reports[0].ratio - 1.0).abs() < f64::EPSILON);

        let reports = evaluate(&[&a], 5);
        assert!(!reports[0].completed);
        assert!((reports[0].ratio - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_evaluate_ratio_caps_at_one() {
        let a = def("Hello!", 10);
        let reports = evaluate(&[&a], 250);
        assert!(reports[0].completed);
        assert!((reports[0].ratio - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_evaluate_tie_is_deterministic() {
        let a = def("first", 100);
        let b = def("second", 100);
        let ladder = vec![&a, &b];

        // Equal thresholds: declaration order wins, every time
        for _ in 0..10 {
            assert_eq!(highest_eligible(&ladder, 100).unwrap().name, "first");
        }
    }
}
