//! # Feature: Voice Time Tracking
//!
//! Accumulates voice-channel presence into the per-user `time_spent`
//! counter. Open sessions live only in memory: a join stamps the start
//! time, a leave converts the elapsed time into one atomic counter
//! increment. A process restart drops not-yet-closed sessions; that loss
//! is accepted, the store is never left half-updated.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: Initial release

use crate::database::Database;
use anyhow::Result;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{debug, info};
use serenity::model::voice::VoiceState;
use std::sync::Arc;

/// Session registry keyed by user id; one entry per continuous voice presence
#[derive(Clone)]
pub struct VoiceTracker {
    database: Database,
    sessions: Arc<DashMap<String, DateTime<Utc>>>,
}

impl VoiceTracker {
    pub fn new(database: Database) -> Self {
        VoiceTracker {
            database,
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Handle a gateway voice-state transition
    pub async fn handle_update(&self, old: Option<&VoiceState>, new: &VoiceState) -> Result<()> {
        let user_id = new.user_id.to_string();
        let was_in = old.map(|o| o.channel_id.is_some()).unwrap_or(false);
        let now_in = new.channel_id.is_some();

        match (was_in, now_in) {
            (false, true) => {
                self.note_join(&user_id, Utc::now());
                Ok(())
            }
            (true, false) => {
                if let Some(seconds) = self.note_leave(&user_id, Utc::now()) {
                    self.database.record_voice_seconds(&user_id, seconds).await?;
                    info!("Recorded {seconds}s of voice time for user {user_id}");
                } else {
                    // Session opened before the last restart; its start time is gone
                    debug!("No open session for user {user_id} on leave; skipping");
                }
                Ok(())
            }
            // Channel moves and mute/deafen updates keep the session running
            _ => Ok(()),
        }
    }

    fn note_join(&self, user_id: &str, now: DateTime<Utc>) {
        self.sessions.entry(user_id.to_string()).or_insert(now);
    }

    /// Close a session and return its length in seconds, if one was open
    fn note_leave(&self, user_id: &str, now: DateTime<Utc>) -> Option<i64> {
        self.sessions
            .remove(user_id)
            .map(|(_, start)| now.signed_duration_since(start).num_seconds().max(0))
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_join_then_leave_measures_elapsed() {
        let db = Database::new(":memory:").await.unwrap();
        let tracker = VoiceTracker::new(db);

        let start = Utc::now();
        tracker.note_join("42", start);
        assert_eq!(tracker.open_sessions(), 1);

        let seconds = tracker.note_leave("42", start + Duration::seconds(90)).unwrap();
        assert_eq!(seconds, 90);
        assert_eq!(tracker.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_join_keeps_original_start() {
        let db = Database::new(":memory:").await.unwrap();
        let tracker = VoiceTracker::new(db);

        let start = Utc::now();
        tracker.note_join("42", start);
        tracker.note_join("42", start + Duration::seconds(30));

        let seconds = tracker.note_leave("42", start + Duration::seconds(60)).unwrap();
        assert_eq!(seconds, 60);
    }

    #[tokio::test]
    async fn test_leave_without_join_is_lossy_not_fatal() {
        let db = Database::new(":memory:").await.unwrap();
        let tracker = VoiceTracker::new(db);

        assert!(tracker.note_leave("42", Utc::now()).is_none());
    }

    #[tokio::test]
    async fn test_clock_skew_clamps_to_zero() {
        let db = Database::new(":memory:").await.unwrap();
        let tracker = VoiceTracker::new(db);

        let start = Utc::now();
        tracker.note_join("42", start);
        let seconds = tracker.note_leave("42", start - Duration::seconds(5)).unwrap();
        assert_eq!(seconds, 0);
    }
}
