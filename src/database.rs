use anyhow::Result;
use log::info;
use sqlite::{Connection, State};
use std::sync::Arc;
use tokio::sync::Mutex;

/// A user's accumulated activity counters.
///
/// A missing row reads as all zeros; rows are created lazily on first
/// observed activity. Counters may go negative after admin decrements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserActivity {
    pub message_count: i64,
    pub reaction_count: i64,
    /// Accumulated voice presence in seconds
    pub time_spent: i64,
}

impl UserActivity {
    /// Voice time in whole minutes (floor division)
    pub fn voice_minutes(&self) -> i64 {
        self.time_spent / 60
    }
}

/// Leaderboard / progress metrics backed by local counter columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityMetric {
    Messages,
    Reactions,
    VoiceMinutes,
}

impl ActivityMetric {
    /// SQL expression for the metric; a closed enum, never user input
    fn expr(&self) -> &'static str {
        match self {
            ActivityMetric::Messages => "message_count",
            ActivityMetric::Reactions => "reaction_count",
            ActivityMetric::VoiceMinutes => "time_spent / 60",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ActivityMetric::Messages => "messages",
            ActivityMetric::Reactions => "reactions",
            ActivityMetric::VoiceMinutes => "voice minutes",
        }
    }
}

/// Per-user signature row with its three rotation slots
#[derive(Debug, Clone, Default)]
pub struct SignatureRow {
    pub signature: Option<String>,
    /// RFC 3339 timestamps; slot index is an identity, not a rank
    pub change_times: [Option<String>; 3],
    pub is_disabled: bool,
}

/// Persisted reference to an interactive panel message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRef {
    pub category: String,
    pub message_id: String,
    pub channel_id: String,
}

#[derive(Clone)]
pub struct Database {
    connection: Arc<Mutex<Connection>>,
}

impl Database {
    pub async fn new(database_path: &str) -> Result<Self> {
        let connection = sqlite::open(database_path)?;
        let db = Database {
            connection: Arc::new(Mutex::new(connection)),
        };

        db.init_tables().await?;
        info!("Database initialized at: {database_path}");
        Ok(db)
    }

    async fn init_tables(&self) -> Result<()> {
        let conn = self.connection.lock().await;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS user_activity (
                user_id TEXT PRIMARY KEY,
                message_count INTEGER NOT NULL DEFAULT 0,
                reaction_count INTEGER NOT NULL DEFAULT 0,
                time_spent INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS user_signature (
                user_id TEXT PRIMARY KEY,
                signature TEXT,
                change_time1 TEXT,
                change_time2 TEXT,
                change_time3 TEXT,
                is_disabled INTEGER NOT NULL DEFAULT 0,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS persistent_views (
                category TEXT PRIMARY KEY,
                message_id TEXT NOT NULL,
                channel_id TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS bot_settings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                setting_key TEXT NOT NULL UNIQUE,
                setting_value TEXT,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
        )?;

        Ok(())
    }

    // Activity Counter Methods

    /// Apply three signed deltas to a user's counters in one atomic upsert.
    ///
    /// A single statement so concurrent increments for the same user cannot
    /// lose updates. Negative deltas are applied as-is; there is no floor.
    pub async fn adjust_activity(
        &self,
        user_id: &str,
        d_messages: i64,
        d_reactions: i64,
        d_seconds: i64,
    ) -> Result<()> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "INSERT INTO user_activity (user_id, message_count, reaction_count, time_spent)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                 message_count = message_count + excluded.message_count,
                 reaction_count = reaction_count + excluded.reaction_count,
                 time_spent = time_spent + excluded.time_spent,
                 updated_at = CURRENT_TIMESTAMP",
        )?;
        statement.bind((1, user_id))?;
        statement.bind((2, d_messages))?;
        statement.bind((3, d_reactions))?;
        statement.bind((4, d_seconds))?;
        statement.next()?;
        Ok(())
    }

    pub async fn record_message(&self, user_id: &str) -> Result<()> {
        self.adjust_activity(user_id, 1, 0, 0).await
    }

    pub async fn record_reaction(&self, user_id: &str) -> Result<()> {
        self.adjust_activity(user_id, 0, 1, 0).await
    }

    pub async fn record_voice_seconds(&self, user_id: &str, seconds: i64) -> Result<()> {
        self.adjust_activity(user_id, 0, 0, seconds).await
    }

    /// Read a user's counters; absent rows read as all zeros
    pub async fn activity(&self, user_id: &str) -> Result<UserActivity> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "SELECT message_count, reaction_count, time_spent
             FROM user_activity WHERE user_id = ?",
        )?;
        statement.bind((1, user_id))?;

        if let Ok(State::Row) = statement.next() {
            Ok(UserActivity {
                message_count: statement.read::<i64, _>("message_count")?,
                reaction_count: statement.read::<i64, _>("reaction_count")?,
                time_spent: statement.read::<i64, _>("time_spent")?,
            })
        } else {
            Ok(UserActivity::default())
        }
    }

    /// Top users by a metric, highest first
    pub async fn top_by(&self, metric: ActivityMetric, limit: i64) -> Result<Vec<(String, i64)>> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(&format!(
            "SELECT user_id, {} AS score FROM user_activity
             ORDER BY score DESC
             LIMIT ?",
            metric.expr()
        ))?;
        statement.bind((1, limit))?;

        let mut rows = Vec::new();
        while let Ok(State::Row) = statement.next() {
            let user_id = statement.read::<String, _>("user_id")?;
            let score = statement.read::<i64, _>("score")?;
            rows.push((user_id, score));
        }
        Ok(rows)
    }

    /// Delete a user's counter row entirely (explicit admin action)
    pub async fn delete_activity(&self, user_id: &str) -> Result<()> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare("DELETE FROM user_activity WHERE user_id = ?")?;
        statement.bind((1, user_id))?;
        statement.next()?;
        info!("Deleted activity row for user {user_id}");
        Ok(())
    }

    // Signature Methods

    pub async fn get_signature(&self, user_id: &str) -> Result<Option<SignatureRow>> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "SELECT signature, change_time1, change_time2, change_time3, is_disabled
             FROM user_signature WHERE user_id = ?",
        )?;
        statement.bind((1, user_id))?;

        if let Ok(State::Row) = statement.next() {
            Ok(Some(SignatureRow {
                signature: statement.read::<Option<String>, _>("signature")?,
                change_times: [
                    statement.read::<Option<String>, _>("change_time1")?,
                    statement.read::<Option<String>, _>("change_time2")?,
                    statement.read::<Option<String>, _>("change_time3")?,
                ],
                is_disabled: statement.read::<i64, _>("is_disabled")? != 0,
            }))
        } else {
            Ok(None)
        }
    }

    /// Write a new signature and stamp exactly one rotation slot.
    ///
    /// The other two slots are left untouched.
    pub async fn write_signature(
        &self,
        user_id: &str,
        signature: &str,
        slot: usize,
        timestamp: &str,
    ) -> Result<()> {
        let column = match slot {
            0 => "change_time1",
            1 => "change_time2",
            2 => "change_time3",
            _ => anyhow::bail!("signature slot out of range: {slot}"),
        };

        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(&format!(
            "INSERT INTO user_signature (user_id, signature, {column})
             VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                 signature = excluded.signature,
                 {column} = excluded.{column},
                 updated_at = CURRENT_TIMESTAMP"
        ))?;
        statement.bind((1, user_id))?;
        statement.bind((2, signature))?;
        statement.bind((3, timestamp))?;
        statement.next()?;
        Ok(())
    }

    pub async fn set_signature_disabled(&self, user_id: &str, disabled: bool) -> Result<()> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "INSERT INTO user_signature (user_id, is_disabled)
             VALUES (?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                 is_disabled = excluded.is_disabled,
                 updated_at = CURRENT_TIMESTAMP",
        )?;
        statement.bind((1, user_id))?;
        statement.bind((2, if disabled { 1i64 } else { 0i64 }))?;
        statement.next()?;
        info!("Set signature disabled={disabled} for user {user_id}");
        Ok(())
    }

    /// Clear a user's signature text; rotation slots keep their history
    pub async fn clear_signature(&self, user_id: &str) -> Result<()> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "UPDATE user_signature SET signature = NULL, updated_at = CURRENT_TIMESTAMP
             WHERE user_id = ?",
        )?;
        statement.bind((1, user_id))?;
        statement.next()?;
        info!("Cleared signature for user {user_id}");
        Ok(())
    }

    // Persistent View Methods

    pub async fn save_view(&self, category: &str, message_id: &str, channel_id: &str) -> Result<()> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "INSERT OR REPLACE INTO persistent_views (category, message_id, channel_id)
             VALUES (?, ?, ?)",
        )?;
        statement.bind((1, category))?;
        statement.bind((2, message_id))?;
        statement.bind((3, channel_id))?;
        statement.next()?;
        info!("Saved view reference for category {category}");
        Ok(())
    }

    pub async fn list_views(&self) -> Result<Vec<ViewRef>> {
        let conn = self.connection.lock().await;
        let mut statement =
            conn.prepare("SELECT category, message_id, channel_id FROM persistent_views")?;

        let mut views = Vec::new();
        while let Ok(State::Row) = statement.next() {
            views.push(ViewRef {
                category: statement.read::<String, _>("category")?,
                message_id: statement.read::<String, _>("message_id")?,
                channel_id: statement.read::<String, _>("channel_id")?,
            });
        }
        Ok(views)
    }

    pub async fn delete_view(&self, category: &str) -> Result<()> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare("DELETE FROM persistent_views WHERE category = ?")?;
        statement.bind((1, category))?;
        statement.next()?;
        info!("Pruned view reference for category {category}");
        Ok(())
    }

    // Bot Settings Methods (global runtime-mutable configuration)

    pub async fn set_bot_setting(&self, setting_key: &str, setting_value: &str) -> Result<()> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "INSERT OR REPLACE INTO bot_settings (setting_key, setting_value, updated_at)
             VALUES (?, ?, CURRENT_TIMESTAMP)",
        )?;
        statement.bind((1, setting_key))?;
        statement.bind((2, setting_value))?;
        statement.next()?;
        Ok(())
    }

    pub async fn get_bot_setting(&self, setting_key: &str) -> Result<Option<String>> {
        let conn = self.connection.lock().await;
        let mut statement =
            conn.prepare("SELECT setting_value FROM bot_settings WHERE setting_key = ?")?;
        statement.bind((1, setting_key))?;

        if let Ok(State::Row) = statement.next() {
            Ok(Some(statement.read::<String, _>(0)?))
        } else {
            Ok(None)
        }
    }
}
