//! Counter Store Integration Tests
//!
//! These tests verify the store's atomic increment semantics, the derived
//! progress reads, and the signature/view bookkeeping against an in-memory
//! database.
//!
//! Run with: `cargo test --test activity_store_tests`

use std::sync::Arc;
use waypoint::catalog::SignatureSettings;
use waypoint::progress::{evaluate, progress_count, NullShopGateway};
use waypoint::signature::RotateOutcome;
use waypoint::{AchievementDef, AchievementKind, ActivityMetric, Database, SignatureService};

// ============================================================================
// Counter Semantics
// ============================================================================

/// Final counter value equals the sum of all applied deltas, including
/// negative ones driving it below zero
#[tokio::test]
async fn test_counters_sum_of_deltas() {
    let db = Database::new(":memory:").await.unwrap();

    db.record_message("user1").await.unwrap();
    db.record_message("user1").await.unwrap();
    db.adjust_activity("user1", 5, 0, 0).await.unwrap();
    db.adjust_activity("user1", -10, 0, 0).await.unwrap();

    let activity = db.activity("user1").await.unwrap();
    assert_eq!(activity.message_count, 2 + 5 - 10);
}

/// A missing row reads as all zeros and never errors
#[tokio::test]
async fn test_absent_row_reads_zero() {
    let db = Database::new(":memory:").await.unwrap();

    let activity = db.activity("nobody").await.unwrap();
    assert_eq!(activity.message_count, 0);
    assert_eq!(activity.reaction_count, 0);
    assert_eq!(activity.time_spent, 0);
}

/// Concurrent increments for the same user must not lose updates
#[tokio::test]
async fn test_concurrent_increments() {
    let db = Arc::new(Database::new(":memory:").await.unwrap());

    let db1 = db.clone();
    let db2 = db.clone();

    let handle1 = tokio::spawn(async move {
        for _ in 0..25 {
            db1.record_message("user1").await.unwrap();
        }
    });
    let handle2 = tokio::spawn(async move {
        for _ in 0..25 {
            db2.record_message("user1").await.unwrap();
        }
    });

    handle1.await.unwrap();
    handle2.await.unwrap();

    let activity = db.activity("user1").await.unwrap();
    assert_eq!(activity.message_count, 50);
}

/// One adjust call applies three independent signed deltas
#[tokio::test]
async fn test_adjust_applies_three_deltas() {
    let db = Database::new(":memory:").await.unwrap();

    db.adjust_activity("user1", 3, -2, 120).await.unwrap();

    let activity = db.activity("user1").await.unwrap();
    assert_eq!(activity.message_count, 3);
    assert_eq!(activity.reaction_count, -2);
    assert_eq!(activity.time_spent, 120);
}

/// Voice minutes derive from stored seconds by floor division
#[tokio::test]
async fn test_voice_minutes_floor_division() {
    let db = Database::new(":memory:").await.unwrap();

    db.record_voice_seconds("user1", 119).await.unwrap();
    assert_eq!(db.activity("user1").await.unwrap().voice_minutes(), 1);

    db.record_voice_seconds("user1", 1).await.unwrap();
    assert_eq!(db.activity("user1").await.unwrap().voice_minutes(), 2);

    let shop = NullShopGateway;
    let count = progress_count(&db, &shop, "user1", AchievementKind::TimeSpent)
        .await
        .unwrap();
    assert_eq!(count, 2);
}

// ============================================================================
// Leaderboard
// ============================================================================

#[tokio::test]
async fn test_leaderboard_orders_descending() {
    let db = Database::new(":memory:").await.unwrap();

    db.adjust_activity("user1", 5, 0, 0).await.unwrap();
    db.adjust_activity("user2", 20, 0, 0).await.unwrap();
    db.adjust_activity("user3", 10, 0, 0).await.unwrap();

    let top = db.top_by(ActivityMetric::Messages, 10).await.unwrap();
    let ids: Vec<&str> = top.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["user2", "user3", "user1"]);
    assert_eq!(top[0].1, 20);
}

#[tokio::test]
async fn test_leaderboard_respects_limit() {
    let db = Database::new(":memory:").await.unwrap();

    for i in 0..15 {
        db.adjust_activity(&format!("user{i}"), i, 0, 0).await.unwrap();
    }

    let top = db.top_by(ActivityMetric::Messages, 10).await.unwrap();
    assert_eq!(top.len(), 10);
}

#[tokio::test]
async fn test_leaderboard_voice_minutes_metric() {
    let db = Database::new(":memory:").await.unwrap();

    db.record_voice_seconds("user1", 3600).await.unwrap();
    db.record_voice_seconds("user2", 90).await.unwrap();

    let top = db.top_by(ActivityMetric::VoiceMinutes, 10).await.unwrap();
    assert_eq!(top[0], ("user1".to_string(), 60));
    assert_eq!(top[1], ("user2".to_string(), 1));
}

// ============================================================================
// End-to-End Progress
// ============================================================================

/// Ten messages complete a threshold-10 achievement; an eleventh keeps it
/// completed with no tier change
#[tokio::test]
async fn test_ten_messages_complete_hello() {
    let db = Database::new(":memory:").await.unwrap();
    let shop = NullShopGateway;

    let hello = AchievementDef {
        name: "Hello!".to_string(),
        description: "Send 10 messages".to_string(),
        kind: AchievementKind::Message,
        threshold: 10,
        role_id: Some(201),
    };

    for _ in 0..10 {
        db.record_message("user1").await.unwrap();
    }

    let count = progress_count(&db, &shop, "user1", AchievementKind::Message)
        .await
        .unwrap();
    let reports = evaluate(&[&hello], count);
    assert!(reports[0].completed);
    assert!((reports[0].ratio - 1.0).abs() < f64::EPSILON);

    db.record_message("user1").await.unwrap();

    let count = progress_count(&db, &shop, "user1", AchievementKind::Message)
        .await
        .unwrap();
    let reports = evaluate(&[&hello], count);
    assert!(reports[0].completed);
    assert!((reports[0].ratio - 1.0).abs() < f64::EPSILON);
}

// ============================================================================
// Signature Store
// ============================================================================

fn signature_service(db: &Database, required_voice_minutes: i64) -> SignatureService {
    SignatureService::new(
        db.clone(),
        SignatureSettings {
            exempt_role: None,
            required_voice_minutes,
            default_cooldown_minutes: 7 * 24 * 60,
        },
    )
}

/// First rotation of a brand-new user lands in slot 1
#[tokio::test]
async fn test_first_rotation_uses_slot_one() {
    let db = Database::new(":memory:").await.unwrap();
    let service = signature_service(&db, 0);

    let outcome = service.rotate("user1", &[], "o7").await.unwrap();
    assert_eq!(outcome, RotateOutcome::Updated { remaining: 2 });

    let row = db.get_signature("user1").await.unwrap().unwrap();
    assert_eq!(row.signature.as_deref(), Some("o7"));
    assert!(row.change_times[0].is_some());
    assert!(row.change_times[1].is_none());
    assert!(row.change_times[2].is_none());
}

/// Three quick rotations exhaust the slots; the fourth is rejected and
/// reports the stored text
#[tokio::test]
async fn test_fourth_rotation_rejected() {
    let db = Database::new(":memory:").await.unwrap();
    let service = signature_service(&db, 0);

    for text in ["one", "two", "three"] {
        let outcome = service.rotate("user1", &[], text).await.unwrap();
        assert!(matches!(outcome, RotateOutcome::Updated { .. }));
    }

    let outcome = service.rotate("user1", &[], "four").await.unwrap();
    assert_eq!(
        outcome,
        RotateOutcome::NoSlot {
            current: Some("three".to_string())
        }
    );
}

/// The voice-minutes gate rejects with current and required values
#[tokio::test]
async fn test_rotation_gated_on_voice_minutes() {
    let db = Database::new(":memory:").await.unwrap();
    let service = signature_service(&db, 600);

    db.record_voice_seconds("user1", 1200).await.unwrap(); // 20 minutes

    let outcome = service.rotate("user1", &[], "o7").await.unwrap();
    assert_eq!(
        outcome,
        RotateOutcome::NotEligible {
            minutes: 20,
            required: 600
        }
    );
}

/// The disabled flag blocks rotation regardless of slot availability
#[tokio::test]
async fn test_disabled_blocks_rotation() {
    let db = Database::new(":memory:").await.unwrap();
    let service = signature_service(&db, 0);

    db.set_signature_disabled("user1", true).await.unwrap();

    let outcome = service.rotate("user1", &[], "o7").await.unwrap();
    assert_eq!(outcome, RotateOutcome::Disabled);
}

/// A shorter cooldown set at runtime frees slots without a restart
#[tokio::test]
async fn test_cooldown_change_applies_immediately() {
    let db = Database::new(":memory:").await.unwrap();
    let service = signature_service(&db, 0);

    for text in ["one", "two", "three"] {
        service.rotate("user1", &[], text).await.unwrap();
    }
    assert!(matches!(
        service.rotate("user1", &[], "four").await.unwrap(),
        RotateOutcome::NoSlot { .. }
    ));

    // Zero-minute cooldown: every stamped slot is immediately stale again
    service.set_cooldown_minutes(0).await.unwrap();
    assert!(matches!(
        service.rotate("user1", &[], "four").await.unwrap(),
        RotateOutcome::Updated { .. }
    ));
}

/// Writing a slot touches only that slot's timestamp
#[tokio::test]
async fn test_write_signature_touches_one_slot() {
    let db = Database::new(":memory:").await.unwrap();

    db.write_signature("user1", "first", 0, "2026-01-01T00:00:00+00:00")
        .await
        .unwrap();
    db.write_signature("user1", "second", 2, "2026-02-01T00:00:00+00:00")
        .await
        .unwrap();

    let row = db.get_signature("user1").await.unwrap().unwrap();
    assert_eq!(row.signature.as_deref(), Some("second"));
    assert_eq!(
        row.change_times[0].as_deref(),
        Some("2026-01-01T00:00:00+00:00")
    );
    assert!(row.change_times[1].is_none());
    assert_eq!(
        row.change_times[2].as_deref(),
        Some("2026-02-01T00:00:00+00:00")
    );
}

/// Admin clear removes the text but keeps the rotation history
#[tokio::test]
async fn test_clear_signature_keeps_slots() {
    let db = Database::new(":memory:").await.unwrap();

    db.write_signature("user1", "o7", 0, "2026-01-01T00:00:00+00:00")
        .await
        .unwrap();
    db.clear_signature("user1").await.unwrap();

    let row = db.get_signature("user1").await.unwrap().unwrap();
    assert!(row.signature.is_none());
    assert!(row.change_times[0].is_some());
}

// ============================================================================
// Persisted Views
// ============================================================================

#[tokio::test]
async fn test_view_refs_round_trip() {
    let db = Database::new(":memory:").await.unwrap();

    db.save_view("star_sign", "111", "222").await.unwrap();
    db.save_view("gender", "333", "444").await.unwrap();

    let views = db.list_views().await.unwrap();
    assert_eq!(views.len(), 2);

    // Re-posting a panel replaces its reference
    db.save_view("star_sign", "555", "222").await.unwrap();
    let views = db.list_views().await.unwrap();
    assert_eq!(views.len(), 2);
    let star = views.iter().find(|v| v.category == "star_sign").unwrap();
    assert_eq!(star.message_id, "555");

    db.delete_view("star_sign").await.unwrap();
    let views = db.list_views().await.unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].category, "gender");
}

// ============================================================================
// Bot Settings
// ============================================================================

#[tokio::test]
async fn test_bot_settings_round_trip() {
    let db = Database::new(":memory:").await.unwrap();

    assert!(db.get_bot_setting("signature_cooldown_minutes").await.unwrap().is_none());

    db.set_bot_setting("signature_cooldown_minutes", "1440")
        .await
        .unwrap();
    assert_eq!(
        db.get_bot_setting("signature_cooldown_minutes").await.unwrap(),
        Some("1440".to_string())
    );

    db.set_bot_setting("signature_cooldown_minutes", "60")
        .await
        .unwrap();
    assert_eq!(
        db.get_bot_setting("signature_cooldown_minutes").await.unwrap(),
        Some("60".to_string())
    );
}
