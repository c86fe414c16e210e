//! Integration tests for the per-(notification, channel) send ledger.

use sqlx::PgPool;

use bistro_core::channels::ChannelType;
use bistro_db::repositories::ChannelSendRepo;

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// Creation is idempotent on (notification, channel): the second call hits
/// the unique index and inserts nothing.
#[sqlx::test(migrations = "../../db/migrations")]
async fn create_if_absent_is_idempotent(pool: PgPool) {
    assert!(ChannelSendRepo::create_if_absent(&pool, "ntf-1", ChannelType::Sms)
        .await
        .unwrap());
    assert!(!ChannelSendRepo::create_if_absent(&pool, "ntf-1", ChannelType::Sms)
        .await
        .unwrap());

    let entry = ChannelSendRepo::get(&pool, "ntf-1", ChannelType::Sms)
        .await
        .unwrap()
        .expect("entry should exist");
    assert!(entry.sent.is_none());
    assert_eq!(entry.attempt_count, 0);
    assert!(!entry.is_terminal());
}

/// Each channel of the same notification gets its own independent entry.
#[sqlx::test(migrations = "../../db/migrations")]
async fn channels_have_independent_entries(pool: PgPool) {
    assert!(ChannelSendRepo::create_if_absent(&pool, "ntf-2", ChannelType::Sms)
        .await
        .unwrap());
    assert!(ChannelSendRepo::create_if_absent(&pool, "ntf-2", ChannelType::Email)
        .await
        .unwrap());

    ChannelSendRepo::mark_sent(&pool, "ntf-2", ChannelType::Email)
        .await
        .unwrap();

    let sms = ChannelSendRepo::get(&pool, "ntf-2", ChannelType::Sms)
        .await
        .unwrap()
        .unwrap();
    let email = ChannelSendRepo::get(&pool, "ntf-2", ChannelType::Email)
        .await
        .unwrap()
        .unwrap();
    assert!(sms.sent.is_none());
    assert_eq!(email.sent, Some(true));
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// `mark_sent` wins exactly once and stamps the attempt time.
#[sqlx::test(migrations = "../../db/migrations")]
async fn mark_sent_is_conditional(pool: PgPool) {
    ChannelSendRepo::create_if_absent(&pool, "ntf-3", ChannelType::Push)
        .await
        .unwrap();

    assert!(ChannelSendRepo::mark_sent(&pool, "ntf-3", ChannelType::Push)
        .await
        .unwrap());
    assert!(!ChannelSendRepo::mark_sent(&pool, "ntf-3", ChannelType::Push)
        .await
        .unwrap());

    let entry = ChannelSendRepo::get(&pool, "ntf-3", ChannelType::Push)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.sent, Some(true));
    assert!(entry.last_attempt_at.is_some());
    assert!(entry.is_terminal());
}

/// Exactly `max_retries` failures flip `sent` to false (terminal failure);
/// further failures on the terminal entry are no-ops.
#[sqlx::test(migrations = "../../db/migrations")]
async fn failure_cap_flips_sent_false(pool: PgPool) {
    ChannelSendRepo::create_if_absent(&pool, "ntf-4", ChannelType::Slack)
        .await
        .unwrap();

    for attempt in 1..3 {
        let terminal = ChannelSendRepo::record_failure(
            &pool,
            "ntf-4",
            ChannelType::Slack,
            &format!("attempt {attempt}"),
            3,
        )
        .await
        .unwrap();
        assert!(!terminal, "attempt {attempt} must not be terminal");
    }

    let entry = ChannelSendRepo::get(&pool, "ntf-4", ChannelType::Slack)
        .await
        .unwrap()
        .unwrap();
    assert!(entry.sent.is_none());
    assert_eq!(entry.attempt_count, 2);
    assert_eq!(entry.last_error_message.as_deref(), Some("attempt 2"));

    assert!(
        ChannelSendRepo::record_failure(&pool, "ntf-4", ChannelType::Slack, "attempt 3", 3)
            .await
            .unwrap()
    );
    assert!(
        !ChannelSendRepo::record_failure(&pool, "ntf-4", ChannelType::Slack, "attempt 4", 3)
            .await
            .unwrap()
    );

    let entry = ChannelSendRepo::get(&pool, "ntf-4", ChannelType::Slack)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.sent, Some(false));
    assert_eq!(entry.attempt_count, 3);
}

/// A successful send cannot be recorded over a terminal failure.
#[sqlx::test(migrations = "../../db/migrations")]
async fn mark_sent_cannot_revive_terminal_failure(pool: PgPool) {
    ChannelSendRepo::create_if_absent(&pool, "ntf-5", ChannelType::Sms)
        .await
        .unwrap();
    ChannelSendRepo::record_failure(&pool, "ntf-5", ChannelType::Sms, "boom", 1)
        .await
        .unwrap();

    assert!(!ChannelSendRepo::mark_sent(&pool, "ntf-5", ChannelType::Sms)
        .await
        .unwrap());
    let entry = ChannelSendRepo::get(&pool, "ntf-5", ChannelType::Sms)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.sent, Some(false));
}

// ---------------------------------------------------------------------------
// Counts and retention
// ---------------------------------------------------------------------------

/// Pending/failed counters ignore successful sends.
#[sqlx::test(migrations = "../../db/migrations")]
async fn counts_split_pending_sent_failed(pool: PgPool) {
    ChannelSendRepo::create_if_absent(&pool, "ntf-6", ChannelType::Sms)
        .await
        .unwrap();
    ChannelSendRepo::create_if_absent(&pool, "ntf-6", ChannelType::Email)
        .await
        .unwrap();
    ChannelSendRepo::create_if_absent(&pool, "ntf-6", ChannelType::Push)
        .await
        .unwrap();

    ChannelSendRepo::mark_sent(&pool, "ntf-6", ChannelType::Email)
        .await
        .unwrap();
    ChannelSendRepo::record_failure(&pool, "ntf-6", ChannelType::Push, "boom", 1)
        .await
        .unwrap();

    assert_eq!(ChannelSendRepo::pending_count(&pool).await.unwrap(), 1);
    assert_eq!(ChannelSendRepo::failed_count(&pool).await.unwrap(), 1);
}

/// Retention removes old terminal entries; pending entries stay.
#[sqlx::test(migrations = "../../db/migrations")]
async fn retention_spares_pending_entries(pool: PgPool) {
    ChannelSendRepo::create_if_absent(&pool, "ntf-7", ChannelType::Sms)
        .await
        .unwrap();
    ChannelSendRepo::create_if_absent(&pool, "ntf-7", ChannelType::Email)
        .await
        .unwrap();
    ChannelSendRepo::mark_sent(&pool, "ntf-7", ChannelType::Email)
        .await
        .unwrap();

    sqlx::query("UPDATE channel_sends SET created_at = NOW() - interval '90 days'")
        .execute(&pool)
        .await
        .unwrap();

    let cutoff = chrono::Utc::now() - chrono::Duration::days(30);
    let removed = ChannelSendRepo::delete_terminal_older_than(&pool, cutoff)
        .await
        .unwrap();
    assert_eq!(removed, 1);

    assert!(ChannelSendRepo::get(&pool, "ntf-7", ChannelType::Email)
        .await
        .unwrap()
        .is_none());
    assert!(ChannelSendRepo::get(&pool, "ntf-7", ChannelType::Sms)
        .await
        .unwrap()
        .is_some());
}
