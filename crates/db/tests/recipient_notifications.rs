//! Integration tests for disaggregated recipient notifications.
//!
//! Covers the idempotency key, conditional delivery transitions, the
//! per-channel batch updates, broadcast-read propagation, and recipient
//! queries.

use sqlx::PgPool;

use bistro_core::channels::ChannelType;
use bistro_core::types::Priority;
use bistro_db::models::NewRecipientNotification;
use bistro_db::repositories::RecipientNotificationRepo;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_row(
    event_id: &str,
    recipient_id: i64,
    channel: ChannelType,
    read_by_all: bool,
) -> NewRecipientNotification {
    NewRecipientNotification {
        event_id: event_id.to_string(),
        notification_id: format!("ntf-{event_id}"),
        recipient_id,
        recipient_type: "staff".to_string(),
        restaurant_id: 1,
        channel,
        title: "Table ready".to_string(),
        body: "Table 5 is ready for seating".to_string(),
        priority: Priority::Normal,
        read_by_all,
    }
}

async fn row_id(pool: &PgPool, event_id: &str, recipient_id: i64, channel: ChannelType) -> i64 {
    sqlx::query_scalar(
        "SELECT id FROM recipient_notifications \
         WHERE event_id = $1 AND recipient_id = $2 AND channel = $3",
    )
    .bind(event_id)
    .bind(recipient_id)
    .bind(channel.as_str())
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn status_of(pool: &PgPool, id: i64) -> String {
    sqlx::query_scalar("SELECT status FROM recipient_notifications WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Idempotent creation
// ---------------------------------------------------------------------------

/// (event, recipient, channel) is the idempotency key: a redelivered
/// message inserts nothing, while a different recipient or channel does.
#[sqlx::test(migrations = "../../db/migrations")]
async fn creation_is_idempotent_per_recipient_and_channel(pool: PgPool) {
    let row = new_row("evt-1", 10, ChannelType::Email, false);
    assert!(RecipientNotificationRepo::create_if_absent(&pool, &row)
        .await
        .unwrap());
    assert!(!RecipientNotificationRepo::create_if_absent(&pool, &row)
        .await
        .unwrap());

    assert!(RecipientNotificationRepo::create_if_absent(
        &pool,
        &new_row("evt-1", 11, ChannelType::Email, false)
    )
    .await
    .unwrap());
    assert!(RecipientNotificationRepo::create_if_absent(
        &pool,
        &new_row("evt-1", 10, ChannelType::Sms, false)
    )
    .await
    .unwrap());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recipient_notifications")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 3);
}

// ---------------------------------------------------------------------------
// Delivery transitions
// ---------------------------------------------------------------------------

/// `mark_delivered` wins exactly once; a delivered row cannot flip to FAILED.
#[sqlx::test(migrations = "../../db/migrations")]
async fn delivery_transitions_are_monotonic(pool: PgPool) {
    RecipientNotificationRepo::create_if_absent(&pool, &new_row("evt-2", 10, ChannelType::Sms, false))
        .await
        .unwrap();
    let id = row_id(&pool, "evt-2", 10, ChannelType::Sms).await;

    assert!(RecipientNotificationRepo::mark_delivered(&pool, id)
        .await
        .unwrap());
    assert!(!RecipientNotificationRepo::mark_delivered(&pool, id)
        .await
        .unwrap());
    assert!(!RecipientNotificationRepo::mark_failed(&pool, id)
        .await
        .unwrap());
    assert_eq!(status_of(&pool, id).await, "DELIVERED");
}

/// The per-channel batch updates touch only the named channel's pending rows.
#[sqlx::test(migrations = "../../db/migrations")]
async fn channel_batch_updates_respect_channel_boundary(pool: PgPool) {
    for recipient in [10, 11] {
        for channel in [ChannelType::Sms, ChannelType::Email] {
            RecipientNotificationRepo::create_if_absent(
                &pool,
                &new_row("evt-3", recipient, channel, false),
            )
            .await
            .unwrap();
        }
    }

    let updated =
        RecipientNotificationRepo::mark_channel_delivered(&pool, "ntf-evt-3", ChannelType::Email)
            .await
            .unwrap();
    assert_eq!(updated, 2);

    let failed =
        RecipientNotificationRepo::mark_channel_failed(&pool, "ntf-evt-3", ChannelType::Sms)
            .await
            .unwrap();
    assert_eq!(failed, 2);

    for recipient in [10, 11] {
        let email = row_id(&pool, "evt-3", recipient, ChannelType::Email).await;
        let sms = row_id(&pool, "evt-3", recipient, ChannelType::Sms).await;
        assert_eq!(status_of(&pool, email).await, "DELIVERED");
        assert_eq!(status_of(&pool, sms).await, "FAILED");
    }
}

/// Pending listing for a channel excludes other channels and non-pending rows.
#[sqlx::test(migrations = "../../db/migrations")]
async fn pending_listing_is_channel_scoped(pool: PgPool) {
    RecipientNotificationRepo::create_if_absent(&pool, &new_row("evt-4", 10, ChannelType::Sms, false))
        .await
        .unwrap();
    RecipientNotificationRepo::create_if_absent(&pool, &new_row("evt-4", 11, ChannelType::Sms, false))
        .await
        .unwrap();
    RecipientNotificationRepo::create_if_absent(
        &pool,
        &new_row("evt-4", 10, ChannelType::Email, false),
    )
    .await
    .unwrap();

    let delivered = row_id(&pool, "evt-4", 11, ChannelType::Sms).await;
    RecipientNotificationRepo::mark_delivered(&pool, delivered)
        .await
        .unwrap();

    let pending =
        RecipientNotificationRepo::list_pending_for_channel(&pool, "ntf-evt-4", ChannelType::Sms)
            .await
            .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].recipient_id, 10);

    let with_pending = RecipientNotificationRepo::list_notifications_with_pending(&pool, 100)
        .await
        .unwrap();
    assert_eq!(with_pending, vec!["ntf-evt-4".to_string()]);
}

// ---------------------------------------------------------------------------
// Broadcast reads
// ---------------------------------------------------------------------------

/// With `read_by_all`, one recipient's read marks every sibling row of the
/// same (event, restaurant) READ in a single batch.
#[sqlx::test(migrations = "../../db/migrations")]
async fn broadcast_read_propagates_to_siblings(pool: PgPool) {
    for recipient in 1..=10 {
        RecipientNotificationRepo::create_if_absent(
            &pool,
            &new_row("evt-5", recipient, ChannelType::Websocket, true),
        )
        .await
        .unwrap();
    }

    let acting = row_id(&pool, "evt-5", 3, ChannelType::Websocket).await;
    let marked = RecipientNotificationRepo::mark_read(&pool, acting, 3)
        .await
        .unwrap()
        .expect("row exists for recipient");
    assert_eq!(marked, 10);

    let unread: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM recipient_notifications WHERE status <> 'READ'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(unread, 0);

    let read_at_set: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM recipient_notifications WHERE read_at IS NOT NULL",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(read_at_set, 10);
}

/// Without `read_by_all`, a read touches only the acting recipient's row.
#[sqlx::test(migrations = "../../db/migrations")]
async fn individual_read_marks_single_row(pool: PgPool) {
    for recipient in 1..=3 {
        RecipientNotificationRepo::create_if_absent(
            &pool,
            &new_row("evt-6", recipient, ChannelType::Push, false),
        )
        .await
        .unwrap();
    }

    let acting = row_id(&pool, "evt-6", 2, ChannelType::Push).await;
    let marked = RecipientNotificationRepo::mark_read(&pool, acting, 2)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(marked, 1);

    assert_eq!(status_of(&pool, acting).await, "READ");
    let other = row_id(&pool, "evt-6", 1, ChannelType::Push).await;
    assert_eq!(status_of(&pool, other).await, "PENDING");
}

/// Re-reading an already-read broadcast notification marks nothing new, and
/// a wrong recipient gets a not-found.
#[sqlx::test(migrations = "../../db/migrations")]
async fn repeated_and_foreign_reads(pool: PgPool) {
    RecipientNotificationRepo::create_if_absent(
        &pool,
        &new_row("evt-7", 1, ChannelType::Websocket, true),
    )
    .await
    .unwrap();
    let id = row_id(&pool, "evt-7", 1, ChannelType::Websocket).await;

    assert_eq!(
        RecipientNotificationRepo::mark_read(&pool, id, 1)
            .await
            .unwrap(),
        Some(1)
    );
    assert_eq!(
        RecipientNotificationRepo::mark_read(&pool, id, 1)
            .await
            .unwrap(),
        Some(0)
    );
    // Recipient 99 does not own this row.
    assert_eq!(
        RecipientNotificationRepo::mark_read(&pool, id, 99)
            .await
            .unwrap(),
        None
    );
}

// ---------------------------------------------------------------------------
// Recipient queries and retention
// ---------------------------------------------------------------------------

/// Listing and unread counting are scoped to the recipient.
#[sqlx::test(migrations = "../../db/migrations")]
async fn listing_and_unread_count_per_recipient(pool: PgPool) {
    RecipientNotificationRepo::create_if_absent(&pool, &new_row("evt-8", 1, ChannelType::Push, false))
        .await
        .unwrap();
    RecipientNotificationRepo::create_if_absent(&pool, &new_row("evt-9", 1, ChannelType::Push, false))
        .await
        .unwrap();
    RecipientNotificationRepo::create_if_absent(&pool, &new_row("evt-8", 2, ChannelType::Push, false))
        .await
        .unwrap();

    let read = row_id(&pool, "evt-8", 1, ChannelType::Push).await;
    RecipientNotificationRepo::mark_read(&pool, read, 1)
        .await
        .unwrap();

    assert_eq!(
        RecipientNotificationRepo::unread_count(&pool, 1).await.unwrap(),
        1
    );
    assert_eq!(
        RecipientNotificationRepo::unread_count(&pool, 2).await.unwrap(),
        1
    );

    let all = RecipientNotificationRepo::list_for_recipient(&pool, 1, false, 10, 0)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let unread = RecipientNotificationRepo::list_for_recipient(&pool, 1, true, 10, 0)
        .await
        .unwrap();
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].event_id, "evt-9");
}

/// Retention removes old READ rows only; unread rows of any age stay.
#[sqlx::test(migrations = "../../db/migrations")]
async fn retention_spares_unread_rows(pool: PgPool) {
    RecipientNotificationRepo::create_if_absent(&pool, &new_row("evt-a", 1, ChannelType::Sms, false))
        .await
        .unwrap();
    RecipientNotificationRepo::create_if_absent(&pool, &new_row("evt-b", 1, ChannelType::Sms, false))
        .await
        .unwrap();

    let read = row_id(&pool, "evt-a", 1, ChannelType::Sms).await;
    RecipientNotificationRepo::mark_read(&pool, read, 1)
        .await
        .unwrap();

    sqlx::query("UPDATE recipient_notifications SET created_at = NOW() - interval '90 days'")
        .execute(&pool)
        .await
        .unwrap();

    let cutoff = chrono::Utc::now() - chrono::Duration::days(30);
    let removed = RecipientNotificationRepo::delete_read_older_than(&pool, cutoff)
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recipient_notifications")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 1);
}
