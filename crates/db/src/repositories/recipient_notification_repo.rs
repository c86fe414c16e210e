//! Repository for the `recipient_notifications` table.

use bistro_core::channels::ChannelType;
use bistro_core::types::DbId;
use sqlx::PgPool;

use crate::models::recipient_notification::{
    NewRecipientNotification, RecipientChannelNotification,
};

/// Column list for `recipient_notifications` queries.
const COLUMNS: &str = "id, event_id, notification_id, recipient_id, recipient_type, \
     restaurant_id, channel, title, body, status, priority, read_by_all, read_at, \
     created_at, updated_at";

/// Provides operations on disaggregated recipient notifications.
pub struct RecipientNotificationRepo;

impl RecipientNotificationRepo {
    /// Create a row if none exists for `(event_id, recipient_id, channel)`.
    ///
    /// The idempotent-creation primitive: a redelivered broker message hits
    /// the unique index and inserts nothing. Returns `true` if a row was
    /// inserted.
    pub async fn create_if_absent(
        pool: &PgPool,
        entry: &NewRecipientNotification,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO recipient_notifications \
                (event_id, notification_id, recipient_id, recipient_type, restaurant_id, \
                 channel, title, body, priority, read_by_all) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (event_id, recipient_id, channel) DO NOTHING",
        )
        .bind(&entry.event_id)
        .bind(&entry.notification_id)
        .bind(entry.recipient_id)
        .bind(&entry.recipient_type)
        .bind(entry.restaurant_id)
        .bind(entry.channel.as_str())
        .bind(&entry.title)
        .bind(&entry.body)
        .bind(entry.priority.as_str())
        .bind(entry.read_by_all)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Fetch a row by primary key.
    pub async fn get(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<RecipientChannelNotification>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM recipient_notifications WHERE id = $1");
        sqlx::query_as::<_, RecipientChannelNotification>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Distinct notification IDs that still have at least one pending row.
    ///
    /// The channel poller's outer work queue, oldest notification first.
    pub async fn list_notifications_with_pending(
        pool: &PgPool,
        limit: i64,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT notification_id FROM recipient_notifications \
             WHERE status = 'PENDING' \
             GROUP BY notification_id \
             ORDER BY MIN(created_at) ASC \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Pending rows for one notification on one channel.
    pub async fn list_pending_for_channel(
        pool: &PgPool,
        notification_id: &str,
        channel: ChannelType,
    ) -> Result<Vec<RecipientChannelNotification>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM recipient_notifications \
             WHERE notification_id = $1 AND channel = $2 AND status = 'PENDING' \
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, RecipientChannelNotification>(&query)
            .bind(notification_id)
            .bind(channel.as_str())
            .fetch_all(pool)
            .await
    }

    /// Mark one row delivered. Conditional on `status = 'PENDING'`.
    pub async fn mark_delivered(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE recipient_notifications \
             SET status = 'DELIVERED', updated_at = NOW() \
             WHERE id = $1 AND status = 'PENDING'",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark one row terminally failed. Conditional on `status = 'PENDING'`.
    pub async fn mark_failed(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE recipient_notifications \
             SET status = 'FAILED', updated_at = NOW() \
             WHERE id = $1 AND status = 'PENDING'",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark every pending row of a (notification, channel) pair delivered.
    ///
    /// Used when the channel send ledger records a success that covers all
    /// recipients on the channel. Returns the rows updated.
    pub async fn mark_channel_delivered(
        pool: &PgPool,
        notification_id: &str,
        channel: ChannelType,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE recipient_notifications \
             SET status = 'DELIVERED', updated_at = NOW() \
             WHERE notification_id = $1 AND channel = $2 AND status = 'PENDING'",
        )
        .bind(notification_id)
        .bind(channel.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Mark every pending row of a (notification, channel) pair failed.
    pub async fn mark_channel_failed(
        pool: &PgPool,
        notification_id: &str,
        channel: ChannelType,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE recipient_notifications \
             SET status = 'FAILED', updated_at = NOW() \
             WHERE notification_id = $1 AND channel = $2 AND status = 'PENDING'",
        )
        .bind(notification_id)
        .bind(channel.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Mark a notification read by the acting recipient.
    ///
    /// For a broadcast row (`read_by_all = true`) every sibling row sharing
    /// `(event_id, restaurant_id)` is marked READ in one batch update; for
    /// an individual row only the acting recipient's row changes. Rows
    /// already READ are left untouched. Returns the number of rows marked,
    /// or `None` if the row does not exist for the given recipient.
    pub async fn mark_read(
        pool: &PgPool,
        id: DbId,
        recipient_id: DbId,
    ) -> Result<Option<u64>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM recipient_notifications \
             WHERE id = $1 AND recipient_id = $2"
        );
        let row = sqlx::query_as::<_, RecipientChannelNotification>(&query)
            .bind(id)
            .bind(recipient_id)
            .fetch_optional(pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let marked = if row.read_by_all {
            sqlx::query(
                "UPDATE recipient_notifications \
                 SET status = 'READ', read_at = NOW(), updated_at = NOW() \
                 WHERE event_id = $1 AND restaurant_id = $2 AND status <> 'READ'",
            )
            .bind(&row.event_id)
            .bind(row.restaurant_id)
            .execute(pool)
            .await?
            .rows_affected()
        } else {
            sqlx::query(
                "UPDATE recipient_notifications \
                 SET status = 'READ', read_at = NOW(), updated_at = NOW() \
                 WHERE id = $1 AND status <> 'READ'",
            )
            .bind(id)
            .execute(pool)
            .await?
            .rows_affected()
        };

        Ok(Some(marked))
    }

    /// List notifications for a recipient, newest first.
    pub async fn list_for_recipient(
        pool: &PgPool,
        recipient_id: DbId,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RecipientChannelNotification>, sqlx::Error> {
        let filter = if unread_only {
            "AND status <> 'READ'"
        } else {
            ""
        };
        let query = format!(
            "SELECT {COLUMNS} FROM recipient_notifications \
             WHERE recipient_id = $1 {filter} \
             ORDER BY created_at DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, RecipientChannelNotification>(&query)
            .bind(recipient_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Number of not-yet-read notifications for a recipient.
    pub async fn unread_count(pool: &PgPool, recipient_id: DbId) -> Result<i64, sqlx::Error> {
        let count: Option<i64> = sqlx::query_scalar(
            "SELECT COUNT(*) FROM recipient_notifications \
             WHERE recipient_id = $1 AND status <> 'READ'",
        )
        .bind(recipient_id)
        .fetch_one(pool)
        .await?;
        Ok(count.unwrap_or(0))
    }

    /// Delete READ rows older than `cutoff`. Returns the rows removed.
    pub async fn delete_read_older_than(
        pool: &PgPool,
        cutoff: bistro_core::types::Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM recipient_notifications \
             WHERE status = 'READ' AND created_at < $1",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
