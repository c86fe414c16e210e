//! Repository for the `notification_outbox` table.

use bistro_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::notification_outbox::{NewNotificationOutboxEntry, NotificationOutboxEntry};

/// Column list for `notification_outbox` queries.
const COLUMNS: &str = "id, notification_id, notification_type, payload, status, retry_count, \
     error_message, created_at, processed_at";

/// Provides operations on the notification outbox ledger.
pub struct NotificationOutboxRepo;

impl NotificationOutboxRepo {
    /// Insert a new pending notification, returning the generated row ID.
    pub async fn insert(
        pool: &PgPool,
        entry: &NewNotificationOutboxEntry,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO notification_outbox (notification_id, notification_type, payload) \
             VALUES ($1, $2, $3) \
             RETURNING id",
        )
        .bind(&entry.notification_id)
        .bind(&entry.notification_type)
        .bind(&entry.payload)
        .fetch_one(pool)
        .await
    }

    /// Fetch a single entry by its business notification ID.
    pub async fn get_by_notification_id(
        pool: &PgPool,
        notification_id: &str,
    ) -> Result<Option<NotificationOutboxEntry>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM notification_outbox WHERE notification_id = $1");
        sqlx::query_as::<_, NotificationOutboxEntry>(&query)
            .bind(notification_id)
            .fetch_optional(pool)
            .await
    }

    /// List a bounded batch of pending notifications, oldest first.
    pub async fn list_pending(
        pool: &PgPool,
        limit: i64,
    ) -> Result<Vec<NotificationOutboxEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_outbox \
             WHERE status = 'PENDING' \
             ORDER BY created_at ASC \
             LIMIT $1"
        );
        sqlx::query_as::<_, NotificationOutboxEntry>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Mark an entry published after a successful broker publish.
    ///
    /// Conditional on `status = 'PENDING'`; returns whether this call won
    /// the transition.
    pub async fn mark_published(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notification_outbox \
             SET status = 'PUBLISHED', processed_at = NOW(), error_message = NULL \
             WHERE id = $1 AND status = 'PENDING'",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a failed publish attempt; flips to `FAILED` at the retry cap.
    ///
    /// Returns `true` if the row is now terminally failed.
    pub async fn record_failure(
        pool: &PgPool,
        id: DbId,
        error: &str,
        max_retries: i32,
    ) -> Result<bool, sqlx::Error> {
        let status: Option<String> = sqlx::query_scalar(
            "UPDATE notification_outbox \
             SET retry_count = retry_count + 1, \
                 error_message = $2, \
                 status = CASE WHEN retry_count + 1 >= $3 THEN 'FAILED' ELSE 'PENDING' END \
             WHERE id = $1 AND status = 'PENDING' \
             RETURNING status",
        )
        .bind(id)
        .bind(error)
        .bind(max_retries)
        .fetch_optional(pool)
        .await?;
        Ok(status.as_deref() == Some("FAILED"))
    }

    /// Number of rows still awaiting fan-out publication.
    pub async fn pending_count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT COUNT(*) FROM notification_outbox WHERE status = 'PENDING'")
                .fetch_one(pool)
                .await?;
        Ok(count.unwrap_or(0))
    }

    /// Number of terminally failed rows.
    pub async fn failed_count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT COUNT(*) FROM notification_outbox WHERE status = 'FAILED'")
                .fetch_one(pool)
                .await?;
        Ok(count.unwrap_or(0))
    }

    /// Delete terminal rows older than `cutoff`. Returns the rows removed.
    pub async fn delete_terminal_older_than(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM notification_outbox \
             WHERE status IN ('PUBLISHED', 'FAILED') AND created_at < $1",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
