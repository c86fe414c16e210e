//! Repository for the `channel_sends` table.

use bistro_core::channels::ChannelType;
use sqlx::PgPool;

use crate::models::channel_send::ChannelSendEntry;

/// Column list for `channel_sends` queries.
const COLUMNS: &str = "id, notification_id, channel_type, sent, attempt_count, \
     last_error_message, last_attempt_at, created_at";

/// Provides operations on the per-(notification, channel) send ledger.
pub struct ChannelSendRepo;

impl ChannelSendRepo {
    /// Create a pending send entry if none exists for the pair.
    ///
    /// Idempotent under concurrent callers via the unique index and
    /// `ON CONFLICT DO NOTHING`. Returns `true` if a row was inserted.
    pub async fn create_if_absent(
        pool: &PgPool,
        notification_id: &str,
        channel: ChannelType,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO channel_sends (notification_id, channel_type) \
             VALUES ($1, $2) \
             ON CONFLICT (notification_id, channel_type) DO NOTHING",
        )
        .bind(notification_id)
        .bind(channel.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Fetch the entry for a (notification, channel) pair.
    pub async fn get(
        pool: &PgPool,
        notification_id: &str,
        channel: ChannelType,
    ) -> Result<Option<ChannelSendEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM channel_sends \
             WHERE notification_id = $1 AND channel_type = $2"
        );
        sqlx::query_as::<_, ChannelSendEntry>(&query)
            .bind(notification_id)
            .bind(channel.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Mark a send successful. Conditional on the entry still being pending;
    /// returns whether this call won the transition.
    pub async fn mark_sent(
        pool: &PgPool,
        notification_id: &str,
        channel: ChannelType,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE channel_sends \
             SET sent = true, last_attempt_at = NOW() \
             WHERE notification_id = $1 AND channel_type = $2 AND sent IS NULL",
        )
        .bind(notification_id)
        .bind(channel.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a failed send attempt.
    ///
    /// Increments `attempt_count`; when the incremented count reaches
    /// `max_retries` the entry becomes `sent = false` (terminal failure).
    /// Returns `true` if the entry is now terminally failed.
    pub async fn record_failure(
        pool: &PgPool,
        notification_id: &str,
        channel: ChannelType,
        error: &str,
        max_retries: i32,
    ) -> Result<bool, sqlx::Error> {
        let sent: Option<Option<bool>> = sqlx::query_scalar(
            "UPDATE channel_sends \
             SET attempt_count = attempt_count + 1, \
                 last_error_message = $3, \
                 last_attempt_at = NOW(), \
                 sent = CASE WHEN attempt_count + 1 >= $4 THEN false ELSE NULL END \
             WHERE notification_id = $1 AND channel_type = $2 AND sent IS NULL \
             RETURNING sent",
        )
        .bind(notification_id)
        .bind(channel.as_str())
        .bind(error)
        .bind(max_retries)
        .fetch_optional(pool)
        .await?;
        Ok(sent == Some(Some(false)))
    }

    /// Delete terminal entries older than `cutoff`. Returns the rows removed.
    pub async fn delete_terminal_older_than(
        pool: &PgPool,
        cutoff: bistro_core::types::Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM channel_sends WHERE sent IS NOT NULL AND created_at < $1")
                .bind(cutoff)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }

    /// Number of sends still pending across all notifications.
    pub async fn pending_count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT COUNT(*) FROM channel_sends WHERE sent IS NULL")
                .fetch_one(pool)
                .await?;
        Ok(count.unwrap_or(0))
    }

    /// Number of terminally failed sends.
    pub async fn failed_count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT COUNT(*) FROM channel_sends WHERE sent = false")
                .fetch_one(pool)
                .await?;
        Ok(count.unwrap_or(0))
    }
}
