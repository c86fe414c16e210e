//! Repository for the `event_outbox` table.

use bistro_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::event_outbox::{EventOutboxEntry, NewEventOutboxEntry};

/// Column list for `event_outbox` queries.
const COLUMNS: &str = "id, event_id, event_type, aggregate_type, aggregate_id, payload, \
     status, retry_count, error_message, created_at, published_at";

/// Provides operations on the event outbox ledger.
pub struct EventOutboxRepo;

impl EventOutboxRepo {
    /// Insert a new pending event, returning the generated row ID.
    ///
    /// Called by the producing tier, ideally inside the same transaction as
    /// the domain state change (the transactional-outbox write).
    pub async fn insert(pool: &PgPool, entry: &NewEventOutboxEntry) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO event_outbox \
                (event_id, event_type, aggregate_type, aggregate_id, payload) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id",
        )
        .bind(&entry.event_id)
        .bind(&entry.event_type)
        .bind(&entry.aggregate_type)
        .bind(&entry.aggregate_id)
        .bind(&entry.payload)
        .fetch_one(pool)
        .await
    }

    /// Fetch a single entry by its business event ID.
    pub async fn get_by_event_id(
        pool: &PgPool,
        event_id: &str,
    ) -> Result<Option<EventOutboxEntry>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM event_outbox WHERE event_id = $1");
        sqlx::query_as::<_, EventOutboxEntry>(&query)
            .bind(event_id)
            .fetch_optional(pool)
            .await
    }

    /// List pending events created at or after `cutoff`, oldest first.
    ///
    /// The fast poller's selection: fresh rows inside the freshness window.
    pub async fn list_pending_since(
        pool: &PgPool,
        cutoff: Timestamp,
        limit: i64,
    ) -> Result<Vec<EventOutboxEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM event_outbox \
             WHERE status = 'PENDING' AND created_at >= $1 \
             ORDER BY created_at ASC \
             LIMIT $2"
        );
        sqlx::query_as::<_, EventOutboxEntry>(&query)
            .bind(cutoff)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// List pending events created before `cutoff`, oldest first.
    ///
    /// The slow poller's selection: rows the fast poller's window has
    /// already passed by (e.g. events written during an outage).
    pub async fn list_pending_before(
        pool: &PgPool,
        cutoff: Timestamp,
        limit: i64,
    ) -> Result<Vec<EventOutboxEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM event_outbox \
             WHERE status = 'PENDING' AND created_at < $1 \
             ORDER BY created_at ASC \
             LIMIT $2"
        );
        sqlx::query_as::<_, EventOutboxEntry>(&query)
            .bind(cutoff)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Mark an entry processed after a successful publish.
    ///
    /// Conditional on `status = 'PENDING'`: returns `true` if this call won
    /// the transition, `false` if another poller instance got there first
    /// or the row already reached a terminal status.
    pub async fn mark_processed(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE event_outbox \
             SET status = 'PROCESSED', published_at = NOW(), error_message = NULL \
             WHERE id = $1 AND status = 'PENDING'",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a failed publish attempt.
    ///
    /// Increments `retry_count`; when the incremented count reaches
    /// `max_retries` the row flips to `FAILED` (terminal). Returns `true`
    /// if the row is now terminally failed.
    pub async fn record_failure(
        pool: &PgPool,
        id: DbId,
        error: &str,
        max_retries: i32,
    ) -> Result<bool, sqlx::Error> {
        let status: Option<String> = sqlx::query_scalar(
            "UPDATE event_outbox \
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

    /// Number of rows still awaiting publication.
    pub async fn pending_count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT COUNT(*) FROM event_outbox WHERE status = 'PENDING'")
                .fetch_one(pool)
                .await?;
        Ok(count.unwrap_or(0))
    }

    /// Number of terminally failed rows (operator follow-up required).
    pub async fn failed_count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT COUNT(*) FROM event_outbox WHERE status = 'FAILED'")
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
            "DELETE FROM event_outbox \
             WHERE status IN ('PROCESSED', 'FAILED') AND created_at < $1",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
