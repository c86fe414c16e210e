//! Recipient-facing read semantics.
//!
//! Thin service over [`RecipientNotificationRepo::mark_read`]: a broadcast
//! notification (`read_by_all = true`) propagates one recipient's read to
//! every sibling row sharing `(event_id, restaurant_id)`; an individual
//! notification updates only the acting recipient's row.

use bistro_core::types::DbId;
use sqlx::PgPool;

use bistro_db::repositories::RecipientNotificationRepo;

/// Result of a mark-read request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The notification does not exist for this recipient.
    NotFound,
    /// `rows_marked` rows transitioned to READ (zero if already read).
    Marked { rows_marked: u64 },
}

/// Mark a notification read by the acting recipient.
pub async fn mark_read(
    pool: &PgPool,
    notification_row_id: DbId,
    recipient_id: DbId,
) -> Result<ReadOutcome, sqlx::Error> {
    match RecipientNotificationRepo::mark_read(pool, notification_row_id, recipient_id).await? {
        None => Ok(ReadOutcome::NotFound),
        Some(rows_marked) => {
            if rows_marked > 1 {
                tracing::info!(
                    id = notification_row_id,
                    recipient_id,
                    rows_marked,
                    "Broadcast read propagated to sibling rows"
                );
            }
            Ok(ReadOutcome::Marked { rows_marked })
        }
    }
}

/// Number of not-yet-read notifications for a recipient.
pub async fn unread_count(pool: &PgPool, recipient_id: DbId) -> Result<i64, sqlx::Error> {
    RecipientNotificationRepo::unread_count(pool, recipient_id).await
}
