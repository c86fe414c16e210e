//! Notification outbox entity model.

use bistro_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `notification_outbox` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NotificationOutboxEntry {
    pub id: DbId,
    pub notification_id: String,
    pub notification_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub processed_at: Option<Timestamp>,
}

/// Insert payload for a new notification outbox row.
#[derive(Debug, Clone)]
pub struct NewNotificationOutboxEntry {
    pub notification_id: String,
    pub notification_type: String,
    pub payload: serde_json::Value,
}
