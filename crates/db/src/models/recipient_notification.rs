//! Disaggregated recipient-facing notification model.

use bistro_core::channels::ChannelType;
use bistro_core::types::{DbId, Priority, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `recipient_notifications` table: one logical notification
/// for one recipient on one channel.
///
/// Uniquely identified by `(event_id, recipient_id, channel)` so duplicate
/// broker deliveries short-circuit on creation.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RecipientChannelNotification {
    pub id: DbId,
    pub event_id: String,
    pub notification_id: String,
    pub recipient_id: DbId,
    pub recipient_type: String,
    pub restaurant_id: DbId,
    pub channel: String,
    pub title: String,
    pub body: String,
    pub status: String,
    pub priority: String,
    pub read_by_all: bool,
    pub read_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Insert payload for a disaggregated notification row.
#[derive(Debug, Clone)]
pub struct NewRecipientNotification {
    pub event_id: String,
    pub notification_id: String,
    pub recipient_id: DbId,
    pub recipient_type: String,
    pub restaurant_id: DbId,
    pub channel: ChannelType,
    pub title: String,
    pub body: String,
    pub priority: Priority,
    pub read_by_all: bool,
}
