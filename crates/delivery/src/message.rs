//! Fan-out message contract.
//!
//! The notification outbox poller publishes each pending notification as a
//! [`NotificationMessage`] serialized into the broker payload; the fan-out
//! consumer parses it back and disaggregates it into one
//! `recipient_notifications` row per (recipient, channel) pair.

use bistro_core::channels::ChannelType;
use bistro_core::types::{DbId, Priority};
use serde::{Deserialize, Serialize};

/// A notification target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub recipient_id: DbId,
    /// Recipient kind, e.g. `"staff"` or `"guest"`.
    pub recipient_type: String,
}

/// The payload of a notification fan-out message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// Stable notification identifier (the outbox `notification_id`).
    pub notification_id: String,

    /// Identifier of the originating domain event; together with the
    /// recipient and channel it forms the idempotency key.
    pub event_id: String,

    /// Notification type name, e.g. `"reservation.request"`.
    pub notification_type: String,

    /// Scope of the notification (the restaurant it belongs to).
    pub restaurant_id: DbId,

    /// Who should receive it.
    pub recipients: Vec<Recipient>,

    /// Which channels to deliver on.
    pub channels: Vec<ChannelType>,

    pub title: String,
    pub body: String,

    #[serde(default)]
    pub priority: Priority,

    /// Broadcast-read semantics: one recipient reading marks all sibling
    /// rows for the same (event, restaurant) as read.
    #[serde(default)]
    pub read_by_all: bool,
}

impl NotificationMessage {
    /// Parse a message from a broker payload.
    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(payload.clone())
    }

    /// Serialize into a broker payload.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("NotificationMessage serialization cannot fail")
    }
}
