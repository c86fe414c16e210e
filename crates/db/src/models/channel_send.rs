//! Per-(notification, channel) send ledger model.

use bistro_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `channel_sends` table.
///
/// `sent` is tri-state: `None` while the send is pending, `Some(true)` after
/// a successful delivery, `Some(false)` after the retry ceiling was reached
/// (terminal failure, requires operator follow-up).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChannelSendEntry {
    pub id: DbId,
    pub notification_id: String,
    pub channel_type: String,
    pub sent: Option<bool>,
    pub attempt_count: i32,
    pub last_error_message: Option<String>,
    pub last_attempt_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl ChannelSendEntry {
    /// Whether the send has reached a terminal outcome.
    pub fn is_terminal(&self) -> bool {
        self.sent.is_some()
    }
}
