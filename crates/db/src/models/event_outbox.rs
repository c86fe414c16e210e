//! Event outbox entity model.

use bistro_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `event_outbox` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EventOutboxEntry {
    pub id: DbId,
    pub event_id: String,
    pub event_type: String,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub published_at: Option<Timestamp>,
}

/// Insert payload for a new event outbox row.
///
/// Written by the producing tier in the same transaction as the domain
/// state change; the poller is the only component that mutates it afterwards.
#[derive(Debug, Clone)]
pub struct NewEventOutboxEntry {
    pub event_id: String,
    pub event_type: String,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub payload: serde_json::Value,
}
