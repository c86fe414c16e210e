//! Operational visibility: pending/failed counts per tier.
//!
//! Not part of the delivery algorithm; FAILED rows are terminal and only
//! surface here until the retention sweep ages them out.

use serde::Serialize;
use sqlx::PgPool;

use bistro_db::repositories::{ChannelSendRepo, EventOutboxRepo, NotificationOutboxRepo};

/// Pending/failed counters for one ledger tier.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct TierCounts {
    pub pending: i64,
    pub failed: i64,
}

/// Counters across all pipeline tiers.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PipelineSnapshot {
    pub event_outbox: TierCounts,
    pub notification_outbox: TierCounts,
    pub channel_sends: TierCounts,
}

/// Query the current counters from all tiers.
pub async fn snapshot(pool: &PgPool) -> Result<PipelineSnapshot, sqlx::Error> {
    Ok(PipelineSnapshot {
        event_outbox: TierCounts {
            pending: EventOutboxRepo::pending_count(pool).await?,
            failed: EventOutboxRepo::failed_count(pool).await?,
        },
        notification_outbox: TierCounts {
            pending: NotificationOutboxRepo::pending_count(pool).await?,
            failed: NotificationOutboxRepo::failed_count(pool).await?,
        },
        channel_sends: TierCounts {
            pending: ChannelSendRepo::pending_count(pool).await?,
            failed: ChannelSendRepo::failed_count(pool).await?,
        },
    })
}
