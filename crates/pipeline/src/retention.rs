//! Periodic cleanup of aged-out ledger rows.
//!
//! The only physical deletion in the pipeline: terminal outbox rows,
//! terminal channel sends, and already-read recipient rows older than the
//! configured age are swept on a fixed interval. PENDING and unread rows
//! are never touched.

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use bistro_db::repositories::{
    ChannelSendRepo, EventOutboxRepo, NotificationOutboxRepo, RecipientNotificationRepo,
};

use crate::config::RetentionConfig;

/// Rows removed by one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub event_outbox: u64,
    pub notification_outbox: u64,
    pub channel_sends: u64,
    pub recipient_notifications: u64,
}

impl SweepStats {
    /// Total rows removed.
    pub fn total(&self) -> u64 {
        self.event_outbox
            + self.notification_outbox
            + self.channel_sends
            + self.recipient_notifications
    }
}

/// Background service that deletes aged-out terminal rows.
pub struct RetentionSweeper {
    pool: PgPool,
    config: RetentionConfig,
}

impl RetentionSweeper {
    /// Create a sweeper with the given pool and retention settings.
    pub fn new(pool: PgPool, config: RetentionConfig) -> Self {
        Self { pool, config }
    }

    /// Run the sweep loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            max_age_days = self.config.max_age_days,
            interval_secs = self.config.interval.as_secs(),
            "Retention sweeper started"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Retention sweeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    match self.sweep_once().await {
                        Ok(stats) if stats.total() > 0 => {
                            tracing::info!(
                                event_outbox = stats.event_outbox,
                                notification_outbox = stats.notification_outbox,
                                channel_sends = stats.channel_sends,
                                recipient_notifications = stats.recipient_notifications,
                                "Retention sweep purged aged rows"
                            );
                        }
                        Ok(_) => {
                            tracing::debug!("Retention sweep found nothing to purge");
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Retention sweep failed");
                        }
                    }
                }
            }
        }
    }

    /// One sweep across all four ledgers.
    pub async fn sweep_once(&self) -> Result<SweepStats, sqlx::Error> {
        let cutoff = chrono::Utc::now() - chrono::Duration::days(self.config.max_age_days);

        Ok(SweepStats {
            event_outbox: EventOutboxRepo::delete_terminal_older_than(&self.pool, cutoff).await?,
            notification_outbox: NotificationOutboxRepo::delete_terminal_older_than(
                &self.pool, cutoff,
            )
            .await?,
            channel_sends: ChannelSendRepo::delete_terminal_older_than(&self.pool, cutoff).await?,
            recipient_notifications: RecipientNotificationRepo::delete_read_older_than(
                &self.pool, cutoff,
            )
            .await?,
        })
    }
}
