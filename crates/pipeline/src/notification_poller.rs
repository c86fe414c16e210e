//! Notification outbox poller.
//!
//! Decouples "event happened" from "fan out notification": a stall here
//! never blocks event publication upstream. Selects a bounded batch of
//! PENDING notification rows every cycle and publishes each to the
//! notifications topic with the same retry/cap semantics as the event tier.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use bistro_db::models::NotificationOutboxEntry;
use bistro_db::repositories::NotificationOutboxRepo;
use bistro_delivery::broker::{Broker, BrokerMessage, NOTIFICATIONS_TOPIC};

use crate::config::PipelineConfig;
use crate::CycleStats;

/// Publishes pending notification-outbox rows to the broker.
pub struct NotificationOutboxPoller {
    pool: PgPool,
    broker: Arc<dyn Broker>,
    config: PipelineConfig,
}

impl NotificationOutboxPoller {
    /// Create a poller over the given pool, broker, and configuration.
    pub fn new(pool: PgPool, broker: Arc<dyn Broker>, config: PipelineConfig) -> Self {
        Self {
            pool,
            broker,
            config,
        }
    }

    /// Run the poll loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.notification_poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(
            interval_ms = self.config.notification_poll_interval.as_millis() as u64,
            "Notification outbox poller started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Notification outbox poller shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.process_batch().await {
                        Ok(stats) if !stats.is_empty() => {
                            tracing::info!(
                                published = stats.succeeded,
                                retried = stats.retried,
                                failed = stats.exhausted,
                                "Notification outbox cycle"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "Notification outbox cycle failed"),
                    }
                }
            }
        }
    }

    /// One cycle: publish a bounded batch of PENDING rows.
    pub async fn process_batch(&self) -> Result<CycleStats, sqlx::Error> {
        let rows = NotificationOutboxRepo::list_pending(&self.pool, self.config.batch_size).await?;
        let mut stats = CycleStats::default();

        for row in &rows {
            match self.publish_row(row).await {
                Ok(()) => match NotificationOutboxRepo::mark_published(&self.pool, row.id).await {
                    Ok(true) => stats.succeeded += 1,
                    Ok(false) => {
                        tracing::debug!(notification_id = %row.notification_id,
                            "Notification already published");
                    }
                    Err(e) => {
                        tracing::error!(notification_id = %row.notification_id, error = %e,
                            "Failed to mark notification published");
                    }
                },
                Err(e) => {
                    let error = e.to_string();
                    match NotificationOutboxRepo::record_failure(
                        &self.pool,
                        row.id,
                        &error,
                        self.config.max_retries,
                    )
                    .await
                    {
                        Ok(true) => {
                            stats.exhausted += 1;
                            tracing::error!(
                                notification_id = %row.notification_id,
                                error = %error,
                                "Notification publish exhausted retries, marked FAILED"
                            );
                        }
                        Ok(false) => {
                            stats.retried += 1;
                            tracing::warn!(
                                notification_id = %row.notification_id,
                                error = %error,
                                "Notification publish failed, will retry"
                            );
                        }
                        Err(db_err) => {
                            tracing::error!(notification_id = %row.notification_id,
                                error = %db_err,
                                "Failed to record notification publish failure");
                        }
                    }
                }
            }
        }

        Ok(stats)
    }

    /// Publish one row to the notifications topic.
    async fn publish_row(
        &self,
        row: &NotificationOutboxEntry,
    ) -> Result<(), bistro_delivery::BrokerError> {
        let message = BrokerMessage::new(
            &row.notification_id,
            &row.notification_type,
            row.payload.clone(),
        );
        self.broker.publish(NOTIFICATIONS_TOPIC, message).await
    }
}
