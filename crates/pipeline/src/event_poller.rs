//! Event outbox poller.
//!
//! Two scheduling profiles over the same ledger share one implementation:
//! the fast profile targets low latency for fresh events, the slow profile
//! is a feature-flagged safety net that retries events the fast poller's
//! freshness window has passed by (e.g. rows written during an outage).

use std::sync::Arc;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use bistro_db::models::EventOutboxEntry;
use bistro_db::repositories::EventOutboxRepo;
use bistro_delivery::broker::{topic_for_event_type, Broker, BrokerMessage};

use crate::config::PipelineConfig;
use crate::CycleStats;

/// Publishes pending event-outbox rows to the broker.
pub struct EventOutboxPoller {
    pool: PgPool,
    broker: Arc<dyn Broker>,
    config: PipelineConfig,
}

impl EventOutboxPoller {
    /// Create a poller over the given pool, broker, and configuration.
    pub fn new(pool: PgPool, broker: Arc<dyn Broker>, config: PipelineConfig) -> Self {
        Self {
            pool,
            broker,
            config,
        }
    }

    /// Run the fast poll loop until the cancellation token is triggered.
    ///
    /// Every `fast_poll_interval` (default 1s), publishes PENDING rows
    /// created within the freshness window.
    pub async fn run_fast(&self, cancel: CancellationToken) {
        if !self.config.fast_poll_initial_delay.is_zero() {
            tokio::time::sleep(self.config.fast_poll_initial_delay).await;
        }

        let mut ticker = tokio::time::interval(self.config.fast_poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(
            interval_ms = self.config.fast_poll_interval.as_millis() as u64,
            freshness_window_secs = self.config.freshness_window_secs,
            "Event outbox fast poller started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Event outbox fast poller shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.process_fresh_batch().await {
                        Ok(stats) if !stats.is_empty() => {
                            tracing::info!(
                                published = stats.succeeded,
                                retried = stats.retried,
                                failed = stats.exhausted,
                                "Event outbox fast cycle"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "Event outbox fast cycle failed"),
                    }
                }
            }
        }
    }

    /// Run the slow safety-net loop until the cancellation token is
    /// triggered.
    ///
    /// Every `slow_poll_interval` (default 30s), publishes PENDING rows
    /// older than the stuck threshold. Only spawned when
    /// `slow_poll_enabled` is set; without it, rows past the freshness
    /// window stay PENDING indefinitely.
    pub async fn run_slow(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.slow_poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(
            interval_ms = self.config.slow_poll_interval.as_millis() as u64,
            stuck_threshold_secs = self.config.slow_poll_stuck_threshold_secs,
            "Event outbox slow poller started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Event outbox slow poller shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.process_stale_batch().await {
                        Ok(stats) if !stats.is_empty() => {
                            tracing::info!(
                                published = stats.succeeded,
                                retried = stats.retried,
                                failed = stats.exhausted,
                                "Event outbox slow cycle recovered stuck events"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "Event outbox slow cycle failed"),
                    }
                }
            }
        }
    }

    /// One fast cycle: publish PENDING rows inside the freshness window.
    pub async fn process_fresh_batch(&self) -> Result<CycleStats, sqlx::Error> {
        let cutoff =
            chrono::Utc::now() - chrono::Duration::seconds(self.config.freshness_window_secs);
        let rows =
            EventOutboxRepo::list_pending_since(&self.pool, cutoff, self.config.batch_size).await?;
        Ok(self.process_rows(rows).await)
    }

    /// One slow cycle: publish PENDING rows older than the stuck threshold.
    pub async fn process_stale_batch(&self) -> Result<CycleStats, sqlx::Error> {
        let cutoff = chrono::Utc::now()
            - chrono::Duration::seconds(self.config.slow_poll_stuck_threshold_secs);
        let rows = EventOutboxRepo::list_pending_before(&self.pool, cutoff, self.config.batch_size)
            .await?;
        Ok(self.process_rows(rows).await)
    }

    /// Publish each row and record its outcome. One row's failure never
    /// aborts the batch; each status transition is its own statement, so a
    /// crash mid-batch leaves only unprocessed rows PENDING.
    async fn process_rows(&self, rows: Vec<EventOutboxEntry>) -> CycleStats {
        let mut stats = CycleStats::default();

        for row in &rows {
            match self.publish_row(row).await {
                Ok(()) => match EventOutboxRepo::mark_processed(&self.pool, row.id).await {
                    Ok(true) => stats.succeeded += 1,
                    Ok(false) => {
                        // Another poller instance won the transition.
                        tracing::debug!(event_id = %row.event_id, "Event already processed");
                    }
                    Err(e) => {
                        tracing::error!(event_id = %row.event_id, error = %e,
                            "Failed to mark event processed");
                    }
                },
                Err(e) => {
                    let error = e.to_string();
                    match EventOutboxRepo::record_failure(
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
                                event_id = %row.event_id,
                                retry_count = row.retry_count + 1,
                                error = %error,
                                "Event publish exhausted retries, marked FAILED"
                            );
                        }
                        Ok(false) => {
                            stats.retried += 1;
                            tracing::warn!(
                                event_id = %row.event_id,
                                error = %error,
                                "Event publish failed, will retry"
                            );
                        }
                        Err(db_err) => {
                            tracing::error!(event_id = %row.event_id, error = %db_err,
                                "Failed to record event publish failure");
                        }
                    }
                }
            }
        }

        stats
    }

    /// Publish one row to the broker under a topic derived from its type.
    async fn publish_row(&self, row: &EventOutboxEntry) -> Result<(), bistro_delivery::BrokerError> {
        let topic = topic_for_event_type(&row.event_type);
        let message = BrokerMessage::new(&row.event_id, &row.event_type, row.payload.clone());
        self.broker.publish(&topic, message).await
    }
}
