//! Channel poller: per-channel delivery with channel isolation.
//!
//! For every notification with at least one pending recipient row, each
//! known channel is evaluated independently every cycle — one channel at a
//! time, never atomically across channels. A failure on one channel must
//! not block, retry-couple, or lose delivery on any other channel of the
//! same notification; the only state a channel owns is its own
//! `channel_sends` row and its own recipient rows.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use bistro_core::channels::{ChannelType, DeliveryMode};
use bistro_db::models::RecipientChannelNotification;
use bistro_db::repositories::{ChannelSendRepo, RecipientNotificationRepo};
use bistro_delivery::{OutboundDelivery, TransportRegistry};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::CycleStats;

/// Delivers pending recipient notifications channel by channel.
pub struct ChannelPoller {
    pool: PgPool,
    registry: Arc<TransportRegistry>,
    config: PipelineConfig,
}

/// Outcome of evaluating one (notification, channel) pair.
#[derive(Debug, PartialEq, Eq)]
enum ChannelOutcome {
    /// Nothing pending on this channel, or no transport registered.
    Skipped,
    /// Every pending recipient row was delivered and the send ledger row
    /// is terminal-success.
    Sent,
    /// The attempt failed; the ledger row stays pending for the next cycle.
    Retried,
    /// The retry budget is exhausted; the ledger row is terminal-failure.
    Exhausted,
}

impl ChannelPoller {
    /// Create a poller over the given pool, transports, and configuration.
    pub fn new(pool: PgPool, registry: Arc<TransportRegistry>, config: PipelineConfig) -> Self {
        Self {
            pool,
            registry,
            config,
        }
    }

    /// Run the poll loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.channel_poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(
            interval_ms = self.config.channel_poll_interval.as_millis() as u64,
            "Channel poller started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Channel poller shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    match self.process_pending().await {
                        Ok(stats) if !stats.is_empty() => {
                            tracing::info!(
                                sent = stats.succeeded,
                                retried = stats.retried,
                                failed = stats.exhausted,
                                "Channel poll cycle"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "Channel poll cycle failed"),
                    }
                }
            }
        }
    }

    /// One cycle: evaluate every channel of every notification that still
    /// has pending recipient rows.
    ///
    /// The outer loop is per notification, the inner loop per channel type,
    /// so every channel is evaluated independently regardless of another
    /// channel's outcome. A per-channel error is logged and the iteration
    /// continues.
    pub async fn process_pending(&self) -> Result<CycleStats, sqlx::Error> {
        let notifications = RecipientNotificationRepo::list_notifications_with_pending(
            &self.pool,
            self.config.batch_size,
        )
        .await?;

        let mut stats = CycleStats::default();

        for notification_id in &notifications {
            for channel in ChannelType::ALL {
                match self.process_channel(notification_id, channel).await {
                    Ok(ChannelOutcome::Sent) => stats.succeeded += 1,
                    Ok(ChannelOutcome::Retried) => stats.retried += 1,
                    Ok(ChannelOutcome::Exhausted) => stats.exhausted += 1,
                    Ok(ChannelOutcome::Skipped) => {}
                    Err(e) => {
                        tracing::error!(
                            notification_id = %notification_id,
                            channel = %channel,
                            error = %e,
                            "Channel processing failed"
                        );
                    }
                }
            }
        }

        Ok(stats)
    }

    /// Evaluate a single (notification, channel) pair.
    async fn process_channel(
        &self,
        notification_id: &str,
        channel: ChannelType,
    ) -> Result<ChannelOutcome, PipelineError> {
        let rows = RecipientNotificationRepo::list_pending_for_channel(
            &self.pool,
            notification_id,
            channel,
        )
        .await?;
        if rows.is_empty() {
            return Ok(ChannelOutcome::Skipped);
        }

        let Some(transport) = self.registry.get(channel) else {
            // Classification/configuration error: surfaced, never retried
            // against the ledger, never crashes the loop.
            tracing::error!(
                notification_id = %notification_id,
                channel = %channel,
                "No transport registered for channel"
            );
            return Ok(ChannelOutcome::Skipped);
        };

        match channel.delivery_mode() {
            DeliveryMode::Direct => {
                self.deliver_direct(notification_id, channel, &rows, transport.as_ref())
                    .await
            }
            DeliveryMode::Persistent => {
                self.deliver_persistent(notification_id, channel, &rows, transport.as_ref())
                    .await
            }
        }
    }

    /// Direct channel: attempt delivery immediately, best-effort.
    ///
    /// No `channel_sends` row is created and nothing is retried; the
    /// recipient row records the single outcome so the pair is never
    /// revisited.
    async fn deliver_direct(
        &self,
        notification_id: &str,
        channel: ChannelType,
        rows: &[RecipientChannelNotification],
        transport: &dyn bistro_delivery::ChannelTransport,
    ) -> Result<ChannelOutcome, PipelineError> {
        let mut delivered = 0;

        for row in rows {
            match transport.send(&Self::delivery_for(row)).await {
                Ok(()) => {
                    RecipientNotificationRepo::mark_delivered(&self.pool, row.id).await?;
                    delivered += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        notification_id = %notification_id,
                        channel = %channel,
                        recipient_id = row.recipient_id,
                        error = %e,
                        "Direct channel send failed, dropping (no retry)"
                    );
                    RecipientNotificationRepo::mark_failed(&self.pool, row.id).await?;
                }
            }
        }

        Ok(if delivered > 0 {
            ChannelOutcome::Sent
        } else {
            ChannelOutcome::Skipped
        })
    }

    /// Persistent channel: track the attempt in the `channel_sends` ledger.
    async fn deliver_persistent(
        &self,
        notification_id: &str,
        channel: ChannelType,
        rows: &[RecipientChannelNotification],
        transport: &dyn bistro_delivery::ChannelTransport,
    ) -> Result<ChannelOutcome, PipelineError> {
        // Existence check precedes insert; the unique index makes the
        // create idempotent under concurrent pollers.
        ChannelSendRepo::create_if_absent(&self.pool, notification_id, channel).await?;

        // Re-read: if another instance already drove the entry terminal,
        // reconcile the recipient rows and skip the send.
        let Some(entry) = ChannelSendRepo::get(&self.pool, notification_id, channel).await? else {
            return Ok(ChannelOutcome::Skipped);
        };
        if let Some(sent) = entry.sent {
            if sent {
                RecipientNotificationRepo::mark_channel_delivered(
                    &self.pool,
                    notification_id,
                    channel,
                )
                .await?;
            } else {
                RecipientNotificationRepo::mark_channel_failed(&self.pool, notification_id, channel)
                    .await?;
            }
            return Ok(ChannelOutcome::Skipped);
        }

        // Dispatch to each still-pending recipient. Rows delivered in an
        // earlier attempt are no longer PENDING and are never re-sent, so a
        // partial failure cannot produce duplicate terminal notifications.
        let mut last_error: Option<PipelineError> = None;
        for row in rows {
            match transport.send(&Self::delivery_for(row)).await {
                Ok(()) => {
                    RecipientNotificationRepo::mark_delivered(&self.pool, row.id).await?;
                }
                Err(e) => {
                    last_error = Some(e.into());
                }
            }
        }

        match last_error {
            None => {
                ChannelSendRepo::mark_sent(&self.pool, notification_id, channel).await?;
                Ok(ChannelOutcome::Sent)
            }
            Some(e) => {
                let terminal = ChannelSendRepo::record_failure(
                    &self.pool,
                    notification_id,
                    channel,
                    &e.to_string(),
                    self.config.max_retries,
                )
                .await?;
                if terminal {
                    RecipientNotificationRepo::mark_channel_failed(
                        &self.pool,
                        notification_id,
                        channel,
                    )
                    .await?;
                    tracing::error!(
                        notification_id = %notification_id,
                        channel = %channel,
                        error = %e,
                        "Channel send exhausted retries, marked terminally failed"
                    );
                    Ok(ChannelOutcome::Exhausted)
                } else {
                    tracing::warn!(
                        notification_id = %notification_id,
                        channel = %channel,
                        error = %e,
                        "Channel send failed, will retry"
                    );
                    Ok(ChannelOutcome::Retried)
                }
            }
        }
    }

    /// Build the transport input for one recipient row.
    fn delivery_for(row: &RecipientChannelNotification) -> OutboundDelivery {
        OutboundDelivery {
            notification_id: row.notification_id.clone(),
            recipient_id: row.recipient_id,
            recipient_type: row.recipient_type.clone(),
            title: row.title.clone(),
            body: row.body.clone(),
        }
    }
}
