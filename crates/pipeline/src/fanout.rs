//! Fan-out consumer.
//!
//! Subscribes to the broker's notifications topic and disaggregates each
//! [`NotificationMessage`] into one `recipient_notifications` row per
//! (recipient, channel) pair. Creation is idempotent on
//! `(event_id, recipient_id, channel)`, so redelivered messages
//! short-circuit against the unique index and insert nothing.

use sqlx::PgPool;
use tokio::sync::broadcast;

use bistro_db::models::NewRecipientNotification;
use bistro_db::repositories::RecipientNotificationRepo;
use bistro_delivery::broker::{BrokerMessage, NOTIFICATIONS_TOPIC};
use bistro_delivery::NotificationMessage;

use crate::error::PipelineError;

/// Background consumer that turns notification messages into recipient rows.
pub struct FanoutConsumer {
    pool: PgPool,
}

impl FanoutConsumer {
    /// Create a consumer over the given database pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the consume loop.
    ///
    /// Processes every message on the notifications topic; exits when the
    /// broker channel is closed (i.e. the broker is dropped).
    pub async fn run(self, mut receiver: broadcast::Receiver<(String, BrokerMessage)>) {
        loop {
            match receiver.recv().await {
                Ok((topic, message)) => {
                    if topic != NOTIFICATIONS_TOPIC {
                        continue;
                    }
                    match self.disaggregate(&message).await {
                        Ok(created) if created > 0 => {
                            tracing::info!(
                                notification_id = %message.key,
                                rows = created,
                                "Notification disaggregated"
                            );
                        }
                        Ok(_) => {
                            tracing::debug!(
                                notification_id = %message.key,
                                "Duplicate delivery, no rows created"
                            );
                        }
                        Err(e) => {
                            tracing::error!(
                                notification_id = %message.key,
                                error = %e,
                                "Failed to disaggregate notification"
                            );
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Fan-out consumer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Broker closed, fan-out consumer shutting down");
                    break;
                }
            }
        }
    }

    /// Create one row per (recipient, channel) pair of the message.
    ///
    /// Returns the number of rows actually inserted (zero for a pure
    /// redelivery).
    pub async fn disaggregate(&self, message: &BrokerMessage) -> Result<usize, PipelineError> {
        let notification = NotificationMessage::from_payload(&message.payload)?;
        let mut created = 0;

        for recipient in &notification.recipients {
            for &channel in &notification.channels {
                let entry = NewRecipientNotification {
                    event_id: notification.event_id.clone(),
                    notification_id: notification.notification_id.clone(),
                    recipient_id: recipient.recipient_id,
                    recipient_type: recipient.recipient_type.clone(),
                    restaurant_id: notification.restaurant_id,
                    channel,
                    title: notification.title.clone(),
                    body: notification.body.clone(),
                    priority: notification.priority,
                    read_by_all: notification.read_by_all,
                };
                if RecipientNotificationRepo::create_if_absent(&self.pool, &entry).await? {
                    created += 1;
                }
            }
        }

        Ok(created)
    }
}
