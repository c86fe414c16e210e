//! Message broker abstraction.
//!
//! The outbox pollers publish through the [`Broker`] trait and assume
//! nothing beyond at-least-once delivery: no ordering, no exactly-once.
//! [`InProcessBroker`] is the default implementation, backed by a
//! `tokio::sync::broadcast` channel so any number of consumers can
//! independently receive every published message.

use async_trait::async_trait;
use bistro_core::types::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Topic prefix for event messages; the full topic is derived from the
/// event type, e.g. `bistro.events.reservation.created`.
const EVENT_TOPIC_PREFIX: &str = "bistro.events";

/// Topic for notification fan-out messages.
pub const NOTIFICATIONS_TOPIC: &str = "bistro.notifications";

/// Derive the broker topic for an event type name.
pub fn topic_for_event_type(event_type: &str) -> String {
    format!("{EVENT_TOPIC_PREFIX}.{event_type}")
}

// ---------------------------------------------------------------------------
// BrokerMessage
// ---------------------------------------------------------------------------

/// A message published to the broker.
///
/// Carries the minimum publish contract: a stable identifier (`key`), the
/// event or notification type, and an opaque JSON payload. Consumers must
/// tolerate redelivery keyed on `key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerMessage {
    /// Stable identifier of the message (event ID or notification ID).
    pub key: String,

    /// Event type or notification type name.
    pub message_type: String,

    /// Opaque serialized payload.
    pub payload: serde_json::Value,

    /// When the message was published (UTC).
    pub published_at: Timestamp,
}

impl BrokerMessage {
    /// Create a message stamped with the current time.
    pub fn new(
        key: impl Into<String>,
        message_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            key: key.into(),
            message_type: message_type.into(),
            payload,
            published_at: chrono::Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Broker
// ---------------------------------------------------------------------------

/// Error type for broker publish failures.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The publish was rejected or the broker is unreachable.
    #[error("Broker publish failed: {0}")]
    Publish(String),
}

/// Publishing side of the message broker.
///
/// Implementations must be safe to call concurrently from multiple poller
/// tasks. A returned error is treated as a transient publish failure and
/// counted against the row's retry budget.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Publish a message to a topic.
    async fn publish(&self, topic: &str, message: BrokerMessage) -> Result<(), BrokerError>;
}

// ---------------------------------------------------------------------------
// InProcessBroker
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process broker backed by a broadcast channel.
///
/// Designed to be shared via `Arc<InProcessBroker>` between the pollers
/// (publishers) and the fan-out consumer (subscriber).
pub struct InProcessBroker {
    sender: broadcast::Sender<(String, BrokerMessage)>,
}

impl InProcessBroker {
    /// Create a broker with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all messages published on this broker.
    ///
    /// Each receiver gets every `(topic, message)` pair; consumers filter
    /// by topic themselves.
    pub fn subscribe(&self) -> broadcast::Receiver<(String, BrokerMessage)> {
        self.sender.subscribe()
    }
}

impl Default for InProcessBroker {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl Broker for InProcessBroker {
    async fn publish(&self, topic: &str, message: BrokerMessage) -> Result<(), BrokerError> {
        // Ignore the SendError — it only means there are zero receivers,
        // which is a valid state for a fire-and-forget publish.
        let _ = self.sender.send((topic.to_string(), message));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_topic_from_event_type() {
        assert_eq!(
            topic_for_event_type("reservation.created"),
            "bistro.events.reservation.created"
        );
    }

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let broker = InProcessBroker::default();
        let mut rx = broker.subscribe();

        let msg = BrokerMessage::new("e1", "reservation.created", serde_json::json!({"id": 42}));
        broker.publish("bistro.events.reservation.created", msg).await.unwrap();

        let (topic, received) = rx.recv().await.expect("should receive the message");
        assert_eq!(topic, "bistro.events.reservation.created");
        assert_eq!(received.key, "e1");
        assert_eq!(received.message_type, "reservation.created");
        assert_eq!(received.payload["id"], 42);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_message() {
        let broker = InProcessBroker::default();
        let mut rx1 = broker.subscribe();
        let mut rx2 = broker.subscribe();

        let msg = BrokerMessage::new("n1", "table.ready", serde_json::json!({}));
        broker.publish(NOTIFICATIONS_TOPIC, msg).await.unwrap();

        let (_, m1) = rx1.recv().await.expect("subscriber 1 should receive");
        let (_, m2) = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(m1.key, "n1");
        assert_eq!(m2.key, "n1");
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_succeeds() {
        let broker = InProcessBroker::default();
        let msg = BrokerMessage::new("e2", "reservation.cancelled", serde_json::json!({}));
        broker
            .publish("bistro.events.reservation.cancelled", msg)
            .await
            .expect("publish must not fail with zero receivers");
    }
}
