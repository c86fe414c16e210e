//! WebSocket channel: the direct (non-persistent) delivery path.
//!
//! [`SocketManager`] tracks live connections per recipient;
//! [`WebsocketTransport`] pushes a JSON message to every open connection of
//! the recipient. The transport is inherently transient, so the channel
//! poller never creates a ledger row for it and never retries a failure.

use std::collections::HashMap;

use async_trait::async_trait;
use bistro_core::types::DbId;
use tokio::sync::{mpsc, RwLock};

use super::{ChannelTransport, OutboundDelivery, TransportError};

/// Channel sender half for pushing messages to a live connection.
pub type SocketSender = mpsc::UnboundedSender<String>;

/// Manages all active socket connections.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared between the connection acceptor and the websocket transport.
#[derive(Default)]
pub struct SocketManager {
    connections: RwLock<HashMap<String, (DbId, SocketSender)>>,
}

impl SocketManager {
    /// Create a new, empty connection manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection for a recipient.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the socket sink.
    pub async fn add(
        &self,
        conn_id: String,
        recipient_id: DbId,
    ) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections
            .write()
            .await
            .insert(conn_id, (recipient_id, tx));
        rx
    }

    /// Remove a connection by its ID.
    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    /// Push a message to every open connection of a recipient.
    ///
    /// Returns the number of connections the message was handed to.
    /// Connections whose send channels are closed are skipped (they will be
    /// cleaned up by their own receive loop).
    pub async fn send_to_recipient(&self, recipient_id: DbId, message: &str) -> usize {
        let conns = self.connections.read().await;
        let mut delivered = 0;
        for (conn_recipient, sender) in conns.values() {
            if *conn_recipient == recipient_id && sender.send(message.to_string()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}

// ---------------------------------------------------------------------------
// WebsocketTransport
// ---------------------------------------------------------------------------

/// Pushes notifications over live socket connections.
pub struct WebsocketTransport {
    sockets: std::sync::Arc<SocketManager>,
}

impl WebsocketTransport {
    /// Create a transport over the shared connection manager.
    pub fn new(sockets: std::sync::Arc<SocketManager>) -> Self {
        Self { sockets }
    }
}

#[async_trait]
impl ChannelTransport for WebsocketTransport {
    async fn send(&self, delivery: &OutboundDelivery) -> Result<(), TransportError> {
        let message = serde_json::json!({
            "type": "notification",
            "notification_id": delivery.notification_id,
            "title": delivery.title,
            "body": delivery.body,
        })
        .to_string();

        let delivered = self
            .sockets
            .send_to_recipient(delivery.recipient_id, &message)
            .await;

        if delivered == 0 {
            return Err(TransportError::NoConnection(delivery.recipient_id));
        }

        tracing::debug!(
            notification_id = %delivery.notification_id,
            recipient_id = delivery.recipient_id,
            connections = delivered,
            "WebSocket notification pushed"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
