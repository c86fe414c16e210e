//! Channel transports.
//!
//! Each delivery channel exposes a single [`ChannelTransport::send`]
//! operation; the channel poller is agnostic to transport details (SMS
//! gateway, SMTP, push service, chat webhook, live socket). Transports
//! report failure through [`TransportError`]; the poller owns all retry
//! state, so transports never retry internally.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bistro_core::channels::ChannelType;
use bistro_core::types::DbId;

pub mod email;
pub mod push;
pub mod slack;
pub mod sms;
pub mod websocket;

pub use email::{EmailConfig, EmailTransport};
pub use push::PushTransport;
pub use slack::SlackTransport;
pub use sms::SmsTransport;
pub use websocket::{SocketManager, WebsocketTransport};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for channel send failures.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote gateway returned a non-2xx status code.
    #[error("Gateway returned HTTP {0}")]
    HttpStatus(u16),

    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),

    /// No contact details are known for the recipient.
    #[error("No contact details for recipient {0}")]
    NoContact(DbId),

    /// The recipient has no live socket connection.
    #[error("No live socket for recipient {0}")]
    NoConnection(DbId),
}

// ---------------------------------------------------------------------------
// OutboundDelivery
// ---------------------------------------------------------------------------

/// One delivery handed to a transport: a notification addressed to a single
/// recipient.
#[derive(Debug, Clone)]
pub struct OutboundDelivery {
    pub notification_id: String,
    pub recipient_id: DbId,
    pub recipient_type: String,
    pub title: String,
    pub body: String,
}

// ---------------------------------------------------------------------------
// ChannelTransport
// ---------------------------------------------------------------------------

/// A delivery channel's send operation.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Attempt to deliver to a single recipient. Blocking is bounded by the
    /// transport's own per-call timeout.
    async fn send(&self, delivery: &OutboundDelivery) -> Result<(), TransportError>;
}

/// Resolves a recipient ID to an email address.
///
/// Contact resolution belongs to the surrounding application (the user
/// domain is outside this pipeline); the email transport only needs this
/// one lookup.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    async fn email_address(&self, recipient_id: DbId) -> Option<String>;
}

// ---------------------------------------------------------------------------
// TransportRegistry
// ---------------------------------------------------------------------------

/// Maps each channel to its transport implementation.
///
/// A channel with no registered transport is a configuration error surfaced
/// by the poller (logged, skipped); it never crashes the poll loop.
#[derive(Default)]
pub struct TransportRegistry {
    transports: HashMap<ChannelType, Arc<dyn ChannelTransport>>,
}

impl TransportRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transport for a channel, replacing any existing one.
    pub fn register(&mut self, channel: ChannelType, transport: Arc<dyn ChannelTransport>) {
        self.transports.insert(channel, transport);
    }

    /// Look up the transport for a channel.
    pub fn get(&self, channel: ChannelType) -> Option<Arc<dyn ChannelTransport>> {
        self.transports.get(&channel).cloned()
    }

    /// Channels that currently have a transport registered.
    pub fn registered_channels(&self) -> Vec<ChannelType> {
        let mut channels: Vec<ChannelType> = self.transports.keys().copied().collect();
        channels.sort_by_key(|c| c.as_str());
        channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopTransport;

    #[async_trait]
    impl ChannelTransport for NoopTransport {
        async fn send(&self, _delivery: &OutboundDelivery) -> Result<(), TransportError> {
            Ok(())
        }
    }

    #[test]
    fn registry_returns_registered_transport() {
        let mut registry = TransportRegistry::new();
        registry.register(ChannelType::Email, Arc::new(NoopTransport));

        assert!(registry.get(ChannelType::Email).is_some());
        assert!(registry.get(ChannelType::Sms).is_none());
        assert_eq!(registry.registered_channels(), vec![ChannelType::Email]);
    }

    #[test]
    fn transport_error_display() {
        let err = TransportError::HttpStatus(502);
        assert_eq!(err.to_string(), "Gateway returned HTTP 502");

        let err = TransportError::NoConnection(9);
        assert_eq!(err.to_string(), "No live socket for recipient 9");
    }
}
