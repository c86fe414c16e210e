//! SMS channel via an HTTP gateway.
//!
//! The gateway owns recipient-to-phone-number resolution; this transport
//! posts the recipient ID and message text and checks the response status.

use std::time::Duration;

use async_trait::async_trait;

use super::{ChannelTransport, OutboundDelivery, TransportError};

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends notification texts through an SMS gateway endpoint.
pub struct SmsTransport {
    client: reqwest::Client,
    gateway_url: String,
}

impl SmsTransport {
    /// Create a new SMS transport for the given gateway URL.
    pub fn new(gateway_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            gateway_url: gateway_url.into(),
        }
    }

    /// Load the gateway URL from `SMS_GATEWAY_URL`; `None` when unset.
    pub fn from_env() -> Option<Self> {
        std::env::var("SMS_GATEWAY_URL").ok().map(Self::new)
    }
}

#[async_trait]
impl ChannelTransport for SmsTransport {
    async fn send(&self, delivery: &OutboundDelivery) -> Result<(), TransportError> {
        let payload = serde_json::json!({
            "recipient_id": delivery.recipient_id,
            "recipient_type": delivery.recipient_type,
            "text": format!("{}: {}", delivery.title, delivery.body),
        });

        let response = self
            .client
            .post(&self.gateway_url)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::HttpStatus(response.status().as_u16()));
        }

        tracing::info!(
            notification_id = %delivery.notification_id,
            recipient_id = delivery.recipient_id,
            "SMS notification sent"
        );
        Ok(())
    }
}
