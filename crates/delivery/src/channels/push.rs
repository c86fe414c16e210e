//! Mobile push channel via an HTTP push service.
//!
//! The push service owns device-token registration; this transport posts
//! the recipient ID plus title/body and checks the response status.

use std::time::Duration;

use async_trait::async_trait;

use super::{ChannelTransport, OutboundDelivery, TransportError};

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends mobile push notifications through a push service endpoint.
pub struct PushTransport {
    client: reqwest::Client,
    service_url: String,
}

impl PushTransport {
    /// Create a new push transport for the given service URL.
    pub fn new(service_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            service_url: service_url.into(),
        }
    }

    /// Load the service URL from `PUSH_SERVICE_URL`; `None` when unset.
    pub fn from_env() -> Option<Self> {
        std::env::var("PUSH_SERVICE_URL").ok().map(Self::new)
    }
}

#[async_trait]
impl ChannelTransport for PushTransport {
    async fn send(&self, delivery: &OutboundDelivery) -> Result<(), TransportError> {
        let payload = serde_json::json!({
            "recipient_id": delivery.recipient_id,
            "title": delivery.title,
            "body": delivery.body,
        });

        let response = self
            .client
            .post(&self.service_url)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::HttpStatus(response.status().as_u16()));
        }

        tracing::info!(
            notification_id = %delivery.notification_id,
            recipient_id = delivery.recipient_id,
            "Push notification sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_returns_none_without_url() {
        std::env::remove_var("PUSH_SERVICE_URL");
        assert!(PushTransport::from_env().is_none());
    }
}
