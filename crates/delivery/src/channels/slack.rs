//! Slack channel via incoming webhook.

use std::time::Duration;

use async_trait::async_trait;

use super::{ChannelTransport, OutboundDelivery, TransportError};

/// HTTP request timeout for a single delivery attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts notification messages to a Slack incoming-webhook URL.
pub struct SlackTransport {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackTransport {
    /// Create a new Slack transport for the given webhook URL.
    pub fn new(webhook_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            webhook_url: webhook_url.into(),
        }
    }

    /// Load the webhook URL from `SLACK_WEBHOOK_URL`.
    ///
    /// Returns `None` when unset, signalling the channel should not be
    /// registered.
    pub fn from_env() -> Option<Self> {
        std::env::var("SLACK_WEBHOOK_URL").ok().map(Self::new)
    }
}

#[async_trait]
impl ChannelTransport for SlackTransport {
    async fn send(&self, delivery: &OutboundDelivery) -> Result<(), TransportError> {
        let payload = serde_json::json!({
            "text": format!("*{}*\n{}", delivery.title, delivery.body),
        });

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransportError::HttpStatus(response.status().as_u16()));
        }

        tracing::info!(
            notification_id = %delivery.notification_id,
            recipient_id = delivery.recipient_id,
            "Slack notification sent"
        );
        Ok(())
    }
}
