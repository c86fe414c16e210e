//! Delivery channel taxonomy.
//!
//! Channel values must match the TEXT stored in `channel_sends.channel_type`
//! and `recipient_notifications.channel`, and are matched by the channel
//! poller and transport registry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A delivery channel for user-facing notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChannelType {
    Sms,
    Email,
    Push,
    Websocket,
    Slack,
}

/// How a channel handles delivery state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Best-effort, fire-and-forget: no ledger row, no retry. The transport
    /// is inherently transient (a live socket), so a retry has no value once
    /// the moment has passed.
    Direct,
    /// Tracked in the `channel_sends` ledger with per-channel retry state.
    Persistent,
}

impl ChannelType {
    /// Every known channel, in the order the channel poller iterates them.
    pub const ALL: [ChannelType; 5] = [
        ChannelType::Sms,
        ChannelType::Email,
        ChannelType::Push,
        ChannelType::Websocket,
        ChannelType::Slack,
    ];

    /// Database column value for this channel.
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelType::Sms => "SMS",
            ChannelType::Email => "EMAIL",
            ChannelType::Push => "PUSH",
            ChannelType::Websocket => "WEBSOCKET",
            ChannelType::Slack => "SLACK",
        }
    }

    /// Classify the channel as direct (no persistence) or persistent.
    pub fn delivery_mode(self) -> DeliveryMode {
        match self {
            ChannelType::Websocket => DeliveryMode::Direct,
            ChannelType::Sms | ChannelType::Email | ChannelType::Push | ChannelType::Slack => {
                DeliveryMode::Persistent
            }
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored channel value is not a known [`ChannelType`].
#[derive(Debug, thiserror::Error)]
#[error("Unknown channel type: {0}")]
pub struct UnknownChannel(pub String);

impl FromStr for ChannelType {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SMS" => Ok(ChannelType::Sms),
            "EMAIL" => Ok(ChannelType::Email),
            "PUSH" => Ok(ChannelType::Push),
            "WEBSOCKET" => Ok(ChannelType::Websocket),
            "SLACK" => Ok(ChannelType::Slack),
            other => Err(UnknownChannel(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_channel_through_str() {
        for channel in ChannelType::ALL {
            assert_eq!(channel.as_str().parse::<ChannelType>().unwrap(), channel);
        }
    }

    #[test]
    fn websocket_is_the_only_direct_channel() {
        for channel in ChannelType::ALL {
            let expected = if channel == ChannelType::Websocket {
                DeliveryMode::Direct
            } else {
                DeliveryMode::Persistent
            };
            assert_eq!(channel.delivery_mode(), expected);
        }
    }

    #[test]
    fn unknown_channel_error_names_the_value() {
        let err = "CARRIER_PIGEON".parse::<ChannelType>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown channel type: CARRIER_PIGEON");
    }

    #[test]
    fn serde_uses_uppercase_column_values() {
        let json = serde_json::to_string(&ChannelType::Websocket).unwrap();
        assert_eq!(json, "\"WEBSOCKET\"");
    }
}
