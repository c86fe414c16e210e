//! Broker abstraction and channel transports for the notification pipeline.

pub mod broker;
pub mod channels;
pub mod message;

pub use broker::{Broker, BrokerError, BrokerMessage, InProcessBroker};
pub use channels::{
    ChannelTransport, OutboundDelivery, RecipientDirectory, TransportError, TransportRegistry,
};
pub use message::{NotificationMessage, Recipient};
