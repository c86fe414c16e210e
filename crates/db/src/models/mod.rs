//! Ledger row models.
//!
//! Each struct maps one table row via `sqlx::FromRow`. Status columns are
//! TEXT in the database; the enums in [`status`] hold the canonical values.

pub mod channel_send;
pub mod event_outbox;
pub mod notification_outbox;
pub mod recipient_notification;
pub mod status;

pub use channel_send::ChannelSendEntry;
pub use event_outbox::{EventOutboxEntry, NewEventOutboxEntry};
pub use notification_outbox::{NewNotificationOutboxEntry, NotificationOutboxEntry};
pub use recipient_notification::{NewRecipientNotification, RecipientChannelNotification};
pub use status::{EventOutboxStatus, NotificationOutboxStatus, RecipientStatus};
