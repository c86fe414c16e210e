//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. All status mutations are
//! conditional single-row updates (`WHERE status = 'PENDING'` /
//! `WHERE sent IS NULL`) so that concurrent poller instances racing on the
//! same row resolve to exactly one winner; the loser's update affects zero
//! rows and is reported as such.

pub mod channel_send_repo;
pub mod event_outbox_repo;
pub mod notification_outbox_repo;
pub mod recipient_notification_repo;

pub use channel_send_repo::ChannelSendRepo;
pub use event_outbox_repo::EventOutboxRepo;
pub use notification_outbox_repo::NotificationOutboxRepo;
pub use recipient_notification_repo::RecipientNotificationRepo;
