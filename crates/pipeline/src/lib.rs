//! The notification delivery pipeline: scheduled, stateless pollers over
//! the persisted ledgers.
//!
//! Each poller is an independent timer-driven task; the ledgers are the
//! only shared mutable state, and every status transition is a conditional
//! single-row update, so pollers may run concurrently with each other and
//! with copies of themselves on other instances.

pub mod channel_poller;
pub mod config;
pub mod error;
pub mod event_poller;
pub mod fanout;
pub mod monitor;
pub mod notification_poller;
pub mod reads;
pub mod retention;

pub use channel_poller::ChannelPoller;
pub use config::PipelineConfig;
pub use error::PipelineError;
pub use event_poller::EventOutboxPoller;
pub use fanout::FanoutConsumer;
pub use notification_poller::NotificationOutboxPoller;
pub use retention::RetentionSweeper;

/// Per-cycle outcome counters, logged by each poller when nonzero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    /// Rows that reached their success status this cycle.
    pub succeeded: usize,
    /// Rows that failed and stay pending for the next cycle.
    pub retried: usize,
    /// Rows that exhausted their retry budget and are now terminal.
    pub exhausted: usize,
}

impl CycleStats {
    /// Whether anything happened this cycle.
    pub fn is_empty(&self) -> bool {
        self.succeeded == 0 && self.retried == 0 && self.exhausted == 0
    }
}
