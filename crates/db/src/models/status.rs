//! Status vocabularies for the ledger tables.
//!
//! Values must match the CHECK constraints in `db/migrations`. Every status
//! column transitions monotonically: once a row reaches a terminal value it
//! never returns to `PENDING`, enforced by the conditional updates in the
//! repository layer.

/// Status of an `event_outbox` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutboxStatus {
    Pending,
    Processed,
    Failed,
}

impl EventOutboxStatus {
    /// Database column value.
    pub fn as_str(self) -> &'static str {
        match self {
            EventOutboxStatus::Pending => "PENDING",
            EventOutboxStatus::Processed => "PROCESSED",
            EventOutboxStatus::Failed => "FAILED",
        }
    }

    /// Whether this status permits no further transitions.
    pub fn is_terminal(self) -> bool {
        !matches!(self, EventOutboxStatus::Pending)
    }
}

/// Status of a `notification_outbox` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutboxStatus {
    Pending,
    Published,
    Failed,
}

impl NotificationOutboxStatus {
    /// Database column value.
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationOutboxStatus::Pending => "PENDING",
            NotificationOutboxStatus::Published => "PUBLISHED",
            NotificationOutboxStatus::Failed => "FAILED",
        }
    }

    /// Whether this status permits no further transitions.
    pub fn is_terminal(self) -> bool {
        !matches!(self, NotificationOutboxStatus::Pending)
    }
}

/// Status of a `recipient_notifications` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientStatus {
    Pending,
    Delivered,
    Failed,
    Read,
}

impl RecipientStatus {
    /// Database column value.
    pub fn as_str(self) -> &'static str {
        match self {
            RecipientStatus::Pending => "PENDING",
            RecipientStatus::Delivered => "DELIVERED",
            RecipientStatus::Failed => "FAILED",
            RecipientStatus::Read => "READ",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!EventOutboxStatus::Pending.is_terminal());
        assert!(EventOutboxStatus::Processed.is_terminal());
        assert!(EventOutboxStatus::Failed.is_terminal());
        assert!(!NotificationOutboxStatus::Pending.is_terminal());
        assert!(NotificationOutboxStatus::Published.is_terminal());
        assert!(NotificationOutboxStatus::Failed.is_terminal());
    }
}
