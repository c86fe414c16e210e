//! Pipeline error type.
//!
//! Failures are contained at the row level: a poller catches this error per
//! row, logs it, and converts publish/send failures into retry-count
//! increments. It never propagates out of a batch loop.

use bistro_delivery::{BrokerError, TransportError};

/// Error type for per-row pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Database access failed.
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    /// The broker rejected a publish.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// A channel transport failed to send.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A broker payload could not be parsed.
    #[error("Malformed message payload: {0}")]
    Payload(#[from] serde_json::Error),
}
