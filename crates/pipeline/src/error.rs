use std::time::Duration;

use horde_client::HordeApiError;
use horde_core::error::CoreError;
use horde_core::media::MediaError;

/// Errors that end a lifecycle or a store operation.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A local precondition failed (validation, lookup miss, busy).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The network call failed or its response was rejected.
    #[error(transparent)]
    Api(#[from] HordeApiError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A returned image could not be decoded or re-encoded.
    #[error(transparent)]
    Media(#[from] MediaError),

    /// The Horde reported the request as faulted or impossible.
    #[error("{0}")]
    Faulted(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("No result after {0:?}")]
    TimedOut(Duration),
}

impl SessionError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
