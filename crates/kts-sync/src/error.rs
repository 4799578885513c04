use thiserror::Error;

/// Errors surfaced by the request layer.
///
/// Cloneable so that every caller sharing a deduplicated call observes the
/// same failure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    /// The exchange as a whole failed; every call in the batch sees this.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server rejected one specific call.
    #[error("remote error: {0}")]
    Remote(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("call dropped before a response arrived")]
    Cancelled,
}

impl From<kts_protocol::ProtocolError> for SyncError {
    fn from(err: kts_protocol::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
