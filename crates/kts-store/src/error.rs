use kts_sync::SyncError;
use kts_types::KeyPath;

/// Errors from namespace and storage operations.
///
/// Structural violations are reported before any state changes. Transport
/// and remote failures come back from the request layer.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A malformed arity, or a key too shallow for the requested operation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Mutation attempted on a read-only namespace.
    #[error("namespace is read-only")]
    ReadOnly,

    /// A save for the same unit is already in flight.
    #[error("save already in flight for {0}")]
    Conflict(KeyPath),

    /// No namespace is registered under this name.
    #[error("namespace not found: {0}")]
    NotFound(String),

    /// The batched exchange carrying the call failed as a whole.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server rejected this specific call.
    #[error("remote error: {0}")]
    Remote(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<SyncError> for StoreError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Remote(message) => Self::Remote(message),
            SyncError::Transport(message) | SyncError::Protocol(message) => Self::Transport(message),
            SyncError::Cancelled => Self::Transport(SyncError::Cancelled.to_string()),
        }
    }
}

impl From<toml::de::Error> for StoreError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
