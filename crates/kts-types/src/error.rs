use thiserror::Error;

/// Errors produced by type conversions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid key segment: {0}")]
    InvalidSegment(String),

    #[error("invalid key path: {0}")]
    InvalidPath(String),
}
