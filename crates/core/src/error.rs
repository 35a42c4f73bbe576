//! Error types for histmeta
//!
//! Every layer reports failures through `StoreError`. There is deliberately no
//! `NotFound` variant: absence is an empty successful result.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use std::io;
use thiserror::Error;

/// Result type alias for histmeta operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Error types for the history-metadata store
///
/// `Clone` so a single failure can be handed to both a waiting caller and a
/// registered continuation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Caller supplied something malformed (unparsable URL, negative limit, bad config)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Underlying storage unreadable or unwritable (disk error, corruption)
    #[error("I/O failure: {0}")]
    IoFailure(String),

    /// The store was closed before the operation could run
    #[error("Store is closed")]
    Closed,
}

impl StoreError {
    /// Create an `InvalidArgument` error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        StoreError::InvalidArgument(msg.into())
    }

    /// Create an `IoFailure` error
    pub fn io(msg: impl Into<String>) -> Self {
        StoreError::IoFailure(msg.into())
    }

    /// True for `InvalidArgument`
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, StoreError::InvalidArgument(_))
    }

    /// True for `IoFailure`
    pub fn is_io_failure(&self) -> bool {
        matches!(self, StoreError::IoFailure(_))
    }

    /// True for `Closed`
    pub fn is_closed(&self) -> bool {
        matches!(self, StoreError::Closed)
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        StoreError::IoFailure(e.to_string())
    }
}
