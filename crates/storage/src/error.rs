//! Storage-level errors
//!
//! These stay inside the storage crate's vocabulary (offsets, frames) and are
//! flattened into `StoreError` at the crate boundary: an entry too large to
//! log is the caller's mistake, everything else is an I/O failure.

use histmeta_core::StoreError;
use std::io;
use thiserror::Error;

/// Errors raised while reading or writing the log
#[derive(Debug, Error)]
pub enum WalError {
    /// File operation failed
    #[error("WAL I/O error: {0}")]
    Io(#[from] io::Error),

    /// Log content is not what was written
    #[error("WAL corruption at offset {offset}: {detail}")]
    Corruption {
        /// Byte offset of the bad frame
        offset: u64,
        /// What was wrong
        detail: String,
    },

    /// Buffer ends before the frame does; more bytes are needed
    #[error("Incomplete WAL frame at offset {offset}: have {have} bytes, need {needed}")]
    Incomplete {
        /// Byte offset of the frame
        offset: u64,
        /// Bytes available
        have: usize,
        /// Bytes required
        needed: usize,
    },

    /// Entry could not be encoded or decoded
    #[error("WAL serialization error: {0}")]
    Serialization(String),

    /// Entry would produce a frame the reader refuses
    #[error("WAL entry too large: frame of {len} bytes exceeds maximum {max}")]
    EntryTooLarge {
        /// Frame length the entry needs
        len: usize,
        /// Largest frame accepted
        max: usize,
    },

    /// Writer lost its log handle and refuses further writes
    #[error("WAL writer unusable after a failed reopen of {0}; close and reopen the store")]
    Unusable(String),

    /// Data directory is held by another open store
    #[error("Data directory is locked by another store: {0}")]
    Locked(String),
}

impl From<rmp_serde::encode::Error> for WalError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        WalError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for WalError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        WalError::Serialization(e.to_string())
    }
}

impl From<WalError> for StoreError {
    fn from(e: WalError) -> Self {
        match e {
            WalError::EntryTooLarge { .. } => StoreError::InvalidArgument(e.to_string()),
            other => StoreError::IoFailure(other.to_string()),
        }
    }
}
