//! WAL entry types
//!
//! Each entry is one atomic state change. Entries are logical (a retention
//! sweep is one `DeleteOlderThan`, not N deletes) and replay is deterministic
//! because it runs the same apply code as the live path.

use histmeta_core::{MetadataKey, MetadataRecord, Timestamp};
use serde::{Deserialize, Serialize};

/// A state change persisted in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalEntry {
    /// Insert or replace the record for `record.key`
    Put(MetadataRecord),

    /// Remove the record for a key, if present
    Delete(MetadataKey),

    /// Remove every record with `last_observed_at < threshold`
    DeleteOlderThan(Timestamp),

    /// Remove every record
    Clear,
}

impl WalEntry {
    /// Frame type tag
    pub fn type_tag(&self) -> u8 {
        match self {
            WalEntry::Put(_) => 1,
            WalEntry::Delete(_) => 2,
            WalEntry::DeleteOlderThan(_) => 3,
            WalEntry::Clear => 4,
        }
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            WalEntry::Put(_) => "put",
            WalEntry::Delete(_) => "delete",
            WalEntry::DeleteOlderThan(_) => "delete_older_than",
            WalEntry::Clear => "clear",
        }
    }
}
