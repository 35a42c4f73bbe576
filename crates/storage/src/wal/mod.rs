//! Write-Ahead Log (WAL) module.
//!
//! One append-only file per store (`history-metadata.wal`):
//!
//! ```text
//! [magic "HMWAL"][format version: u8]
//! [frame][frame][frame]...
//! ```
//!
//! # Key Invariants
//!
//! - The log is append-only; only compaction replaces it, atomically, by rename
//! - Every frame is self-delimiting and checksummed
//! - An entry is in the log before it is visible in memory
//! - Replaying the log reproduces the in-memory state exactly
//!
//! # Usage
//!
//! ```ignore
//! use histmeta_storage::wal::{WalWriter, WalReader, DurabilityMode};
//!
//! let read = WalReader::read_all(&path)?;
//! let mut writer = WalWriter::open(&path, DurabilityMode::Always, &read)?;
//! writer.append(&entry)?;
//! ```

mod durability;
pub mod encoding;
mod entry;
pub mod reader;
pub mod writer;

pub use durability::DurabilityMode;
pub use entry::WalEntry;
pub use reader::{ReadStopReason, WalReadResult, WalReader};
pub use writer::{WalCounters, WalWriter};

/// Log file name inside the data directory
pub const WAL_FILE_NAME: &str = "history-metadata.wal";

/// File magic
pub const WAL_MAGIC: &[u8; 5] = b"HMWAL";

/// Current on-disk format version
pub const WAL_FORMAT_VERSION: u8 = 1;

/// Size of the file header (magic + version)
pub const WAL_HEADER_SIZE: usize = WAL_MAGIC.len() + 1;
