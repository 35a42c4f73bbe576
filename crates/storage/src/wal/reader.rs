//! WAL reader for recovery and replay.
//!
//! Reads the whole log into memory, validates the header and decodes frames
//! in order. A torn tail (a partial frame, or a checksum failure on the very
//! last frame) is the expected shape of a crash mid-append and is reported,
//! not raised. Damage anywhere before the tail is a hard error: silently
//! skipping a frame would resurrect or lose records.

use super::encoding::decode_entry;
use super::entry::WalEntry;
use super::{WAL_FORMAT_VERSION, WAL_HEADER_SIZE, WAL_MAGIC};
use crate::error::WalError;
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use tracing::warn;

/// Why reading stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStopReason {
    /// Every byte decoded
    EndOfData,
    /// The file ended inside a frame
    PartialRecord {
        /// Offset of the partial frame
        offset: u64,
    },
    /// The final frame failed its checksum
    TornTail {
        /// Offset of the damaged frame
        offset: u64,
    },
    /// The header itself was cut short
    PartialHeader,
}

/// Result of reading a log file
#[derive(Debug, Clone)]
pub struct WalReadResult {
    /// Decoded entries, in log order
    pub entries: Vec<WalEntry>,
    /// Byte offset where valid content ends
    pub valid_end: u64,
    /// Bytes past `valid_end` that must be discarded
    pub truncated_bytes: u64,
    /// Whether a complete, valid header was found
    pub header_present: bool,
    /// Why reading stopped
    pub stop_reason: ReadStopReason,
}

impl WalReadResult {
    /// Result for a log that does not exist yet
    pub fn empty() -> Self {
        WalReadResult {
            entries: Vec::new(),
            valid_end: 0,
            truncated_bytes: 0,
            header_present: false,
            stop_reason: ReadStopReason::EndOfData,
        }
    }

    /// Check if the tail needs truncating before appending
    pub fn needs_truncation(&self) -> bool {
        self.truncated_bytes > 0
    }
}

/// Reads a log file from start to end
pub struct WalReader;

impl WalReader {
    /// Read every entry from the log at `path`
    ///
    /// A missing file reads as empty.
    ///
    /// # Errors
    ///
    /// - `WalError::Corruption` if the header is foreign, the version is
    ///   unknown, or a frame before the tail is damaged
    /// - `WalError::Io` if the file cannot be read
    pub fn read_all(path: &Path) -> Result<WalReadResult, WalError> {
        let mut file = match fs::File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(WalReadResult::empty()),
            Err(e) => return Err(e.into()),
        };
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        Self::read_bytes(&buffer)
    }

    /// Decode a complete log image
    pub fn read_bytes(buffer: &[u8]) -> Result<WalReadResult, WalError> {
        if buffer.len() < WAL_HEADER_SIZE {
            if !buffer.is_empty() && !WAL_MAGIC.starts_with(&buffer[..buffer.len().min(WAL_MAGIC.len())]) {
                return Err(WalError::Corruption {
                    offset: 0,
                    detail: "not a history metadata log".to_string(),
                });
            }
            if !buffer.is_empty() {
                warn!(
                    target: "histmeta::wal",
                    bytes = buffer.len(),
                    "Log header is incomplete, treating log as empty"
                );
            }
            return Ok(WalReadResult {
                truncated_bytes: buffer.len() as u64,
                stop_reason: if buffer.is_empty() {
                    ReadStopReason::EndOfData
                } else {
                    ReadStopReason::PartialHeader
                },
                ..WalReadResult::empty()
            });
        }

        if &buffer[..WAL_MAGIC.len()] != WAL_MAGIC {
            return Err(WalError::Corruption {
                offset: 0,
                detail: "not a history metadata log".to_string(),
            });
        }
        let version = buffer[WAL_MAGIC.len()];
        if version != WAL_FORMAT_VERSION {
            return Err(WalError::Corruption {
                offset: WAL_MAGIC.len() as u64,
                detail: format!(
                    "unsupported log format version {} (expected {})",
                    version, WAL_FORMAT_VERSION
                ),
            });
        }

        let mut entries = Vec::new();
        let mut offset = WAL_HEADER_SIZE;
        let mut stop_reason = ReadStopReason::EndOfData;

        while offset < buffer.len() {
            match decode_entry(&buffer[offset..], offset as u64) {
                Ok((entry, consumed)) => {
                    entries.push(entry);
                    offset += consumed;
                }
                Err(WalError::Incomplete { .. }) => {
                    stop_reason = ReadStopReason::PartialRecord {
                        offset: offset as u64,
                    };
                    break;
                }
                Err(WalError::Corruption { detail, .. }) if Self::is_last_frame(buffer, offset) => {
                    warn!(
                        target: "histmeta::wal",
                        offset,
                        %detail,
                        "Final log frame is damaged, discarding it"
                    );
                    stop_reason = ReadStopReason::TornTail {
                        offset: offset as u64,
                    };
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        let truncated_bytes = (buffer.len() - offset) as u64;
        if truncated_bytes > 0 {
            warn!(
                target: "histmeta::wal",
                valid_end = offset,
                truncated_bytes,
                "Log has an incomplete tail"
            );
        }

        Ok(WalReadResult {
            entries,
            valid_end: offset as u64,
            truncated_bytes,
            header_present: true,
            stop_reason,
        })
    }

    /// Whether the frame at `offset` claims to end exactly at end of file
    fn is_last_frame(buffer: &[u8], offset: usize) -> bool {
        let remaining = &buffer[offset..];
        if remaining.len() < 4 {
            return false;
        }
        let declared = u32::from_le_bytes([remaining[0], remaining[1], remaining[2], remaining[3]]);
        4 + declared as usize == remaining.len()
    }
}
