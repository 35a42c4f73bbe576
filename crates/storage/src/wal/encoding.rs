//! WAL frame encoding and decoding
//!
//! ## Frame Format
//!
//! ```text
//! [length: u32][type: u8][payload: bytes][crc32: u32]
//! ```
//!
//! - **length**: size of type + payload + crc (NOT including length itself)
//! - **type**: entry type tag (1=Put, 2=Delete, 3=DeleteOlderThan, 4=Clear)
//! - **payload**: MessagePack-serialized `WalEntry`
//! - **crc32**: checksum over \[type\]\[payload\]
//!
//! All integers are little-endian.

use super::entry::WalEntry;
use crate::error::WalError;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;

/// Smallest legal `length` value: type(1) + crc(4)
const MIN_FRAME_LEN: usize = 5;

/// Frames above this size are treated as corruption rather than allocated
const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Encode an entry into one frame
///
/// # Errors
///
/// `WalError::EntryTooLarge` if the frame would exceed what `decode_entry`
/// accepts; nothing is produced in that case.
pub fn encode_entry(entry: &WalEntry) -> Result<Vec<u8>, WalError> {
    let type_tag = entry.type_tag();
    let payload = rmp_serde::to_vec(entry)?;
    let total_len = frame_len(payload.len())?;

    let mut buf = Vec::with_capacity(4 + total_len as usize);
    buf.write_u32::<LittleEndian>(total_len)?;
    buf.write_u8(type_tag)?;
    buf.extend_from_slice(&payload);

    let mut hasher = Hasher::new();
    hasher.update(&[type_tag]);
    hasher.update(&payload);
    buf.write_u32::<LittleEndian>(hasher.finalize())?;

    Ok(buf)
}

/// `length` field for a payload of `payload_len` bytes
fn frame_len(payload_len: usize) -> Result<u32, WalError> {
    let total_len = payload_len.saturating_add(1 + 4);
    if total_len > MAX_FRAME_LEN {
        return Err(WalError::EntryTooLarge {
            len: total_len,
            max: MAX_FRAME_LEN,
        });
    }
    u32::try_from(total_len).map_err(|_| WalError::EntryTooLarge {
        len: total_len,
        max: MAX_FRAME_LEN,
    })
}

/// Decode one frame from the front of `buf`
///
/// Returns the entry and the number of bytes consumed. `offset` is the file
/// offset of `buf[0]`, used only for error reporting.
///
/// # Errors
///
/// - `WalError::Incomplete` if `buf` ends before the frame does
/// - `WalError::Corruption` on a bad length, CRC mismatch, type tag mismatch
///   or undecodable payload
pub fn decode_entry(buf: &[u8], offset: u64) -> Result<(WalEntry, usize), WalError> {
    if buf.len() < 4 {
        return Err(WalError::Incomplete {
            offset,
            have: buf.len(),
            needed: 4,
        });
    }
    let total_len = (&buf[..4]).read_u32::<LittleEndian>()? as usize;

    if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&total_len) {
        return Err(WalError::Corruption {
            offset,
            detail: format!("invalid frame length {}", total_len),
        });
    }

    if buf.len() < 4 + total_len {
        return Err(WalError::Incomplete {
            offset,
            have: buf.len(),
            needed: 4 + total_len,
        });
    }

    let type_tag = buf[4];
    let payload = &buf[5..4 + total_len - 4];
    let stored_crc = (&buf[4 + total_len - 4..4 + total_len]).read_u32::<LittleEndian>()?;

    let mut hasher = Hasher::new();
    hasher.update(&[type_tag]);
    hasher.update(payload);
    let computed_crc = hasher.finalize();

    if stored_crc != computed_crc {
        return Err(WalError::Corruption {
            offset,
            detail: format!(
                "CRC mismatch: stored {:#010x}, computed {:#010x}",
                stored_crc, computed_crc
            ),
        });
    }

    let entry: WalEntry = rmp_serde::from_slice(payload).map_err(|e| WalError::Corruption {
        offset,
        detail: format!("undecodable payload: {}", e),
    })?;

    if entry.type_tag() != type_tag {
        return Err(WalError::Corruption {
            offset,
            detail: format!(
                "type tag {} does not match decoded {} entry",
                type_tag,
                entry.kind()
            ),
        });
    }

    Ok((entry, 4 + total_len))
}
