//! WAL writer with durability mode support.
//!
//! Appends frames straight to the log file (no userspace buffer, so a failed
//! append can be rolled back with `set_len`). fsync timing follows the
//! configured `DurabilityMode`.

use super::encoding::encode_entry;
use super::entry::WalEntry;
use super::reader::WalReadResult;
use super::{DurabilityMode, WAL_FORMAT_VERSION, WAL_MAGIC};
use crate::error::WalError;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Cumulative WAL operation counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalCounters {
    /// Total successful appends
    pub appends: u64,
    /// Total fsync calls
    pub sync_calls: u64,
    /// Total bytes appended
    pub bytes_written: u64,
    /// Total compactions
    pub rewrites: u64,
    /// Batch or interval fsyncs that failed after an append landed
    pub deferred_sync_failures: u64,
}

/// Append-only writer for one log file.
///
/// In `DurabilityMode::InMemory` no file is opened and every operation
/// succeeds without doing I/O.
pub struct WalWriter {
    /// Open log (None for InMemory)
    file: Option<File>,

    /// Log path
    path: PathBuf,

    /// Durability mode
    durability: DurabilityMode,

    /// Length of valid content; the file is never longer after an append
    len: u64,

    /// Frames currently in the log
    entries: usize,

    /// Appends since the last fsync (Standard mode)
    writes_since_sync: usize,

    /// Last fsync time (Standard mode)
    last_sync_time: Instant,

    /// Whether data was written but not yet fsynced
    has_unsynced_data: bool,

    /// Set when the log handle was lost; every later write is refused
    failed: bool,

    counters: WalCounters,
}

impl WalWriter {
    /// Writer that never touches disk
    pub fn in_memory() -> Self {
        WalWriter {
            file: None,
            path: PathBuf::new(),
            durability: DurabilityMode::InMemory,
            len: 0,
            entries: 0,
            writes_since_sync: 0,
            last_sync_time: Instant::now(),
            has_unsynced_data: false,
            failed: false,
            counters: WalCounters::default(),
        }
    }

    /// Open the log at `path` for appending.
    ///
    /// `read` must be the result of reading the same file. A missing or
    /// partial header is (re)written; a torn tail is truncated away.
    pub fn open(path: &Path, durability: DurabilityMode, read: &WalReadResult) -> Result<Self, WalError> {
        if !durability.requires_wal() {
            return Ok(Self::in_memory());
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let len = if read.header_present {
            if read.needs_truncation() {
                warn!(
                    target: "histmeta::wal",
                    path = %path.display(),
                    valid_end = read.valid_end,
                    truncated_bytes = read.truncated_bytes,
                    "Truncating incomplete log tail"
                );
                file.set_len(read.valid_end)?;
                file.sync_all()?;
            }
            read.valid_end
        } else {
            file.set_len(0)?;
            let header = header_bytes();
            file.write_all(&header)?;
            file.sync_all()?;
            sync_parent_dir(path);
            debug!(target: "histmeta::wal", path = %path.display(), "Created log");
            header.len() as u64
        };
        file.seek(SeekFrom::Start(len))?;

        Ok(WalWriter {
            file: Some(file),
            path: path.to_path_buf(),
            durability,
            len,
            entries: read.entries.len(),
            writes_since_sync: 0,
            last_sync_time: Instant::now(),
            has_unsynced_data: false,
            failed: false,
            counters: WalCounters::default(),
        })
    }

    /// Append one entry.
    ///
    /// On failure the file is cut back to its previous length, so a failed
    /// append leaves no trace in the log. In Standard mode a failed batch or
    /// interval fsync does not fail the append: the frame is already in the
    /// log and the data stays marked unsynced for the next attempt.
    pub fn append(&mut self, entry: &WalEntry) -> Result<(), WalError> {
        self.check_usable()?;
        let Some(file) = self.file.as_mut() else {
            self.entries += 1;
            return Ok(());
        };

        let frame = encode_entry(entry)?;
        let immediate = self.durability.requires_immediate_fsync();
        let written = file.write_all(&frame).and_then(|_| {
            if immediate {
                file.sync_data()
            } else {
                Ok(())
            }
        });

        if let Err(e) = written {
            warn!(
                target: "histmeta::wal",
                error = %e,
                kind = entry.kind(),
                "Log append failed, rolling back"
            );
            let _ = file.set_len(self.len);
            let _ = file.seek(SeekFrom::Start(self.len));
            return Err(e.into());
        }

        self.len += frame.len() as u64;
        self.entries += 1;
        self.counters.appends += 1;
        self.counters.bytes_written += frame.len() as u64;

        if immediate {
            self.counters.sync_calls += 1;
            self.reset_sync_counters();
        } else {
            self.writes_since_sync += 1;
            self.has_unsynced_data = true;
            if let Err(e) = self.maybe_sync() {
                self.counters.deferred_sync_failures += 1;
                warn!(
                    target: "histmeta::wal",
                    error = %e,
                    unsynced = self.writes_since_sync,
                    "Deferred fsync failed; will retry"
                );
            }
        }
        Ok(())
    }

    /// Standard mode: sync once the batch fills or the interval elapses
    fn maybe_sync(&mut self) -> Result<(), WalError> {
        if let DurabilityMode::Standard {
            interval_ms,
            batch_size,
        } = self.durability
        {
            let overdue = self.last_sync_time.elapsed().as_millis() as u64 >= interval_ms;
            if self.writes_since_sync >= batch_size || overdue {
                self.sync()?;
            }
        }
        Ok(())
    }

    fn reset_sync_counters(&mut self) {
        self.writes_since_sync = 0;
        self.last_sync_time = Instant::now();
        self.has_unsynced_data = false;
    }

    fn check_usable(&self) -> Result<(), WalError> {
        if self.failed {
            return Err(WalError::Unusable(self.path.display().to_string()));
        }
        Ok(())
    }

    /// Force everything written so far to disk
    pub fn sync(&mut self) -> Result<(), WalError> {
        self.check_usable()?;
        if let Some(file) = self.file.as_mut() {
            if self.has_unsynced_data {
                file.sync_data()?;
                self.counters.sync_calls += 1;
            }
        }
        self.reset_sync_counters();
        Ok(())
    }

    /// Sync if Standard mode's interval has passed with data pending.
    ///
    /// Returns `true` if a sync was performed.
    pub fn sync_if_overdue(&mut self) -> Result<bool, WalError> {
        if !self.has_unsynced_data {
            return Ok(false);
        }
        if let DurabilityMode::Standard { interval_ms, .. } = self.durability {
            if self.last_sync_time.elapsed().as_millis() as u64 >= interval_ms {
                self.sync()?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Replace the log with exactly `entries`.
    ///
    /// Writes a sibling temp file, fsyncs it and renames it over the log, so
    /// a crash leaves either the old log or the new one.
    pub fn rewrite<'a, I>(&mut self, entries: I) -> Result<(), WalError>
    where
        I: IntoIterator<Item = &'a WalEntry>,
    {
        self.check_usable()?;
        if self.file.is_none() {
            self.entries = 0;
            return Ok(());
        }

        let tmp_path = compaction_path(&self.path);
        // Flush what the old handle holds before it is replaced.
        let written = write_compacted(&tmp_path, entries)
            .and_then(|done| self.sync().map(|_| done));
        let (len, count) = match written {
            Ok(done) => done,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                return Err(e);
            }
        };
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        sync_parent_dir(&self.path);

        // The old handle now points at an unlinked file.
        let reopened = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .and_then(|mut file| file.seek(SeekFrom::Start(len)).map(|_| file));
        let file = match reopened {
            Ok(file) => file,
            Err(e) => {
                warn!(
                    target: "histmeta::wal",
                    path = %self.path.display(),
                    error = %e,
                    "Log reopen after compaction failed"
                );
                self.failed = true;
                return Err(e.into());
            }
        };

        info!(
            target: "histmeta::wal",
            before = self.entries,
            after = count,
            bytes = len,
            "Compacted log"
        );

        self.file = Some(file);
        self.len = len;
        self.entries = count;
        self.counters.rewrites += 1;
        self.reset_sync_counters();
        Ok(())
    }

    /// Frames currently in the log
    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Valid log length in bytes
    pub fn len_bytes(&self) -> u64 {
        self.len
    }

    /// Log path (empty for InMemory)
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Durability mode
    pub fn durability(&self) -> DurabilityMode {
        self.durability
    }

    /// Snapshot of cumulative counters
    pub fn counters(&self) -> WalCounters {
        self.counters.clone()
    }
}

impl Drop for WalWriter {
    fn drop(&mut self) {
        if self.has_unsynced_data {
            if let Some(file) = self.file.as_mut() {
                let _ = file.sync_data();
            }
        }
    }
}

fn header_bytes() -> Vec<u8> {
    let mut header = WAL_MAGIC.to_vec();
    header.push(WAL_FORMAT_VERSION);
    header
}

/// Write a complete log holding `entries` to `path` and fsync it.
///
/// Returns the file length and the frame count.
fn write_compacted<'a, I>(path: &Path, entries: I) -> Result<(u64, usize), WalError>
where
    I: IntoIterator<Item = &'a WalEntry>,
{
    let mut tmp = File::create(path)?;
    let header = header_bytes();
    tmp.write_all(&header)?;
    let mut len = header.len() as u64;
    let mut count = 0usize;
    for entry in entries {
        let frame = encode_entry(entry)?;
        tmp.write_all(&frame)?;
        len += frame.len() as u64;
        count += 1;
    }
    tmp.sync_all()?;
    Ok((len, count))
}

fn compaction_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".compact");
    path.with_file_name(name)
}

/// Best effort: persist a rename or create in the parent directory
fn sync_parent_dir(path: &Path) {
    #[cfg(unix)]
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}
