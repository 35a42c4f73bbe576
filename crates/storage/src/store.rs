//! DurableStore: ordered record map backed by the write-ahead log
//!
//! # Structure
//!
//! - `StoreState`: `BTreeMap<MetadataKey, MetadataRecord>` plus the
//!   `ObservedIndex`, always updated together
//! - `RwLock<StoreState>`: many concurrent readers, one applier
//! - `Mutex<WalWriter>`: the single writer slot
//!
//! # Write Protocol
//!
//! 1. `begin_write()` takes the writer slot (serializes all mutations)
//! 2. The caller reads current state through the guard and computes an entry
//! 3. `commit(entry)` appends it to the log, then applies it under the
//!    write lock
//!
//! Because the slot is held from read to commit, read-modify-write sequences
//! (observation merges) cannot interleave. Because the apply happens under
//! one write lock, readers never see half of an entry.
//!
//! Replay runs `StoreState::apply` on every logged entry, the same code the
//! live path runs.

use crate::error::WalError;
use crate::index::ObservedIndex;
use crate::wal::{DurabilityMode, WalEntry, WalReader, WalWriter, WAL_FILE_NAME};
use fs2::FileExt;
use histmeta_core::{MetadataKey, MetadataRecord, StoreResult, Timestamp};
use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the directory lock file
pub const LOCK_FILE_NAME: &str = "LOCK";

/// Options for opening a `DurableStore`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageOptions {
    /// When log appends are fsynced
    pub durability: DurabilityMode,
    /// Rewrite the log once it holds more than this many entries (0 = never)
    pub compact_after_entries: usize,
}

impl Default for StorageOptions {
    fn default() -> Self {
        StorageOptions {
            durability: DurabilityMode::default(),
            compact_after_entries: 10_000,
        }
    }
}

impl StorageOptions {
    /// Set the durability mode
    pub fn with_durability(mut self, durability: DurabilityMode) -> Self {
        self.durability = durability;
        self
    }

    /// Set the compaction threshold
    pub fn with_compact_after_entries(mut self, entries: usize) -> Self {
        self.compact_after_entries = entries;
        self
    }
}

// ============================================================================
// StoreState
// ============================================================================

/// In-memory state: records plus their observed-at index
#[derive(Debug, Default, Clone)]
pub struct StoreState {
    records: BTreeMap<MetadataKey, MetadataRecord>,
    observed: ObservedIndex,
}

impl StoreState {
    /// Empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one entry, returning how many records it inserted, replaced
    /// or removed
    pub fn apply(&mut self, entry: &WalEntry) -> usize {
        match entry {
            WalEntry::Put(record) => {
                self.put(record.clone());
                1
            }
            WalEntry::Delete(key) => usize::from(self.remove(key)),
            WalEntry::DeleteOlderThan(threshold) => self.remove_older_than(*threshold),
            WalEntry::Clear => {
                let removed = self.records.len();
                self.records.clear();
                self.observed.clear();
                removed
            }
        }
    }

    fn put(&mut self, record: MetadataRecord) {
        if let Some(old) = self.records.get(&record.key) {
            self.observed.remove(old.last_observed_at, &old.key);
        }
        self.observed.insert(record.last_observed_at, record.key.clone());
        self.records.insert(record.key.clone(), record);
    }

    fn remove(&mut self, key: &MetadataKey) -> bool {
        match self.records.remove(key) {
            Some(old) => {
                self.observed.remove(old.last_observed_at, key);
                true
            }
            None => false,
        }
    }

    fn remove_older_than(&mut self, threshold: Timestamp) -> usize {
        let expired = self.observed.older_than(threshold);
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    /// Look up a record
    pub fn get(&self, key: &MetadataKey) -> Option<&MetadataRecord> {
        self.records.get(key)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if there are no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in key order
    pub fn records(&self) -> impl Iterator<Item = &MetadataRecord> + '_ {
        self.records.values()
    }

    /// The observed-at index
    pub fn observed(&self) -> &ObservedIndex {
        &self.observed
    }

    /// Records with `last_observed_at >= since`, ascending, url tie-break
    pub fn since(&self, since: Timestamp) -> impl Iterator<Item = &MetadataRecord> + '_ {
        self.observed
            .since(since)
            .filter_map(move |key| self.records.get(key))
    }

    /// Records with `start <= last_observed_at < end`, ascending
    pub fn between(&self, start: Timestamp, end: Timestamp) -> Vec<&MetadataRecord> {
        self.observed
            .between(start, end)
            .into_iter()
            .filter_map(|key| self.records.get(key))
            .collect()
    }

    /// All records, most recently observed first
    pub fn newest_first(&self) -> impl Iterator<Item = &MetadataRecord> + '_ {
        self.observed
            .newest_first()
            .filter_map(move |key| self.records.get(key))
    }

    /// One `Put` per live record, the minimal log reproducing this state
    fn checkpoint_entries(&self) -> Vec<WalEntry> {
        self.records.values().cloned().map(WalEntry::Put).collect()
    }
}

// ============================================================================
// DurableStore
// ============================================================================

/// Thread-safe, log-backed record store
pub struct DurableStore {
    state: RwLock<StoreState>,
    writer: Mutex<WalWriter>,
    options: StorageOptions,
    dir: Option<PathBuf>,
    /// Held for the store's lifetime; the OS releases the lock on close
    _lock: Option<File>,
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore")
            .field("dir", &self.dir)
            .field("options", &self.options)
            .field("records", &self.state.read().len())
            .finish()
    }
}

impl DurableStore {
    /// Ephemeral store with no files
    pub fn in_memory() -> Self {
        DurableStore {
            state: RwLock::new(StoreState::new()),
            writer: Mutex::new(WalWriter::in_memory()),
            options: StorageOptions::default().with_durability(DurabilityMode::InMemory),
            dir: None,
            _lock: None,
        }
    }

    /// Open (or create) the store in `dir`, replaying its log.
    ///
    /// # Errors
    ///
    /// `StoreError::IoFailure` if the directory cannot be created or locked,
    /// or the log is corrupt.
    pub fn open(dir: impl AsRef<Path>, options: StorageOptions) -> StoreResult<Self> {
        if !options.durability.requires_wal() {
            return Ok(Self::in_memory());
        }

        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let lock = acquire_lock(dir)?;

        let wal_path = dir.join(WAL_FILE_NAME);
        let read = WalReader::read_all(&wal_path)?;

        let mut state = StoreState::new();
        for entry in &read.entries {
            state.apply(entry);
        }
        let writer = WalWriter::open(&wal_path, options.durability, &read)?;

        info!(
            target: "histmeta::storage",
            dir = %dir.display(),
            records = state.len(),
            log_entries = read.entries.len(),
            durability = options.durability.description(),
            "Opened history metadata store"
        );

        let store = DurableStore {
            state: RwLock::new(state),
            writer: Mutex::new(writer),
            options,
            dir: Some(dir.to_path_buf()),
            _lock: Some(lock),
        };
        store.maybe_compact(&mut store.writer.lock())?;
        Ok(store)
    }

    /// Take the writer slot
    ///
    /// Blocks until any other write completes.
    pub fn begin_write(&self) -> WriteGuard<'_> {
        WriteGuard {
            store: self,
            writer: self.writer.lock(),
        }
    }

    /// Consistent read view; blocks appliers while held
    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            state: self.state.read(),
        }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    /// Check if the store has no records
    pub fn is_empty(&self) -> bool {
        self.state.read().is_empty()
    }

    /// Data directory (None for in-memory stores)
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Options the store was opened with
    pub fn options(&self) -> StorageOptions {
        self.options
    }

    /// Entries currently in the log
    pub fn log_entries(&self) -> usize {
        self.writer.lock().entry_count()
    }

    /// Rewrite the log as one `Put` per live record
    pub fn compact(&self) -> StoreResult<()> {
        let mut writer = self.writer.lock();
        self.compact_locked(&mut writer)
    }

    /// fsync anything pending
    pub fn sync(&self) -> StoreResult<()> {
        self.writer.lock().sync()?;
        Ok(())
    }

    /// Sync if Standard mode's interval has elapsed
    pub fn sync_if_overdue(&self) -> StoreResult<bool> {
        Ok(self.writer.lock().sync_if_overdue()?)
    }

    fn compact_locked(&self, writer: &mut WalWriter) -> StoreResult<()> {
        let entries = self.state.read().checkpoint_entries();
        writer.rewrite(&entries)?;
        Ok(())
    }

    /// Compact once the log is past the threshold and mostly garbage
    ///
    /// The `2 * live` floor keeps a large live set from triggering a rewrite
    /// on every append.
    fn maybe_compact(&self, writer: &mut WalWriter) -> StoreResult<()> {
        let threshold = self.options.compact_after_entries;
        if threshold == 0 || !self.options.durability.requires_wal() {
            return Ok(());
        }
        let live = self.state.read().len();
        let logged = writer.entry_count();
        if logged > threshold && logged > live.saturating_mul(2) {
            debug!(target: "histmeta::storage", logged, live, "Log past compaction threshold");
            if let Err(e) = self.compact_locked(writer) {
                // The old log is still intact; retry on a later write.
                warn!(target: "histmeta::storage", error = %e, "Log compaction failed");
            }
        }
        Ok(())
    }
}

fn acquire_lock(dir: &Path) -> Result<File, WalError> {
    let path = dir.join(LOCK_FILE_NAME);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)?;
    file.try_lock_exclusive()
        .map_err(|_| WalError::Locked(dir.display().to_string()))?;
    Ok(file)
}

// ============================================================================
// Guards
// ============================================================================

/// Exclusive write access to a `DurableStore`
pub struct WriteGuard<'a> {
    store: &'a DurableStore,
    writer: MutexGuard<'a, WalWriter>,
}

impl WriteGuard<'_> {
    /// Current record for `key`
    ///
    /// Stable until this guard commits or drops.
    pub fn get(&self, key: &MetadataKey) -> Option<MetadataRecord> {
        self.store.state.read().get(key).cloned()
    }

    /// Log `entry` then apply it; returns the number of records affected
    ///
    /// If the log append fails nothing is applied.
    pub fn commit(&mut self, entry: WalEntry) -> StoreResult<usize> {
        self.writer.append(&entry)?;
        let affected = self.store.state.write().apply(&entry);
        debug!(target: "histmeta::store", kind = entry.kind(), affected, "Committed");
        self.store.maybe_compact(&mut self.writer)?;
        Ok(affected)
    }

    /// Snapshot of current state while holding the writer slot
    pub fn snapshot(&self) -> Snapshot<'_> {
        self.store.snapshot()
    }
}

/// Read view of a `DurableStore`
pub struct Snapshot<'a> {
    state: RwLockReadGuard<'a, StoreState>,
}

impl std::ops::Deref for Snapshot<'_> {
    type Target = StoreState;

    fn deref(&self) -> &StoreState {
        &self.state
    }
}
