//! MetadataStore: the record store operations
//!
//! Wraps a `DurableStore` with the merge rules and an injected `Clock`.
//! All methods are synchronous and thread-safe; mutations serialize on the
//! storage writer slot, reads run against a snapshot.
//!
//! # Observation Protocol
//!
//! 1. Validate the key (`InvalidArgument` on malformed URLs)
//! 2. Skip the observation entirely if every field is absent
//! 3. Take the writer slot, load the current record, `merge` at `now`
//! 4. Commit one `Put` (logged, then applied)
//!
//! The writer slot is held from load to commit, so concurrent observations
//! for the same key accumulate instead of overwriting each other.

use histmeta_core::{
    merge, Clock, MetadataKey, MetadataRecord, Observation, StoreResult, SystemClock, Timestamp,
};
use histmeta_storage::{DurableStore, Snapshot, StorageOptions, WalEntry};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::query::Query;

/// Record store over a durable substrate
#[derive(Debug)]
pub struct MetadataStore {
    storage: DurableStore,
    clock: Arc<dyn Clock>,
}

impl MetadataStore {
    /// Open the store in `dir` with the wall clock
    pub fn open(dir: impl AsRef<Path>, options: StorageOptions) -> StoreResult<Self> {
        Self::open_with_clock(dir, options, Arc::new(SystemClock))
    }

    /// Open the store in `dir` with a custom clock
    pub fn open_with_clock(
        dir: impl AsRef<Path>,
        options: StorageOptions,
        clock: Arc<dyn Clock>,
    ) -> StoreResult<Self> {
        Ok(Self::from_storage(DurableStore::open(dir, options)?, clock))
    }

    /// Ephemeral store with the wall clock
    pub fn in_memory() -> Self {
        Self::in_memory_with_clock(Arc::new(SystemClock))
    }

    /// Ephemeral store with a custom clock
    pub fn in_memory_with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::from_storage(DurableStore::in_memory(), clock)
    }

    /// Wrap an already-open substrate
    pub fn from_storage(storage: DurableStore, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// The clock stamping observations
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The underlying durable store
    pub fn storage(&self) -> &DurableStore {
        &self.storage
    }

    /// Consistent read view
    pub fn snapshot(&self) -> Snapshot<'_> {
        self.storage.snapshot()
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Fold one observation into the record for `key`, creating it if needed
    ///
    /// An observation with no fields set succeeds without touching the store.
    pub fn note_observation(&self, key: &MetadataKey, observation: &Observation) -> StoreResult<()> {
        key.validate()?;
        observation.validate()?;
        if observation.is_empty() {
            debug!(target: "histmeta::store", %key, "Skipping empty observation");
            return Ok(());
        }

        let mut writer = self.storage.begin_write();
        let now = self.clock.now();
        let merged = merge(writer.get(key), key, observation, now);
        writer.commit(WalEntry::Put(merged))?;
        Ok(())
    }

    /// Remove the record for `key`; returns whether one existed
    pub fn delete(&self, key: &MetadataKey) -> StoreResult<bool> {
        let mut writer = self.storage.begin_write();
        if writer.get(key).is_none() {
            return Ok(false);
        }
        Ok(writer.commit(WalEntry::Delete(key.clone()))? > 0)
    }

    /// Remove every record; returns how many there were
    pub fn delete_all(&self) -> StoreResult<usize> {
        let mut writer = self.storage.begin_write();
        if writer.snapshot().is_empty() {
            return Ok(0);
        }
        writer.commit(WalEntry::Clear)
    }

    /// Remove every record with `last_observed_at < threshold`
    ///
    /// Returns how many were removed. Nothing is logged when nothing expires.
    pub fn delete_older_than(&self, threshold: Timestamp) -> StoreResult<usize> {
        let mut writer = self.storage.begin_write();
        if writer.snapshot().observed().older_than(threshold).is_empty() {
            return Ok(0);
        }
        writer.commit(WalEntry::DeleteOlderThan(threshold))
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Record for `key`, if any
    pub fn get(&self, key: &MetadataKey) -> StoreResult<Option<MetadataRecord>> {
        Ok(self.storage.snapshot().get(key).cloned())
    }

    /// Records with `last_observed_at >= since`, oldest first, ties by URL
    pub fn get_since(&self, since: Timestamp) -> StoreResult<Vec<MetadataRecord>> {
        Ok(self.storage.snapshot().since(since).cloned().collect())
    }

    /// Records with `start <= last_observed_at < end`, oldest first
    pub fn get_between(&self, start: Timestamp, end: Timestamp) -> StoreResult<Vec<MetadataRecord>> {
        Ok(self
            .storage
            .snapshot()
            .between(start, end)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Case-insensitive substring search, newest first, at most `limit`
    pub fn query(&self, text: &str, limit: usize) -> StoreResult<Vec<MetadataRecord>> {
        let query = Query::new(text, limit);
        Ok(query.execute(&self.storage.snapshot()))
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if the store has no records
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Rewrite the log down to the live records
    pub fn compact(&self) -> StoreResult<()> {
        self.storage.compact()
    }

    /// fsync pending log writes
    pub fn sync(&self) -> StoreResult<()> {
        self.storage.sync()
    }
}
