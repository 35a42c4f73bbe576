//! Observed-at index for range scans and retention
//!
//! Maps `last_observed_at → Set<MetadataKey>` using ordered maps, so:
//! - `since(ts)` yields keys in ascending observation order
//! - keys observed at the same instant come out in key order (url first),
//!   which gives listings their deterministic tie-break for free
//! - `older_than(ts)` is O(expired count), not O(total records)

use histmeta_core::{MetadataKey, Timestamp};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

/// Index: last_observed_at → Keys
#[derive(Debug, Default, Clone)]
pub struct ObservedIndex {
    index: BTreeMap<Timestamp, BTreeSet<MetadataKey>>,
}

impl ObservedIndex {
    /// Create a new empty index
    pub fn new() -> Self {
        Self {
            index: BTreeMap::new(),
        }
    }

    /// Record that `key` was last observed at `ts`
    pub fn insert(&mut self, ts: Timestamp, key: MetadataKey) {
        self.index.entry(ts).or_default().insert(key);
    }

    /// Drop the entry for `key` at `ts`
    ///
    /// Empty timestamp buckets are removed.
    pub fn remove(&mut self, ts: Timestamp, key: &MetadataKey) {
        if let Some(keys) = self.index.get_mut(&ts) {
            keys.remove(key);
            if keys.is_empty() {
                self.index.remove(&ts);
            }
        }
    }

    /// Keys with `last_observed_at < threshold`
    pub fn older_than(&self, threshold: Timestamp) -> Vec<MetadataKey> {
        self.index
            .range(..threshold)
            .flat_map(|(_, keys)| keys.iter().cloned())
            .collect()
    }

    /// Keys with `last_observed_at >= since`, ascending
    pub fn since(&self, since: Timestamp) -> impl DoubleEndedIterator<Item = &MetadataKey> + '_ {
        self.index
            .range(since..)
            .flat_map(|(_, keys)| keys.iter())
    }

    /// Keys with `start <= last_observed_at < end`, ascending
    pub fn between(&self, start: Timestamp, end: Timestamp) -> Vec<&MetadataKey> {
        if start >= end {
            return Vec::new();
        }
        self.index
            .range((Bound::Included(start), Bound::Excluded(end)))
            .flat_map(|(_, keys)| keys.iter())
            .collect()
    }

    /// All keys, most recently observed first
    ///
    /// Within one instant keys keep ascending key order.
    pub fn newest_first(&self) -> impl Iterator<Item = &MetadataKey> + '_ {
        self.index.iter().rev().flat_map(|(_, keys)| keys.iter())
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.index.clear();
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Total number of keys in the index
    pub fn len(&self) -> usize {
        self.index.values().map(|keys| keys.len()).sum()
    }

    /// Number of distinct timestamps
    pub fn timestamp_count(&self) -> usize {
        self.index.len()
    }
}
