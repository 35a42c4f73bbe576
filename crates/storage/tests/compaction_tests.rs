//! Compaction correctness tests
//!
//! These tests verify that compaction:
//! 1. Preserves every live record exactly
//! 2. Drops deleted and superseded entries from the log
//! 3. Leaves a log that later appends extend normally

use histmeta_core::{merge, MetadataKey, MetadataRecord, Observation, Timestamp};
use histmeta_storage::{DurabilityMode, DurableStore, StorageOptions, WalEntry, WalReader, WAL_FILE_NAME};
use std::collections::BTreeMap;
use tempfile::tempdir;

fn options(compact_after: usize) -> StorageOptions {
    StorageOptions::default()
        .with_durability(DurabilityMode::Always)
        .with_compact_after_entries(compact_after)
}

fn observe(store: &DurableStore, url: &str, obs: Observation, at: i64) -> MetadataRecord {
    let key = MetadataKey::from_url(url);
    let mut w = store.begin_write();
    let merged = merge(w.get(&key), &key, &obs, Timestamp::from_millis(at));
    w.commit(WalEntry::Put(merged.clone())).unwrap();
    merged
}

fn dump(store: &DurableStore) -> BTreeMap<MetadataKey, MetadataRecord> {
    store
        .snapshot()
        .records()
        .map(|r| (r.key.clone(), r.clone()))
        .collect()
}

#[test]
fn test_compaction_preserves_state_across_reopen() {
    let dir = tempdir().unwrap();
    let before = {
        let store = DurableStore::open(dir.path(), options(0)).unwrap();
        for i in 0..30 {
            let url = format!("https://site{}.com/", i % 4);
            observe(&store, &url, Observation::view_time(10), i);
        }
        observe(&store, "https://site0.com/", Observation::title("Zero"), 100);
        store
            .begin_write()
            .commit(WalEntry::Delete(MetadataKey::from_url("https://site3.com/")))
            .unwrap();

        store.compact().unwrap();
        assert_eq!(store.log_entries(), 3);
        dump(&store)
    };

    let store = DurableStore::open(dir.path(), options(0)).unwrap();
    assert_eq!(dump(&store), before);

    let zero = &before[&MetadataKey::from_url("https://site0.com/")];
    assert_eq!(zero.title.as_deref(), Some("Zero"));
    assert_eq!(zero.total_view_time, 80);
}

#[test]
fn test_compaction_of_empty_store() {
    let dir = tempdir().unwrap();
    let store = DurableStore::open(dir.path(), options(0)).unwrap();
    store.begin_write().commit(WalEntry::Clear).unwrap();
    store.compact().unwrap();
    assert_eq!(store.log_entries(), 0);
    drop(store);

    let read = WalReader::read_all(&dir.path().join(WAL_FILE_NAME)).unwrap();
    assert!(read.header_present);
    assert!(read.entries.is_empty());
}

#[test]
fn test_automatic_compaction_bounds_log() {
    let dir = tempdir().unwrap();
    let store = DurableStore::open(dir.path(), options(16)).unwrap();
    for i in 0..200 {
        observe(&store, "https://busy.com/", Observation::view_time(1), i);
        assert!(store.log_entries() <= 16);
    }
    drop(store);

    let store = DurableStore::open(dir.path(), options(16)).unwrap();
    let rec = dump(&store)
        .remove(&MetadataKey::from_url("https://busy.com/"))
        .unwrap();
    assert_eq!(rec.total_view_time, 200);
}

#[test]
fn test_large_live_set_does_not_compact_every_write() {
    let dir = tempdir().unwrap();
    let store = DurableStore::open(dir.path(), options(4)).unwrap();
    for i in 0..20 {
        observe(&store, &format!("https://s{}.com/", i), Observation::view_time(1), i);
    }
    // 20 live records, 20 entries: not mostly garbage yet
    assert_eq!(store.log_entries(), 20);
}
