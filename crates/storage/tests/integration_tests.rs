//! Integration tests for DurableStore
//!
//! Concurrency and isolation through the public API: one writer slot,
//! many snapshot readers.

use histmeta_core::{merge, MetadataKey, Observation, Timestamp};
use histmeta_storage::{DurabilityMode, DurableStore, StorageOptions, WalEntry};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::tempdir;

fn add_view_time(store: &DurableStore, key: &MetadataKey, millis: u64, at: i64) {
    let mut w = store.begin_write();
    let merged = merge(w.get(key), key, &Observation::view_time(millis), Timestamp::from_millis(at));
    w.commit(WalEntry::Put(merged)).unwrap();
}

#[test]
fn test_concurrent_read_modify_write_loses_nothing() {
    let store = Arc::new(DurableStore::in_memory());
    let key = MetadataKey::from_url("https://shared.com/");
    let threads = 8;
    let per_thread = 250;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let store = Arc::clone(&store);
            let key = key.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..per_thread {
                    add_view_time(&store, &key, 1, (t * per_thread + i) as i64);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let snap = store.snapshot();
    assert_eq!(snap.get(&key).unwrap().total_view_time, (threads * per_thread) as u64);
}

#[test]
fn test_readers_see_whole_entries() {
    let store = Arc::new(DurableStore::in_memory());
    let writes = 500;
    let barrier = Arc::new(Barrier::new(2));

    let writer = {
        let store = Arc::clone(&store);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for i in 0..writes {
                let key = MetadataKey::from_url(&format!("https://s{}.com/", i));
                add_view_time(&store, &key, 1, i as i64);
            }
            store.begin_write().commit(WalEntry::Clear).unwrap();
        })
    };

    barrier.wait();
    loop {
        let snap = store.snapshot();
        // Index and map are updated under one lock, so they always agree.
        assert_eq!(snap.len(), snap.observed().len());
        assert_eq!(snap.since(Timestamp::MIN).count(), snap.len());
        if writer.is_finished() {
            break;
        }
    }
    writer.join().unwrap();
    assert!(store.is_empty());
}

#[test]
fn test_on_disk_concurrent_writers() {
    let dir = tempdir().unwrap();
    let opts = StorageOptions::default()
        .with_durability(DurabilityMode::Cache)
        .with_compact_after_entries(64);
    {
        let store = Arc::new(DurableStore::open(dir.path(), opts).unwrap());
        let handles: Vec<_> = ["https://a.com/", "https://b.com/"]
            .into_iter()
            .map(|url| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let key = MetadataKey::from_url(url);
                    for i in 0..100 {
                        add_view_time(&store, &key, 2, i);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }

    let store = DurableStore::open(dir.path(), opts).unwrap();
    let snap = store.snapshot();
    for url in ["https://a.com/", "https://b.com/"] {
        assert_eq!(snap.get(&MetadataKey::from_url(url)).unwrap().total_view_time, 200);
    }
}
