//! Many callers, one store

use crate::common::{manual_store, TestStore};
use histmeta::{MetadataKey, Observation, Timestamp};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_parallel_callers_on_distinct_keys() {
    let t = TestStore::new();
    let threads = 4;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let store = t.store.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for j in 0..25 {
                    store
                        .note_history_metadata_observation(
                            MetadataKey::from_url(format!("https://t{}.example/{}", i, j)),
                            Observation::view_time(1),
                        )
                        .wait()
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let all = t.store.get_history_metadata_since(Timestamp::MIN).wait().unwrap();
    assert_eq!(all.len(), threads * 25);
}

#[test]
fn test_reads_interleaved_with_writes_stay_consistent() {
    let (store, _) = manual_store(0);
    let key = MetadataKey::from_url("https://steady.example/");

    let writer = {
        let store = store.clone();
        let key = key.clone();
        thread::spawn(move || {
            for _ in 0..200 {
                let _ = store.note_history_metadata_observation(key.clone(), Observation::view_time(2));
            }
        })
    };

    let mut last = 0;
    for _ in 0..100 {
        if let Some(record) = store.get_history_metadata(key.clone()).wait().unwrap() {
            assert_eq!(record.total_view_time % 2, 0);
            assert!(record.total_view_time >= last);
            last = record.total_view_time;
        }
    }
    writer.join().unwrap();

    let record = store.get_history_metadata(key).wait().unwrap().unwrap();
    assert_eq!(record.total_view_time, 400);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_async_callers() {
    let (store, _) = manual_store(0);
    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .note_history_metadata_observation(
                        MetadataKey::new("https://async.example/", Some(format!("q{}", i % 2)), None),
                        Observation::view_time(5),
                    )
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let groups = store.search_term_groups(Timestamp::EPOCH).await.unwrap();
    assert_eq!(groups.len(), 2);
    assert!(groups.values().all(|keys| keys.len() == 1));
    let total: u64 = store
        .get_history_metadata_since(Timestamp::EPOCH)
        .await
        .unwrap()
        .iter()
        .map(|r| r.total_view_time)
        .sum();
    assert_eq!(total, 40);
}
