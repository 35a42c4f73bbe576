//! Observation, listing, query and deletion through the public handle

use crate::common::manual_store;
use histmeta::{DocumentType, MetadataKey, MetadataRecord, Observation, Timestamp};

fn since_zero(store: &histmeta::HistoryMetadata) -> Vec<MetadataRecord> {
    store.get_history_metadata_since(Timestamp::EPOCH).wait().unwrap()
}

#[test]
fn test_history_metadata_basics() {
    let (store, clock) = manual_store(1_000);
    let observe = |key: &MetadataKey, obs: Observation| {
        store.note_history_metadata_observation(key.clone(), obs).wait().unwrap();
        clock.advance(1);
    };

    // Deleting from an empty store is fine at any bound.
    for bound in [0, i64::MAX, -1] {
        store.delete_history_metadata_older_than(bound).wait().unwrap();
    }
    assert!(since_zero(&store).is_empty());

    // Facts observed one by one.
    let key1 = MetadataKey::new("https://www.mozilla.org", None, None);
    observe(&key1, Observation::title("Mozilla Test"));
    observe(&key1, Observation::view_time(1));
    observe(&key1, Observation::document_type(DocumentType::Regular));

    let read = since_zero(&store);
    assert_eq!(read.len(), 1);
    assert_eq!(read[0].title.as_deref(), Some("Mozilla Test"));
    assert_eq!(read[0].document_type, Some(DocumentType::Regular));
    assert_eq!(read[0].total_view_time, 1);

    // View time accumulates.
    observe(&key1, Observation::view_time(11));
    assert_eq!(since_zero(&store)[0].total_view_time, 12);
    observe(&key1, Observation::view_time(3));
    assert_eq!(since_zero(&store)[0].total_view_time, 15);

    // Document type follows the latest observation.
    observe(&key1, Observation::document_type(DocumentType::Media));
    assert_eq!(since_zero(&store)[0].document_type, Some(DocumentType::Media));

    // The first title sticks.
    observe(&key1, Observation::title("New title"));
    let read = since_zero(&store);
    assert_eq!(read.len(), 1);
    assert_eq!(read[0].title.as_deref(), Some("Mozilla Test"));

    // A second key is independent of the first.
    let key2 = MetadataKey::new(
        "https://www.mozilla.org/another",
        None,
        Some("https://www.mozilla.org".to_string()),
    );
    observe(&key2, Observation::title("Another Mozilla"));
    observe(&key2, Observation::document_type(DocumentType::Regular));

    let read = since_zero(&store);
    assert_eq!(read.len(), 2);
    let (first, second) = (&read[0], &read[1]);
    assert_eq!(first.key, key1);
    assert_eq!(
        (first.title.as_deref(), first.document_type, first.total_view_time),
        (Some("Mozilla Test"), Some(DocumentType::Media), 15)
    );
    assert_eq!(second.key, key2);
    assert_eq!(
        (second.title.as_deref(), second.document_type, second.total_view_time),
        (Some("Another Mozilla"), Some(DocumentType::Regular), 0)
    );

    observe(&key2, Observation::view_time(25));
    let read = since_zero(&store);
    let another = read.iter().find(|r| r.key == key2).unwrap();
    assert_eq!(another.total_view_time, 25);
    let first = read.iter().find(|r| r.key == key1).unwrap();
    assert_eq!(first.total_view_time, 15);

    // Query by title.
    assert!(store.query_history_metadata("another", 0).wait().unwrap().is_empty());
    assert_eq!(store.query_history_metadata("another", 10).wait().unwrap().len(), 1);
    assert_eq!(store.query_history_metadata("mozilla", 10).wait().unwrap().len(), 2);

    // Query by url.
    let key3 = MetadataKey::new(
        "https://www.firefox.ru/download",
        None,
        Some("https://www.mozilla.org".to_string()),
    );
    observe(&key3, Observation::title("Скачать Фаерфокс"));
    let hits = store.query_history_metadata("firefox", 10).wait().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key.url(), "https://www.firefox.ru/download");
    assert_eq!(hits[0].title.as_deref(), Some("Скачать Фаерфокс"));

    // Query by search term.
    let key4 = MetadataKey::new("https://www.example.com", Some("Sample webpage".into()), None);
    observe(&key4, Observation::view_time(1337));
    let hits = store.query_history_metadata("sample", 10).wait().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key.url(), "https://www.example.com/");

    // Delete everything.
    assert_eq!(since_zero(&store).len(), 4);
    store.delete_history_metadata_older_than(i64::MAX).wait().unwrap();
    assert!(since_zero(&store).is_empty());
}

#[test]
fn test_query_orders_newest_first_and_limits() {
    let (store, clock) = manual_store(0);
    for i in 0..5 {
        store
            .note_history_metadata_observation(
                MetadataKey::from_url(format!("https://news.example/{}", i)),
                Observation::view_time(1),
            )
            .wait()
            .unwrap();
        clock.advance(10);
    }

    let hits = store.query_history_metadata("NEWS", 3).wait().unwrap();
    let urls: Vec<_> = hits.iter().map(|r| r.key.url()).collect();
    assert_eq!(
        urls,
        vec!["https://news.example/4", "https://news.example/3", "https://news.example/2"]
    );
    assert!(store.query_history_metadata("news", -5).wait().unwrap_err().is_invalid_argument());
}

#[test]
fn test_range_reads() {
    let (store, clock) = manual_store(100);
    for url in ["https://a.example/", "https://b.example/", "https://c.example/"] {
        store
            .note_history_metadata_observation(MetadataKey::from_url(url), Observation::view_time(1))
            .wait()
            .unwrap();
        clock.advance(100);
    }

    let since = store.get_history_metadata_since(200i64).wait().unwrap();
    assert_eq!(
        since.iter().map(|r| r.key.url()).collect::<Vec<_>>(),
        vec!["https://b.example/", "https://c.example/"]
    );
    let between = store.get_history_metadata_between(100i64, 300i64).wait().unwrap();
    assert_eq!(between.len(), 2);
    assert!(store
        .get_history_metadata_between(300i64, 100i64)
        .wait()
        .unwrap()
        .is_empty());
}

#[test]
fn test_delete_single_and_all() {
    let (store, _) = manual_store(0);
    let keep = MetadataKey::from_url("https://keep.example/");
    let drop = MetadataKey::from_url("https://drop.example/");
    for key in [&keep, &drop] {
        store
            .note_history_metadata_observation(key.clone(), Observation::title("t"))
            .wait()
            .unwrap();
    }

    assert!(store.delete_history_metadata(drop.clone()).wait().unwrap());
    assert!(!store.delete_history_metadata(drop).wait().unwrap());
    assert!(store.get_history_metadata(keep).wait().unwrap().is_some());
    assert_eq!(store.delete_all_history_metadata().wait().unwrap(), 1);
    assert_eq!(store.delete_all_history_metadata().wait().unwrap(), 0);
}

#[test]
fn test_empty_observation_creates_nothing() {
    let (store, _) = manual_store(0);
    store
        .note_history_metadata_observation("https://quiet.example/", Observation::default())
        .wait()
        .unwrap();
    assert!(since_zero(&store).is_empty());
}

#[test]
fn test_delete_older_than_boundary_is_strict() {
    let (store, clock) = manual_store(500);
    let key = MetadataKey::from_url("https://edge.example/");
    store
        .note_history_metadata_observation(key.clone(), Observation::view_time(1))
        .wait()
        .unwrap();
    clock.advance(1_000);

    store.delete_history_metadata_older_than(500i64).wait().unwrap();
    assert!(store.get_history_metadata(key.clone()).wait().unwrap().is_some());
    store.delete_history_metadata_older_than(501i64).wait().unwrap();
    assert!(store.get_history_metadata(key).wait().unwrap().is_none());
}
