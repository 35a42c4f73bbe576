//! Records survive close, reopen and compaction

use crate::common::{always_config, TestStore};
use histmeta::{
    DocumentType, MetadataConfig, MetadataKey, Observation, Timestamp, MAX_SEARCH_TERM_LENGTH,
    MAX_TITLE_LENGTH,
};
use std::fs::OpenOptions;
use std::io::Write;

#[test]
fn test_records_survive_reopen() {
    let mut t = TestStore::new();
    let key = MetadataKey::new("https://www.mozilla.org", Some("firefox".into()), None);
    t.store
        .note_history_metadata_observation(key.clone(), Observation::title("Mozilla"))
        .wait()
        .unwrap();
    t.clock.advance(50);
    t.store
        .note_history_metadata_observation(key.clone(), Observation::view_time(40))
        .wait()
        .unwrap();
    t.store
        .note_history_metadata_observation(key.clone(), Observation::document_type(DocumentType::Media))
        .wait()
        .unwrap();
    let before = t.store.get_history_metadata(key.clone()).wait().unwrap().unwrap();

    t.reopen();
    let after = t.store.get_history_metadata(key).wait().unwrap().unwrap();
    assert_eq!(after, before);
    assert_eq!(after.created_at, Timestamp::EPOCH);
    assert_eq!(after.last_observed_at, Timestamp::from_millis(50));
}

#[test]
fn test_deletions_survive_reopen() {
    let mut t = TestStore::new();
    for i in 0..10 {
        t.store
            .note_history_metadata_observation(
                MetadataKey::from_url(format!("https://site.example/{}", i)),
                Observation::view_time(1),
            )
            .wait()
            .unwrap();
        t.clock.advance(10);
    }
    t.store
        .delete_history_metadata(MetadataKey::from_url("https://site.example/9"))
        .wait()
        .unwrap();
    t.store.delete_history_metadata_older_than(50i64).wait().unwrap();

    t.reopen();
    let urls: Vec<_> = t
        .store
        .get_history_metadata_since(Timestamp::MIN)
        .wait()
        .unwrap()
        .into_iter()
        .map(|r| r.key.url().to_string())
        .collect();
    assert_eq!(
        urls,
        (5..9)
            .map(|i| format!("https://site.example/{}", i))
            .collect::<Vec<_>>()
    );
}

#[test]
fn test_compaction_then_reopen() {
    let config = MetadataConfig {
        compact_after_entries: 0,
        ..always_config()
    };
    let mut t = TestStore::with_config(config);
    let key = MetadataKey::from_url("https://busy.example/");
    for _ in 0..100 {
        t.store
            .note_history_metadata_observation(key.clone(), Observation::view_time(1))
            .wait()
            .unwrap();
    }
    t.store.compact().wait().unwrap();
    t.store.flush().wait().unwrap();

    t.reopen();
    let record = t.store.get_history_metadata(key).wait().unwrap().unwrap();
    assert_eq!(record.total_view_time, 100);
}

#[test]
fn test_torn_write_at_tail_is_dropped() {
    let mut t = TestStore::new();
    let key = MetadataKey::from_url("https://torn.example/");
    t.store
        .note_history_metadata_observation(key.clone(), Observation::view_time(7))
        .wait()
        .unwrap();
    t.store.close().unwrap();

    // Half a frame: a length prefix promising more bytes than follow.
    let mut log = OpenOptions::new()
        .append(true)
        .open(t.dir.path().join(histmeta::WAL_FILE_NAME))
        .unwrap();
    log.write_all(&[64, 0, 0, 0, 1, 2, 3]).unwrap();
    drop(log);

    t.reopen();
    let record = t.store.get_history_metadata(key.clone()).wait().unwrap().unwrap();
    assert_eq!(record.total_view_time, 7);

    // The store keeps working after recovery.
    t.store
        .note_history_metadata_observation(key.clone(), Observation::view_time(3))
        .wait()
        .unwrap();
    t.reopen();
    let record = t.store.get_history_metadata(key).wait().unwrap().unwrap();
    assert_eq!(record.total_view_time, 10);
}

#[test]
fn test_config_file_drives_settings() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(histmeta::CONFIG_FILE_NAME),
        "durability = \"cache\"\nretention_days = 30\n",
    )
    .unwrap();

    let store = histmeta::HistoryMetadata::open(dir.path()).unwrap();
    assert_eq!(store.config().durability, "cache");
    assert_eq!(store.config().retention_days, 30);
    assert_eq!(store.config().reader_threads, MetadataConfig::default().reader_threads);
}

#[test]
fn test_bad_config_is_invalid_argument() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join(histmeta::CONFIG_FILE_NAME), "durability = \"sometimes\"\n")
        .unwrap();
    let err = histmeta::HistoryMetadata::open(dir.path()).unwrap_err();
    assert!(err.is_invalid_argument());
}

#[test]
fn test_oversized_fields_are_refused_before_logging() {
    let mut t = TestStore::new();
    let key = MetadataKey::from_url("https://long.example/");

    let err = t
        .store
        .note_history_metadata_observation(key.clone(), Observation::title("x".repeat(MAX_TITLE_LENGTH + 1)))
        .wait()
        .unwrap_err();
    assert!(err.is_invalid_argument());
    let long_term = MetadataKey::new(
        "https://long.example/",
        Some("q".repeat(MAX_SEARCH_TERM_LENGTH + 1)),
        None,
    );
    assert!(t
        .store
        .note_history_metadata_observation(long_term, Observation::view_time(1))
        .wait()
        .unwrap_err()
        .is_invalid_argument());

    // Later writes still land, and the log reopens cleanly.
    t.store
        .note_history_metadata_observation(key.clone(), Observation::title("x".repeat(MAX_TITLE_LENGTH)))
        .wait()
        .unwrap();
    t.store
        .note_history_metadata_observation(key.clone(), Observation::view_time(5))
        .wait()
        .unwrap();

    t.reopen();
    let record = t.store.get_history_metadata(key).wait().unwrap().unwrap();
    assert_eq!(record.title.map(|title| title.len()), Some(MAX_TITLE_LENGTH));
    assert_eq!(record.total_view_time, 5);
    assert_eq!(t.store.get_history_metadata_since(Timestamp::MIN).wait().unwrap().len(), 1);
}
