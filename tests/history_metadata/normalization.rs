//! Keys are normalized on the way in, so equivalent spellings share a record

use crate::common::manual_store;
use histmeta::{MetadataKey, Observation, RawMetadataKey};

#[test]
fn test_bare_host_reads_back_with_trailing_slash() {
    let (store, _) = manual_store(0);
    store
        .note_history_metadata_observation("https://www.example.com", Observation::view_time(5))
        .wait()
        .unwrap();

    let all = store.get_history_metadata_since(0i64).wait().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].key.url(), "https://www.example.com/");
}

#[test]
fn test_equivalent_spellings_share_a_record() {
    let (store, _) = manual_store(0);
    for url in [
        "https://www.mozilla.org",
        "https://WWW.MOZILLA.ORG/",
        " https://www.mozilla.org:443/ ",
    ] {
        store
            .note_history_metadata_observation(url, Observation::view_time(1))
            .wait()
            .unwrap();
    }

    let all = store.get_history_metadata_since(0i64).wait().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].total_view_time, 3);
}

#[test]
fn test_raw_keys_are_normalized() {
    let (store, _) = manual_store(0);
    let raw = RawMetadataKey::new("https://docs.rs", Some("   ".into()), Some(String::new()));
    store
        .note_history_metadata_observation(raw, Observation::title("Docs"))
        .wait()
        .unwrap();

    let record = store
        .get_history_metadata(MetadataKey::from_url("https://docs.rs/"))
        .wait()
        .unwrap()
        .unwrap();
    assert_eq!(record.key.search_term(), None);
    assert_eq!(record.key.referrer_url(), None);
}

#[test]
fn test_search_term_and_referrer_split_records() {
    let (store, _) = manual_store(0);
    let url = "https://www.example.com/";
    for key in [
        MetadataKey::new(url, None, None),
        MetadataKey::new(url, Some("example".into()), None),
        MetadataKey::new(url, None, Some("https://www.mozilla.org".into())),
    ] {
        store
            .note_history_metadata_observation(key, Observation::view_time(1))
            .wait()
            .unwrap();
    }
    assert_eq!(store.get_history_metadata_since(0i64).wait().unwrap().len(), 3);
}

#[test]
fn test_malformed_urls_are_rejected() {
    let (store, _) = manual_store(0);
    for url in ["", "   ", "no scheme here", "https://bad\u{0}host/"] {
        let err = store
            .note_history_metadata_observation(url, Observation::view_time(1))
            .wait()
            .unwrap_err();
        assert!(err.is_invalid_argument(), "{:?} accepted", url);
    }
    assert!(store.get_history_metadata_since(0i64).wait().unwrap().is_empty());
}
