//! histmeta - embedded history-metadata store
//!
//! Records what a browser learns about each visit context (page URL, search
//! term, referrer): the page title, accumulated view time and document type.
//! Observations are folded into one record per key, persisted to an
//! append-only log, and served back by time range or text query.
//!
//! # Quick Start
//!
//! ```no_run
//! use histmeta::{HistoryMetadata, MetadataKey, Observation};
//!
//! let store = HistoryMetadata::open("/tmp/histmeta")?;
//! let key = MetadataKey::from_url("https://www.mozilla.org");
//!
//! store.note_history_metadata_observation(key.clone(), Observation::title("Mozilla")).wait()?;
//! store.note_history_metadata_observation(key, Observation::view_time(1_500)).wait()?;
//!
//! for record in store.query_history_metadata("mozilla", 10).wait()? {
//!     println!("{} {:?} {}ms", record.key, record.title, record.total_view_time);
//! }
//! # Ok::<(), histmeta::StoreError>(())
//! ```
//!
//! # Architecture
//!
//! - `histmeta-core`: keys, observations, records and the merge rule
//! - `histmeta-storage`: write-ahead log and in-memory indexes
//! - `histmeta-engine`: record store, query, retention, configuration
//! - `histmeta-api`: the asynchronous `HistoryMetadata` handle
//!
//! Everything an application needs is re-exported here.

pub use histmeta_api::{
    group_by_search_term, GroupedHistory, HistoryMetadata, MetadataConfig, Pending,
    RetentionOutcome, RetentionPolicy, Subscription, CONFIG_FILE_NAME,
};
pub use histmeta_core::{
    normalize, normalize_url, Clock, DocumentType, ManualClock, MetadataKey, MetadataRecord,
    Observation, RawMetadataKey, StoreError, StoreResult, SystemClock, Timestamp,
    MAX_SEARCH_TERM_LENGTH, MAX_TITLE_LENGTH, MAX_URL_LENGTH,
};
pub use histmeta_storage::{DurabilityMode, WAL_FILE_NAME};
