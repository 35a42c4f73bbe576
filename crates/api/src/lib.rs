//! Public API layer for histmeta
//!
//! This crate provides the interface applications use:
//! - **HistoryMetadata**: asynchronous handle over the record store
//! - **Pending**: the result handle every call returns (wait, await or callback)
//! - **GroupedHistory**: search-term grouping for presentation layers
//!
//! ## Threading Model
//!
//! Calls never block the caller. Mutations run one at a time on a dedicated
//! writer thread in submission order; reads run on a small reader pool and
//! always observe writes queued before them by the same caller.
//!
//! ## Quick Start
//!
//! ```no_run
//! use histmeta_api::HistoryMetadata;
//! use histmeta_core::{MetadataKey, Observation};
//!
//! let store = HistoryMetadata::open("/tmp/histmeta")?;
//! let key = MetadataKey::new("https://www.mozilla.org", Some("firefox".into()), None);
//!
//! store.note_history_metadata_observation(key.clone(), Observation::view_time(1_500)).wait()?;
//! let recent = store.get_history_metadata_since(0i64).wait()?;
//! # Ok::<(), histmeta_core::StoreError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod facade;
pub mod pending;
pub mod projection;

pub use facade::HistoryMetadata;
pub use pending::{pending, Completer, Pending, Subscription};
pub use projection::{group_by_search_term, GroupedHistory};

// Configuration and results surfaced through the facade
pub use histmeta_engine::{MetadataConfig, RetentionOutcome, RetentionPolicy, CONFIG_FILE_NAME};
