//! Record store engine for histmeta
//!
//! This crate layers the history-metadata semantics over the storage crate:
//! - MetadataStore: observation merge, listing, deletion
//! - Query: case-insensitive substring search, newest first
//! - Retention: policies, the retention manager, the sweep timer
//! - Config: `histmeta.toml` in the data directory
//! - Worker lanes: the writer and reader execution contexts
//!
//! Everything here is synchronous. The api crate puts these operations on
//! worker lanes and hands callers pending handles.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod background;
pub mod config;
pub mod query;
pub mod retention;
pub mod store;

pub use background::{LaneClosed, LaneStats, WorkerLane};
pub use config::{ConfigError, MetadataConfig, CONFIG_FILE_NAME};
pub use query::Query;
pub use retention::{RetentionManager, RetentionOutcome, RetentionPolicy, RetentionScheduler};
pub use store::MetadataStore;
