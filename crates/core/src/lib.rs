//! Core types for histmeta
//!
//! This crate defines the foundational types used throughout the system:
//! - Timestamp: Millisecond instant, signed so callers may pass any i64 bound
//! - Clock: Source of "now" (system or manual, for deterministic tests)
//! - MetadataKey: Normalized composite identity (url, search term, referrer)
//! - Observation: Partial update carrying at most one signal per field
//! - MetadataRecord: Aggregated state for one key, plus the pure `merge`
//! - StoreError: Error type shared by every layer

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod key;
pub mod observation;
pub mod record;
pub mod timestamp;

pub use error::{StoreError, StoreResult};
pub use key::{
    normalize, normalize_url, MetadataKey, RawMetadataKey, MAX_SEARCH_TERM_LENGTH, MAX_URL_LENGTH,
};
pub use observation::{DocumentType, Observation, MAX_TITLE_LENGTH};
pub use record::{merge, MetadataRecord};
pub use timestamp::{Clock, ManualClock, SystemClock, Timestamp};
