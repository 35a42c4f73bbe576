//! Aggregated metadata records and the merge rules
//!
//! ## Merge rules
//!
//! | Field | Rule |
//! |-------|------|
//! | `title` | first non-empty title wins, later ones ignored |
//! | `total_view_time` | sum of every view-time delta (saturating) |
//! | `document_type` | latest present value wins |
//! | `last_observed_at` | "now", never moving backwards |
//! | `created_at` | set once on creation |

use crate::key::MetadataKey;
use crate::observation::{DocumentType, Observation};
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};

/// Durable aggregated state for one key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Identity of the visit context
    pub key: MetadataKey,
    /// First non-empty title ever observed
    pub title: Option<String>,
    /// Sum of all view-time observations, in milliseconds
    pub total_view_time: u64,
    /// Latest observed document classification
    pub document_type: Option<DocumentType>,
    /// When the most recent observation was applied
    pub last_observed_at: Timestamp,
    /// When the first observation was applied
    pub created_at: Timestamp,
}

impl MetadataRecord {
    /// Fresh record with reset aggregates
    pub fn new(key: MetadataKey, now: Timestamp) -> Self {
        Self {
            key,
            title: None,
            total_view_time: 0,
            document_type: None,
            last_observed_at: now,
            created_at: now,
        }
    }

    /// Case-insensitive substring match against title, url and search term
    ///
    /// `needle` must already be lowercase.
    pub fn matches_lowercase(&self, needle: &str) -> bool {
        let contains = |field: &str| field.to_lowercase().contains(needle);
        self.title.as_deref().map_or(false, contains)
            || contains(self.key.url())
            || self.key.search_term().map_or(false, contains)
    }
}

/// Fold one observation into the existing record for `key`
///
/// Pure: no I/O, no clock. When `existing` is `None` a record is created at
/// `now`. Callers skip empty observations before calling this; merging an
/// empty observation still refreshes `last_observed_at`.
pub fn merge(
    existing: Option<MetadataRecord>,
    key: &MetadataKey,
    obs: &Observation,
    now: Timestamp,
) -> MetadataRecord {
    let mut record = existing.unwrap_or_else(|| MetadataRecord::new(key.clone(), now));

    if record.title.is_none() {
        if let Some(title) = obs.effective_title() {
            record.title = Some(title.to_string());
        }
    }

    if let Some(delta) = obs.view_time {
        record.total_view_time = record.total_view_time.saturating_add(delta);
    }

    if let Some(document_type) = obs.document_type {
        record.document_type = Some(document_type);
    }

    record.last_observed_at = record.last_observed_at.max(now);
    record
}
