//! Free-text query over titles, URLs and search terms
//!
//! Matching is a case-insensitive contiguous substring test; no tokenizing,
//! no fuzziness. Results come back most recently observed first, ties broken
//! by URL, and are cut at `limit`.

use histmeta_core::MetadataRecord;
use histmeta_storage::StoreState;

/// A prepared query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    needle: String,
    limit: usize,
}

impl Query {
    /// Prepare `text` for matching; the needle is lowercased once here
    pub fn new(text: &str, limit: usize) -> Self {
        Self {
            needle: text.to_lowercase(),
            limit,
        }
    }

    /// Lowercased search text
    pub fn needle(&self) -> &str {
        &self.needle
    }

    /// Maximum number of results
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Check one record
    pub fn matches(&self, record: &MetadataRecord) -> bool {
        record.matches_lowercase(&self.needle)
    }

    /// Run against a consistent view of the store
    pub fn execute(&self, state: &StoreState) -> Vec<MetadataRecord> {
        if self.limit == 0 {
            return Vec::new();
        }
        state
            .newest_first()
            .filter(|record| self.matches(record))
            .take(self.limit)
            .cloned()
            .collect()
    }
}
