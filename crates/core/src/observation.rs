//! Observations: partial updates to a metadata record

use crate::error::StoreResult;
use crate::key::check_length;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest title accepted by `Observation::validate`, in bytes
pub const MAX_TITLE_LENGTH: usize = 65_536;

/// Document classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    /// Ordinary page
    Regular,
    /// Media page (video, audio)
    Media,
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentType::Regular => write!(f, "regular"),
            DocumentType::Media => write!(f, "media"),
        }
    }
}

/// A single partial update for one key
///
/// Absent fields are ignored by the merge. A title that is empty or
/// whitespace-only counts as absent. An observation with nothing present is a
/// no-op: it succeeds without creating or touching a record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Observation {
    /// Page title; only the first non-empty one is kept
    pub title: Option<String>,
    /// View time delta in milliseconds; accumulated
    pub view_time: Option<u64>,
    /// Document classification; latest wins
    pub document_type: Option<DocumentType>,
}

impl Observation {
    /// Observation carrying only a title
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Observation carrying only a view-time delta
    pub fn view_time(millis: u64) -> Self {
        Self {
            view_time: Some(millis),
            ..Self::default()
        }
    }

    /// Observation carrying only a document type
    pub fn document_type(document_type: DocumentType) -> Self {
        Self {
            document_type: Some(document_type),
            ..Self::default()
        }
    }

    /// The title if it carries any non-whitespace text
    pub fn effective_title(&self) -> Option<&str> {
        self.title.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// Check that the observation can be stored
    pub fn validate(&self) -> StoreResult<()> {
        check_length("title", self.title.as_deref(), MAX_TITLE_LENGTH)
    }

    /// True when the observation carries nothing to merge
    pub fn is_empty(&self) -> bool {
        self.effective_title().is_none() && self.view_time.is_none() && self.document_type.is_none()
    }
}
