//! Metadata keys and the key normalizer
//!
//! A `MetadataKey` identifies one logical visit context: the page URL, the
//! search term that led there (if any), and the referring page (if any).
//!
//! ## Normalization
//!
//! - `url` is parsed and re-serialized, so `https://www.example.com` and
//!   `https://WWW.example.com/` are the same key (`https://www.example.com/`).
//!   A URL that does not parse is kept as trimmed text and rejected later by
//!   `MetadataKey::validate`.
//! - `search_term` and `referrer_url` pass through untouched, except that a
//!   value that is empty or whitespace-only becomes `None`.
//!
//! Normalization is pure and idempotent: normalizing a normalized key yields
//! the same key.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Longest URL accepted by `MetadataKey::validate`, in bytes
///
/// Applies to the referrer URL as well.
pub const MAX_URL_LENGTH: usize = 65_536;

/// Longest search term accepted by `MetadataKey::validate`, in bytes
pub const MAX_SEARCH_TERM_LENGTH: usize = 65_536;

/// Un-normalized key as a caller supplies it
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawMetadataKey {
    /// Page URL, any textual form
    pub url: String,
    /// Search term that led to the page
    pub search_term: Option<String>,
    /// URL of the referring page
    pub referrer_url: Option<String>,
}

impl RawMetadataKey {
    /// Create a raw key
    pub fn new(
        url: impl Into<String>,
        search_term: Option<String>,
        referrer_url: Option<String>,
    ) -> Self {
        Self {
            url: url.into(),
            search_term,
            referrer_url,
        }
    }
}

/// Normalized composite identity of a visit context
///
/// Fields are private: the only way to build one is through the normalizer,
/// so every `MetadataKey` in the system is already canonical. Equality and
/// ordering compare url, then search term, then referrer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetadataKey {
    url: String,
    search_term: Option<String>,
    referrer_url: Option<String>,
}

impl MetadataKey {
    /// Build a normalized key
    ///
    /// # Example
    ///
    /// ```
    /// use histmeta_core::MetadataKey;
    ///
    /// let key = MetadataKey::new("https://www.example.com", Some("  ".into()), None);
    /// assert_eq!(key.url(), "https://www.example.com/");
    /// assert_eq!(key.search_term(), None);
    /// ```
    pub fn new(
        url: impl Into<String>,
        search_term: Option<String>,
        referrer_url: Option<String>,
    ) -> Self {
        normalize(&RawMetadataKey::new(url, search_term, referrer_url))
    }

    /// Shorthand for a key with only a URL
    pub fn from_url(url: impl Into<String>) -> Self {
        Self::new(url, None, None)
    }

    /// Normalized page URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Search term, if any
    pub fn search_term(&self) -> Option<&str> {
        self.search_term.as_deref()
    }

    /// Referring URL, if any
    pub fn referrer_url(&self) -> Option<&str> {
        self.referrer_url.as_deref()
    }

    /// Check that the key can be stored
    ///
    /// Rules:
    /// - url must not be empty
    /// - url must not contain NUL bytes
    /// - url must not exceed `MAX_URL_LENGTH`
    /// - url must parse as an absolute URL
    /// - referrer must not exceed `MAX_URL_LENGTH`
    /// - search term must not exceed `MAX_SEARCH_TERM_LENGTH`
    pub fn validate(&self) -> StoreResult<()> {
        if self.url.is_empty() {
            return Err(StoreError::invalid_argument("url cannot be empty"));
        }
        if self.url.contains('\x00') {
            return Err(StoreError::invalid_argument("url cannot contain NUL bytes"));
        }
        if self.url.len() > MAX_URL_LENGTH {
            return Err(StoreError::invalid_argument(format!(
                "url too long: {} bytes exceeds maximum {}",
                self.url.len(),
                MAX_URL_LENGTH
            )));
        }
        Url::parse(&self.url).map_err(|e| {
            StoreError::invalid_argument(format!("unparsable url '{}': {}", self.url, e))
        })?;
        check_length("referrer url", self.referrer_url(), MAX_URL_LENGTH)?;
        check_length("search term", self.search_term(), MAX_SEARCH_TERM_LENGTH)?;
        Ok(())
    }
}

/// Reject an optional field longer than `max` bytes
pub(crate) fn check_length(field: &str, value: Option<&str>, max: usize) -> StoreResult<()> {
    match value {
        Some(v) if v.len() > max => Err(StoreError::invalid_argument(format!(
            "{} too long: {} bytes exceeds maximum {}",
            field,
            v.len(),
            max
        ))),
        _ => Ok(()),
    }
}

impl fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)?;
        if let Some(term) = &self.search_term {
            write!(f, " [search: {}]", term)?;
        }
        if let Some(referrer) = &self.referrer_url {
            write!(f, " [from: {}]", referrer)?;
        }
        Ok(())
    }
}

impl From<RawMetadataKey> for MetadataKey {
    fn from(raw: RawMetadataKey) -> Self {
        normalize(&raw)
    }
}

impl From<&str> for MetadataKey {
    fn from(url: &str) -> Self {
        MetadataKey::from_url(url)
    }
}

/// Canonicalize a raw key
pub fn normalize(raw: &RawMetadataKey) -> MetadataKey {
    MetadataKey {
        url: normalize_url(&raw.url),
        search_term: non_blank(raw.search_term.as_deref()),
        referrer_url: non_blank(raw.referrer_url.as_deref()),
    }
}

/// Canonical textual form of a URL
///
/// Parsable URLs are re-serialized (lowercased scheme and host, `/` path for
/// bare hosts, default port dropped). Anything else is returned trimmed.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    match Url::parse(trimmed) {
        Ok(parsed) => parsed.into(),
        Err(_) => trimmed.to_string(),
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}
