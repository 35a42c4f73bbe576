//! Search-term grouping for presentation consumers
//!
//! A UI that shows "what you searched for" needs only a read-only mapping of
//! search term → entries plus two hooks: an entry was selected, an entry was
//! closed. The store knows nothing about how those are rendered.

use histmeta_core::{MetadataKey, MetadataRecord};
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Group records that carry a search term by that term
///
/// Within a group, keys are ordered most recently observed first, ties by
/// key. Records without a search term are left out.
pub fn group_by_search_term<'a, I>(records: I) -> BTreeMap<String, Vec<MetadataKey>>
where
    I: IntoIterator<Item = &'a MetadataRecord>,
{
    let mut with_terms: Vec<&MetadataRecord> = records
        .into_iter()
        .filter(|r| r.key.search_term().is_some())
        .collect();
    with_terms.sort_by(|a, b| {
        (Reverse(a.last_observed_at), &a.key).cmp(&(Reverse(b.last_observed_at), &b.key))
    });

    let mut groups: BTreeMap<String, Vec<MetadataKey>> = BTreeMap::new();
    for record in with_terms {
        if let Some(term) = record.key.search_term() {
            groups
                .entry(term.to_string())
                .or_default()
                .push(record.key.clone());
        }
    }
    groups
}

type EntryHook = Box<dyn Fn(&str, &MetadataKey) + Send + Sync>;

/// Grouped entries with select and close hooks
#[derive(Default)]
pub struct GroupedHistory {
    groups: BTreeMap<String, Vec<MetadataKey>>,
    on_select: Option<EntryHook>,
    on_close: Option<EntryHook>,
}

impl std::fmt::Debug for GroupedHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupedHistory")
            .field("groups", &self.groups)
            .finish()
    }
}

impl GroupedHistory {
    /// View over precomputed groups
    pub fn new(groups: BTreeMap<String, Vec<MetadataKey>>) -> Self {
        Self {
            groups,
            on_select: None,
            on_close: None,
        }
    }

    /// Build the view straight from records
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a MetadataRecord>,
    {
        Self::new(group_by_search_term(records))
    }

    /// Called with (search term, key) when an entry is selected
    pub fn on_select(mut self, hook: impl Fn(&str, &MetadataKey) + Send + Sync + 'static) -> Self {
        self.on_select = Some(Box::new(hook));
        self
    }

    /// Called with (search term, key) when an entry is closed
    pub fn on_close(mut self, hook: impl Fn(&str, &MetadataKey) + Send + Sync + 'static) -> Self {
        self.on_close = Some(Box::new(hook));
        self
    }

    /// The groups, by search term
    pub fn groups(&self) -> &BTreeMap<String, Vec<MetadataKey>> {
        &self.groups
    }

    /// Search terms in label order
    pub fn labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.groups.keys().map(String::as_str)
    }

    /// Entries under `label`, most recent first
    pub fn entries(&self, label: &str) -> &[MetadataKey] {
        self.groups.get(label).map_or(&[], Vec::as_slice)
    }

    /// Search term whose group holds `key`
    pub fn group_of(&self, key: &MetadataKey) -> Option<&str> {
        let (label, keys) = self.groups.get_key_value(key.search_term()?)?;
        keys.contains(key).then_some(label.as_str())
    }

    /// Number of groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Check if there are no groups
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Report a selection; false if `key` is not shown
    pub fn select(&self, key: &MetadataKey) -> bool {
        let Some(term) = self.group_of(key) else {
            return false;
        };
        if let Some(hook) = &self.on_select {
            hook(term, key);
        }
        true
    }

    /// Remove an entry and report it; an emptied group disappears
    pub fn close(&mut self, key: &MetadataKey) -> bool {
        let Some(term) = self.group_of(key).map(str::to_string) else {
            return false;
        };
        if let Some(entries) = self.groups.get_mut(&term) {
            entries.retain(|k| k != key);
            if entries.is_empty() {
                self.groups.remove(&term);
            }
        }
        if let Some(hook) = &self.on_close {
            hook(&term, key);
        }
        true
    }
}
