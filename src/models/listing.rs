//! Pages and links flowing through a crawl.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Search parameters used to build the first listing page URL.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// Country name (e.g. "United States"); sites that filter by country
    /// map this to their own facet code
    pub country: Option<String>,

    /// Free-text keyword filter, for sites that support one
    pub keyword: Option<String>,
}

/// A fetched page believed to contain a set of job links.
///
/// Ephemeral: produced by the fetch layer, consumed immediately by a site
/// adapter, never persisted.
#[derive(Debug, Clone)]
pub struct ListingPage {
    /// URL the page was fetched from (final, after redirects)
    pub url: String,

    /// Raw page body
    pub body: String,

    /// When the page was fetched
    pub fetched_at: DateTime<Utc>,
}

/// A candidate job-detail URL discovered from a listing page.
///
/// URLs are stored absolute so equality is meaningful for deduplication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct DetailLink {
    /// Absolute detail page URL
    pub url: String,

    /// Site identifier the link was discovered on
    pub site: String,

    /// Zero-based index of the listing page the link was found on
    pub page_index: usize,
}

/// A fetched job-detail page, paired with the link it came from.
#[derive(Debug, Clone)]
pub struct DetailPage {
    /// The discovered link this page was fetched for
    pub link: DetailLink,

    /// Final URL after redirects
    pub url: String,

    /// Raw page body
    pub body: String,

    /// When the page was fetched
    pub fetched_at: DateTime<Utc>,
}

/// Site-specific field names mapped to extracted text.
///
/// Preserves insertion order and keeps absent values explicit: an extractor
/// that found nothing records `None` rather than dropping the key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFieldMap {
    fields: Vec<(String, Option<String>)>,
}

impl RawFieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a field. Later inserts with the same key shadow earlier ones
    /// on lookup but the original position is kept.
    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) {
        let key = key.into();
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.fields.push((key, value));
        }
    }

    /// Look up a field value. Returns `None` both for missing keys and for
    /// keys recorded as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    /// Whether the map records the key at all, even as absent.
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    /// Number of recorded fields, absent ones included.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether every recorded value is absent.
    pub fn all_absent(&self) -> bool {
        self.fields.iter().all(|(_, v)| v.is_none())
    }

    /// Iterate fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_order_is_preserved() {
        let mut map = RawFieldMap::new();
        map.insert("title", Some("Engineer".into()));
        map.insert("salary", None);
        map.insert("location", Some("Berlin".into()));

        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["title", "salary", "location"]);
    }

    #[test]
    fn absent_values_are_kept() {
        let mut map = RawFieldMap::new();
        map.insert("salary", None);

        assert!(map.contains_key("salary"));
        assert_eq!(map.get("salary"), None);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn reinsert_shadows_value_in_place() {
        let mut map = RawFieldMap::new();
        map.insert("title", Some("Old".into()));
        map.insert("location", Some("Berlin".into()));
        map.insert("title", Some("New".into()));

        assert_eq!(map.get("title"), Some("New"));
        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["title", "location"]);
    }

    #[test]
    fn all_absent_detects_empty_extractions() {
        let mut map = RawFieldMap::new();
        map.insert("title", None);
        map.insert("description", None);
        assert!(map.all_absent());

        map.insert("title", Some("Engineer".into()));
        assert!(!map.all_absent());
    }
}
