//! Canonical job record.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A normalized job posting, independent of the site it came from.
///
/// `site` and `external_id` together form the stable identity key.
/// `url` is always absolute. Every other field is optional; absent fields
/// are serialized as explicit nulls so downstream consumers see a uniform
/// shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobRecord {
    /// Site identifier the record was crawled from
    pub site: String,

    /// Stable identifier derived from the canonical detail URL
    pub external_id: String,

    /// Job title
    pub title: Option<String>,

    /// Hiring company
    pub company: Option<String>,

    /// Primary location
    pub location: Option<String>,

    /// Additional locations, as listed by the site
    pub other_locations: Option<String>,

    /// Salary or compensation text
    pub salary: Option<String>,

    /// Posting date, when the site's format was recognized
    pub posted_date: Option<NaiveDate>,

    /// Raw date string preserved when parsing failed
    pub posted_date_raw: Option<String>,

    /// Full job description text
    pub description: Option<String>,

    /// Absolute detail page URL
    pub url: String,

    /// When this record was scraped
    pub scraped_at: DateTime<Utc>,
}

impl JobRecord {
    /// Identity key used for deduplication and sink partitioning.
    pub fn identity_key(&self) -> String {
        format!("{}:{}", self.site, self.external_id)
    }

    /// Hash over the stable descriptive fields.
    ///
    /// Catches re-posted listings whose URL changed: two records with the
    /// same title, company and description hash identically regardless of
    /// where they were discovered.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for field in [&self.title, &self.company, &self.description] {
            match field {
                Some(text) => hasher.update(text.trim().to_lowercase().as_bytes()),
                None => hasher.update(b"\0"),
            }
            hasher.update(b"\x1f");
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record(url: &str, title: &str) -> JobRecord {
        JobRecord {
            site: "enterprise".to_string(),
            external_id: "1234".to_string(),
            title: Some(title.to_string()),
            company: Some("Acme Corp".to_string()),
            location: Some("Berlin".to_string()),
            other_locations: None,
            salary: None,
            posted_date: None,
            posted_date_raw: None,
            description: Some("Build things.".to_string()),
            url: url.to_string(),
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn identity_key_combines_site_and_id() {
        let record = sample_record("https://example.com/job/1234", "Engineer");
        assert_eq!(record.identity_key(), "enterprise:1234");
    }

    #[test]
    fn content_hash_ignores_url() {
        let a = sample_record("https://example.com/job/1234", "Engineer");
        let b = sample_record("https://example.com/careers/1234-engineer", "Engineer");
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn content_hash_differs_on_title() {
        let a = sample_record("https://example.com/job/1234", "Engineer");
        let b = sample_record("https://example.com/job/1234", "Designer");
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn content_hash_distinguishes_absent_from_empty_shift() {
        // ["ab", None] must not collide with ["a", Some("b")]-style shifts
        let mut a = sample_record("https://example.com/job/1", "Engineer");
        a.company = None;
        a.description = Some("Engineer".to_string());
        let mut b = sample_record("https://example.com/job/1", "Engineer");
        b.company = Some("Engineer".to_string());
        b.description = None;
        assert_ne!(a.content_hash(), b.content_hash());
    }
}
