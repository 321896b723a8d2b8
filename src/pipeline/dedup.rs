// src/pipeline/dedup.rs

//! Cross-run deduplication of normalized job records.
//!
//! A record is a duplicate when its `(site, external_id)` key is already
//! known, or when its content hash matches a previously seen posting on
//! the same site — the latter catches re-posted listings whose URL
//! changed. Duplicates are reported, never silently merged; downstream
//! decides whether to refresh an existing record.

use crate::error::Result;
use crate::models::JobRecord;
use crate::storage::DedupIndex;

/// Outcome of deduplicating one batch.
#[derive(Debug, Default)]
pub struct DedupOutcome {
    /// Records not seen before; their keys are now recorded
    pub new: Vec<JobRecord>,

    /// Records whose identity or content was already known
    pub duplicates: Vec<JobRecord>,
}

impl DedupOutcome {
    pub fn total(&self) -> usize {
        self.new.len() + self.duplicates.len()
    }
}

/// Split a batch into new records and duplicates against the index.
///
/// Keys for new records are inserted in the same pass that declares them
/// new, so a record appearing twice in one batch dedupes against itself
/// and re-running the same batch is idempotent.
pub async fn dedupe(records: Vec<JobRecord>, index: &dyn DedupIndex) -> Result<DedupOutcome> {
    let mut outcome = DedupOutcome::default();

    for record in records {
        let key = record.identity_key();
        let hash = record.content_hash();

        let known = index.has_key(&key).await? || index.has_content_hash(&record.site, &hash).await?;
        if known {
            log::debug!("Duplicate record {} ({})", key, record.url);
            outcome.duplicates.push(record);
        } else {
            index.record_key(&key).await?;
            index.record_content_hash(&record.site, &hash).await?;
            outcome.new.push(record);
        }
    }

    log::info!(
        "Dedup: {} new, {} duplicates",
        outcome.new.len(),
        outcome.duplicates.len()
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryIndex;
    use chrono::Utc;

    fn record(site: &str, id: &str, url: &str, title: &str) -> JobRecord {
        JobRecord {
            site: site.to_string(),
            external_id: id.to_string(),
            title: Some(title.to_string()),
            company: Some("Acme".to_string()),
            location: None,
            other_locations: None,
            salary: None,
            posted_date: None,
            posted_date_raw: None,
            description: Some("desc".to_string()),
            url: url.to_string(),
            scraped_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn first_sighting_is_new() {
        let index = MemoryIndex::new();
        let outcome = dedupe(
            vec![record("a", "1", "https://a.test/1", "Engineer")],
            &index,
        )
        .await
        .unwrap();
        assert_eq!(outcome.new.len(), 1);
        assert!(outcome.duplicates.is_empty());
    }

    #[tokio::test]
    async fn rerunning_the_same_batch_is_idempotent() {
        let index = MemoryIndex::new();
        let batch = vec![
            record("a", "1", "https://a.test/1", "Engineer"),
            record("a", "2", "https://a.test/2", "Designer"),
        ];

        let first = dedupe(batch.clone(), &index).await.unwrap();
        assert_eq!(first.new.len(), 2);

        let second = dedupe(batch, &index).await.unwrap();
        assert_eq!(second.new.len(), 0);
        assert_eq!(second.duplicates.len(), 2);
    }

    #[tokio::test]
    async fn same_batch_duplicate_is_caught() {
        let index = MemoryIndex::new();
        let outcome = dedupe(
            vec![
                record("a", "1", "https://a.test/1", "Engineer"),
                record("a", "1", "https://a.test/1", "Engineer"),
            ],
            &index,
        )
        .await
        .unwrap();
        assert_eq!(outcome.new.len(), 1);
        assert_eq!(outcome.duplicates.len(), 1);
    }

    #[tokio::test]
    async fn reposted_listing_under_new_url_is_a_duplicate() {
        let index = MemoryIndex::new();
        let original = record("a", "1", "https://a.test/jobs/1", "Engineer");
        // Same content, different URL and derived id
        let reposted = record("a", "9", "https://a.test/jobs/9", "Engineer");

        dedupe(vec![original], &index).await.unwrap();
        let outcome = dedupe(vec![reposted], &index).await.unwrap();

        assert!(outcome.new.is_empty());
        assert_eq!(outcome.duplicates.len(), 1);
    }

    #[tokio::test]
    async fn same_content_on_another_site_is_new() {
        let index = MemoryIndex::new();
        dedupe(
            vec![record("a", "1", "https://a.test/1", "Engineer")],
            &index,
        )
        .await
        .unwrap();

        let outcome = dedupe(
            vec![record("b", "1", "https://b.test/1", "Engineer")],
            &index,
        )
        .await
        .unwrap();

        assert_eq!(outcome.new.len(), 1);
    }
}
