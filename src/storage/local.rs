//! Local filesystem storage implementation.
//!
//! Stores each site's records in one JSON collection file and the dedup
//! index alongside them. Suited to development and single-host runs; a
//! document store behind the same traits replaces it in production.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── dedup_index.json      # Cross-run identity and content-hash sets
//! ├── ey_jobs.json          # One collection file per site
//! └── handshake_jobs.json
//! ```

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::JobRecord;
use crate::storage::{DedupIndex, RecordSink};

const INDEX_KEY: &str = "dedup_index.json";

/// Persisted dedup state.
#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexData {
    /// `(site, external_id)` identity keys
    keys: HashSet<String>,

    /// Content hashes per site
    content_hashes: HashMap<String, HashSet<String>>,
}

/// Local filesystem storage backend.
pub struct JsonStore {
    root_dir: PathBuf,
    /// Dedup index cache; loaded lazily, persisted on every mutation
    index: Mutex<Option<IndexData>>,
}

impl JsonStore {
    /// Create a new JsonStore rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            index: Mutex::new(None),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Collection file for a site.
    fn collection_key(site: &str) -> String {
        format!("{site}_jobs.json")
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Load a site's collection, empty when absent.
    pub async fn load_collection(&self, site: &str) -> Result<Vec<JobRecord>> {
        Ok(self
            .read_json(&Self::collection_key(site))
            .await?
            .unwrap_or_default())
    }

    /// Run a closure against the cached index, persisting when it
    /// reports a mutation.
    async fn with_index<R>(&self, f: impl FnOnce(&mut IndexData) -> (R, bool)) -> Result<R> {
        let mut guard = self.index.lock().await;
        if guard.is_none() {
            let loaded: IndexData = self.read_json(INDEX_KEY).await?.unwrap_or_default();
            *guard = Some(loaded);
        }
        let data = guard.as_mut().ok_or_else(|| AppError::crawl("storage", "index cache"))?;

        let (result, dirty) = f(data);
        if dirty {
            self.write_json(INDEX_KEY, data).await?;
        }
        Ok(result)
    }
}

#[async_trait]
impl RecordSink for JsonStore {
    async fn upsert(&self, record: &JobRecord) -> Result<()> {
        let key = Self::collection_key(&record.site);
        let mut records: Vec<JobRecord> = self.read_json(&key).await?.unwrap_or_default();

        match records
            .iter_mut()
            .find(|r| r.external_id == record.external_id)
        {
            Some(slot) => *slot = record.clone(),
            None => records.push(record.clone()),
        }

        self.write_json(&key, &records).await
    }

    async fn exists(&self, site: &str, external_id: &str) -> Result<bool> {
        let records = self.load_collection(site).await?;
        Ok(records.iter().any(|r| r.external_id == external_id))
    }
}

#[async_trait]
impl DedupIndex for JsonStore {
    async fn has_key(&self, key: &str) -> Result<bool> {
        self.with_index(|data| (data.keys.contains(key), false)).await
    }

    async fn record_key(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.with_index(move |data| {
            let inserted = data.keys.insert(key);
            ((), inserted)
        })
        .await
    }

    async fn has_content_hash(&self, site: &str, hash: &str) -> Result<bool> {
        self.with_index(|data| {
            let known = data
                .content_hashes
                .get(site)
                .is_some_and(|hashes| hashes.contains(hash));
            (known, false)
        })
        .await
    }

    async fn record_content_hash(&self, site: &str, hash: &str) -> Result<()> {
        let site = site.to_string();
        let hash = hash.to_string();
        self.with_index(move |data| {
            let inserted = data.content_hashes.entry(site).or_default().insert(hash);
            ((), inserted)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(site: &str, id: &str, title: &str) -> JobRecord {
        JobRecord {
            site: site.to_string(),
            external_id: id.to_string(),
            title: Some(title.to_string()),
            company: None,
            location: None,
            other_locations: None,
            salary: None,
            posted_date: None,
            posted_date_raw: None,
            description: None,
            url: format!("https://{site}.test/jobs/{id}"),
            scraped_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_inserts_then_replaces() {
        let tmp = TempDir::new().unwrap();
        let store = JsonStore::new(tmp.path());

        store.upsert(&record("acme", "1", "Engineer")).await.unwrap();
        store.upsert(&record("acme", "2", "Designer")).await.unwrap();
        store
            .upsert(&record("acme", "1", "Senior Engineer"))
            .await
            .unwrap();

        let records = store.load_collection("acme").await.unwrap();
        assert_eq!(records.len(), 2);
        let first = records.iter().find(|r| r.external_id == "1").unwrap();
        assert_eq!(first.title.as_deref(), Some("Senior Engineer"));
    }

    #[tokio::test]
    async fn collections_are_partitioned_per_site() {
        let tmp = TempDir::new().unwrap();
        let store = JsonStore::new(tmp.path());

        store.upsert(&record("acme", "1", "Engineer")).await.unwrap();
        store.upsert(&record("campus", "1", "Intern")).await.unwrap();

        assert!(store.exists("acme", "1").await.unwrap());
        assert!(store.exists("campus", "1").await.unwrap());
        assert!(!store.exists("acme", "9").await.unwrap());
        assert!(tmp.path().join("acme_jobs.json").exists());
        assert!(tmp.path().join("campus_jobs.json").exists());
    }

    #[tokio::test]
    async fn dedup_index_survives_reopen() {
        let tmp = TempDir::new().unwrap();

        {
            let store = JsonStore::new(tmp.path());
            store.record_key("acme:1").await.unwrap();
            store.record_content_hash("acme", "abcd").await.unwrap();
        }

        let reopened = JsonStore::new(tmp.path());
        assert!(reopened.has_key("acme:1").await.unwrap());
        assert!(reopened.has_content_hash("acme", "abcd").await.unwrap());
        assert!(!reopened.has_key("acme:2").await.unwrap());
        assert!(!reopened.has_content_hash("campus", "abcd").await.unwrap());
    }

    #[tokio::test]
    async fn missing_files_read_as_empty() {
        let tmp = TempDir::new().unwrap();
        let store = JsonStore::new(tmp.path());

        assert!(store.load_collection("acme").await.unwrap().is_empty());
        assert!(!store.has_key("acme:1").await.unwrap());
    }
}
