// src/storage/mod.rs

//! Storage abstractions for job records and dedup state.
//!
//! The crawl core needs two capabilities from its surroundings: a record
//! sink (append/upsert into a per-site collection, answer "does this key
//! exist") and a dedup index ("has this identity or content been seen").
//! A document store, key-value store or flat file all satisfy them;
//! [`local::JsonStore`] is the bundled filesystem implementation.

pub mod local;

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::JobRecord;

// Re-export for convenience
pub use local::JsonStore;

/// Destination for new job records, partitioned per site.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Insert or replace the record under its `(site, external_id)` key.
    async fn upsert(&self, record: &JobRecord) -> Result<()>;

    /// Whether a record exists under the key.
    async fn exists(&self, site: &str, external_id: &str) -> Result<bool>;
}

/// Cross-run identity set: the only state that outlives a crawl run.
#[async_trait]
pub trait DedupIndex: Send + Sync {
    /// Whether the `(site, external_id)` key was recorded before.
    async fn has_key(&self, key: &str) -> Result<bool>;

    /// Record an identity key.
    async fn record_key(&self, key: &str) -> Result<()>;

    /// Whether a content hash was recorded for the site before.
    async fn has_content_hash(&self, site: &str, hash: &str) -> Result<bool>;

    /// Record a content hash for the site.
    async fn record_content_hash(&self, site: &str, hash: &str) -> Result<()>;
}

/// In-memory dedup index for tests and single-shot runs.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    keys: Mutex<HashSet<String>>,
    hashes: Mutex<HashSet<(String, String)>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DedupIndex for MemoryIndex {
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.keys.lock().unwrap().contains(key))
    }

    async fn record_key(&self, key: &str) -> Result<()> {
        self.keys.lock().unwrap().insert(key.to_string());
        Ok(())
    }

    async fn has_content_hash(&self, site: &str, hash: &str) -> Result<bool> {
        Ok(self
            .hashes
            .lock()
            .unwrap()
            .contains(&(site.to_string(), hash.to_string())))
    }

    async fn record_content_hash(&self, site: &str, hash: &str) -> Result<()> {
        self.hashes
            .lock()
            .unwrap()
            .insert((site.to_string(), hash.to_string()));
        Ok(())
    }
}

/// In-memory record sink for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<HashMap<String, JobRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, site: &str, external_id: &str) -> Option<JobRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&format!("{site}:{external_id}"))
            .cloned()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn upsert(&self, record: &JobRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap()
            .insert(record.identity_key(), record.clone());
        Ok(())
    }

    async fn exists(&self, site: &str, external_id: &str) -> Result<bool> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .contains_key(&format!("{site}:{external_id}")))
    }
}
