// src/pipeline/testing.rs

//! Scripted fetcher and site adapter for exercising crawl control flow
//! without network access.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{AppError, Result};
use crate::fetch::{FetchOptions, FetchedPage, Fetcher};
use crate::models::{DetailLink, DetailPage, ListingPage, RawFieldMap, SearchQuery};
use crate::sites::SiteAdapter;

enum Scripted {
    Page(String),
    Fail(AppError),
}

impl Scripted {
    fn duplicate(&self) -> Self {
        match self {
            Scripted::Page(body) => Scripted::Page(body.clone()),
            Scripted::Fail(error) => Scripted::Fail(clone_error(error)),
        }
    }
}

/// Fetcher serving scripted responses keyed by URL.
///
/// Responses for a URL form a queue: each fetch consumes the front entry
/// until one remains, which then repeats forever. `fail` followed by
/// `page` scripts a failure once and success afterwards.
#[derive(Clone)]
pub(crate) struct StubFetcher {
    pages: Arc<Mutex<HashMap<String, VecDeque<Scripted>>>>,
    calls: Arc<AtomicUsize>,
    /// Vary fetch latency by URL to randomize completion order in
    /// concurrency tests
    staggered: bool,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self {
            pages: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            staggered: false,
        }
    }

    /// Make fetch latency vary by URL so completion order differs from
    /// submission order.
    pub fn staggered() -> Self {
        Self {
            staggered: true,
            ..Self::new()
        }
    }

    pub fn page(&self, url: &str, body: &str) {
        self.pages
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(Scripted::Page(body.to_string()));
    }

    pub fn fail(&self, url: &str, error: AppError) {
        self.pages
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(Scripted::Fail(error));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &str, _options: &FetchOptions) -> Result<FetchedPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.staggered {
            let spread = (url.len() * 7 % 40) as u64;
            tokio::time::sleep(Duration::from_millis(spread)).await;
        }

        let scripted = {
            let mut map = self.pages.lock().unwrap();
            match map.get_mut(url) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().map(Scripted::duplicate),
                None => None,
            }
        };

        match scripted {
            Some(Scripted::Page(body)) => Ok(FetchedPage {
                url: url.to_string(),
                body,
                fetched_at: Utc::now(),
            }),
            Some(Scripted::Fail(error)) => Err(error),
            None => Err(AppError::HttpStatus {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

fn clone_error(error: &AppError) -> AppError {
    match error {
        AppError::Timeout { url } => AppError::Timeout { url: url.clone() },
        AppError::HttpStatus { url, status } => AppError::HttpStatus {
            url: url.clone(),
            status: *status,
        },
        AppError::NotAuthenticated { url } => AppError::NotAuthenticated { url: url.clone() },
        AppError::Network { url, message } => AppError::Network {
            url: url.clone(),
            message: message.clone(),
        },
        other => AppError::crawl("stub", other),
    }
}

/// Adapter driven entirely by page bodies.
///
/// Body line format: `link <url>` declares a detail link, `next <url>`
/// the next listing page, `field <key> <value>` a detail field.
pub(crate) struct ScriptedSite {
    id: String,
    requires_session: bool,
}

impl ScriptedSite {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            requires_session: false,
        }
    }

    pub fn authenticated(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            requires_session: true,
        }
    }
}

impl SiteAdapter for ScriptedSite {
    fn id(&self) -> &str {
        &self.id
    }

    fn requires_session(&self) -> bool {
        self.requires_session
    }

    fn build_listing_url(&self, _query: &SearchQuery) -> Result<String> {
        Ok("https://stub.test/list?page=0".to_string())
    }

    fn extract_detail_links(
        &self,
        page: &ListingPage,
        page_index: usize,
    ) -> Result<Vec<DetailLink>> {
        Ok(page
            .body
            .lines()
            .filter_map(|line| line.strip_prefix("link "))
            .map(|url| DetailLink {
                url: url.trim().to_string(),
                site: self.id.clone(),
                page_index,
            })
            .collect())
    }

    fn find_next_page(&self, page: &ListingPage) -> Result<Option<String>> {
        Ok(page
            .body
            .lines()
            .find_map(|line| line.strip_prefix("next "))
            .map(|url| url.trim().to_string()))
    }

    fn extract_fields(&self, page: &DetailPage) -> Result<RawFieldMap> {
        let mut fields = RawFieldMap::new();
        for line in page.body.lines() {
            if let Some(rest) = line.strip_prefix("field ") {
                if let Some((key, value)) = rest.trim().split_once(' ') {
                    fields.insert(key, Some(value.to_string()));
                }
            }
        }
        Ok(fields)
    }
}
