// src/pipeline/run.rs

//! End-to-end crawl run orchestration.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::fetch::{Fetcher, PageFetcher, Pacer, SessionCell, SessionHandle};
use crate::models::{Config, CrawlerConfig, SearchQuery};
use crate::sites::{SiteAdapter, SiteRegistry};
use crate::storage::{DedupIndex, RecordSink};

use super::dedup::dedupe;
use super::details::DetailCollector;
use super::normalize::normalize;
use super::pagination::PaginationCrawler;

/// A per-item failure reported in the run summary.
#[derive(Debug, Clone, Serialize)]
pub struct ItemError {
    pub url: String,
    pub message: String,
}

impl ItemError {
    fn new(url: &str, error: &AppError) -> Self {
        Self {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

/// What one crawl run did.
///
/// An aborted run is still a partial success: everything gathered before
/// the abort is counted and stored, and `abort_reason` says why the run
/// stopped early.
#[derive(Debug, Serialize)]
pub struct CrawlSummary {
    pub site: String,

    /// Detail links discovered by the pagination walk
    pub discovered: usize,

    /// Detail pages fetched and extracted successfully
    pub fetched: usize,

    /// Records that passed normalization
    pub normalized: usize,

    /// New records handed to the sink
    pub new_records: usize,

    /// Records recognized as already stored
    pub duplicates: usize,

    /// Per-item failures; these never abort a run on their own
    pub errors: Vec<ItemError>,

    pub aborted: bool,
    pub abort_reason: Option<String>,
}

impl CrawlSummary {
    fn empty(site: String) -> Self {
        Self {
            site,
            discovered: 0,
            fetched: 0,
            normalized: 0,
            new_records: 0,
            duplicates: 0,
            errors: Vec::new(),
            aborted: false,
            abort_reason: None,
        }
    }

    fn aborted(site: String, reason: String) -> Self {
        Self {
            aborted: true,
            abort_reason: Some(reason),
            ..Self::empty(site)
        }
    }
}

/// One end-to-end crawl: pagination -> detail collection -> normalization
/// -> deduplication -> record sink.
pub struct CrawlRun {
    adapter: Arc<dyn SiteAdapter>,
    fetcher: Arc<dyn Fetcher>,
    config: CrawlerConfig,
    session: Option<Arc<SessionCell>>,
    cancel: CancellationToken,
}

impl CrawlRun {
    pub fn new(
        adapter: Arc<dyn SiteAdapter>,
        fetcher: Arc<dyn Fetcher>,
        config: CrawlerConfig,
    ) -> Self {
        Self {
            adapter,
            fetcher,
            config,
            session: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Supply the authenticated session shared by all fetches.
    pub fn with_session(mut self, session: Arc<SessionCell>) -> Self {
        self.session = Some(session);
        self
    }

    /// Use an externally owned cancellation signal.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Execute the run and report what happened.
    ///
    /// Run-level failures (missing session, pagination abort) come back
    /// as a summary with `aborted: true` rather than an `Err`: partial
    /// data is still useful to the caller. `Err` is reserved for sink
    /// and index failures the caller must not mistake for crawl results.
    pub async fn execute(
        &self,
        query: &SearchQuery,
        sink: &dyn RecordSink,
        index: &dyn DedupIndex,
    ) -> Result<CrawlSummary> {
        let site = self.adapter.id().to_string();

        // Fail fast before any network call
        if self.adapter.requires_session() {
            let present = match &self.session {
                Some(cell) => cell.is_present().await,
                None => false,
            };
            if !present {
                let reason = AppError::AuthenticationRequired { site: site.clone() };
                log::error!("{}", reason);
                return Ok(CrawlSummary::aborted(site, reason.to_string()));
            }
        }

        let pacer = Arc::new(Pacer::from_millis(self.config.request_delay_ms));

        let walker = PaginationCrawler::new(
            Arc::clone(&self.adapter),
            Arc::clone(&self.fetcher),
            Arc::clone(&pacer),
            self.config.max_pages,
        );
        let discovery = match walker.run(query).await {
            Ok(discovery) => discovery,
            Err(error) => {
                // A partial link set would corrupt dedup decisions in
                // later runs, so pagination failures abort the run
                log::error!("Pagination for {} aborted: {}", site, error);
                return Ok(CrawlSummary::aborted(site, error.to_string()));
            }
        };

        let mut summary = CrawlSummary::empty(site.clone());
        summary.discovered = discovery.links.len();
        if discovery.truncated {
            summary.aborted = true;
            summary.abort_reason = Some(format!(
                "pagination stopped at the {}-page safety bound",
                self.config.max_pages
            ));
        }

        let mut collector = DetailCollector::new(
            Arc::clone(&self.adapter),
            Arc::clone(&self.fetcher),
            pacer,
            self.config.max_concurrent,
        )
        .with_cancellation(self.cancel.child_token());
        if let Some(cell) = &self.session {
            collector = collector.with_session(Arc::clone(cell));
        }
        let results = collector.collect(discovery.links).await;

        let scraped_at = Utc::now();
        let mut records = Vec::new();
        let mut auth_lost = false;
        for result in results {
            match result.fields {
                Ok(fields) => {
                    summary.fetched += 1;
                    match normalize(&site, &result.link.url, &fields, scraped_at) {
                        Ok(record) => {
                            summary.normalized += 1;
                            records.push(record);
                        }
                        Err(error) => summary.errors.push(ItemError::new(&result.link.url, &error)),
                    }
                }
                Err(error) => {
                    if matches!(error, AppError::NotAuthenticated { .. }) {
                        auth_lost = true;
                    }
                    summary.errors.push(ItemError::new(&result.link.url, &error));
                }
            }
        }

        let outcome = dedupe(records, index).await?;
        summary.duplicates = outcome.duplicates.len();
        for record in &outcome.new {
            match sink.upsert(record).await {
                Ok(()) => summary.new_records += 1,
                Err(error) => summary.errors.push(ItemError::new(&record.url, &error)),
            }
        }

        if auth_lost {
            summary.aborted = true;
            summary.abort_reason = Some(
                AppError::AuthenticationRequired { site: site.clone() }.to_string(),
            );
        } else if self.cancel.is_cancelled() {
            summary.aborted = true;
            summary.abort_reason = Some("run cancelled".to_string());
        }

        log::info!(
            "{}: {} discovered, {} fetched, {} new, {} duplicates, {} errors{}",
            site,
            summary.discovered,
            summary.fetched,
            summary.new_records,
            summary.duplicates,
            summary.errors.len(),
            if summary.aborted { " (aborted)" } else { "" }
        );
        Ok(summary)
    }
}

/// Build and execute a run for a registered site.
///
/// Resolves the adapter from the registry, loads a saved session when the
/// configuration names one, and wires up the HTTP fetcher.
pub async fn run_site(
    registry: &SiteRegistry,
    config: &Config,
    site_id: &str,
    query: &SearchQuery,
    sink: &dyn RecordSink,
    index: &dyn DedupIndex,
) -> Result<CrawlSummary> {
    let adapter = registry
        .get(site_id)
        .ok_or_else(|| AppError::config(format!("Unknown site '{site_id}'")))?;

    let session = config.sessions.get(site_id).and_then(|path| {
        match SessionHandle::load(path) {
            Ok(handle) => Some(Arc::new(SessionCell::with_handle(handle))),
            Err(error) => {
                log::warn!("Could not load session for {}: {}", site_id, error);
                None
            }
        }
    });

    let mut fetcher = PageFetcher::new(&config.crawler)?;
    if let Some(cell) = &session {
        fetcher = fetcher.with_session(Arc::clone(cell));
    }

    let mut run = CrawlRun::new(adapter, Arc::new(fetcher), config.crawler.clone());
    if let Some(cell) = session {
        run = run.with_session(cell);
    }
    run.execute(query, sink, index).await
}
