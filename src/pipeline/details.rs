// src/pipeline/details.rs

//! Concurrent, rate-limited collection of job detail pages.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::fetch::{Fetcher, Pacer, SessionCell};
use crate::models::{DetailLink, DetailPage, RawFieldMap};
use crate::sites::SiteAdapter;

/// One slot of the collection result: the link it belongs to plus either
/// its raw fields or the typed failure that took it down. A failed slot
/// never aborts the batch.
#[derive(Debug)]
pub struct DetailResult {
    pub link: DetailLink,
    pub fields: Result<RawFieldMap>,
}

impl DetailResult {
    pub fn is_ok(&self) -> bool {
        self.fields.is_ok()
    }
}

/// Fetches detail pages with bounded concurrency.
///
/// Result slots come back in input order regardless of completion order,
/// so concurrency never leaks into observable record ordering. All
/// workers share one [`Pacer`], keeping the aggregate request rate
/// bounded no matter the concurrency limit.
pub struct DetailCollector {
    adapter: Arc<dyn SiteAdapter>,
    fetcher: Arc<dyn Fetcher>,
    pacer: Arc<Pacer>,
    concurrency: usize,
    session: Option<Arc<SessionCell>>,
    cancel: CancellationToken,
}

impl DetailCollector {
    pub fn new(
        adapter: Arc<dyn SiteAdapter>,
        fetcher: Arc<dyn Fetcher>,
        pacer: Arc<Pacer>,
        concurrency: usize,
    ) -> Self {
        Self {
            adapter,
            fetcher,
            pacer,
            concurrency: concurrency.max(1),
            session: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Share an authenticated session with every worker.
    pub fn with_session(mut self, session: Arc<SessionCell>) -> Self {
        self.session = Some(session);
        self
    }

    /// Use an externally owned cancellation signal.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Collect raw fields for every link.
    ///
    /// On cancellation the stream stops issuing fetches, in-flight ones
    /// are dropped, and the slots already completed are returned.
    pub async fn collect(&self, links: Vec<DetailLink>) -> Vec<DetailResult> {
        let total = links.len();
        let mut results = Vec::with_capacity(total);

        let mut slots = stream::iter(links)
            .map(|link| self.collect_one(link))
            .buffered(self.concurrency);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    log::warn!(
                        "Detail collection for {} cancelled after {}/{} results",
                        self.adapter.id(),
                        results.len(),
                        total
                    );
                    break;
                }
                slot = slots.next() => match slot {
                    Some(result) => results.push(result),
                    None => break,
                },
            }
        }

        let failures = results.iter().filter(|r| !r.is_ok()).count();
        log::info!(
            "{}: collected {} detail pages, {} failed",
            self.adapter.id(),
            results.len(),
            failures
        );
        results
    }

    async fn collect_one(&self, link: DetailLink) -> DetailResult {
        let fields = self.fetch_and_extract(&link).await;
        if let Err(error) = &fields {
            log::warn!("Detail fetch failed for {}: {}", link.url, error);
        }
        DetailResult { link, fields }
    }

    async fn fetch_and_extract(&self, link: &DetailLink) -> Result<RawFieldMap> {
        let options = self.adapter.fetch_options();

        self.pacer.pause().await;
        let refreshable = self
            .session
            .as_ref()
            .filter(|cell| cell.can_refresh())
            .cloned();
        let session_generation = self.session.as_ref().map(|cell| cell.generation());
        let page = match self.fetcher.fetch(&link.url, &options).await {
            Ok(page) => page,
            Err(error @ AppError::NotAuthenticated { .. }) => {
                let Some(cell) = refreshable else {
                    self.halt_on_auth_failure(&error);
                    return Err(error);
                };
                // Mid-run expiry: refresh once across all workers, then
                // retry this item with the new session
                cell.refresh_if_stale(session_generation.unwrap_or(0)).await?;
                self.pacer.pause().await;
                match self.fetcher.fetch(&link.url, &options).await {
                    Ok(page) => page,
                    Err(error) => {
                        self.halt_on_auth_failure(&error);
                        return Err(error);
                    }
                }
            }
            Err(error) => {
                self.halt_on_auth_failure(&error);
                return Err(error);
            }
        };

        let detail = DetailPage {
            link: link.clone(),
            url: page.url,
            body: page.body,
            fetched_at: page.fetched_at,
        };

        let fields = self.adapter.extract_fields(&detail)?;
        if fields.all_absent() {
            return Err(AppError::extraction(
                &detail.url,
                "no recognized fields in page",
            ));
        }
        Ok(fields)
    }

    /// An unrecoverable authentication failure stops the whole batch:
    /// every remaining fetch would bounce off the login page too.
    fn halt_on_auth_failure(&self, error: &AppError) {
        if matches!(error, AppError::NotAuthenticated { .. }) {
            self.cancel.cancel();
        }
    }
}
