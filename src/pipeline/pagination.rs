// src/pipeline/pagination.rs

//! Sequential pagination walk over a site's listing pages.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;
use crate::fetch::{Fetcher, Pacer};
use crate::models::{DetailLink, ListingPage, SearchQuery};
use crate::sites::SiteAdapter;

/// Per-run state owned exclusively by the pagination walk.
#[derive(Debug, Default)]
struct CrawlState {
    /// Detail URLs already emitted this run
    seen: HashSet<String>,

    /// Listing pages fetched so far
    pages_visited: usize,
}

/// What the walk found.
#[derive(Debug, Default)]
pub struct LinkDiscovery {
    /// Deduplicated detail links in discovery order
    pub links: Vec<DetailLink>,

    /// Listing pages fetched
    pub pages_visited: usize,

    /// The walk hit the `max_pages` safety bound while the site still
    /// advertised a next page; the link set may be incomplete
    pub truncated: bool,
}

/// Walks listing pages one at a time, collecting a deduplicated, ordered
/// sequence of detail links.
///
/// The walk is strictly sequential: each page's URL comes from the
/// previous page's content. It ends when the adapter reports no next page
/// or when `max_pages` is reached, and aborts on any fetch failure that
/// survived the fetcher's own retries. A truncated link set is never
/// returned silently; it would corrupt later deduplication decisions.
pub struct PaginationCrawler {
    adapter: Arc<dyn SiteAdapter>,
    fetcher: Arc<dyn Fetcher>,
    pacer: Arc<Pacer>,
    max_pages: usize,
}

impl PaginationCrawler {
    pub fn new(
        adapter: Arc<dyn SiteAdapter>,
        fetcher: Arc<dyn Fetcher>,
        pacer: Arc<Pacer>,
        max_pages: usize,
    ) -> Self {
        Self {
            adapter,
            fetcher,
            pacer,
            max_pages: max_pages.max(1),
        }
    }

    /// Run the walk for one search query.
    pub async fn run(&self, query: &SearchQuery) -> Result<LinkDiscovery> {
        let options = self.adapter.fetch_options();
        let mut state = CrawlState::default();
        let mut discovery = LinkDiscovery::default();
        let mut current = self.adapter.build_listing_url(query)?;

        loop {
            if state.pages_visited >= self.max_pages {
                log::warn!(
                    "Stopping pagination for {} at the {}-page safety bound",
                    self.adapter.id(),
                    self.max_pages
                );
                discovery.truncated = true;
                break;
            }

            if state.pages_visited > 0 {
                self.pacer.pause().await;
            }

            let fetched = self.fetcher.fetch(&current, &options).await?;
            let page_index = state.pages_visited;
            state.pages_visited += 1;

            let page = ListingPage {
                url: fetched.url,
                body: fetched.body,
                fetched_at: fetched.fetched_at,
            };

            let found = self.adapter.extract_detail_links(&page, page_index)?;
            let found_count = found.len();
            let mut new_count = 0;
            for link in found {
                if state.seen.insert(link.url.clone()) {
                    discovery.links.push(link);
                    new_count += 1;
                }
            }
            log::debug!(
                "{} listing page {}: {} links, {} new",
                self.adapter.id(),
                page_index,
                found_count,
                new_count
            );

            match self.adapter.find_next_page(&page)? {
                Some(next) => current = next,
                None => break,
            }
        }

        discovery.pages_visited = state.pages_visited;
        log::info!(
            "{}: discovered {} detail links across {} listing pages",
            self.adapter.id(),
            discovery.links.len(),
            discovery.pages_visited
        );
        Ok(discovery)
    }
}
