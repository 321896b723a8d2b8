// src/sites/mod.rs

//! Site adapters.
//!
//! All site-specific knowledge (listing URLs, selectors, pagination shape,
//! session requirements) lives behind the [`SiteAdapter`] trait, so the
//! crawl engine stays site-agnostic. Adding a job board means writing one
//! adapter and registering it; the engine does not change.

mod boutique;
mod enterprise;
mod portal;

use std::collections::HashMap;
use std::sync::Arc;

use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::fetch::FetchOptions;
use crate::models::{DetailLink, DetailPage, ListingPage, RawFieldMap, SearchQuery};

pub use boutique::BoutiqueListingSite;
pub use enterprise::EnterpriseCareerSite;
pub use portal::AuthenticatedPortalSite;

/// Capability set every job board adapter implements.
///
/// Extraction methods are pure: they parse page content already fetched
/// and perform no I/O. Field extractors degrade to absent values rather
/// than failing when a section is missing from the markup.
pub trait SiteAdapter: Send + Sync {
    /// Stable site identifier, used as dedup namespace and sink partition.
    fn id(&self) -> &str;

    /// Whether a pre-authenticated session must be supplied before any
    /// page is fetched.
    fn requires_session(&self) -> bool {
        false
    }

    /// Fetch options every page load for this site needs (readiness
    /// selector for client-rendered pages, login-redirect pattern).
    fn fetch_options(&self) -> FetchOptions {
        FetchOptions::default()
    }

    /// Construct the first listing page URL from search parameters.
    fn build_listing_url(&self, query: &SearchQuery) -> Result<String>;

    /// Extract detail-page links from a listing page: absolute URLs,
    /// deduplicated within the page.
    fn extract_detail_links(
        &self,
        page: &ListingPage,
        page_index: usize,
    ) -> Result<Vec<DetailLink>>;

    /// Find the next listing page URL. `None` means the last page was
    /// reached and terminates pagination.
    fn find_next_page(&self, page: &ListingPage) -> Result<Option<String>>;

    /// Extract raw fields from a detail page.
    fn extract_fields(&self, page: &DetailPage) -> Result<RawFieldMap>;
}

/// Site id -> adapter, configured at process start.
#[derive(Default)]
pub struct SiteRegistry {
    adapters: HashMap<String, Arc<dyn SiteAdapter>>,
}

impl SiteRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in reference adapters.
    pub fn with_builtin() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(EnterpriseCareerSite::new(
            "ey",
            "https://careers.ey.com",
        )?));
        registry.register(Arc::new(BoutiqueListingSite::new(
            "motion",
            "https://motionrecruitment.com",
        )?));
        registry.register(Arc::new(AuthenticatedPortalSite::new(
            "handshake",
            "https://utdallas.joinhandshake.com",
        )?));
        Ok(registry)
    }

    /// Register an adapter under its own id. A later registration with
    /// the same id replaces the earlier one.
    pub fn register(&mut self, adapter: Arc<dyn SiteAdapter>) {
        self.adapters.insert(adapter.id().to_string(), adapter);
    }

    /// Look up an adapter by site id.
    pub fn get(&self, site_id: &str) -> Option<Arc<dyn SiteAdapter>> {
        self.adapters.get(site_id).cloned()
    }

    /// Registered site ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.adapters.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// Parse a CSS selector, mapping failures into the app error type.
pub(crate) fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| AppError::selector(selector, format!("{e:?}")))
}

/// First match of `selector` in the whole document, as whitespace-
/// normalized text. Missing elements and empty text both come back as
/// `None`, so extractors degrade to absent fields.
pub(crate) fn document_text(document: &Html, selector: &Selector) -> Option<String> {
    document.select(selector).next().and_then(|el| {
        let text: String = el.text().collect::<Vec<_>>().join(" ");
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.is_empty() {
            None
        } else {
            Some(normalized)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lookup_and_ids() {
        let registry = SiteRegistry::with_builtin().unwrap();
        assert!(registry.get("ey").is_some());
        assert!(registry.get("motion").is_some());
        assert!(registry.get("handshake").is_some());
        assert!(registry.get("nope").is_none());
        assert_eq!(registry.ids(), vec!["ey", "handshake", "motion"]);
    }

    #[test]
    fn registration_replaces_same_id() {
        let mut registry = SiteRegistry::new();
        registry.register(Arc::new(
            EnterpriseCareerSite::new("acme", "https://jobs.acme.test").unwrap(),
        ));
        registry.register(Arc::new(
            EnterpriseCareerSite::new("acme", "https://careers.acme.test").unwrap(),
        ));
        assert_eq!(registry.ids(), vec!["acme"]);
    }

    #[test]
    fn document_text_normalizes_whitespace() {
        let document = Html::parse_document("<p class=\"x\">  a\n  b  </p>");
        let sel = parse_selector("p.x").unwrap();
        assert_eq!(document_text(&document, &sel), Some("a b".to_string()));
    }

    #[test]
    fn document_text_empty_is_none() {
        let document = Html::parse_document("<p class=\"x\">   </p>");
        let sel = parse_selector("p.x").unwrap();
        assert_eq!(document_text(&document, &sel), None);
    }
}
