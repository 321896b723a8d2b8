// src/sites/portal.rs

//! Adapter for authenticated listing portals.
//!
//! The portal serves nothing without a logged-in session: every request
//! carries the session cookie, and a redirect to the login page means the
//! session is gone. Pagination is numbered (`?page=N`) with no explicit
//! "next" control; the walk continues while pages keep yielding cards.

use std::collections::HashSet;

use scraper::Html;
use url::Url;

use crate::error::Result;
use crate::fetch::FetchOptions;
use crate::models::{DetailLink, DetailPage, ListingPage, RawFieldMap, SearchQuery};
use crate::utils::resolve_url;

use super::{SiteAdapter, document_text, parse_selector};

const CARD_SELECTOR: &str = r#"div[data-hook^="job-result-card"]"#;

pub struct AuthenticatedPortalSite {
    id: String,
    base_url: Url,
}

impl AuthenticatedPortalSite {
    pub fn new(id: impl Into<String>, base_url: &str) -> Result<Self> {
        Ok(Self {
            id: id.into(),
            base_url: Url::parse(base_url)?,
        })
    }

    fn listing_url(&self, page_number: u32) -> Result<String> {
        let mut url = self.base_url.join("/job-search")?;
        url.set_query(Some(&format!("page={page_number}")));
        Ok(url.to_string())
    }

    /// Page number of a listing URL, defaulting to 1.
    fn page_number(url_str: &str) -> u32 {
        Url::parse(url_str)
            .ok()
            .and_then(|u| {
                u.query_pairs()
                    .find(|(k, _)| k == "page")
                    .and_then(|(_, v)| v.parse().ok())
            })
            .unwrap_or(1)
    }

    fn card_count(body: &str) -> Result<usize> {
        let card_sel = parse_selector(CARD_SELECTOR)?;
        let document = Html::parse_document(body);
        Ok(document.select(&card_sel).count())
    }
}

impl SiteAdapter for AuthenticatedPortalSite {
    fn id(&self) -> &str {
        &self.id
    }

    fn requires_session(&self) -> bool {
        true
    }

    fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            wait_selector: Some(CARD_SELECTOR.to_string()),
            login_redirect: Some("/login".to_string()),
            ..FetchOptions::default()
        }
    }

    fn build_listing_url(&self, _query: &SearchQuery) -> Result<String> {
        self.listing_url(1)
    }

    fn extract_detail_links(
        &self,
        page: &ListingPage,
        page_index: usize,
    ) -> Result<Vec<DetailLink>> {
        let card_sel = parse_selector(CARD_SELECTOR)?;
        let link_sel = parse_selector(r#"a[href*="/jobs/"]"#)?;

        let document = Html::parse_document(&page.body);
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for card in document.select(&card_sel) {
            let Some(href) = card
                .select(&link_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
            else {
                continue;
            };

            let absolute = resolve_url(&self.base_url, href);
            if seen.insert(absolute.clone()) {
                links.push(DetailLink {
                    url: absolute,
                    site: self.id.clone(),
                    page_index,
                });
            }
        }

        Ok(links)
    }

    fn find_next_page(&self, page: &ListingPage) -> Result<Option<String>> {
        // An empty results page marks the end of the numbered walk
        if Self::card_count(&page.body)? == 0 {
            return Ok(None);
        }
        let next = Self::page_number(&page.url) + 1;
        Ok(Some(self.listing_url(next)?))
    }

    fn extract_fields(&self, page: &DetailPage) -> Result<RawFieldMap> {
        let document = Html::parse_document(&page.body);

        let mut fields = RawFieldMap::new();
        for (name, selector) in [
            ("title", r#"div[data-hook="job-title"]"#),
            ("company", r#"span[data-hook="job-company"]"#),
            ("location", r#"span[data-hook="job-location"]"#),
            ("date_posted", r#"span[data-hook="job-posted"]"#),
            ("description", r#"div[data-hook="job-description"]"#),
        ] {
            let sel = parse_selector(selector)?;
            fields.insert(name, document_text(&document, &sel));
        }

        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn adapter() -> AuthenticatedPortalSite {
        AuthenticatedPortalSite::new("campus", "https://campus.portal.test").unwrap()
    }

    fn listing(url: &str, body: &str) -> ListingPage {
        ListingPage {
            url: url.to_string(),
            body: body.to_string(),
            fetched_at: Utc::now(),
        }
    }

    const CARDS: &str = r#"
        <div data-hook="job-result-card | 7001">
          <a href="/jobs/7001?searchId=abc">Junior Analyst</a>
        </div>
        <div data-hook="job-result-card | 7002">
          <a href="/jobs/7002">QA Intern</a>
        </div>
    "#;

    #[test]
    fn requires_session_and_declares_login_pattern() {
        let a = adapter();
        assert!(a.requires_session());
        assert_eq!(a.fetch_options().login_redirect.as_deref(), Some("/login"));
    }

    #[test]
    fn first_listing_url_is_page_one() {
        let url = adapter().build_listing_url(&SearchQuery::default()).unwrap();
        assert_eq!(url, "https://campus.portal.test/job-search?page=1");
    }

    #[test]
    fn card_links_are_absolute_and_deduplicated() {
        let page = listing("https://campus.portal.test/job-search?page=1", CARDS);
        let links = adapter().extract_detail_links(&page, 0).unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(
            links[0].url,
            "https://campus.portal.test/jobs/7001?searchId=abc"
        );
        assert_eq!(links[1].url, "https://campus.portal.test/jobs/7002");
    }

    #[test]
    fn next_page_increments_while_cards_remain() {
        let page = listing("https://campus.portal.test/job-search?page=3", CARDS);
        assert_eq!(
            adapter().find_next_page(&page).unwrap(),
            Some("https://campus.portal.test/job-search?page=4".to_string())
        );
    }

    #[test]
    fn empty_page_ends_the_walk() {
        let page = listing(
            "https://campus.portal.test/job-search?page=4",
            "<html><body>no results</body></html>",
        );
        assert_eq!(adapter().find_next_page(&page).unwrap(), None);
    }

    #[test]
    fn extracts_card_fields_from_detail() {
        let detail = DetailPage {
            link: DetailLink {
                url: "https://campus.portal.test/jobs/7001".to_string(),
                site: "campus".to_string(),
                page_index: 0,
            },
            url: "https://campus.portal.test/jobs/7001".to_string(),
            body: r#"
                <div data-hook="job-title">Junior Analyst</div>
                <span data-hook="job-company">Northwind</span>
                <span data-hook="job-location">Dallas, TX</span>
                <div data-hook="job-description">Entry level analyst role.</div>
            "#
            .to_string(),
            fetched_at: Utc::now(),
        };

        let fields = adapter().extract_fields(&detail).unwrap();
        assert_eq!(fields.get("title"), Some("Junior Analyst"));
        assert_eq!(fields.get("company"), Some("Northwind"));
        assert_eq!(fields.get("date_posted"), None);
        assert!(fields.contains_key("date_posted"));
    }
}
