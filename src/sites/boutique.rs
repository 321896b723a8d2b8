// src/sites/boutique.rs

//! Adapter for boutique recruiting sites with a client-rendered job list.
//!
//! The whole inventory sits on one listing page rendered after load, so
//! there is no pagination; the fetch layer is told which selector marks
//! the list as actually rendered.

use std::collections::HashSet;

use scraper::Html;
use url::Url;

use crate::error::Result;
use crate::fetch::FetchOptions;
use crate::models::{DetailLink, DetailPage, ListingPage, RawFieldMap, SearchQuery};
use crate::utils::resolve_url;

use super::{SiteAdapter, document_text, parse_selector};

pub struct BoutiqueListingSite {
    id: String,
    base_url: Url,
}

impl BoutiqueListingSite {
    pub fn new(id: impl Into<String>, base_url: &str) -> Result<Self> {
        Ok(Self {
            id: id.into(),
            base_url: Url::parse(base_url)?,
        })
    }
}

impl SiteAdapter for BoutiqueListingSite {
    fn id(&self) -> &str {
        &self.id
    }

    fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            wait_selector: Some("ul.JobsList_module_list".to_string()),
            ..FetchOptions::default()
        }
    }

    fn build_listing_url(&self, _query: &SearchQuery) -> Result<String> {
        Ok(self.base_url.join("/tech-jobs")?.to_string())
    }

    fn extract_detail_links(
        &self,
        page: &ListingPage,
        page_index: usize,
    ) -> Result<Vec<DetailLink>> {
        let item_sel = parse_selector("li.JobItem_module_jobItem")?;
        let link_sel = parse_selector("a[href]")?;

        let document = Html::parse_document(&page.body);
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for item in document.select(&item_sel) {
            let Some(href) = item
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

    fn find_next_page(&self, _page: &ListingPage) -> Result<Option<String>> {
        // Single rendered list, nothing to paginate
        Ok(None)
    }

    fn extract_fields(&self, page: &DetailPage) -> Result<RawFieldMap> {
        let document = Html::parse_document(&page.body);

        let mut fields = RawFieldMap::new();
        for (name, selector) in [
            ("title", "h1.JobView_module_title"),
            ("location", "div.JobView_module_jobDetailsSection > p"),
            ("salary", "p.JobDetailsItem_module_salaryText"),
            ("description", "div.JobView_module_jobDescription"),
            ("author", "p.JobView_module_author"),
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

    fn adapter() -> BoutiqueListingSite {
        BoutiqueListingSite::new("nimbus", "https://nimbusrecruiting.test").unwrap()
    }

    #[test]
    fn listing_url_ignores_query() {
        let url = adapter().build_listing_url(&SearchQuery::default()).unwrap();
        assert_eq!(url, "https://nimbusrecruiting.test/tech-jobs");
    }

    #[test]
    fn declares_render_wait_selector() {
        let options = adapter().fetch_options();
        assert_eq!(
            options.wait_selector.as_deref(),
            Some("ul.JobsList_module_list")
        );
    }

    #[test]
    fn extracts_card_links() {
        let page = ListingPage {
            url: "https://nimbusrecruiting.test/tech-jobs".to_string(),
            body: r#"
                <ul class="JobsList_module_list">
                  <li class="JobItem_module_jobItem">
                    <a href="/tech-jobs/rust-engineer-8841"><h2>Rust Engineer</h2></a>
                  </li>
                  <li class="JobItem_module_jobItem">
                    <a href="/tech-jobs/sre-8850"><h2>SRE</h2></a>
                  </li>
                  <li class="JobItem_module_jobItem">
                    <a href="/tech-jobs/rust-engineer-8841"><h2>Rust Engineer</h2></a>
                  </li>
                </ul>
            "#
            .to_string(),
            fetched_at: Utc::now(),
        };

        let links = adapter().extract_detail_links(&page, 0).unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(
            links[0].url,
            "https://nimbusrecruiting.test/tech-jobs/rust-engineer-8841"
        );
    }

    #[test]
    fn never_paginates() {
        let page = ListingPage {
            url: "https://nimbusrecruiting.test/tech-jobs".to_string(),
            body: "<html></html>".to_string(),
            fetched_at: Utc::now(),
        };
        assert_eq!(adapter().find_next_page(&page).unwrap(), None);
    }

    #[test]
    fn recruiter_line_is_a_raw_field() {
        let detail = DetailPage {
            link: DetailLink {
                url: "https://nimbusrecruiting.test/tech-jobs/rust-engineer-8841".to_string(),
                site: "nimbus".to_string(),
                page_index: 0,
            },
            url: "https://nimbusrecruiting.test/tech-jobs/rust-engineer-8841".to_string(),
            body: r#"
                <h1 class="JobView_module_title">Rust Engineer</h1>
                <div class="JobView_module_jobDetailsSection"><p>Boston, MA</p></div>
                <div class="JobView_module_jobDescription">Ship fast, safely.</div>
                <p class="JobView_module_author">Placed by Jordan Reyes</p>
            "#
            .to_string(),
            fetched_at: Utc::now(),
        };

        let fields = adapter().extract_fields(&detail).unwrap();
        assert_eq!(fields.get("title"), Some("Rust Engineer"));
        assert_eq!(fields.get("location"), Some("Boston, MA"));
        assert_eq!(fields.get("author"), Some("Placed by Jordan Reyes"));
        assert_eq!(fields.get("salary"), None);
        assert!(fields.contains_key("salary"));
    }
}
