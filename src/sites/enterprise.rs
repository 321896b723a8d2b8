// src/sites/enterprise.rs

//! Adapter for enterprise career sites (SuccessFactors-style).
//!
//! Listing pages are server-rendered tables with a country facet in the
//! search URL and a `Next` pagination link; detail pages carry their
//! fields in `data-careersite-propertyid` spans.

use std::collections::HashSet;

use scraper::Html;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{DetailLink, DetailPage, ListingPage, RawFieldMap, SearchQuery};
use crate::utils::resolve_url;

use super::{SiteAdapter, document_text, parse_selector};

/// Country name -> facet code accepted by the search URL.
const COUNTRY_CODES: &[(&str, &str)] = &[
    ("united states", "US"),
    ("united kingdom", "GB"),
    ("canada", "CA"),
    ("germany", "DE"),
    ("india", "IN"),
    ("australia", "AU"),
    ("france", "FR"),
    ("japan", "JP"),
    ("china", "CN"),
    ("south africa", "ZA"),
];

fn country_code(country: &str) -> Option<&'static str> {
    let needle = country.trim().to_lowercase();
    COUNTRY_CODES
        .iter()
        .find(|(name, _)| *name == needle)
        .map(|(_, code)| *code)
}

pub struct EnterpriseCareerSite {
    id: String,
    base_url: Url,
}

impl EnterpriseCareerSite {
    pub fn new(id: impl Into<String>, base_url: &str) -> Result<Self> {
        Ok(Self {
            id: id.into(),
            base_url: Url::parse(base_url)?,
        })
    }
}

impl SiteAdapter for EnterpriseCareerSite {
    fn id(&self) -> &str {
        &self.id
    }

    fn build_listing_url(&self, query: &SearchQuery) -> Result<String> {
        let country = query
            .country
            .as_deref()
            .ok_or_else(|| AppError::validation("country is required for this site"))?;
        let code = country_code(country)
            .ok_or_else(|| AppError::validation(format!("Unsupported country: {country}")))?;

        let keyword = query.keyword.as_deref().unwrap_or("");
        let mut url = self.base_url.join("/search/")?;
        url.set_query(Some(&format!(
            "createNewAlert=false&q={}&locationsearch=&optionsFacetsDD_country={}",
            keyword, code
        )));
        Ok(url.to_string())
    }

    fn extract_detail_links(
        &self,
        page: &ListingPage,
        page_index: usize,
    ) -> Result<Vec<DetailLink>> {
        let row_sel = parse_selector("tr.data-row")?;
        let link_sel = parse_selector("a.jobTitle-link")?;

        let document = Html::parse_document(&page.body);
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for row in document.select(&row_sel) {
            let Some(href) = row
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
        let next_sel = parse_selector(r#"a.pagination-link[aria-label="Next"]"#)?;
        let document = Html::parse_document(&page.body);

        Ok(document
            .select(&next_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| resolve_url(&self.base_url, href)))
    }

    fn extract_fields(&self, page: &DetailPage) -> Result<RawFieldMap> {
        let document = Html::parse_document(&page.body);

        let mut fields = RawFieldMap::new();
        for (name, selector) in [
            ("title", r#"span[data-careersite-propertyid="title"]"#),
            ("city", r#"span[data-careersite-propertyid="city"]"#),
            (
                "other_locations",
                r#"span[data-careersite-propertyid="customfield3"]"#,
            ),
            (
                "salary",
                r#"div.custom__view__job-page__salary span[lang="en-US"]"#,
            ),
            ("date", r#"span[data-careersite-propertyid="date"]"#),
            (
                "description",
                r#"span[data-careersite-propertyid="description"]"#,
            ),
        ] {
            let sel = parse_selector(selector)?;
            fields.insert(name, document_text(&document, &sel));
        }

        Ok(fields)
    }
}
