// src/pipeline/normalize.rs

//! Normalization of site-specific raw fields into canonical job records.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{AppError, Result};
use crate::models::{JobRecord, RawFieldMap};
use crate::utils::stable_job_id;

/// Raw field names each canonical field is read from, in priority order.
/// Sites disagree on naming; the first present, non-empty value wins.
const TITLE_KEYS: &[&str] = &["title"];
const COMPANY_KEYS: &[&str] = &["company"];
const LOCATION_KEYS: &[&str] = &["location", "city"];
const OTHER_LOCATION_KEYS: &[&str] = &["other_locations"];
const SALARY_KEYS: &[&str] = &["salary"];
const DATE_KEYS: &[&str] = &["posted_date", "date", "date_posted"];
const DESCRIPTION_KEYS: &[&str] = &["description"];

/// Date formats the sites are known to serve.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%b %d, %Y",
    "%B %d, %Y",
    "%m/%d/%Y",
    "%d %b %Y",
    "%d.%m.%Y",
];

/// Map raw fields into a canonical [`JobRecord`].
///
/// Pure: no I/O, deterministic for a given input. Absent and empty
/// fields become explicit `None`s; the record is rejected only when no
/// stable identity can be derived from the URL.
pub fn normalize(
    site: &str,
    url: &str,
    fields: &RawFieldMap,
    scraped_at: DateTime<Utc>,
) -> Result<JobRecord> {
    let external_id = stable_job_id(url)
        .map_err(|e| AppError::normalization(url, format!("cannot derive identity: {e}")))?;

    let raw_date = first_present(fields, DATE_KEYS);
    let (posted_date, posted_date_raw) = match &raw_date {
        Some(raw) => match parse_date(raw) {
            Some(date) => (Some(date), None),
            // Unrecognized format: keep the raw string, never discard it
            None => (None, Some(raw.clone())),
        },
        None => (None, None),
    };

    Ok(JobRecord {
        site: site.to_string(),
        external_id,
        title: first_present(fields, TITLE_KEYS),
        company: first_present(fields, COMPANY_KEYS),
        location: first_present(fields, LOCATION_KEYS),
        other_locations: first_present(fields, OTHER_LOCATION_KEYS),
        salary: first_present(fields, SALARY_KEYS),
        posted_date,
        posted_date_raw,
        description: first_present(fields, DESCRIPTION_KEYS),
        url: url.to_string(),
        scraped_at,
    })
}

/// First non-empty value among the given keys, trimmed.
fn first_present(fields: &RawFieldMap, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        fields
            .get(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    })
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}
