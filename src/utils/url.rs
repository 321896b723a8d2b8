// src/utils/url.rs

//! URL manipulation utilities.

use sha2::{Digest, Sha256};
use url::Url;

use crate::error::Result;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Canonicalize a detail URL for identity comparison.
///
/// Lowercases the host, drops the fragment, and strips tracking-style query
/// parameters (utm_*, searchId, ref) that vary between discoveries of the
/// same posting.
pub fn canonicalize(url_str: &str) -> Result<String> {
    let mut parsed = Url::parse(url_str)?;

    if let Some(host) = parsed.host_str() {
        let lowered = host.to_lowercase();
        if lowered != host {
            // set_host only fails on cannot-be-a-base URLs, which parse
            // already ruled out for http(s)
            let _ = parsed.set_host(Some(&lowered));
        }
    }

    parsed.set_fragment(None);

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        let query = kept
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        parsed.set_query(Some(&query));
    }

    Ok(parsed.to_string())
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_lowercase();
    key.starts_with("utm_") || key == "searchid" || key == "ref" || key == "source"
}

/// Extract an explicit job identifier from a URL's query string or path.
fn extract_job_id(parsed: &Url) -> Option<String> {
    let mut fallback_numeric: Option<String> = None;

    for (key, value) in parsed.query_pairs() {
        if value.is_empty() {
            continue;
        }

        let key_lower = key.to_lowercase();
        let value_string = value.to_string();

        if matches!(
            key_lower.as_str(),
            "jobid" | "job_id" | "jid" | "jl" | "posting" | "posting_id" | "id"
        ) {
            return Some(value_string);
        }

        if fallback_numeric.is_none() && value_string.chars().all(|c| c.is_ascii_digit()) {
            fallback_numeric = Some(value_string);
        }
    }

    if let Some(value) = fallback_numeric {
        return Some(value);
    }

    // Trailing path segment carrying digits, e.g. /jobs/senior-engineer-48213
    if let Some(last) = parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
    {
        let digits: String = last.chars().filter(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() {
            return Some(digits);
        }
    }

    None
}

/// Derive a stable job identifier from a detail URL.
///
/// Prefers an explicit id found in the URL; falls back to a truncated
/// sha256 of the canonical URL. Re-deriving from the same URL always
/// yields the same value. Errors only when the URL cannot be parsed.
pub fn stable_job_id(url_str: &str) -> Result<String> {
    let canonical = canonicalize(url_str)?;
    let parsed = Url::parse(&canonical)?;

    if let Some(id) = extract_job_id(&parsed) {
        return Ok(id);
    }

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(&hasher.finalize()[..8]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_and_absolute() {
        let base = Url::parse("https://example.com/search/").unwrap();
        assert_eq!(
            resolve_url(&base, "job/123"),
            "https://example.com/search/job/123"
        );
        assert_eq!(resolve_url(&base, "/job/123"), "https://example.com/job/123");
        assert_eq!(
            resolve_url(&base, "https://other.com/x"),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_canonicalize_strips_tracking() {
        let canonical =
            canonicalize("https://Example.COM/jobs/123?utm_source=feed&dept=eng#apply").unwrap();
        assert_eq!(canonical, "https://example.com/jobs/123?dept=eng");
    }

    #[test]
    fn test_canonicalize_drops_empty_query() {
        let canonical = canonicalize("https://example.com/jobs/123?utm_campaign=x").unwrap();
        assert_eq!(canonical, "https://example.com/jobs/123");
    }

    #[test]
    fn test_stable_id_from_query_key() {
        assert_eq!(
            stable_job_id("https://example.com/job?jobId=9981&mode=view").unwrap(),
            "9981"
        );
    }

    #[test]
    fn test_stable_id_from_path_digits() {
        assert_eq!(
            stable_job_id("https://example.com/jobs/senior-engineer-48213").unwrap(),
            "48213"
        );
    }

    #[test]
    fn test_stable_id_hash_fallback_is_deterministic() {
        let url = "https://example.com/jobs/senior-engineer";
        let a = stable_job_id(url).unwrap();
        let b = stable_job_id(url).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_stable_id_hash_fallback_distinct_urls() {
        let a = stable_job_id("https://example.com/jobs/senior-engineer").unwrap();
        let b = stable_job_id("https://example.com/jobs/staff-engineer").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_stable_id_ignores_tracking_churn() {
        let a = stable_job_id("https://example.com/jobs/engineer?utm_source=a").unwrap();
        let b = stable_job_id("https://example.com/jobs/engineer?utm_source=b").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_stable_id_rejects_malformed_url() {
        assert!(stable_job_id("not a url").is_err());
    }
}
