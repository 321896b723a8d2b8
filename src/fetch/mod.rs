// src/fetch/mod.rs

//! Page fetching with timeout, retry and session support.

pub mod pacer;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::header::COOKIE;
use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;

pub use pacer::Pacer;
pub use session::{SessionCell, SessionHandle, SessionProvider};

/// Options governing a single page load.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Per-call timeout override
    pub timeout: Option<Duration>,

    /// Per-call retry attempt override
    pub retry_attempts: Option<u32>,

    /// Selector that must be present for the page to count as loaded.
    /// Client-rendered pages serve a shell first; an attempt that comes
    /// back without this selector is treated as transient and retried.
    pub wait_selector: Option<String>,

    /// Substring of the final URL that signals a redirect to a login page
    pub login_redirect: Option<String>,
}

/// A successfully loaded page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: String,

    /// Response body
    pub body: String,

    /// When the fetch completed
    pub fetched_at: DateTime<Utc>,
}

/// Fetch capability passed explicitly into the crawl engine.
///
/// Crawl logic never constructs its own client; tests drive the same code
/// paths with stub implementations.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchedPage>;
}

/// HTTP-backed page fetcher.
pub struct PageFetcher {
    client: reqwest::Client,
    config: CrawlerConfig,
    session: Option<Arc<SessionCell>>,
}

impl PageFetcher {
    /// Build a fetcher from crawler settings.
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
            session: None,
        })
    }

    /// Attach a shared session whose cookie accompanies every request.
    pub fn with_session(mut self, session: Arc<SessionCell>) -> Self {
        self.session = Some(session);
        self
    }

    async fn fetch_once(&self, url: &str, options: &FetchOptions) -> Result<FetchedPage> {
        let mut request = self.client.get(url);
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }
        if let Some(cell) = &self.session {
            if let Some(cookie) = cell.cookie_header().await {
                request = request.header(COOKIE, cookie);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_request_error(url, e))?;
        let final_url = response.url().to_string();

        if let Some(pattern) = &options.login_redirect {
            if final_url.contains(pattern.as_str()) {
                return Err(AppError::NotAuthenticated { url: url.to_string() });
            }
        }

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                url: final_url,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_request_error(url, e))?;

        if let Some(selector) = &options.wait_selector {
            if !has_selector(&body, selector)? {
                // Shell page without the expected content; retried like a
                // timeout since the render may simply not be served yet
                return Err(AppError::Timeout {
                    url: final_url.clone(),
                });
            }
        }

        Ok(FetchedPage {
            url: final_url,
            body,
            fetched_at: Utc::now(),
        })
    }
}

#[async_trait]
impl Fetcher for PageFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<FetchedPage> {
        let retries = options.retry_attempts.unwrap_or(self.config.retry_attempts);
        let mut delay = Duration::from_millis(self.config.retry_base_delay_ms);

        for attempt in 0..=retries {
            match self.fetch_once(url, options).await {
                Ok(page) => return Ok(page),
                Err(error) if error.is_transient() && attempt < retries => {
                    let jittered = delay + jitter(delay);
                    log::debug!(
                        "Transient failure fetching {} (attempt {}/{}): {}. Retrying in {:?}",
                        url,
                        attempt + 1,
                        retries + 1,
                        error,
                        jittered
                    );
                    tokio::time::sleep(jittered).await;
                    delay = delay.mul_f64(self.config.retry_backoff_factor);
                }
                Err(error) => return Err(error),
            }
        }

        unreachable!("loop returns on the final attempt")
    }
}

/// Random jitter up to half the current delay, to spread retry herds.
fn jitter(delay: Duration) -> Duration {
    let max = (delay.as_millis() / 2) as u64;
    if max == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max))
}

/// Check a body for the presence of a CSS selector.
fn has_selector(body: &str, selector: &str) -> Result<bool> {
    let parsed =
        Selector::parse(selector).map_err(|e| AppError::selector(selector, format!("{e:?}")))?;
    let document = Html::parse_document(body);
    Ok(document.select(&parsed).next().is_some())
}

fn classify_request_error(url: &str, error: reqwest::Error) -> AppError {
    if error.is_timeout() {
        AppError::Timeout {
            url: url.to_string(),
        }
    } else {
        AppError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
