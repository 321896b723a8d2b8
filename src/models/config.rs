//! Application configuration structures.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Site id -> path of a saved session (cookie header) file.
    /// Only needed for sites that require an authenticated session.
    #[serde(default)]
    pub sessions: HashMap<String, PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if self.crawler.max_pages == 0 {
            return Err(AppError::validation("crawler.max_pages must be > 0"));
        }
        if self.crawler.retry_backoff_factor < 1.0 {
            return Err(AppError::validation(
                "crawler.retry_backoff_factor must be >= 1.0",
            ));
        }
        Ok(())
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Retry attempts for transient fetch failures
    #[serde(default = "defaults::retry_attempts")]
    pub retry_attempts: u32,

    /// Multiplier applied to the retry delay after each attempt
    #[serde(default = "defaults::retry_backoff_factor")]
    pub retry_backoff_factor: f64,

    /// Base delay before the first retry, in milliseconds
    #[serde(default = "defaults::retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Polite delay between requests in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Maximum concurrent detail fetches
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Hard bound on listing pages walked per run
    #[serde(default = "defaults::max_pages")]
    pub max_pages: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            retry_attempts: defaults::retry_attempts(),
            retry_backoff_factor: defaults::retry_backoff_factor(),
            retry_base_delay_ms: defaults::retry_base_delay(),
            request_delay_ms: defaults::request_delay(),
            max_concurrent: defaults::max_concurrent(),
            max_pages: defaults::max_pages(),
        }
    }
}

mod defaults {
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; jobsift/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn retry_attempts() -> u32 {
        3
    }
    pub fn retry_backoff_factor() -> f64 {
        2.0
    }
    pub fn retry_base_delay() -> u64 {
        500
    }
    pub fn request_delay() -> u64 {
        1000
    }
    pub fn max_concurrent() -> usize {
        4
    }
    pub fn max_pages() -> usize {
        50
    }
}
