// src/error.rs

//! Unified error handling for the crawler application.

use std::fmt;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// HTTP client construction failed
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// Request did not complete within the deadline
    #[error("Timeout fetching {url}")]
    Timeout { url: String },

    /// Connection-level failure (DNS, refused, reset, TLS)
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    /// Server responded with a non-success status
    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    /// Request was redirected to a login page
    #[error("Not authenticated: {url} redirected to login")]
    NotAuthenticated { url: String },

    /// Site requires a session but none was supplied
    #[error("Authentication required for site '{site}'")]
    AuthenticationRequired { site: String },

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Field extraction produced no usable data
    #[error("Extraction error for {url}: {message}")]
    Extraction { url: String, message: String },

    /// Raw fields could not be normalized into a job record
    #[error("Normalization error for {url}: {message}")]
    Normalization { url: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Crawling error
    #[error("Crawl error for {context}: {message}")]
    Crawl { context: String, message: String },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an extraction error.
    pub fn extraction(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Extraction {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a normalization error.
    pub fn normalization(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Normalization {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a crawl error with context.
    pub fn crawl(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Crawl {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Whether a retry could plausibly succeed.
    ///
    /// Timeouts, connection failures and 5xx responses are transient;
    /// 4xx responses and authentication failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Timeout { .. } | AppError::Network { .. } => true,
            AppError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
