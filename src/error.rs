// src/error.rs

//! Unified error handling for the monitor.

use std::fmt;

use thiserror::Error;

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Page fetch failed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Authentication probe failed
    #[error("Auth error: {0}")]
    Auth(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Shutdown was requested while work was in flight
    #[error("Operation cancelled")]
    Cancelled,
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create an authentication error.
    pub fn auth(message: impl fmt::Display) -> Self {
        Self::Auth(message.to_string())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// The fetch error kind, if this error came from a page fetch.
    pub fn fetch_kind(&self) -> Option<FetchErrorKind> {
        match self {
            Self::Fetch(e) => Some(e.kind),
            _ => None,
        }
    }
}

/// Coarse classification of a page fetch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// The fetch did not finish within its time budget
    Timeout,
    /// DNS, connection or other navigation-level failure
    NavigationFailed,
    /// The source refused the request (403, 429, captcha wall)
    Blocked,
    /// The page loaded but no selector set matched any rows
    ParseEmpty,
}

impl FetchErrorKind {
    /// Blocked and parse-empty pages are a normal "no items" stop, not a failure.
    pub fn is_empty_page(self) -> bool {
        matches!(self, Self::Blocked | Self::ParseEmpty)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::NavigationFailed => "navigation_failed",
            Self::Blocked => "blocked",
            Self::ParseEmpty => "parse_empty",
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by a [`PageFetcher`](crate::services::PageFetcher).
#[derive(Error, Debug, Clone)]
#[error("Fetch {kind} for source {source_id} page {page}: {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub source_id: i64,
    pub page: u32,
    pub message: String,
}

impl FetchError {
    pub fn new(
        kind: FetchErrorKind,
        source_id: i64,
        page: u32,
        message: impl fmt::Display,
    ) -> Self {
        Self {
            kind,
            source_id,
            page,
            message: message.to_string(),
        }
    }

    /// Classify a reqwest failure.
    pub fn from_reqwest(source_id: i64, page: u32, error: &reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            FetchErrorKind::Timeout
        } else {
            match error.status().map(|s| s.as_u16()) {
                Some(401 | 403 | 429) => FetchErrorKind::Blocked,
                _ => FetchErrorKind::NavigationFailed,
            }
        };
        Self::new(kind, source_id, page, error)
    }
}
