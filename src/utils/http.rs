// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::header::{COOKIE, HeaderMap, HeaderValue};

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;

/// Create the shared asynchronous HTTP session.
///
/// The client-wide timeout is the navigation budget; callers bound body reads
/// separately with the content budget.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    if let Some(cookie) = config.session_cookie.as_deref().filter(|c| !c.trim().is_empty()) {
        let mut value = HeaderValue::from_str(cookie.trim())
            .map_err(|e| AppError::config(format!("crawler.session_cookie is not a valid header: {e}")))?;
        value.set_sensitive(true);
        headers.insert(COOKIE, value);
    }

    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(config.navigation_timeout_secs))
        .timeout(Duration::from_secs(
            config.navigation_timeout_secs + config.content_timeout_secs,
        ))
        .build()?;
    Ok(client)
}
