//! Session authentication probes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::AuthConfig;
use crate::services::AuthProbe;

/// Loads a page behind the session and looks for a logged-in marker element.
pub struct HttpAuthProbe {
    client: Client,
    probe_url: String,
    marker: String,
    timeout: Duration,
}

impl HttpAuthProbe {
    pub fn new(client: Client, config: &AuthConfig) -> Result<Self> {
        let probe_url = config
            .probe_url
            .clone()
            .ok_or_else(|| AppError::config("auth.probe_url is not set"))?;
        Selector::parse(&config.logged_in_selector)
            .map_err(|e| AppError::selector(&config.logged_in_selector, format!("{e:?}")))?;

        Ok(Self {
            client,
            probe_url,
            marker: config.logged_in_selector.clone(),
            timeout: Duration::from_secs(config.probe_timeout_secs),
        })
    }

    fn has_marker(&self, html: &str) -> Result<bool> {
        let selector = Selector::parse(&self.marker)
            .map_err(|e| AppError::selector(&self.marker, format!("{e:?}")))?;
        let document = Html::parse_document(html);
        Ok(document.select(&selector).next().is_some())
    }
}

#[async_trait]
impl AuthProbe for HttpAuthProbe {
    async fn check(&self) -> Result<bool> {
        let request = async {
            let response = self
                .client
                .get(&self.probe_url)
                .send()
                .await?
                .error_for_status()?;
            response.text().await
        };

        let html = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| AppError::auth(format!("probe exceeded {:?}", self.timeout)))??;

        self.has_marker(&html)
    }
}

/// Retries a probe that errors. A definitive `Ok` answer is returned as is.
pub struct RetryingProbe<P> {
    inner: P,
    attempts: u32,
    backoff: Duration,
}

impl<P: AuthProbe> RetryingProbe<P> {
    pub fn new(inner: P, attempts: u32, backoff: Duration) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            backoff,
        }
    }
}

#[async_trait]
impl<P: AuthProbe> AuthProbe for RetryingProbe<P> {
    async fn check(&self) -> Result<bool> {
        let mut attempt = 1;
        loop {
            match self.inner.check().await {
                Ok(authenticated) => return Ok(authenticated),
                Err(e) if attempt < self.attempts => {
                    log::warn!(
                        "Auth probe attempt {}/{} failed: {}",
                        attempt,
                        self.attempts,
                        e
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Fixed answer, used when no probe URL is configured.
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe(pub bool);

#[async_trait]
impl AuthProbe for StaticProbe {
    async fn check(&self) -> Result<bool> {
        Ok(self.0)
    }
}
