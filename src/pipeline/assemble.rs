// src/pipeline/assemble.rs

//! Wiring of the HTTP fetcher, JSON store, login probe and notifier.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::Config;
use crate::monitor::{AdaptiveRateLimiter, AuthStatusCache, EventBus, SourceScanOrchestrator};
use crate::services::{
    AuthProbe, HttpAuthProbe, HttpPageFetcher, LogNotifier, Notifier, RetryingProbe, StaticProbe,
    WebhookNotifier,
};
use crate::storage::{JsonStateStore, StateStore};
use crate::utils::http;
use crate::utils::memory::SystemMemoryPressure;

/// A ready-to-run monitor.
pub struct Monitor {
    pub orchestrator: SourceScanOrchestrator,
    pub notifier: Box<dyn Notifier>,
    pub store: Arc<dyn StateStore>,
    pub events: EventBus,
}

/// Build a monitor from configuration. `cancel` stops in-flight cycles.
pub fn build_monitor(config: &Config, cancel: CancellationToken) -> Result<Monitor> {
    let client = http::create_async_client(&config.crawler)?;

    let fetcher = Arc::new(HttpPageFetcher::new(
        client.clone(),
        &config.crawler,
        &config.boards,
    )?);
    let store: Arc<dyn StateStore> = Arc::new(JsonStateStore::new(&config.paths.state_file));

    let probe: Arc<dyn AuthProbe> = match config.auth.probe_url {
        Some(_) => Arc::new(RetryingProbe::new(
            HttpAuthProbe::new(client.clone(), &config.auth)?,
            config.auth.attempts,
            Duration::from_millis(config.auth.retry_backoff_ms),
        )),
        None => {
            log::info!("No auth.probe_url configured, assuming the session is logged in");
            Arc::new(StaticProbe(true))
        }
    };

    let events = EventBus::default();
    let auth = AuthStatusCache::new(probe)
        .with_revalidate_after(config.auth.revalidate_after_secs.map(Duration::from_secs))
        .with_events(events.clone());

    let limiter = AdaptiveRateLimiter::new(
        config.rate_limit.clone(),
        Arc::new(SystemMemoryPressure::new(config.memory.clone())),
    );

    let orchestrator =
        SourceScanOrchestrator::new(config, fetcher, store.clone(), Arc::new(auth), limiter)
            .with_events(events.clone())
            .with_cancellation(cancel);

    let notifier: Box<dyn Notifier> = match &config.notify.webhook_url {
        Some(url) => Box::new(WebhookNotifier::new(client, url.clone())),
        None => Box::new(LogNotifier),
    };

    Ok(Monitor {
        orchestrator,
        notifier,
        store,
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthConfig, BoardConfig, ListSelectors, PathsConfig};

    fn config(dir: &std::path::Path) -> Config {
        Config {
            paths: PathsConfig {
                state_file: dir.join("state.json").display().to_string(),
                sources_file: dir.join("sources.toml").display().to_string(),
            },
            boards: vec![BoardConfig {
                platform: "cafe".to_string(),
                list_url: "https://board.example.com/{author}?page={page}".to_string(),
                selectors: ListSelectors::default(),
                fallback_selectors: vec![ListSelectors::fallback()],
                id_pattern: r"articleid=(\d+)".to_string(),
            }],
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_build_without_probe_assumes_login() {
        let dir = tempfile::tempdir().unwrap();
        let monitor = build_monitor(&config(dir.path()), CancellationToken::new()).unwrap();
        assert!(monitor.orchestrator.auth().ensure_authenticated().await);
        assert!(monitor.store.list().await.unwrap().is_empty());
    }

    #[test]
    fn test_build_rejects_bad_probe_selector() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.auth = AuthConfig {
            probe_url: Some("https://board.example.com/".to_string()),
            logged_in_selector: "[[".to_string(),
            ..AuthConfig::default()
        };
        assert!(build_monitor(&config, CancellationToken::new()).is_err());
    }
}
