// src/monitor/orchestrator.rs

//! One monitoring cycle over all enabled sources.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, FetchErrorKind, Result};
use crate::models::{Config, ContentItem, Notification, SourceDescriptor};
use crate::monitor::{
    AdaptiveRateLimiter, AuthStatusCache, BaselineEstablisher, BoundedFetcher, EventBus,
    IncrementalFetcher, MonitorEvent, ScanBudget, sleep_or_cancel,
};
use crate::services::{Notifier, PageFetcher};
use crate::storage::StateStore;

/// What happened to one source during a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// First contact: cursor recorded, nothing reported
    Baselined { content_id: String },
    /// First contact, but page 1 was empty
    BaselineDeferred,
    /// Incremental scan finished
    Checked { new_items: usize },
    /// Scan aborted; the cursor did not move
    Failed {
        #[serde(skip_serializing_if = "Option::is_none")]
        kind: Option<&'static str>,
        message: String,
    },
    /// Shutdown interrupted the scan
    Cancelled,
}

impl ScanOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: SourceDescriptor,
    #[serde(flatten)]
    pub outcome: ScanOutcome,
    /// New items, newest first
    pub items: Vec<ContentItem>,
}

/// Result of [`SourceScanOrchestrator::scan_cycle`].
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// False when the auth check short-circuited the cycle
    pub authenticated: bool,
    /// Another cycle was already running
    pub skipped: bool,
    pub cancelled: bool,
    pub sources: Vec<SourceReport>,
}

impl CycleReport {
    fn begin() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            authenticated: false,
            skipped: false,
            cancelled: false,
            sources: Vec::new(),
        }
    }

    fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    pub fn new_item_count(&self) -> usize {
        self.sources.iter().map(|s| s.items.len()).sum()
    }

    pub fn failure_count(&self) -> usize {
        self.sources.iter().filter(|s| s.outcome.is_failure()).count()
    }

    /// All new items, sources in scan order, newest first within a source.
    pub fn items(&self) -> impl Iterator<Item = &ContentItem> {
        self.sources.iter().flat_map(|s| s.items.iter())
    }

    pub fn into_items(self) -> Vec<ContentItem> {
        self.sources.into_iter().flat_map(|s| s.items).collect()
    }
}

/// Extra wait after a failed source, on top of the limiter delay.
#[derive(Debug, Clone, Copy)]
struct Backoff {
    timeout: Duration,
    navigation: Duration,
}

impl Backoff {
    fn after(&self, kind: Option<FetchErrorKind>) -> Duration {
        match kind {
            Some(FetchErrorKind::Timeout) => self.timeout,
            Some(FetchErrorKind::NavigationFailed) => self.navigation,
            _ => Duration::ZERO,
        }
    }
}

/// Drives scan cycles. Store, fetcher, probe and limiter are injected.
pub struct SourceScanOrchestrator {
    auth: Arc<AuthStatusCache>,
    store: Arc<dyn StateStore>,
    baseline: BaselineEstablisher,
    incremental: IncrementalFetcher,
    limiter: AdaptiveRateLimiter,
    backoff: Backoff,
    template: String,
    events: EventBus,
    cycle_lock: Mutex<()>,
    cancel: CancellationToken,
}

impl SourceScanOrchestrator {
    pub fn new(
        config: &Config,
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn StateStore>,
        auth: Arc<AuthStatusCache>,
        limiter: AdaptiveRateLimiter,
    ) -> Self {
        let fetch_timeout = Duration::from_secs(
            config.crawler.navigation_timeout_secs + config.crawler.content_timeout_secs,
        );
        let bounded = BoundedFetcher::new(fetcher, fetch_timeout);

        Self {
            baseline: BaselineEstablisher::new(bounded.clone(), store.clone()),
            incremental: IncrementalFetcher::new(
                bounded,
                store.clone(),
                ScanBudget::from(&config.monitor),
            ),
            auth,
            store,
            limiter,
            backoff: Backoff {
                timeout: Duration::from_millis(config.monitor.timeout_backoff_ms),
                navigation: Duration::from_millis(config.monitor.navigation_backoff_ms),
            },
            template: config.notify.template.clone(),
            events: EventBus::default(),
            cycle_lock: Mutex::new(()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    pub fn auth(&self) -> &AuthStatusCache {
        &self.auth
    }

    /// Run one cycle and return every new item found.
    pub async fn run_cycle(&self, sources: &[SourceDescriptor]) -> Vec<ContentItem> {
        self.scan_cycle(sources).await.into_items()
    }

    /// Run one cycle and report per-source outcomes.
    ///
    /// Returns immediately with `skipped` set if another cycle holds the lock.
    pub async fn scan_cycle(&self, sources: &[SourceDescriptor]) -> CycleReport {
        let mut report = CycleReport::begin();
        let Ok(_running) = self.cycle_lock.try_lock() else {
            log::warn!("Scan cycle already in progress, skipping this trigger");
            report.skipped = true;
            return report.finish();
        };

        let enabled: Vec<&SourceDescriptor> = sources.iter().filter(|s| s.enabled).collect();
        self.events.emit(MonitorEvent::CycleStarted {
            sources: enabled.len(),
        });

        report.authenticated = self.auth.ensure_authenticated().await;
        if !report.authenticated {
            log::warn!("Session is not authenticated, skipping cycle");
            return self.complete(report);
        }

        log::info!("Scanning {} source(s)", enabled.len());
        for (index, source) in enabled.iter().enumerate() {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let (outcome, items, extra_delay) = match self.scan_source(source).await {
                Ok((outcome, items)) => (outcome, items, Duration::ZERO),
                Err(AppError::Cancelled) => (ScanOutcome::Cancelled, Vec::new(), Duration::ZERO),
                Err(e) => {
                    let kind = e.fetch_kind();
                    log::warn!(
                        "Scan of {} ({}) failed: {}",
                        source.label(),
                        source.platform,
                        e
                    );
                    let outcome = ScanOutcome::Failed {
                        kind: kind.map(FetchErrorKind::as_str),
                        message: e.to_string(),
                    };
                    (outcome, Vec::new(), self.backoff.after(kind))
                }
            };

            self.events.emit(MonitorEvent::SourceScanned {
                source_id: source.source_id,
                platform: source.platform.clone(),
                new_items: items.len(),
                failed: outcome.is_failure(),
            });
            let cancelled = outcome == ScanOutcome::Cancelled;
            report.sources.push(SourceReport {
                source: (*source).clone(),
                outcome,
                items,
            });
            if cancelled {
                report.cancelled = true;
                break;
            }

            if index + 1 < enabled.len() {
                let delay = self.limiter.next_delay() + extra_delay;
                if !extra_delay.is_zero() {
                    log::info!("Backing off {delay:?} before the next source");
                }
                if sleep_or_cancel(delay, &self.cancel).await.is_err() {
                    report.cancelled = true;
                    break;
                }
            }
        }

        self.complete(report)
    }

    async fn scan_source(
        &self,
        source: &SourceDescriptor,
    ) -> Result<(ScanOutcome, Vec<ContentItem>)> {
        if self
            .store
            .needs_baseline(source.source_id, &source.platform)
            .await?
        {
            let outcome = match self.baseline.establish(source, &self.cancel).await? {
                Some(content_id) => ScanOutcome::Baselined { content_id },
                None => ScanOutcome::BaselineDeferred,
            };
            return Ok((outcome, Vec::new()));
        }

        let items = self.incremental.fetch_new(source, &self.cancel).await?;
        Ok((
            ScanOutcome::Checked {
                new_items: items.len(),
            },
            items,
        ))
    }

    fn complete(&self, report: CycleReport) -> CycleReport {
        let report = report.finish();
        log::info!(
            "Cycle finished: {} new item(s), {} failure(s){}",
            report.new_item_count(),
            report.failure_count(),
            if report.cancelled { ", cancelled" } else { "" }
        );
        self.events.emit(MonitorEvent::CycleCompleted {
            new_items: report.new_item_count(),
            failures: report.failure_count(),
            cancelled: report.cancelled,
        });
        report
    }

    /// Deliver a notification for every new item in `report`.
    ///
    /// Delivery is best-effort: cursors have already advanced and are never
    /// rolled back. Returns the number of accepted notifications.
    pub async fn notify(&self, report: &CycleReport, notifier: &dyn Notifier) -> usize {
        let mut delivered = 0;
        for source_report in &report.sources {
            for item in &source_report.items {
                let notification = Notification::new(item, &source_report.source, &self.template);
                match notifier.deliver(&notification).await {
                    Ok(true) => delivered += 1,
                    Ok(false) => log::warn!(
                        "Notification for post {} was not delivered",
                        notification.content_id
                    ),
                    Err(e) => log::warn!(
                        "Notification for post {} failed: {}",
                        notification.content_id,
                        e
                    ),
                }
            }
        }
        delivered
    }

    /// Delete a source's cursor so its next scan baselines again.
    pub async fn reset_monitor_state(&self, source_id: i64, platform: &str) -> Result<bool> {
        let removed = self.store.reset(source_id, platform).await?;
        if removed {
            log::info!("Reset monitor state for {platform}:{source_id}");
        } else {
            log::info!("No monitor state stored for {platform}:{source_id}");
        }
        Ok(removed)
    }
}
