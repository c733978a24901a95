// src/pipeline/schedule.rs

//! Scan scheduling.

use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::models::SourceDescriptor;
use crate::monitor::CycleReport;
use crate::pipeline::Monitor;

/// Run one cycle and deliver notifications for what it found.
pub async fn run_once(monitor: &Monitor, sources: &[SourceDescriptor]) -> CycleReport {
    let report = monitor.orchestrator.scan_cycle(sources).await;
    if report.new_item_count() > 0 {
        let delivered = monitor
            .orchestrator
            .notify(&report, monitor.notifier.as_ref())
            .await;
        log::info!(
            "Delivered {}/{} notification(s)",
            delivered,
            report.new_item_count()
        );
    }
    report
}

/// Run cycles every `interval` until the orchestrator's token is cancelled.
///
/// A cycle that overruns the interval delays the next tick rather than
/// triggering a burst. Returns the number of completed cycles.
pub async fn run_loop(
    monitor: &Monitor,
    sources: &[SourceDescriptor],
    interval: Duration,
) -> usize {
    let cancel = monitor.orchestrator.cancellation_token();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log::info!(
        "Monitoring {} source(s) every {:?}",
        sources.iter().filter(|s| s.enabled).count(),
        interval
    );

    let mut cycles = 0;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let report = run_once(monitor, sources).await;
        if report.cancelled {
            break;
        }
        cycles += 1;
    }

    log::info!("Monitor stopped after {cycles} cycle(s)");
    cycles
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::models::Config;
    use crate::monitor::testing::{
        CountingProbe, DeliveryOutcome, ProbeOutcome, RecordingNotifier, ScriptedFetcher, source,
    };
    use crate::monitor::{AdaptiveRateLimiter, AuthStatusCache, EventBus, SourceScanOrchestrator};
    use crate::services::Notifier;
    use crate::storage::{MemoryStateStore, StateStore};
    use crate::utils::memory::{FixedPressure, PressureLevel};

    struct SharedNotifier(Arc<RecordingNotifier>);

    #[async_trait::async_trait]
    impl Notifier for SharedNotifier {
        async fn deliver(
            &self,
            notification: &crate::models::Notification,
        ) -> crate::error::Result<bool> {
            self.0.deliver(notification).await
        }
    }

    fn monitor(
        fetcher: Arc<ScriptedFetcher>,
        notifier: Arc<RecordingNotifier>,
        cancel: CancellationToken,
    ) -> Monitor {
        let config = Config::default();
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let orchestrator = SourceScanOrchestrator::new(
            &config,
            fetcher,
            store.clone(),
            Arc::new(AuthStatusCache::new(Arc::new(CountingProbe::new(
                ProbeOutcome::LoggedIn,
            )))),
            AdaptiveRateLimiter::new(
                config.rate_limit.clone(),
                Arc::new(FixedPressure(PressureLevel::Normal)),
            ),
        )
        .with_cancellation(cancel);

        Monitor {
            orchestrator,
            notifier: Box::new(SharedNotifier(notifier)),
            store,
            events: EventBus::default(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_once_delivers_new_posts() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let notifier = Arc::new(RecordingNotifier::new(DeliveryOutcome::Accept));
        let monitor = monitor(fetcher.clone(), notifier.clone(), CancellationToken::new());
        let sources = [source(1)];

        fetcher.set_page(1, 1, &["40", "39"]);
        run_once(&monitor, &sources).await;
        assert!(notifier.received().is_empty());

        fetcher.set_page(1, 1, &["42", "41", "40"]);
        let report = run_once(&monitor, &sources).await;
        assert_eq!(report.new_item_count(), 2);

        let delivered: Vec<_> = notifier
            .received()
            .into_iter()
            .map(|n| n.content_id)
            .collect();
        assert_eq!(delivered, vec!["42", "41"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_stops_on_cancel() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let notifier = Arc::new(RecordingNotifier::new(DeliveryOutcome::Accept));
        let cancel = CancellationToken::new();
        let monitor = monitor(fetcher.clone(), notifier, cancel.clone());
        fetcher.set_page(1, 1, &["1"]);

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(150)).await;
            cancel.cancel();
        });
        let cycles = run_loop(&monitor, &[source(1)], Duration::from_secs(60)).await;
        stopper.await.unwrap();

        // Ticks at 0s, 60s and 120s
        assert_eq!(cycles, 3);
        assert_eq!(fetcher.pages_fetched(1).len(), 3);
    }
}
