//! Incremental content monitoring.
//!
//! # Flow
//!
//! ```text
//! SourceScanOrchestrator::scan_cycle
//!   ├─ AuthStatusCache::ensure_authenticated   (false -> empty cycle)
//!   └─ per enabled source, sequentially
//!        ├─ BaselineEstablisher   (no cursor yet: record newest, emit nothing)
//!        ├─ IncrementalFetcher    (page until the cursor, budgets apply)
//!        └─ AdaptiveRateLimiter   (delay before the next source)
//! ```
//!
//! Page fetches, the inter-page delay and the inter-source delay are the only
//! suspension points. Each of them observes the cycle's cancellation token.

pub mod auth;
pub mod baseline;
pub mod compare;
pub mod events;
pub mod incremental;
pub mod orchestrator;
pub mod rate_limit;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{AppError, FetchError, FetchErrorKind, Result};
use crate::models::{ContentItem, SourceDescriptor};
use crate::services::PageFetcher;

pub use auth::{AuthSnapshot, AuthStatusCache};
pub use baseline::BaselineEstablisher;
pub use compare::{compare_ids, is_numeric_id};
pub use events::{EventBus, MonitorEvent};
pub use incremental::{IncrementalFetcher, ScanBudget};
pub use orchestrator::{CycleReport, ScanOutcome, SourceReport, SourceScanOrchestrator};
pub use rate_limit::AdaptiveRateLimiter;

/// [`PageFetcher`] wrapper that bounds every fetch in time and observes
/// cancellation.
#[derive(Clone)]
pub struct BoundedFetcher {
    inner: Arc<dyn PageFetcher>,
    timeout: Duration,
}

impl BoundedFetcher {
    pub fn new(inner: Arc<dyn PageFetcher>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// Fetch one page.
    ///
    /// Blocked and parse-empty pages come back as an empty list. Timeout and
    /// navigation failures are errors.
    pub async fn fetch(
        &self,
        source: &SourceDescriptor,
        page: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContentItem>> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let fetched = tokio::select! {
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            fetched = tokio::time::timeout(self.timeout, self.inner.fetch_page(source, page)) => fetched,
        };

        match fetched {
            Ok(Ok(items)) => Ok(items),
            Ok(Err(e)) if e.kind.is_empty_page() => {
                log::debug!("{}, treating as empty page", e);
                Ok(Vec::new())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(FetchError::new(
                FetchErrorKind::Timeout,
                source.source_id,
                page,
                format!("no response within {:?}", self.timeout),
            )
            .into()),
        }
    }
}

/// Sleep for `duration` unless cancelled first.
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(AppError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
