//! First contact with a source.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{MonitorStatus, SourceDescriptor};
use crate::monitor::BoundedFetcher;
use crate::storage::StateStore;

/// Records the newest post of a new source as its cursor without reporting
/// anything as new.
#[derive(Clone)]
pub struct BaselineEstablisher {
    fetcher: BoundedFetcher,
    store: Arc<dyn StateStore>,
}

impl BaselineEstablisher {
    pub fn new(fetcher: BoundedFetcher, store: Arc<dyn StateStore>) -> Self {
        Self { fetcher, store }
    }

    /// Fetch page 1 and store its first item with `baseline_set`.
    ///
    /// Returns the recorded cursor, or `None` when the page was empty and the
    /// source stays unbaselined until the next cycle.
    pub async fn establish(
        &self,
        source: &SourceDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let items = self.fetcher.fetch(source, 1, cancel).await?;

        let Some(newest) = items.first() else {
            log::info!(
                "No posts on first page of {} ({}), baseline deferred",
                source.label(),
                source.platform
            );
            return Ok(None);
        };

        self.store
            .set(
                source.source_id,
                &source.platform,
                &newest.id,
                MonitorStatus::BaselineSet,
            )
            .await?;
        log::info!(
            "Baseline set for {} ({}) at {}, skipping {} existing posts",
            source.label(),
            source.platform,
            newest.id,
            items.len()
        );
        Ok(Some(newest.id.clone()))
    }
}
