//! Finding posts newer than a source's cursor.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{ContentItem, MonitorConfig, MonitorStatus, SourceDescriptor};
use crate::monitor::{BoundedFetcher, compare_ids, is_numeric_id, sleep_or_cancel};
use crate::storage::StateStore;

/// Paging limits for one incremental scan.
#[derive(Debug, Clone)]
pub struct ScanBudget {
    pub max_pages: u32,
    pub max_items: usize,
    /// Items kept when a source unexpectedly has no cursor
    pub unbaselined_item_cap: usize,
    pub page_delay: Duration,
}

impl Default for ScanBudget {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

impl From<&MonitorConfig> for ScanBudget {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            max_pages: config.max_pages,
            max_items: config.max_items,
            unbaselined_item_cap: config.unbaselined_item_cap,
            page_delay: Duration::from_millis(config.page_delay_ms),
        }
    }
}

/// Pages through a source until its cursor shows up, collecting newer posts.
#[derive(Clone)]
pub struct IncrementalFetcher {
    fetcher: BoundedFetcher,
    store: Arc<dyn StateStore>,
    budget: ScanBudget,
}

impl IncrementalFetcher {
    pub fn new(fetcher: BoundedFetcher, store: Arc<dyn StateStore>, budget: ScanBudget) -> Self {
        Self {
            fetcher,
            store,
            budget,
        }
    }

    /// Collect posts newer than the stored cursor, newest first, and advance
    /// the cursor to the first of them.
    ///
    /// A fetch error aborts the scan and leaves the cursor where it was.
    pub async fn fetch_new(
        &self,
        source: &SourceDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContentItem>> {
        let cursor = self
            .store
            .get(source.source_id, &source.platform)
            .await?
            .and_then(|state| state.last_content_id)
            .filter(|id| !id.trim().is_empty());

        let new_items = match cursor.as_deref() {
            Some(cursor) => self.collect_after(source, cursor, cancel).await?,
            None => self.collect_unbaselined(source, cancel).await?,
        };

        match new_items.first() {
            Some(newest) => {
                if leaves_numeric_order(cursor.as_deref(), &newest.id) {
                    log::warn!(
                        "Cursor of {} ({}) moves from numeric {:?} to non-numeric {:?}; \
                         numeric posts will compare older until the source is reset",
                        source.label(),
                        source.platform,
                        cursor.as_deref().unwrap_or_default(),
                        newest.id
                    );
                }
                self.store
                    .set(
                        source.source_id,
                        &source.platform,
                        &newest.id,
                        MonitorStatus::Checked,
                    )
                    .await?;
                log::info!(
                    "{} new post(s) from {} ({}), cursor now {}",
                    new_items.len(),
                    source.label(),
                    source.platform,
                    newest.id
                );
            }
            None => {
                self.store
                    .mark_checked(source.source_id, &source.platform)
                    .await?;
                log::debug!("No new posts from {} ({})", source.label(), source.platform);
            }
        }

        Ok(new_items)
    }

    async fn collect_after(
        &self,
        source: &SourceDescriptor,
        cursor: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContentItem>> {
        let mut new_items: Vec<ContentItem> = Vec::new();
        let mut seen = HashSet::new();

        for page in 1..=self.budget.max_pages {
            if page > 1 {
                sleep_or_cancel(self.budget.page_delay, cancel).await?;
            }

            let items = self.fetcher.fetch(source, page, cancel).await?;
            if items.is_empty() {
                log::debug!("Page {page} of {} is empty, stopping", source.label());
                break;
            }

            let mut boundary_found = false;
            let mut page_new = 0;
            for item in items {
                match compare_ids(&item.id, cursor) {
                    Ordering::Equal => {
                        boundary_found = true;
                        break;
                    }
                    Ordering::Greater => {
                        if !seen.insert(item.id.clone()) {
                            log::debug!("Post {} already collected this scan", item.id);
                            continue;
                        }
                        new_items.push(item);
                        page_new += 1;
                        if new_items.len() >= self.budget.max_items {
                            break;
                        }
                    }
                    Ordering::Less => {
                        log::debug!("Post {} is older than cursor {}, skipping", item.id, cursor);
                    }
                }
            }

            if boundary_found {
                log::debug!("Found cursor {cursor} on page {page} of {}", source.label());
                break;
            }
            if page_new == 0 {
                break;
            }
            if new_items.len() >= self.budget.max_items {
                log::debug!(
                    "Item budget of {} reached for {}",
                    self.budget.max_items,
                    source.label()
                );
                break;
            }
        }

        new_items.truncate(self.budget.max_items);
        Ok(new_items)
    }

    /// Page 1 only, capped, for a source that reached the incremental path
    /// without ever being baselined.
    async fn collect_unbaselined(
        &self,
        source: &SourceDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContentItem>> {
        log::warn!(
            "{} ({}) has no cursor, taking at most {} posts from page 1",
            source.label(),
            source.platform,
            self.budget.unbaselined_item_cap
        );

        let mut seen = HashSet::new();
        Ok(self
            .fetcher
            .fetch(source, 1, cancel)
            .await?
            .into_iter()
            .filter(|item| seen.insert(item.id.clone()))
            .take(self.budget.unbaselined_item_cap)
            .collect())
    }
}

/// A numeric cursor replaced by a non-numeric id stops matching later numeric posts.
fn leaves_numeric_order(previous: Option<&str>, next: &str) -> bool {
    previous.is_some_and(is_numeric_id) && !is_numeric_id(next)
}
