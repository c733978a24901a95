//! Collaborators the monitor core depends on.
//!
//! The core only sees the traits defined here:
//! - [`PageFetcher`]: one page of a source's listing, newest first
//! - [`AuthProbe`]: whether the shared session is logged in
//! - [`Notifier`]: best-effort delivery of a new-post notification
//!
//! Reference implementations live in the submodules.

mod auth_probe;
mod board;
mod notifier;

use async_trait::async_trait;

use crate::error::{FetchError, Result};
use crate::models::{ContentItem, Notification, SourceDescriptor};

pub use auth_probe::{HttpAuthProbe, RetryingProbe, StaticProbe};
pub use board::HttpPageFetcher;
pub use notifier::{LogNotifier, WebhookNotifier};

/// Fetches one page of a source's listing.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Items on `page` (1-based), ordered newest first as the source sorts them.
    async fn fetch_page(
        &self,
        source: &SourceDescriptor,
        page: u32,
    ) -> std::result::Result<Vec<ContentItem>, FetchError>;
}

/// Answers whether the shared session is authenticated.
#[async_trait]
pub trait AuthProbe: Send + Sync {
    async fn check(&self) -> Result<bool>;
}

/// Delivers a notification. `Ok(false)` means the delivery was refused.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<bool>;
}
