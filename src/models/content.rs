//! Discovered posts and the notification payload built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::SourceDescriptor;

/// A post found on a listing page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentItem {
    /// Opaque post id, numeric when the source behaves
    pub id: String,

    /// Post title
    pub title: String,

    /// Full URL to the post
    pub url: String,

    /// Author as rendered on the listing
    pub author: String,

    /// Best-effort publish time
    pub published_at: DateTime<Utc>,
}

impl ContentItem {
    /// Format the item for display using a template.
    ///
    /// Supported placeholders:
    /// - `{id}`, `{title}`, `{url}`, `{author}`, `{published_at}`
    pub fn format(&self, template: &str) -> String {
        template
            .replace("{id}", &self.id)
            .replace("{title}", &self.title)
            .replace("{url}", &self.url)
            .replace("{author}", &self.author)
            .replace(
                "{published_at}",
                &self.published_at.format("%Y-%m-%d %H:%M").to_string(),
            )
    }
}

/// Structured payload handed to a [`Notifier`](crate::services::Notifier).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub source_id: i64,
    pub platform: String,
    pub source_name: String,
    pub content_id: String,
    pub title: String,
    pub message: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
}

impl Notification {
    /// Build a notification for an item found on `source`.
    pub fn new(item: &ContentItem, source: &SourceDescriptor, template: &str) -> Self {
        let mut item_for_display = item.clone();
        if item_for_display.author.trim().is_empty() {
            item_for_display.author = source.label().to_string();
        }

        Self {
            source_id: source.source_id,
            platform: source.platform.clone(),
            source_name: source.label().to_string(),
            content_id: item.id.clone(),
            title: item.title.clone(),
            message: item_for_display.format(template),
            url: item.url.clone(),
            published_at: item.published_at,
        }
    }
}
