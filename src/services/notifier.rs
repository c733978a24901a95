//! Notification delivery.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::Result;
use crate::models::Notification;
use crate::services::Notifier;

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<bool> {
        log::info!("New post: {} <{}>", notification.message, notification.url);
        Ok(true)
    }
}

/// POSTs each notification as JSON to a webhook.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<bool> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            log::warn!(
                "Webhook refused notification {} ({})",
                notification.content_id,
                status
            );
        }
        Ok(status.is_success())
    }
}
