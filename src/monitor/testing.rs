//! In-memory fakes for monitor tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, FetchError, FetchErrorKind, Result};
use crate::models::{ContentItem, Notification, SourceDescriptor};
use crate::services::{AuthProbe, Notifier, PageFetcher};

pub fn source(source_id: i64) -> SourceDescriptor {
    SourceDescriptor {
        source_id,
        platform: "cafe".to_string(),
        author_handle: format!("writer{source_id}"),
        group_id: "10050146".to_string(),
        display_name: None,
        enabled: true,
    }
}

pub fn item(id: &str) -> ContentItem {
    ContentItem {
        id: id.to_string(),
        title: format!("Post {id}"),
        url: format!("https://board.example.com/articles/{id}"),
        author: "writer".to_string(),
        published_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    }
}

pub fn ids(items: &[ContentItem]) -> Vec<&str> {
    items.iter().map(|i| i.id.as_str()).collect()
}

type PageResult = std::result::Result<Vec<ContentItem>, FetchErrorKind>;

/// Serves scripted pages per `(source_id, page)`. Unscripted pages are empty.
#[derive(Default)]
pub struct ScriptedFetcher {
    pages: Mutex<HashMap<(i64, u32), PageResult>>,
    calls: Mutex<Vec<(i64, u32)>>,
    latency: Mutex<Duration>,
    cancel_after: Mutex<Option<(usize, CancellationToken)>>,
}

impl ScriptedFetcher {
    pub fn set_page(&self, source_id: i64, page: u32, page_ids: &[&str]) {
        let items = page_ids.iter().map(|id| item(id)).collect();
        self.pages.lock().unwrap().insert((source_id, page), Ok(items));
    }

    pub fn fail_page(&self, source_id: i64, page: u32, kind: FetchErrorKind) {
        self.pages.lock().unwrap().insert((source_id, page), Err(kind));
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    /// Cancel `token` once `calls` fetches have been served.
    pub fn cancel_after_calls(&self, calls: usize, token: CancellationToken) {
        *self.cancel_after.lock().unwrap() = Some((calls, token));
    }

    pub fn calls(&self) -> Vec<(i64, u32)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn pages_fetched(&self, source_id: i64) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter(|(id, _)| *id == source_id)
            .map(|(_, page)| page)
            .collect()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch_page(
        &self,
        source: &SourceDescriptor,
        page: u32,
    ) -> std::result::Result<Vec<ContentItem>, FetchError> {
        let served = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((source.source_id, page));
            calls.len()
        };

        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if let Some((after, token)) = self.cancel_after.lock().unwrap().as_ref() {
            if served >= *after {
                token.cancel();
            }
        }

        let scripted = self
            .pages
            .lock()
            .unwrap()
            .get(&(source.source_id, page))
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()));
        scripted.map_err(|kind| FetchError::new(kind, source.source_id, page, "scripted failure"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    LoggedIn,
    LoggedOut,
    Fails,
}

/// Counts probe invocations and answers with a settable outcome.
pub struct CountingProbe {
    calls: AtomicUsize,
    latency: Duration,
    outcome: Mutex<ProbeOutcome>,
}

impl CountingProbe {
    pub fn new(outcome: ProbeOutcome) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            latency: Duration::ZERO,
            outcome: Mutex::new(outcome),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_outcome(&self, outcome: ProbeOutcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthProbe for CountingProbe {
    async fn check(&self) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let outcome = *self.outcome.lock().unwrap();
        match outcome {
            ProbeOutcome::LoggedIn => Ok(true),
            ProbeOutcome::LoggedOut => Ok(false),
            ProbeOutcome::Fails => Err(AppError::auth("probe exploded")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Accept,
    Refuse,
    Fail,
}

/// Records every notification it is handed.
pub struct RecordingNotifier {
    received: Mutex<Vec<Notification>>,
    outcome: DeliveryOutcome,
}

impl RecordingNotifier {
    pub fn new(outcome: DeliveryOutcome) -> Self {
        Self {
            received: Mutex::new(Vec::new()),
            outcome,
        }
    }

    pub fn received(&self) -> Vec<Notification> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<bool> {
        self.received.lock().unwrap().push(notification.clone());
        match self.outcome {
            DeliveryOutcome::Accept => Ok(true),
            DeliveryOutcome::Refuse => Ok(false),
            DeliveryOutcome::Fail => Err(AppError::validation("notifier unavailable")),
        }
    }
}
