//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::BoardConfig;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP session settings shared by the fetcher and the auth probe
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Paging budgets, scan interval and error backoff
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Inter-source pacing
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Memory pressure thresholds
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Login probe settings
    #[serde(default)]
    pub auth: AuthConfig,

    /// Notification formatting and delivery
    #[serde(default)]
    pub notify: NotifyConfig,

    /// File locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Listing page definitions, one per platform
    #[serde(default)]
    pub boards: Vec<BoardConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Find the board definition for a platform key.
    pub fn board(&self, platform: &str) -> Option<&BoardConfig> {
        self.boards.iter().find(|b| b.platform == platform)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.navigation_timeout_secs == 0 {
            return Err(AppError::validation(
                "crawler.navigation_timeout_secs must be > 0",
            ));
        }
        if self.crawler.content_timeout_secs == 0 {
            return Err(AppError::validation(
                "crawler.content_timeout_secs must be > 0",
            ));
        }
        if self.monitor.max_pages == 0 {
            return Err(AppError::validation("monitor.max_pages must be > 0"));
        }
        if self.monitor.max_items == 0 {
            return Err(AppError::validation("monitor.max_items must be > 0"));
        }
        if self.monitor.interval_secs == 0 {
            return Err(AppError::validation("monitor.interval_secs must be > 0"));
        }
        if self.rate_limit.peak_start_hour > 23 || self.rate_limit.peak_end_hour > 23 {
            return Err(AppError::validation(
                "rate_limit peak hours must be within 0..=23",
            ));
        }
        for factor in [
            self.rate_limit.peak_factor,
            self.rate_limit.warning_factor,
            self.rate_limit.critical_factor,
        ] {
            if !factor.is_finite() || factor < 1.0 {
                return Err(AppError::validation(
                    "rate_limit factors must be finite and >= 1.0",
                ));
            }
        }
        if !(self.memory.emergency_mb <= self.memory.critical_mb
            && self.memory.critical_mb <= self.memory.warning_mb)
        {
            return Err(AppError::validation(
                "memory thresholds must satisfy emergency <= critical <= warning",
            ));
        }
        if self.auth.attempts == 0 {
            return Err(AppError::validation("auth.attempts must be > 0"));
        }

        let mut platforms = HashSet::new();
        for board in &self.boards {
            board.validate()?;
            if !platforms.insert(board.platform.as_str()) {
                return Err(AppError::validation(format!(
                    "Duplicate board definition for platform '{}'",
                    board.platform
                )));
            }
        }
        Ok(())
    }
}

/// HTTP session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Budget for reaching the listing page (connect + response headers)
    #[serde(default = "defaults::navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// Budget for reading the body and locating rows on it
    #[serde(default = "defaults::content_timeout")]
    pub content_timeout_secs: u64,

    /// Raw `Cookie` header carrying the logged-in session
    #[serde(default)]
    pub session_cookie: Option<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            navigation_timeout_secs: defaults::navigation_timeout(),
            content_timeout_secs: defaults::content_timeout(),
            session_cookie: None,
        }
    }
}

/// Paging budgets and per-source error backoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Maximum listing pages walked per incremental scan
    #[serde(default = "defaults::max_pages")]
    pub max_pages: u32,

    /// Maximum new items returned per source per scan
    #[serde(default = "defaults::max_items")]
    pub max_items: usize,

    /// Item cap when a scan runs without any recorded cursor
    #[serde(default = "defaults::unbaselined_item_cap")]
    pub unbaselined_item_cap: usize,

    /// Delay between two pages of the same source
    #[serde(default = "defaults::page_delay")]
    pub page_delay_ms: u64,

    /// Interval between scan cycles
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,

    /// Extra delay after a source timed out
    #[serde(default = "defaults::timeout_backoff")]
    pub timeout_backoff_ms: u64,

    /// Extra delay after a navigation-level failure
    #[serde(default = "defaults::navigation_backoff")]
    pub navigation_backoff_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_pages: defaults::max_pages(),
            max_items: defaults::max_items(),
            unbaselined_item_cap: defaults::unbaselined_item_cap(),
            page_delay_ms: defaults::page_delay(),
            interval_secs: defaults::interval(),
            timeout_backoff_ms: defaults::timeout_backoff(),
            navigation_backoff_ms: defaults::navigation_backoff(),
        }
    }
}

/// Inter-source delay parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "defaults::base_delay")]
    pub base_delay_ms: u64,

    #[serde(default = "defaults::jitter_max")]
    pub jitter_max_ms: u64,

    /// First local hour of the peak window (inclusive)
    #[serde(default = "defaults::peak_start")]
    pub peak_start_hour: u32,

    /// Last local hour of the peak window (inclusive)
    #[serde(default = "defaults::peak_end")]
    pub peak_end_hour: u32,

    #[serde(default = "defaults::peak_factor")]
    pub peak_factor: f64,

    #[serde(default = "defaults::warning_factor")]
    pub warning_factor: f64,

    /// Applied under critical and emergency pressure
    #[serde(default = "defaults::critical_factor")]
    pub critical_factor: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: defaults::base_delay(),
            jitter_max_ms: defaults::jitter_max(),
            peak_start_hour: defaults::peak_start(),
            peak_end_hour: defaults::peak_end(),
            peak_factor: defaults::peak_factor(),
            warning_factor: defaults::warning_factor(),
            critical_factor: defaults::critical_factor(),
        }
    }
}

/// Available-RAM thresholds in MiB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "defaults::warning_mb")]
    pub warning_mb: u64,
    #[serde(default = "defaults::critical_mb")]
    pub critical_mb: u64,
    #[serde(default = "defaults::emergency_mb")]
    pub emergency_mb: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            warning_mb: defaults::warning_mb(),
            critical_mb: defaults::critical_mb(),
            emergency_mb: defaults::emergency_mb(),
        }
    }
}

/// Login probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Page that renders differently for logged-in sessions. When absent the
    /// session is assumed to be authenticated.
    #[serde(default)]
    pub probe_url: Option<String>,

    /// Selector that only matches on the logged-in rendering
    #[serde(default = "defaults::logged_in_selector")]
    pub logged_in_selector: String,

    #[serde(default = "defaults::auth_attempts")]
    pub attempts: u32,

    #[serde(default = "defaults::auth_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Upper bound on a whole probe, retries included
    #[serde(default = "defaults::probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Re-probe a cached "logged in" once it is older than this
    #[serde(default)]
    pub revalidate_after_secs: Option<u64>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            probe_url: None,
            logged_in_selector: defaults::logged_in_selector(),
            attempts: defaults::auth_attempts(),
            retry_backoff_ms: defaults::auth_retry_backoff(),
            probe_timeout_secs: defaults::probe_timeout(),
            revalidate_after_secs: None,
        }
    }
}

/// Notification formatting and delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Message template, see [`ContentItem::format`](crate::models::ContentItem::format)
    #[serde(default = "defaults::notify_template")]
    pub template: String,

    /// Deliver notifications as JSON POSTs to this URL instead of the log
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            template: defaults::notify_template(),
            webhook_url: None,
        }
    }
}

/// File locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::state_file")]
    pub state_file: String,

    #[serde(default = "defaults::sources_file")]
    pub sources_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_file: defaults::state_file(),
            sources_file: defaults::sources_file(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; postwatch/0.1)".into()
    }
    pub fn navigation_timeout() -> u64 {
        30
    }
    pub fn content_timeout() -> u64 {
        10
    }

    // Monitor defaults
    pub fn max_pages() -> u32 {
        3
    }
    pub fn max_items() -> usize {
        15
    }
    pub fn unbaselined_item_cap() -> usize {
        3
    }
    pub fn page_delay() -> u64 {
        1_000
    }
    pub fn interval() -> u64 {
        60
    }
    pub fn timeout_backoff() -> u64 {
        10_000
    }
    pub fn navigation_backoff() -> u64 {
        30_000
    }

    // Rate limit defaults
    pub fn base_delay() -> u64 {
        2_000
    }
    pub fn jitter_max() -> u64 {
        1_000
    }
    pub fn peak_start() -> u32 {
        18
    }
    pub fn peak_end() -> u32 {
        23
    }
    pub fn peak_factor() -> f64 {
        1.3
    }
    pub fn warning_factor() -> f64 {
        1.5
    }
    pub fn critical_factor() -> f64 {
        2.0
    }

    // Memory defaults
    pub fn warning_mb() -> u64 {
        1_024
    }
    pub fn critical_mb() -> u64 {
        512
    }
    pub fn emergency_mb() -> u64 {
        256
    }

    // Auth defaults
    pub fn logged_in_selector() -> String {
        "a.logout, #gnb_logout_button".into()
    }
    pub fn auth_attempts() -> u32 {
        3
    }
    pub fn auth_retry_backoff() -> u64 {
        1_000
    }
    pub fn probe_timeout() -> u64 {
        20
    }

    // Notify defaults
    pub fn notify_template() -> String {
        "[{author}] {title}".into()
    }

    // Path defaults
    pub fn state_file() -> String {
        "storage/state.json".into()
    }
    pub fn sources_file() -> String {
        "storage/sources.toml".into()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn defaults_match_scan_budgets() {
        let config = Config::default();
        assert_eq!(config.monitor.max_pages, 3);
        assert_eq!(config.monitor.max_items, 15);
        assert_eq!(config.monitor.unbaselined_item_cap, 3);
        assert_eq!(config.rate_limit.base_delay_ms, 2_000);
        assert_eq!(config.rate_limit.jitter_max_ms, 1_000);
        assert_eq!(config.auth.attempts, 3);
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.crawler.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_budgets() {
        let mut config = Config::default();
        config.monitor.max_pages = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.monitor.max_items = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_shrinking_factor() {
        let mut config = Config::default();
        config.rate_limit.peak_factor = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [monitor]
            max_pages = 5

            [rate_limit]
            base_delay_ms = 500
            "#,
        )
        .unwrap();

        assert_eq!(config.monitor.max_pages, 5);
        assert_eq!(config.monitor.max_items, 15);
        assert_eq!(config.rate_limit.base_delay_ms, 500);
        assert_eq!(config.rate_limit.peak_end_hour, 23);
        assert_eq!(config.notify.template, "[{author}] {title}");
    }
}
