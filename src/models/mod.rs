// src/models/mod.rs

//! Domain models for the monitor.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod board;
mod config;
mod content;
mod selectors;
mod source;
mod state;

// Re-export all public types
pub use board::BoardConfig;
pub use config::{
    AuthConfig, Config, CrawlerConfig, LoggingConfig, MemoryConfig, MonitorConfig, NotifyConfig,
    PathsConfig, RateLimitConfig,
};
pub use content::{ContentItem, Notification};
pub use selectors::ListSelectors;
pub use source::{SourceDescriptor, SourceRegistry};
pub use state::{MonitorState, MonitorStatus};
