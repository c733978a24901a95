//! Storage abstractions for per-source cursors.
//!
//! One [`MonitorState`] is kept per `(source_id, platform)` pair:
//!
//! ```text
//! storage/
//! └── state.json      # { "cafe:1": { last_content_id, last_check_time, ... } }
//! ```
//!
//! Writes only ever come from the orchestrator's sequential scan path, so the
//! backends serialize within a process and nothing more.

pub mod local;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{MonitorState, MonitorStatus};

// Re-export for convenience
pub use local::JsonStateStore;
pub use memory::MemoryStateStore;

/// Key under which a cursor is stored.
pub fn state_key(source_id: i64, platform: &str) -> String {
    format!("{platform}:{source_id}")
}

/// Trait for cursor storage backends.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the cursor for a source, if one was ever written.
    async fn get(&self, source_id: i64, platform: &str) -> Result<Option<MonitorState>>;

    /// Upsert the cursor with the current time.
    async fn set(
        &self,
        source_id: i64,
        platform: &str,
        content_id: &str,
        status: MonitorStatus,
    ) -> Result<()>;

    /// Refresh check time and status of an existing cursor without moving it.
    /// Does nothing when the source has no state.
    async fn mark_checked(&self, source_id: i64, platform: &str) -> Result<()>;

    /// Delete the cursor. Returns whether anything was removed.
    async fn reset(&self, source_id: i64, platform: &str) -> Result<bool>;

    /// All stored cursors.
    async fn list(&self) -> Result<Vec<MonitorState>>;

    /// True iff no state exists or it carries no cursor.
    async fn needs_baseline(&self, source_id: i64, platform: &str) -> Result<bool> {
        Ok(self
            .get(source_id, platform)
            .await?
            .is_none_or(|state| state.needs_baseline()))
    }
}
