//! Local filesystem cursor storage.
//!
//! All cursors live in a single JSON object keyed by `platform:source_id`.
//! Every mutation rewrites the file atomically (temp file, then rename) so a
//! crash mid-write leaves the previous cursors intact.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{MonitorState, MonitorStatus};
use crate::storage::{StateStore, state_key};

type StateMap = BTreeMap<String, MonitorState>;

/// JSON file backed [`StateStore`].
pub struct JsonStateStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl JsonStateStore {
    /// Create a store persisting to the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_dir().await?;

        let tmp = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Read the whole map, treating a missing file as empty.
    async fn read_map(&self) -> Result<StateMap> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(StateMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StateMap::new()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn write_map(&self, map: &StateMap) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(map)?;
        self.write_bytes(&bytes).await
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn get(&self, source_id: i64, platform: &str) -> Result<Option<MonitorState>> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        Ok(map.remove(&state_key(source_id, platform)))
    }

    async fn set(
        &self,
        source_id: i64,
        platform: &str,
        content_id: &str,
        status: MonitorStatus,
    ) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        map.insert(
            state_key(source_id, platform),
            MonitorState {
                source_id,
                platform: platform.to_string(),
                last_content_id: Some(content_id.to_string()),
                last_check_time: Utc::now(),
                last_status: status,
            },
        );
        self.write_map(&map).await?;
        log::debug!(
            "Stored cursor {} for {} ({})",
            content_id,
            state_key(source_id, platform),
            status
        );
        Ok(())
    }

    async fn mark_checked(&self, source_id: i64, platform: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        let Some(state) = map.get_mut(&state_key(source_id, platform)) else {
            return Ok(());
        };
        state.last_check_time = Utc::now();
        state.last_status = MonitorStatus::Checked;
        self.write_map(&map).await
    }

    async fn reset(&self, source_id: i64, platform: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        let removed = map.remove(&state_key(source_id, platform)).is_some();
        if removed {
            self.write_map(&map).await?;
        }
        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<MonitorState>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_map().await?.into_values().collect())
    }
}
