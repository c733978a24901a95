//! In-memory cursor storage for tests and dry runs.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::Result;
use crate::models::{MonitorState, MonitorStatus};
use crate::storage::{StateStore, state_key};

/// Volatile [`StateStore`]; nothing survives the process.
#[derive(Default)]
pub struct MemoryStateStore {
    states: Mutex<BTreeMap<String, MonitorState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_states<T>(&self, f: impl FnOnce(&mut BTreeMap<String, MonitorState>) -> T) -> T {
        let mut guard = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, source_id: i64, platform: &str) -> Result<Option<MonitorState>> {
        Ok(self.with_states(|states| states.get(&state_key(source_id, platform)).cloned()))
    }

    async fn set(
        &self,
        source_id: i64,
        platform: &str,
        content_id: &str,
        status: MonitorStatus,
    ) -> Result<()> {
        self.with_states(|states| {
            states.insert(
                state_key(source_id, platform),
                MonitorState {
                    source_id,
                    platform: platform.to_string(),
                    last_content_id: Some(content_id.to_string()),
                    last_check_time: Utc::now(),
                    last_status: status,
                },
            );
        });
        Ok(())
    }

    async fn mark_checked(&self, source_id: i64, platform: &str) -> Result<()> {
        self.with_states(|states| {
            if let Some(state) = states.get_mut(&state_key(source_id, platform)) {
                state.last_check_time = Utc::now();
                state.last_status = MonitorStatus::Checked;
            }
        });
        Ok(())
    }

    async fn reset(&self, source_id: i64, platform: &str) -> Result<bool> {
        Ok(self.with_states(|states| states.remove(&state_key(source_id, platform)).is_some()))
    }

    async fn list(&self) -> Result<Vec<MonitorState>> {
        Ok(self.with_states(|states| states.values().cloned().collect()))
    }
}
