//! Persisted per-source cursor.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last recorded outcome for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MonitorStatus {
    #[default]
    Uninitialized,
    BaselineSet,
    Checked,
}

impl fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::BaselineSet => "baseline_set",
            Self::Checked => "checked",
        })
    }
}

/// Cursor for one (source, platform) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorState {
    pub source_id: i64,
    pub platform: String,

    /// Newest post already seen; `None` means never baselined
    pub last_content_id: Option<String>,

    pub last_check_time: DateTime<Utc>,

    #[serde(default)]
    pub last_status: MonitorStatus,
}

impl MonitorState {
    /// True when no cursor has ever been recorded.
    pub fn needs_baseline(&self) -> bool {
        self.last_content_id
            .as_deref()
            .is_none_or(|id| id.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serde_names() {
        assert_eq!(
            serde_json::to_string(&MonitorStatus::BaselineSet).unwrap(),
            "\"baseline_set\""
        );
        let status: MonitorStatus = serde_json::from_str("\"checked\"").unwrap();
        assert_eq!(status, MonitorStatus::Checked);
        assert_eq!(MonitorStatus::Uninitialized.to_string(), "uninitialized");
    }

    #[test]
    fn test_needs_baseline() {
        let mut state = MonitorState {
            source_id: 1,
            platform: "cafe".to_string(),
            last_content_id: None,
            last_check_time: Utc::now(),
            last_status: MonitorStatus::Uninitialized,
        };
        assert!(state.needs_baseline());

        state.last_content_id = Some(String::new());
        assert!(state.needs_baseline());

        state.last_content_id = Some("500".to_string());
        assert!(!state.needs_baseline());
    }
}
