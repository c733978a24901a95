//! Monitored sources and the registry file that lists them.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Config;

/// One monitored author listing on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Stable numeric identifier
    pub source_id: i64,

    /// Platform key (e.g. "cafe")
    pub platform: String,

    /// Author handle substituted into the listing URL
    pub author_handle: String,

    /// Board/group scope substituted into the listing URL
    #[serde(default)]
    pub group_id: String,

    /// Name shown in notifications; falls back to the handle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl SourceDescriptor {
    /// Name to show for this source.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.author_handle)
    }
}

/// Root of the sources file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceRegistry {
    #[serde(default)]
    pub sources: Vec<SourceDescriptor>,
}

impl SourceRegistry {
    /// Load the registry from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Sources that should be scanned, in file order.
    pub fn enabled(&self) -> Vec<SourceDescriptor> {
        self.sources.iter().filter(|s| s.enabled).cloned().collect()
    }

    /// Validate that every source is addressable and has a board definition.
    pub fn validate(&self, config: &Config) -> Result<()> {
        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.author_handle.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "source {} has an empty author_handle",
                    source.source_id
                )));
            }
            if !seen.insert((source.source_id, source.platform.as_str())) {
                return Err(AppError::validation(format!(
                    "duplicate source {} on platform '{}'",
                    source.source_id, source.platform
                )));
            }
            if config.board(&source.platform).is_none() {
                return Err(AppError::validation(format!(
                    "source {} uses platform '{}' which has no [[boards]] entry",
                    source.source_id, source.platform
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoardConfig, ListSelectors};

    const SOURCES: &str = r#"
        [[sources]]
        source_id = 1
        platform = "cafe"
        author_handle = "writer01"
        group_id = "10050146"
        display_name = "Writer One"

        [[sources]]
        source_id = 2
        platform = "cafe"
        author_handle = "writer02"
        enabled = false
    "#;

    fn config_with_cafe() -> Config {
        Config {
            boards: vec![BoardConfig {
                platform: "cafe".to_string(),
                list_url: "https://board.example.com/{group}/{author}?page={page}".to_string(),
                selectors: ListSelectors::default(),
                fallback_selectors: vec![],
                id_pattern: r"articleid=(\d+)".to_string(),
            }],
            ..Config::default()
        }
    }

    #[test]
    fn test_parse_and_enabled() {
        let registry: SourceRegistry = toml::from_str(SOURCES).unwrap();
        assert_eq!(registry.sources.len(), 2);
        assert_eq!(registry.sources[1].group_id, "");

        let enabled = registry.enabled();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].label(), "Writer One");
    }

    #[test]
    fn test_validate_requires_board() {
        let registry: SourceRegistry = toml::from_str(SOURCES).unwrap();
        assert!(registry.validate(&config_with_cafe()).is_ok());
        assert!(registry.validate(&Config::default()).is_err());
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let mut registry: SourceRegistry = toml::from_str(SOURCES).unwrap();
        registry.sources[1].source_id = 1;
        assert!(registry.validate(&config_with_cafe()).is_err());
    }
}
