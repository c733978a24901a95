//! Per-platform listing page definition.

use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{ListSelectors, SourceDescriptor};

/// How to reach and read the per-author listing of one platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Platform key matched against `SourceDescriptor::platform`
    pub platform: String,

    /// Listing URL template. Supported placeholders:
    /// `{author}`, `{group}`, `{page}`
    pub list_url: String,

    /// Primary selector set
    #[serde(default)]
    pub selectors: ListSelectors,

    /// Tried in order when the primary set matches nothing
    #[serde(default = "default_fallbacks")]
    pub fallback_selectors: Vec<ListSelectors>,

    /// Regex with one capture group that pulls the post id out of its link
    #[serde(default = "default_id_pattern")]
    pub id_pattern: String,
}

fn default_fallbacks() -> Vec<ListSelectors> {
    vec![ListSelectors::fallback()]
}

fn default_id_pattern() -> String {
    r"(?i)(?:articleid=|/articles?/|[?&](?:id|no|seq|idx)=)(\d+)".to_string()
}

impl BoardConfig {
    /// Build the listing URL for a source and 1-based page number.
    pub fn page_url(&self, source: &SourceDescriptor, page: u32) -> String {
        self.list_url
            .replace("{author}", &source.author_handle)
            .replace("{group}", &source.group_id)
            .replace("{page}", &page.to_string())
    }

    /// Primary selectors followed by the fallbacks.
    pub fn selector_chain(&self) -> impl Iterator<Item = &ListSelectors> {
        std::iter::once(&self.selectors).chain(self.fallback_selectors.iter())
    }

    /// Compile the id pattern.
    pub fn id_regex(&self) -> Result<Regex> {
        Regex::new(&self.id_pattern).map_err(|e| {
            AppError::config(format!(
                "Invalid id_pattern for platform '{}': {e}",
                self.platform
            ))
        })
    }

    /// Check that every selector and the id pattern compile.
    pub fn validate(&self) -> Result<()> {
        if self.platform.trim().is_empty() {
            return Err(AppError::validation("board.platform is empty"));
        }
        if !self.list_url.contains("{page}") {
            return Err(AppError::validation(format!(
                "board '{}' list_url has no {{page}} placeholder",
                self.platform
            )));
        }
        for selector in self.selector_chain().flat_map(ListSelectors::all) {
            Selector::parse(selector).map_err(|e| AppError::selector(selector, format!("{e:?}")))?;
        }
        self.id_regex()?;
        Ok(())
    }
}
