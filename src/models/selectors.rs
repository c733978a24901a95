// src/models/selectors.rs

//! CSS selectors for scraping a per-author post listing.

use serde::{Deserialize, Serialize};

/// CSS selectors for one rendering of a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSelectors {
    /// Selector for each post row in the listing
    pub row_selector: String,

    /// Selector for the title element within a row
    pub title_selector: String,

    /// Selector for the date element within a row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_selector: Option<String>,

    /// Selector for the author element within a row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_selector: Option<String>,

    /// Optional selector for the link element (if different from title)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_selector: Option<String>,

    /// HTML attribute name for extracting links (usually "href")
    #[serde(default = "default_link_attr")]
    pub link_attr: String,
}

fn default_link_attr() -> String {
    "href".to_string()
}

impl Default for ListSelectors {
    fn default() -> Self {
        Self {
            row_selector: "table.article-board tbody tr".to_string(),
            title_selector: "a.article".to_string(),
            date_selector: Some("td.td_date".to_string()),
            author_selector: Some("td.td_name".to_string()),
            link_selector: None,
            link_attr: default_link_attr(),
        }
    }
}

impl ListSelectors {
    /// Generic selectors that work with most table-based listings.
    pub fn fallback() -> Self {
        Self {
            row_selector: "table tr:has(a)".to_string(),
            title_selector: "a".to_string(),
            date_selector: Some("td:last-child".to_string()),
            author_selector: None,
            link_selector: None,
            link_attr: default_link_attr(),
        }
    }

    /// Every selector string in this set, for validation.
    pub fn all(&self) -> impl Iterator<Item = &str> {
        [Some(&self.row_selector), Some(&self.title_selector)]
            .into_iter()
            .chain([
                self.date_selector.as_ref(),
                self.author_selector.as_ref(),
                self.link_selector.as_ref(),
            ])
            .flatten()
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_skips_unset() {
        let selectors = ListSelectors::fallback();
        let all: Vec<_> = selectors.all().collect();
        assert_eq!(all, vec!["table tr:has(a)", "a", "td:last-child"]);
    }

    #[test]
    fn test_link_attr_default() {
        let selectors: ListSelectors = toml::from_str(
            r#"
            row_selector = "li"
            title_selector = "a.title"
            "#,
        )
        .unwrap();
        assert_eq!(selectors.link_attr, "href");
        assert!(selectors.date_selector.is_none());
    }
}
