// src/services/board.rs

//! Listing page fetcher.
//!
//! Fetches a per-author listing over HTTP and extracts post rows using the
//! platform's CSS selectors, falling back through alternate selector sets
//! when the primary set matches nothing.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, FetchError, FetchErrorKind, Result};
use crate::models::{BoardConfig, ContentItem, CrawlerConfig, ListSelectors, SourceDescriptor};
use crate::services::PageFetcher;
use crate::utils::timestamp::parse_published_at;
use crate::utils::{extract_content_id, normalize_whitespace, resolve_url};

/// A board definition with its id pattern compiled.
struct PreparedBoard {
    config: BoardConfig,
    id_regex: Regex,
}

/// [`PageFetcher`] backed by the shared HTTP session.
pub struct HttpPageFetcher {
    client: Client,
    boards: HashMap<String, PreparedBoard>,
    navigation_timeout: Duration,
    content_timeout: Duration,
}

/// Selectors of one set, parsed for a single page.
struct RowSelectors<'a> {
    row: Selector,
    title: Selector,
    date: Option<Selector>,
    author: Option<Selector>,
    link: Option<Selector>,
    link_attr: &'a str,
}

impl<'a> RowSelectors<'a> {
    fn parse(set: &'a ListSelectors) -> Result<Self> {
        let optional = |s: &Option<String>| s.as_deref().map(parse_selector).transpose();
        Ok(Self {
            row: parse_selector(&set.row_selector)?,
            title: parse_selector(&set.title_selector)?,
            date: optional(&set.date_selector)?,
            author: optional(&set.author_selector)?,
            link: optional(&set.link_selector)?,
            link_attr: &set.link_attr,
        })
    }
}

impl HttpPageFetcher {
    /// Create a fetcher for the given boards, validating their selectors.
    pub fn new(client: Client, crawler: &CrawlerConfig, boards: &[BoardConfig]) -> Result<Self> {
        let mut prepared = HashMap::new();
        for board in boards {
            board.validate()?;
            prepared.insert(
                board.platform.clone(),
                PreparedBoard {
                    id_regex: board.id_regex()?,
                    config: board.clone(),
                },
            );
        }

        Ok(Self {
            client,
            boards: prepared,
            navigation_timeout: Duration::from_secs(crawler.navigation_timeout_secs),
            content_timeout: Duration::from_secs(crawler.content_timeout_secs),
        })
    }

    /// GET the page, bounding navigation and body read separately.
    async fn download(
        &self,
        source: &SourceDescriptor,
        page: u32,
        url: &str,
    ) -> std::result::Result<String, FetchError> {
        let fail = |kind, message: String| FetchError::new(kind, source.source_id, page, message);

        let response = tokio::time::timeout(self.navigation_timeout, self.client.get(url).send())
            .await
            .map_err(|_| {
                fail(
                    FetchErrorKind::Timeout,
                    format!("navigation to {url} exceeded {:?}", self.navigation_timeout),
                )
            })?
            .and_then(|r| r.error_for_status())
            .map_err(|e| FetchError::from_reqwest(source.source_id, page, &e))?;

        tokio::time::timeout(self.content_timeout, response.text())
            .await
            .map_err(|_| {
                fail(
                    FetchErrorKind::Timeout,
                    format!("reading {url} exceeded {:?}", self.content_timeout),
                )
            })?
            .map_err(|e| FetchError::from_reqwest(source.source_id, page, &e))
    }

    /// Extract items from a listing document, trying each selector set in turn.
    fn parse_listing(
        &self,
        board: &PreparedBoard,
        source: &SourceDescriptor,
        page: u32,
        page_url: &str,
        html: &str,
    ) -> std::result::Result<Vec<ContentItem>, FetchError> {
        let fail = |kind, message: String| FetchError::new(kind, source.source_id, page, message);

        let base_url = Url::parse(page_url)
            .map_err(|e| fail(FetchErrorKind::NavigationFailed, format!("bad page url: {e}")))?;
        let document = Html::parse_document(html);

        for (index, set) in board.config.selector_chain().enumerate() {
            let selectors = RowSelectors::parse(set)
                .map_err(|e| fail(FetchErrorKind::ParseEmpty, e.to_string()))?;

            let items: Vec<ContentItem> = document
                .select(&selectors.row)
                .filter_map(|row| self.parse_row(&row, &selectors, board, source, &base_url))
                .collect();

            if !items.is_empty() {
                if index > 0 {
                    log::debug!(
                        "Source {} page {} matched fallback selector set #{}",
                        source.source_id,
                        page,
                        index
                    );
                }
                return Ok(items);
            }
        }

        Err(fail(
            FetchErrorKind::ParseEmpty,
            "no selector set matched any rows".to_string(),
        ))
    }

    fn parse_row(
        &self,
        row: &ElementRef,
        selectors: &RowSelectors<'_>,
        board: &PreparedBoard,
        source: &SourceDescriptor,
        base_url: &Url,
    ) -> Option<ContentItem> {
        let title_elem = row.select(&selectors.title).next()?;
        let title = normalize_whitespace(&title_elem.text().collect::<String>());
        if title.is_empty() {
            return None;
        }

        let link_elem = selectors
            .link
            .as_ref()
            .and_then(|sel| row.select(sel).next())
            .unwrap_or(title_elem);
        let raw_link = link_elem.value().attr(selectors.link_attr).unwrap_or("");
        let url = resolve_url(base_url, raw_link);

        let Some(id) = extract_content_id(&board.id_regex, &url) else {
            log::debug!("Skipping row without a post id: {title} ({url})");
            return None;
        };

        let text_of = |sel: &Option<Selector>| {
            sel.as_ref()
                .and_then(|s| row.select(s).next())
                .map(|el| normalize_whitespace(&el.text().collect::<String>()))
                .unwrap_or_default()
        };

        let author = text_of(&selectors.author);
        let author = if author.is_empty() {
            source.label().to_string()
        } else {
            author
        };

        Some(ContentItem {
            id,
            title,
            url,
            author,
            published_at: parse_published_at(&text_of(&selectors.date)),
        })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(
        &self,
        source: &SourceDescriptor,
        page: u32,
    ) -> std::result::Result<Vec<ContentItem>, FetchError> {
        let board = self.boards.get(&source.platform).ok_or_else(|| {
            FetchError::new(
                FetchErrorKind::NavigationFailed,
                source.source_id,
                page,
                format!("no board configured for platform '{}'", source.platform),
            )
        })?;

        let url = board.config.page_url(source, page);
        log::debug!("Fetching {url}");
        let html = self.download(source, page, &url).await?;
        self.parse_listing(board, source, page, &url, &html)
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
        <table class="article-board"><tbody>
          <tr>
            <td><a class="article" href="/ArticleRead.nhn?clubid=1&amp;articleid=503"> New
              chapter </a></td>
            <td class="td_name">writer01</td>
            <td class="td_date">2026.03.01.</td>
          </tr>
          <tr>
            <td><a class="article" href="/ArticleRead.nhn?clubid=1&amp;articleid=502">Older</a></td>
            <td class="td_name"></td>
            <td class="td_date">garbage</td>
          </tr>
          <tr>
            <td><a class="article" href="/notice">Pinned notice without id</a></td>
          </tr>
        </tbody></table>
        </body></html>
    "#;

    const PLAIN_TABLE: &str = r#"
        <table><tr><td><a href="/read?articleid=77">Plain row</a></td><td>03.02.</td></tr></table>
    "#;

    fn board() -> BoardConfig {
        BoardConfig {
            platform: "cafe".to_string(),
            list_url: "https://board.example.com/{group}/members/{author}?page={page}".to_string(),
            selectors: ListSelectors::default(),
            fallback_selectors: vec![ListSelectors::fallback()],
            id_pattern: r"articleid=(\d+)".to_string(),
        }
    }

    fn source() -> SourceDescriptor {
        SourceDescriptor {
            source_id: 1,
            platform: "cafe".to_string(),
            author_handle: "writer01".to_string(),
            group_id: "10050146".to_string(),
            display_name: Some("Writer One".to_string()),
            enabled: true,
        }
    }

    fn fetcher() -> HttpPageFetcher {
        HttpPageFetcher::new(Client::new(), &CrawlerConfig::default(), &[board()]).unwrap()
    }

    fn parse(html: &str) -> std::result::Result<Vec<ContentItem>, FetchError> {
        let fetcher = fetcher();
        let board = &fetcher.boards["cafe"];
        let url = board.config.page_url(&source(), 1);
        fetcher.parse_listing(board, &source(), 1, &url, html)
    }

    #[test]
    fn test_parse_primary_selectors() {
        let items = parse(LISTING).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "503");
        assert_eq!(items[0].title, "New chapter");
        assert_eq!(items[0].author, "writer01");
        assert_eq!(
            items[0].url,
            "https://board.example.com/ArticleRead.nhn?clubid=1&articleid=503"
        );
        // Empty author cell falls back to the source label
        assert_eq!(items[1].author, "Writer One");
    }

    #[test]
    fn test_parse_uses_fallback_selectors() {
        let items = parse(PLAIN_TABLE).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "77");
    }

    #[test]
    fn test_parse_empty_page() {
        let err = parse("<html><body><p>No posts yet</p></body></html>").unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::ParseEmpty);
    }

    #[test]
    fn test_invalid_board_rejected() {
        let mut bad = board();
        bad.selectors.title_selector = "[[invalid".to_string();
        assert!(HttpPageFetcher::new(Client::new(), &CrawlerConfig::default(), &[bad]).is_err());
    }

    #[tokio::test]
    async fn test_unknown_platform() {
        let mut other = source();
        other.platform = "blog".to_string();
        let err = fetcher().fetch_page(&other, 1).await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::NavigationFailed);
    }
}
