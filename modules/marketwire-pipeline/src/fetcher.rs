// Feed fetching and normalisation. All configured sources are fetched
// concurrently; a failure on one source never hides items from the others.

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use tracing::{info, warn};

use marketwire_common::{FeedError, FetchedItem, SourceConfig};

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = "MarketWire/1.0 (news aggregator)";

// ---------------------------------------------------------------------------
// FeedFetcher trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Retrieve and normalise all items from one source.
    async fn fetch(&self, source: &SourceConfig) -> Result<Vec<FetchedItem>>;
}

/// Fetch every source concurrently and collect per-source failures.
/// The stage completes when every fetch has settled.
pub async fn fetch_all(
    fetcher: &dyn FeedFetcher,
    sources: &[SourceConfig],
) -> (Vec<FetchedItem>, Vec<FeedError>) {
    let fetches = sources.iter().map(|source| fetcher.fetch(source));
    let results = futures::future::join_all(fetches).await;

    let mut items = Vec::new();
    let mut errors = Vec::new();

    for (source, result) in sources.iter().zip(results) {
        match result {
            Ok(batch) => {
                info!(source = %source.name, items = batch.len(), "Feed fetched");
                items.extend(batch);
            }
            Err(e) => {
                warn!(source = %source.name, error = %e, "Failed to fetch feed");
                errors.push(FeedError {
                    source: source.name.clone(),
                    message: e.to_string(),
                });
            }
        }
    }

    (items, errors)
}

// ---------------------------------------------------------------------------
// RSS implementation
// ---------------------------------------------------------------------------

pub struct RssFetcher {
    client: reqwest::Client,
}

impl RssFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build RSS HTTP client");
        Self { client }
    }
}

impl Default for RssFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedFetcher for RssFetcher {
    async fn fetch(&self, source: &SourceConfig) -> Result<Vec<FetchedItem>> {
        let resp = self
            .client
            .get(&source.url)
            .send()
            .await
            .context("Feed fetch failed")?;

        let bytes = resp.bytes().await.context("Failed to read feed body")?;
        let feed = feed_rs::parser::parse(&bytes[..]).context("Failed to parse RSS/Atom feed")?;

        Ok(feed
            .entries
            .into_iter()
            .map(|entry| normalise_entry(source, entry))
            .collect())
    }
}

fn normalise_entry(source: &SourceConfig, entry: feed_rs::model::Entry) -> FetchedItem {
    let url = entry
        .links
        .first()
        .map(|l| l.href.clone())
        .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))
        .unwrap_or_default();

    let external_id = if entry.id.is_empty() {
        (!url.is_empty()).then(|| url.clone())
    } else {
        Some(entry.id.clone())
    };

    let title = entry
        .title
        .map(|t| strip_html(&t.content))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());

    let content = entry
        .content
        .and_then(|c| c.body)
        .map(|body| strip_html(&body))
        .unwrap_or_default();

    let summary = entry
        .summary
        .map(|s| strip_html(&s.content))
        .unwrap_or_default();

    let author = entry
        .authors
        .first()
        .map(|person| person.name.clone())
        .filter(|name| !name.is_empty());

    let published_at = entry
        .published
        .or(entry.updated)
        .map(|dt| dt.with_timezone(&chrono::Utc));

    FetchedItem {
        source_name: source.name.clone(),
        source_url: source.url.clone(),
        external_id,
        title,
        content,
        summary,
        url,
        author,
        published_at,
    }
}

// ---------------------------------------------------------------------------
// Markup stripping
// ---------------------------------------------------------------------------

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("Invalid tag regex"));

/// Strip markup from an HTML-bearing text field: tags removed, entities
/// decoded, whitespace runs collapsed to single spaces, ends trimmed.
pub fn strip_html(html: &str) -> String {
    let without_tags = TAG_PATTERN.replace_all(html, " ");
    let decoded = html_escape::decode_html_entities(without_tags.as_ref());
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_collapses_whitespace() {
        assert_eq!(strip_html("<p>Hello <b>world</b></p>"), "Hello world");
        assert_eq!(strip_html(""), "");
        assert_eq!(strip_html("  plain   text  "), "plain text");
    }

    #[test]
    fn decodes_entities() {
        assert_eq!(strip_html("Ben &amp; Jerry&#39;s"), "Ben & Jerry's");
        assert_eq!(strip_html("<p>1 &lt; 2</p>"), "1 < 2");
    }

    #[test]
    fn strip_html_is_idempotent() {
        for input in [
            "<div><p>Hello   <b>world</b></p></div>",
            "no markup here",
            "a &amp; b",
            "",
        ] {
            let once = strip_html(input);
            assert_eq!(strip_html(&once), once);
        }
    }

    #[test]
    fn strips_nested_and_self_closing_tags() {
        assert_eq!(
            strip_html("<img src=\"x.png\"/>caption<br/>line"),
            "caption line"
        );
    }
}
