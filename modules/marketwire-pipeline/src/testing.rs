// Test doubles for the pipeline trait boundaries:
// - MockFetcher (FeedFetcher): scripted items and failures per feed URL
// - MockStore (NewsStore): stateful in-memory store honouring URL uniqueness
// - MockLlm (LlmProvider): scripted scoring responses keyed by title
//
// Deterministic `cargo test`: no network, no database.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use llm_client::{
    LlmError, LlmProvider, ScoreRequest, ScoringResult, SummaryRequest, SummaryResult, Ticker,
};
use marketwire_common::{Category, FetchedItem, SourceConfig};

use crate::fetcher::FeedFetcher;
use crate::store::{NewArticle, NewRawItem, NewsStore, RawItem};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A minimal fetched item for a given source.
pub fn item(source: &SourceConfig, url: &str, title: &str) -> FetchedItem {
    FetchedItem {
        source_name: source.name.clone(),
        source_url: source.url.clone(),
        external_id: Some(url.to_string()),
        title: title.to_string(),
        content: format!("Full text of {title}."),
        summary: String::new(),
        url: url.to_string(),
        author: None,
        published_at: Some(Utc::now()),
    }
}

/// A scoring result with one category and one ticker, as the prompt asks for.
pub fn scoring(score: u8) -> ScoringResult {
    ScoringResult {
        relevance_score: score,
        rationale: "scripted".to_string(),
        categories: vec!["chips".to_string()],
        tickers: vec![Ticker {
            symbol: "NVDA".to_string(),
            exchange: Some("NASDAQ".to_string()),
        }],
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Returns scripted items per feed URL; unregistered URLs error.
#[derive(Default)]
pub struct MockFetcher {
    feeds: HashMap<String, Vec<FetchedItem>>,
    failures: HashMap<String, String>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_feed(mut self, url: &str, items: Vec<FetchedItem>) -> Self {
        self.feeds.insert(url.to_string(), items);
        self
    }

    pub fn failing(mut self, url: &str, message: &str) -> Self {
        self.failures.insert(url.to_string(), message.to_string());
        self
    }
}

#[async_trait]
impl FeedFetcher for MockFetcher {
    async fn fetch(&self, source: &SourceConfig) -> Result<Vec<FetchedItem>> {
        if let Some(message) = self.failures.get(&source.url) {
            return Err(anyhow!("{message}"));
        }
        self.feeds
            .get(&source.url)
            .cloned()
            .ok_or_else(|| anyhow!("MockFetcher: no feed registered for {}", source.url))
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

struct StoredSource {
    id: Uuid,
    config: SourceConfig,
    last_fetched_at: Option<chrono::DateTime<Utc>>,
}

struct StoredTicker {
    id: Uuid,
    symbol: String,
    exchange: Option<String>,
}

struct StoredCategory {
    id: Uuid,
    slug: String,
}

#[derive(Default)]
struct Inner {
    sources: Vec<StoredSource>,
    raw_items: Vec<RawItem>,
    articles: Vec<NewArticle>,
    tickers: Vec<StoredTicker>,
    article_tickers: HashSet<(Uuid, Uuid)>,
    categories: Vec<StoredCategory>,
    article_categories: HashSet<(Uuid, Uuid)>,
    fail_article_inserts: bool,
    fail_touch_source: bool,
    seq: i64,
}

/// Stateful in-memory store. Categories are pre-seeded like the migrations do.
pub struct MockStore {
    inner: Mutex<Inner>,
}

impl MockStore {
    pub fn new() -> Self {
        let mut inner = Inner::default();
        for category in Category::ALL {
            inner.categories.push(StoredCategory {
                id: Uuid::new_v4(),
                slug: category.slug().to_string(),
            });
        }
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Make every article insert fail, to exercise the publication-failure path.
    pub fn failing_article_inserts(self) -> Self {
        self.inner.lock().unwrap().fail_article_inserts = true;
        self
    }

    /// Make every last-fetched touch fail.
    pub fn failing_touch_source(self) -> Self {
        self.inner.lock().unwrap().fail_touch_source = true;
        self
    }

    // --- assertion accessors ---

    pub fn raw_items(&self) -> Vec<RawItem> {
        self.inner.lock().unwrap().raw_items.clone()
    }

    pub fn raw_count_for_url(&self, url: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .raw_items
            .iter()
            .filter(|r| r.url == url)
            .count()
    }

    pub fn articles(&self) -> Vec<NewArticle> {
        self.inner.lock().unwrap().articles.clone()
    }

    pub fn article_for_url(&self, url: &str) -> Option<NewArticle> {
        self.inner
            .lock()
            .unwrap()
            .articles
            .iter()
            .find(|a| a.original_url == url)
            .cloned()
    }

    pub fn ticker_symbols_for_article(&self, article_id: Uuid) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        let mut symbols: Vec<String> = inner
            .article_tickers
            .iter()
            .filter(|(a, _)| *a == article_id)
            .filter_map(|(_, t)| {
                inner
                    .tickers
                    .iter()
                    .find(|ticker| ticker.id == *t)
                    .map(|ticker| ticker.symbol.clone())
            })
            .collect();
        symbols.sort();
        symbols
    }

    pub fn category_slugs_for_article(&self, article_id: Uuid) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        let mut slugs: Vec<String> = inner
            .article_categories
            .iter()
            .filter(|(a, _)| *a == article_id)
            .filter_map(|(_, c)| {
                inner
                    .categories
                    .iter()
                    .find(|category| category.id == *c)
                    .map(|category| category.slug.clone())
            })
            .collect();
        slugs.sort();
        slugs
    }

    pub fn source_count(&self) -> usize {
        self.inner.lock().unwrap().sources.len()
    }

    pub fn last_fetched(&self, source_url: &str) -> Option<chrono::DateTime<Utc>> {
        self.inner
            .lock()
            .unwrap()
            .sources
            .iter()
            .find(|s| s.config.url == source_url)
            .and_then(|s| s.last_fetched_at)
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NewsStore for MockStore {
    async fn register_source(&self, config: &SourceConfig) -> Result<Uuid> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.sources.iter().find(|s| s.config.url == config.url) {
            return Ok(existing.id);
        }
        let id = Uuid::new_v4();
        inner.sources.push(StoredSource {
            id,
            config: config.clone(),
            last_fetched_at: None,
        });
        Ok(id)
    }

    async fn touch_source(&self, source_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_touch_source {
            return Err(anyhow!("MockStore: touch_source disabled"));
        }
        if let Some(source) = inner.sources.iter_mut().find(|s| s.id == source_id) {
            source.last_fetched_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn insert_raw_item(&self, item: NewRawItem) -> Result<Option<Uuid>> {
        let mut inner = self.inner.lock().unwrap();
        if inner.raw_items.iter().any(|r| r.url == item.url) {
            return Ok(None);
        }
        let id = Uuid::new_v4();
        // Monotonic fetch timestamps keep FIFO ordering observable.
        inner.seq += 1;
        let fetched_at = Utc::now() + Duration::milliseconds(inner.seq);
        inner.raw_items.push(RawItem {
            id,
            source_id: item.source_id,
            external_id: item.external_id,
            title: item.title,
            content: item.content,
            summary: item.summary,
            url: item.url,
            author: item.author,
            published_at: item.published_at,
            fetched_at,
            processed: false,
        });
        Ok(Some(id))
    }

    async fn unprocessed_batch(&self, limit: u32) -> Result<Vec<RawItem>> {
        let inner = self.inner.lock().unwrap();
        let mut batch: Vec<RawItem> = inner
            .raw_items
            .iter()
            .filter(|r| !r.processed)
            .cloned()
            .collect();
        batch.sort_by_key(|r| r.fetched_at);
        batch.truncate(limit as usize);
        Ok(batch)
    }

    async fn mark_processed(&self, raw_item_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(raw) = inner.raw_items.iter_mut().find(|r| r.id == raw_item_id) {
            raw.processed = true;
        }
        Ok(())
    }

    async fn source_name(&self, source_id: Uuid) -> Result<Option<String>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .sources
            .iter()
            .find(|s| s.id == source_id)
            .map(|s| s.config.name.clone()))
    }

    async fn insert_article(&self, article: NewArticle) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_article_inserts {
            return Err(anyhow!("MockStore: article inserts disabled"));
        }
        if inner.articles.iter().any(|a| a.slug == article.slug) {
            return Err(anyhow!("MockStore: duplicate slug {}", article.slug));
        }
        inner.articles.push(article);
        Ok(())
    }

    async fn ensure_ticker(&self, symbol: &str, exchange: Option<&str>) -> Result<Uuid> {
        let symbol = symbol.to_uppercase();
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner
            .tickers
            .iter()
            .find(|t| t.symbol == symbol && t.exchange.as_deref() == exchange)
        {
            return Ok(existing.id);
        }
        let id = Uuid::new_v4();
        inner.tickers.push(StoredTicker {
            id,
            symbol,
            exchange: exchange.map(str::to_string),
        });
        Ok(id)
    }

    async fn link_ticker(&self, article_id: Uuid, ticker_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.article_tickers.insert((article_id, ticker_id));
        Ok(())
    }

    async fn category_id(&self, slug: &str) -> Result<Option<Uuid>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .categories
            .iter()
            .find(|c| c.slug == slug)
            .map(|c| c.id))
    }

    async fn link_category(&self, article_id: Uuid, category_id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.article_categories.insert((article_id, category_id));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockLlm
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum ScriptedScoring {
    Result(ScoringResult),
    Malformed,
}

/// Scripted LLM provider keyed by article title. Unscripted titles error,
/// so tests fail loudly on unexpected calls.
#[derive(Debug)]
pub struct MockLlm {
    scripted: HashMap<String, ScriptedScoring>,
    fail_summary_for: HashSet<String>,
    summarised: Mutex<Vec<String>>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self {
            scripted: HashMap::new(),
            fail_summary_for: HashSet::new(),
            summarised: Mutex::new(Vec::new()),
        }
    }

    pub fn with_score(self, title: &str, score: u8) -> Self {
        self.with_scoring(title, scoring(score))
    }

    pub fn with_scoring(mut self, title: &str, result: ScoringResult) -> Self {
        self.scripted
            .insert(title.to_string(), ScriptedScoring::Result(result));
        self
    }

    /// The scoring call for this title behaves as if the model returned
    /// something unparseable.
    pub fn with_malformed(mut self, title: &str) -> Self {
        self.scripted
            .insert(title.to_string(), ScriptedScoring::Malformed);
        self
    }

    pub fn failing_summary(mut self, title: &str) -> Self {
        self.fail_summary_for.insert(title.to_string());
        self
    }

    /// Titles that have been passed to `summarise_article`.
    pub fn summarised_titles(&self) -> Vec<String> {
        self.summarised.lock().unwrap().clone()
    }
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlm {
    async fn score_article(
        &self,
        req: ScoreRequest<'_>,
    ) -> std::result::Result<ScoringResult, LlmError> {
        match self.scripted.get(req.title) {
            Some(ScriptedScoring::Result(result)) => Ok(result.clone()),
            Some(ScriptedScoring::Malformed) => Err(LlmError::MalformedScoreResponse(
                "no JSON object found in response".to_string(),
            )),
            None => Err(LlmError::Api(format!(
                "no scripted scoring for '{}'",
                req.title
            ))),
        }
    }

    async fn summarise_article(
        &self,
        req: SummaryRequest<'_>,
    ) -> std::result::Result<SummaryResult, LlmError> {
        self.summarised
            .lock()
            .unwrap()
            .push(req.title.to_string());
        if self.fail_summary_for.contains(req.title) {
            return Err(LlmError::MalformedSummaryResponse(
                "no JSON object found in response".to_string(),
            ));
        }
        Ok(SummaryResult {
            summary: format!("Summary of {}.", req.title),
            why_it_matters: "Market context for traders.".to_string(),
        })
    }
}
