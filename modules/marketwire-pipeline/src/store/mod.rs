// Deduplication store. Canonical-URL uniqueness turns at-least-once fetch
// semantics into at-most-once storage; concurrent runs rely on the store's
// uniqueness constraints with do-nothing-on-conflict semantics, not locks.

pub mod pg;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use marketwire_common::{FetchedItem, SourceConfig};

pub use pg::{ArticleFilter, PgStore, PublishedArticle};

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

/// A stored, not-yet-scored feed entry.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawItem {
    pub id: Uuid,
    pub source_id: Uuid,
    pub external_id: Option<String>,
    pub title: String,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub url: String,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    pub processed: bool,
}

impl RawItem {
    /// Best available text for LLM calls: full text, else the feed-provided
    /// summary, else nothing.
    pub fn best_text(&self) -> &str {
        self.content
            .as_deref()
            .or(self.summary.as_deref())
            .unwrap_or("")
    }
}

/// Parameters for inserting a new raw item.
#[derive(Debug, Clone)]
pub struct NewRawItem {
    pub source_id: Uuid,
    pub external_id: Option<String>,
    pub title: String,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub url: String,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Parameters for inserting a published article. The id is generated by the
/// caller so the slug suffix can be derived from it before the write.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub id: Uuid,
    pub raw_item_id: Uuid,
    pub slug: String,
    pub title: String,
    pub original_url: String,
    pub source_name: String,
    pub ai_summary: String,
    pub why_it_matters: String,
    pub relevance_score: i32,
    pub score_rationale: Option<String>,
}

// ---------------------------------------------------------------------------
// NewsStore trait
// ---------------------------------------------------------------------------

/// Persistence operations the pipeline needs. One Postgres implementation,
/// plus an in-memory mock for deterministic tests.
#[async_trait]
pub trait NewsStore: Send + Sync {
    /// Ensure a source exists and return its id. Idempotent: a second call
    /// for the same canonical URL returns the same id.
    async fn register_source(&self, config: &SourceConfig) -> Result<Uuid>;

    /// Record a successful fetch on the source.
    async fn touch_source(&self, source_id: Uuid) -> Result<()>;

    /// Insert a raw item. Returns `Ok(None)` when the URL is already stored;
    /// a duplicate is expected under re-fetch, not an error.
    async fn insert_raw_item(&self, item: NewRawItem) -> Result<Option<Uuid>>;

    /// Not-yet-processed items, oldest fetched first.
    async fn unprocessed_batch(&self, limit: u32) -> Result<Vec<RawItem>>;

    /// Flip the processed flag. Called once per item, after a scoring
    /// outcome is known and before publication is attempted.
    async fn mark_processed(&self, raw_item_id: Uuid) -> Result<()>;

    /// Display name of a source, if it exists.
    async fn source_name(&self, source_id: Uuid) -> Result<Option<String>>;

    async fn insert_article(&self, article: NewArticle) -> Result<()>;

    /// Resolve-or-create a ticker by (uppercased symbol, exchange).
    async fn ensure_ticker(&self, symbol: &str, exchange: Option<&str>) -> Result<Uuid>;

    async fn link_ticker(&self, article_id: Uuid, ticker_id: Uuid) -> Result<()>;

    /// Look up a pre-seeded category. Unknown slugs yield `None`.
    async fn category_id(&self, slug: &str) -> Result<Option<Uuid>>;

    async fn link_category(&self, article_id: Uuid, category_id: Uuid) -> Result<()>;
}

/// Store fetched items, skipping duplicates by canonical URL. Returns the
/// count of newly stored items. Safe to call repeatedly with overlapping
/// item sets.
pub async fn store_items(
    store: &dyn NewsStore,
    items: &[FetchedItem],
    source_ids: &HashMap<String, Uuid>,
) -> Result<u32> {
    let mut stored = 0;

    for item in items {
        if item.url.is_empty() {
            debug!(title = %item.title, "Skipping item without a URL");
            continue;
        }

        let Some(&source_id) = source_ids.get(&item.source_url) else {
            debug!(source_url = %item.source_url, "Skipping item from unregistered source");
            continue;
        };

        let new_item = NewRawItem {
            source_id,
            external_id: item.external_id.clone(),
            title: item.title.clone(),
            content: none_if_empty(&item.content),
            summary: none_if_empty(&item.summary),
            url: item.url.clone(),
            author: item.author.clone(),
            published_at: item.published_at,
        };

        match store.insert_raw_item(new_item).await {
            Ok(Some(_)) => stored += 1,
            Ok(None) => {} // known URL, expected under re-fetch
            Err(e) => {
                // A write failure loses this item but must not abort the batch.
                warn!(url = %item.url, error = %e, "Failed to store raw item");
            }
        }
    }

    Ok(stored)
}

fn none_if_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}
