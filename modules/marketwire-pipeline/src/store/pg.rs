// Postgres persistence. Uniqueness is enforced by the schema; inserts use
// ON CONFLICT DO NOTHING so concurrent runs settle on exactly one row.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use marketwire_common::SourceConfig;

use super::{NewArticle, NewRawItem, NewsStore, RawItem};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Re-queue raw items that were marked processed but never produced an
    /// article. External repair step for runs that died mid-publication.
    pub async fn reset_stuck(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE raw_items SET processed = false
            WHERE processed = true
              AND id NOT IN (SELECT raw_item_id FROM articles)
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl NewsStore for PgStore {
    async fn register_source(&self, config: &SourceConfig) -> Result<Uuid> {
        let inserted = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO sources (name, url, type, category, active)
            VALUES ($1, $2, $3, $4, true)
            ON CONFLICT (url) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&config.name)
        .bind(&config.url)
        .bind(config.kind.as_str())
        .bind(config.category.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(id) = inserted {
            return Ok(id);
        }

        let id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM sources WHERE url = $1")
            .bind(&config.url)
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    async fn touch_source(&self, source_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE sources SET last_fetched_at = now() WHERE id = $1")
            .bind(source_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_raw_item(&self, item: NewRawItem) -> Result<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO raw_items
                (source_id, external_id, title, content, summary, url, author, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (url) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(item.source_id)
        .bind(&item.external_id)
        .bind(&item.title)
        .bind(&item.content)
        .bind(&item.summary)
        .bind(&item.url)
        .bind(&item.author)
        .bind(item.published_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn unprocessed_batch(&self, limit: u32) -> Result<Vec<RawItem>> {
        let rows = sqlx::query_as::<_, RawItem>(
            r#"
            SELECT * FROM raw_items
            WHERE processed = false
            ORDER BY fetched_at ASC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn mark_processed(&self, raw_item_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE raw_items SET processed = true WHERE id = $1")
            .bind(raw_item_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn source_name(&self, source_id: Uuid) -> Result<Option<String>> {
        let name = sqlx::query_scalar::<_, String>("SELECT name FROM sources WHERE id = $1")
            .bind(source_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(name)
    }

    async fn insert_article(&self, article: NewArticle) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO articles
                (id, raw_item_id, slug, title, original_url, source_name,
                 ai_summary, why_it_matters, relevance_score, score_rationale,
                 status, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'published', now())
            "#,
        )
        .bind(article.id)
        .bind(article.raw_item_id)
        .bind(&article.slug)
        .bind(&article.title)
        .bind(&article.original_url)
        .bind(&article.source_name)
        .bind(&article.ai_summary)
        .bind(&article.why_it_matters)
        .bind(article.relevance_score)
        .bind(&article.score_rationale)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ensure_ticker(&self, symbol: &str, exchange: Option<&str>) -> Result<Uuid> {
        let symbol = symbol.to_uppercase();

        let inserted = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO tickers (symbol, exchange)
            VALUES ($1, $2)
            ON CONFLICT (symbol, COALESCE(exchange, '')) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&symbol)
        .bind(exchange)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(id) = inserted {
            return Ok(id);
        }

        let id = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM tickers WHERE symbol = $1 AND exchange IS NOT DISTINCT FROM $2",
        )
        .bind(&symbol)
        .bind(exchange)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn link_ticker(&self, article_id: Uuid, ticker_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO article_tickers (article_id, ticker_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(article_id)
        .bind(ticker_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn category_id(&self, slug: &str) -> Result<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM categories WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn link_category(&self, article_id: Uuid, category_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO article_categories (article_id, category_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(article_id)
        .bind(category_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Read surface
// ---------------------------------------------------------------------------

/// Filters for the published-article listing.
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub page: u32,
    pub limit: u32,
    pub ticker: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TickerTag {
    pub symbol: String,
    pub exchange: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryTag {
    pub slug: String,
    pub name: String,
}

/// A published article as exposed to the front-end.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedArticle {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub summary: String,
    pub why_it_matters: String,
    pub relevance_score: i32,
    pub score_rationale: Option<String>,
    pub source_name: String,
    pub original_url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub tickers: Vec<TickerTag>,
    pub categories: Vec<CategoryTag>,
}

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: Uuid,
    slug: String,
    title: String,
    ai_summary: String,
    why_it_matters: String,
    relevance_score: i32,
    score_rationale: Option<String>,
    source_name: String,
    original_url: String,
    published_at: Option<DateTime<Utc>>,
}

/// Row offset for a 1-based page. Widened to i64 before multiplying: the
/// page number is caller-supplied and may be anything up to u32::MAX.
fn page_offset(page: u32, limit: u32) -> i64 {
    (i64::from(page.max(1)) - 1) * i64::from(limit)
}

const LIST_WHERE: &str = r#"
    status = 'published'
    AND ($1::text IS NULL OR EXISTS (
        SELECT 1 FROM article_tickers at
        JOIN tickers t ON t.id = at.ticker_id
        WHERE at.article_id = a.id AND t.symbol = $1))
    AND ($2::text IS NULL OR EXISTS (
        SELECT 1 FROM article_categories ac
        JOIN categories c ON c.id = ac.category_id
        WHERE ac.article_id = a.id AND c.slug = $2))
"#;

impl PgStore {
    /// Published articles, newest first, paginated, optionally filtered by
    /// ticker symbol and category slug. Returns the page plus total count.
    pub async fn list_articles(
        &self,
        filter: &ArticleFilter,
    ) -> Result<(Vec<PublishedArticle>, i64)> {
        let page = filter.page.max(1);
        let limit = filter.limit.clamp(1, 100);
        let offset = page_offset(page, limit);

        let ticker = filter.ticker.as_deref().map(str::to_uppercase);
        let category = filter.category.as_deref().map(str::to_lowercase);

        let query = format!(
            r#"
            SELECT id, slug, title, ai_summary, why_it_matters, relevance_score,
                   score_rationale, source_name, original_url, published_at
            FROM articles a
            WHERE {LIST_WHERE}
            ORDER BY published_at DESC NULLS LAST
            LIMIT $3 OFFSET $4
            "#
        );

        let rows = sqlx::query_as::<_, ArticleRow>(&query)
            .bind(&ticker)
            .bind(&category)
            .bind(i64::from(limit))
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let count_query = format!("SELECT count(*) FROM articles a WHERE {LIST_WHERE}");
        let total = sqlx::query_scalar::<_, i64>(&count_query)
            .bind(&ticker)
            .bind(&category)
            .fetch_one(&self.pool)
            .await?;

        let mut articles = Vec::with_capacity(rows.len());
        for row in rows {
            articles.push(self.hydrate(row).await?);
        }

        Ok((articles, total))
    }

    pub async fn article_by_slug(&self, slug: &str) -> Result<Option<PublishedArticle>> {
        let row = sqlx::query_as::<_, ArticleRow>(
            r#"
            SELECT id, slug, title, ai_summary, why_it_matters, relevance_score,
                   score_rationale, source_name, original_url, published_at
            FROM articles
            WHERE slug = $1 AND status = 'published'
            "#,
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn hydrate(&self, row: ArticleRow) -> Result<PublishedArticle> {
        let tickers = sqlx::query_as::<_, (String, Option<String>)>(
            r#"
            SELECT t.symbol, t.exchange FROM tickers t
            JOIN article_tickers at ON at.ticker_id = t.id
            WHERE at.article_id = $1
            ORDER BY t.symbol
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(symbol, exchange)| TickerTag { symbol, exchange })
        .collect();

        let categories = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT c.slug, c.name FROM categories c
            JOIN article_categories ac ON ac.category_id = c.id
            WHERE ac.article_id = $1
            ORDER BY c.slug
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(slug, name)| CategoryTag { slug, name })
        .collect();

        Ok(PublishedArticle {
            id: row.id,
            slug: row.slug,
            title: row.title,
            summary: row.ai_summary,
            why_it_matters: row.why_it_matters,
            relevance_score: row.relevance_score,
            score_rationale: row.score_rationale,
            source_name: row.source_name,
            original_url: row.original_url,
            published_at: row.published_at,
            tickers,
            categories,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_offset_is_zero_based_from_page_one() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(2, 20), 20);
        assert_eq!(page_offset(0, 20), 0);
    }

    #[test]
    fn page_offset_survives_extreme_page_numbers() {
        assert_eq!(
            page_offset(u32::MAX, 100),
            (i64::from(u32::MAX) - 1) * 100
        );
        assert_eq!(page_offset(u32::MAX, 1), i64::from(u32::MAX) - 1);
    }
}
