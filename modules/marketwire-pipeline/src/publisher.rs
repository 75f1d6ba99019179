// Publication writer: turns a passing raw item plus its scoring and summary
// into an article row with ticker and category associations.

use anyhow::Result;
use tracing::debug;
use uuid::Uuid;

use llm_client::{ScoringResult, SummaryResult};

use crate::store::{NewArticle, NewsStore, RawItem};

const SLUG_MAX_LEN: usize = 120;

/// Create the published article and its associations. Uniqueness conflicts
/// on associations are no-ops; unknown category slugs are skipped.
pub async fn publish(
    store: &dyn NewsStore,
    raw: &RawItem,
    scoring: &ScoringResult,
    summary: &SummaryResult,
) -> Result<Uuid> {
    let source_name = store
        .source_name(raw.source_id)
        .await?
        .unwrap_or_else(|| "Unknown".to_string());

    // Generate the id up front so the slug suffix can be derived from it.
    let article_id = Uuid::new_v4();
    let slug = unique_slug(&raw.title, article_id);

    store
        .insert_article(NewArticle {
            id: article_id,
            raw_item_id: raw.id,
            slug,
            title: raw.title.clone(),
            original_url: raw.url.clone(),
            source_name,
            ai_summary: summary.summary.clone(),
            why_it_matters: summary.why_it_matters.clone(),
            relevance_score: i32::from(scoring.relevance_score),
            score_rationale: (!scoring.rationale.is_empty()).then(|| scoring.rationale.clone()),
        })
        .await?;

    for ticker in &scoring.tickers {
        let ticker_id = store
            .ensure_ticker(&ticker.symbol, ticker.exchange.as_deref())
            .await?;
        store.link_ticker(article_id, ticker_id).await?;
    }

    for slug in &scoring.categories {
        match store.category_id(slug).await? {
            Some(category_id) => store.link_category(article_id, category_id).await?,
            None => debug!(slug = %slug, "Skipping unknown category"),
        }
    }

    Ok(article_id)
}

/// Lower-cased, apostrophe-stripped title with non-alphanumeric runs
/// collapsed to single hyphens, trimmed and truncated.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase().replace(['\'', '\u{2019}'], "");

    let mut slug = String::with_capacity(lowered.len());
    for ch in lowered.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    slug.truncate(SLUG_MAX_LEN);
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// The base slug plus the first 8 characters of the article id, so two
/// titles that normalise identically still get distinct slugs.
pub fn unique_slug(title: &str, id: Uuid) -> String {
    let suffix = &id.to_string()[..8];
    format!("{}-{}", slugify(title), suffix)
}
