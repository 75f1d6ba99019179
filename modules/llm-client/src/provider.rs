use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::claude::ClaudeProvider;
use crate::error::{LlmError, Result};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Input for a relevance scoring call.
#[derive(Debug, Clone, Copy)]
pub struct ScoreRequest<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub source: &'a str,
}

/// Input for a summarisation call. Only issued for items that passed the
/// relevance threshold, so the score is always available.
#[derive(Debug, Clone, Copy)]
pub struct SummaryRequest<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub source: &'a str,
    pub score: u8,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A market symbol extracted from an article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ticker {
    pub symbol: String,
    pub exchange: Option<String>,
}

/// Validated scoring output. Symbols are uppercased and category slugs
/// lowercased during parsing; callers still enum-check categories against
/// the fixed taxonomy.
#[derive(Debug, Clone)]
pub struct ScoringResult {
    pub relevance_score: u8,
    pub rationale: String,
    pub categories: Vec<String>,
    pub tickers: Vec<Ticker>,
}

#[derive(Debug, Clone)]
pub struct SummaryResult {
    pub summary: String,
    pub why_it_matters: String,
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// The external LLM capability: two single-round-trip operations with no
/// session state between calls.
#[async_trait]
pub trait LlmProvider: Send + Sync + std::fmt::Debug {
    /// Score an article for AI-market relevance (0-100) and tag it.
    async fn score_article(&self, req: ScoreRequest<'_>) -> Result<ScoringResult>;

    /// Produce a trader-facing summary and "why it matters" note.
    async fn summarise_article(&self, req: SummaryRequest<'_>) -> Result<SummaryResult>;
}

/// Resolve a provider by name. Called once at startup; the resulting instance
/// is injected into the pipeline.
pub fn create_provider(
    name: &str,
    api_key: &str,
    model: &str,
) -> Result<Arc<dyn LlmProvider>> {
    match name.trim() {
        "claude" => Ok(Arc::new(ClaudeProvider::new(api_key, model))),
        other => Err(LlmError::UnknownProvider(other.to_string())),
    }
}
