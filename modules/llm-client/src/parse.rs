// Defensive parsing of LLM responses. The model is untrusted input: it may
// wrap its JSON in a fenced code block, return out-of-range scores, or emit
// junk categories and tickers. Everything is validated before use.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::LlmError;
use crate::provider::{ScoringResult, SummaryResult, Ticker};

static FENCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("Invalid fence regex"));

/// Extract the JSON payload from a response that may be wrapped in a
/// markdown code fence.
pub(crate) fn extract_json(text: &str) -> &str {
    FENCE_PATTERN
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or_else(|| text.trim())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScoreWire {
    relevance_score: f64,
    #[serde(default)]
    rationale: String,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    tickers: Vec<TickerWire>,
}

#[derive(Deserialize)]
struct TickerWire {
    symbol: String,
    #[serde(default)]
    exchange: Option<String>,
}

pub(crate) fn parse_scoring(text: &str) -> Result<ScoringResult, LlmError> {
    let wire: ScoreWire = serde_json::from_str(extract_json(text))
        .map_err(|e| LlmError::MalformedScoreResponse(e.to_string()))?;

    let score = wire.relevance_score;
    if !(0.0..=100.0).contains(&score) || score.fract() != 0.0 {
        return Err(LlmError::MalformedScoreResponse(format!(
            "relevance score must be an integer in 0-100, got {score}"
        )));
    }

    let mut seen = HashSet::new();
    let categories: Vec<String> = wire
        .categories
        .into_iter()
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty() && seen.insert(c.clone()))
        .collect();

    let tickers: Vec<Ticker> = wire
        .tickers
        .into_iter()
        .filter(|t| !t.symbol.trim().is_empty())
        .map(|t| Ticker {
            symbol: t.symbol.trim().to_uppercase(),
            exchange: t
                .exchange
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty()),
        })
        .collect();

    Ok(ScoringResult {
        relevance_score: score as u8,
        rationale: wire.rationale,
        categories,
        tickers,
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryWire {
    summary: String,
    why_it_matters: String,
}

pub(crate) fn parse_summary(text: &str) -> Result<SummaryResult, LlmError> {
    let wire: SummaryWire = serde_json::from_str(extract_json(text))
        .map_err(|e| LlmError::MalformedSummaryResponse(e.to_string()))?;

    Ok(SummaryResult {
        summary: wire.summary,
        why_it_matters: wire.why_it_matters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_json() {
        assert_eq!(extract_json("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(extract_json("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(extract_json("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn extracts_fenced_json_with_prose_around_it() {
        let text = "Here is my answer:\n```json\n{\"relevanceScore\": 80}\n```\nHope that helps!";
        assert_eq!(extract_json(text), "{\"relevanceScore\": 80}");
    }

    #[test]
    fn parses_full_scoring_response() {
        let text = r#"{
            "relevanceScore": 85,
            "rationale": "NVIDIA earnings are directly AI-market relevant",
            "categories": ["chips"],
            "tickers": [{"symbol": "nvda", "exchange": "NASDAQ"}]
        }"#;
        let result = parse_scoring(text).unwrap();
        assert_eq!(result.relevance_score, 85);
        assert_eq!(result.categories, vec!["chips"]);
        assert_eq!(result.tickers[0].symbol, "NVDA");
        assert_eq!(result.tickers[0].exchange.as_deref(), Some("NASDAQ"));
    }

    #[test]
    fn rejects_non_json_response() {
        let err = parse_scoring("I cannot score this article.").unwrap_err();
        assert!(matches!(err, LlmError::MalformedScoreResponse(_)));
    }

    #[test]
    fn rejects_out_of_range_score() {
        let err = parse_scoring(r#"{"relevanceScore": 150, "rationale": ""}"#).unwrap_err();
        assert!(matches!(err, LlmError::MalformedScoreResponse(_)));
    }

    #[test]
    fn rejects_fractional_score() {
        let err = parse_scoring(r#"{"relevanceScore": 72.5, "rationale": ""}"#).unwrap_err();
        assert!(matches!(err, LlmError::MalformedScoreResponse(_)));
    }

    #[test]
    fn rejects_non_numeric_score() {
        let err = parse_scoring(r#"{"relevanceScore": "high", "rationale": ""}"#).unwrap_err();
        assert!(matches!(err, LlmError::MalformedScoreResponse(_)));
    }

    #[test]
    fn drops_blank_tickers_and_normalises_symbols() {
        let text = r#"{
            "relevanceScore": 60,
            "rationale": "r",
            "categories": ["Chips", "chips"],
            "tickers": [{"symbol": "  "}, {"symbol": "msft", "exchange": ""}]
        }"#;
        let result = parse_scoring(text).unwrap();
        assert_eq!(result.categories, vec!["chips"]);
        assert_eq!(result.tickers.len(), 1);
        assert_eq!(result.tickers[0].symbol, "MSFT");
        assert_eq!(result.tickers[0].exchange, None);
    }

    #[test]
    fn deduplicates_non_adjacent_categories() {
        let text = r#"{
            "relevanceScore": 70,
            "rationale": "r",
            "categories": ["chips", "models", "Chips"]
        }"#;
        let result = parse_scoring(text).unwrap();
        assert_eq!(result.categories, vec!["chips", "models"]);
    }

    #[test]
    fn parses_summary_response() {
        let text = "```json\n{\"summary\": \"s\", \"whyItMatters\": \"w\"}\n```";
        let result = parse_summary(text).unwrap();
        assert_eq!(result.summary, "s");
        assert_eq!(result.why_it_matters, "w");
    }

    #[test]
    fn rejects_summary_missing_fields() {
        let err = parse_summary(r#"{"summary": "only half"}"#).unwrap_err();
        assert!(matches!(err, LlmError::MalformedSummaryResponse(_)));
    }
}
