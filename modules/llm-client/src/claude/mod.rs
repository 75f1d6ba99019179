mod client;
pub(crate) mod types;

use async_trait::async_trait;

use client::ClaudeClient;
use types::{ChatRequest, WireMessage};

use crate::error::{LlmError, Result};
use crate::parse;
use crate::provider::{LlmProvider, ScoreRequest, ScoringResult, SummaryRequest, SummaryResult};

/// Article content is truncated before prompting to stay well under the
/// model's context limit. Feed bodies occasionally run to whole articles.
const MAX_CONTENT_BYTES: usize = 24_000;

#[derive(Debug)]
pub struct ClaudeProvider {
    client: ClaudeClient,
    model: String,
}

impl ClaudeProvider {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: ClaudeClient::new(api_key),
            model: model.to_string(),
        }
    }

    async fn complete(&self, prompt: String, max_tokens: u32) -> Result<String> {
        let request = ChatRequest::new(&self.model)
            .message(WireMessage::user(prompt))
            .max_tokens(max_tokens)
            .temperature(0.0);

        let response = self.client.chat(&request).await?;
        response
            .text()
            .map(str::to_string)
            .ok_or_else(|| LlmError::Api("No text content in Claude response".to_string()))
    }
}

#[async_trait]
impl LlmProvider for ClaudeProvider {
    async fn score_article(&self, req: ScoreRequest<'_>) -> Result<ScoringResult> {
        let prompt = scoring_prompt(req.title, truncate(req.content), req.source);
        let text = self.complete(prompt, 1024).await?;
        parse::parse_scoring(&text)
    }

    async fn summarise_article(&self, req: SummaryRequest<'_>) -> Result<SummaryResult> {
        let prompt = summary_prompt(req.title, truncate(req.content), req.source, req.score);
        let text = self.complete(prompt, 2048).await?;
        parse::parse_summary(&text)
    }
}

/// Truncate content to at most `MAX_CONTENT_BYTES` at a character boundary.
fn truncate(content: &str) -> &str {
    if content.len() <= MAX_CONTENT_BYTES {
        return content;
    }
    let mut end = MAX_CONTENT_BYTES;
    while !content.is_char_boundary(end) && end > 0 {
        end -= 1;
    }
    &content[..end]
}

fn scoring_prompt(title: &str, content: &str, source: &str) -> String {
    format!(
        r#"You are an AI relevance scoring system for a financial news platform focused on artificial intelligence.

Score the following article for AI relevance to financial markets on a scale of 0-100.

Scoring guidelines:
- 80-100: Directly about AI companies, AI chips, major AI model releases, AI regulation affecting markets
- 60-79: Significant AI component in a broader business/market story
- 40-59: Tangential AI connection with some market relevance
- 0-39: Not AI-relevant or no clear market impact

Also identify:
- ONE primary category (pick the single best fit):
  - infrastructure: AI data centres, cloud compute, energy, scaling (e.g., Azure AI revenue, data centre buildout)
  - regulation: Government policy, AI safety laws, export controls, compliance (e.g., EU AI Act, chip bans)
  - applications: Enterprise AI adoption, new AI products, real-world deployments (e.g., AI in healthcare, new AI tools)
  - chips: Semiconductors, GPUs, custom silicon, chip manufacturing (e.g., NVIDIA earnings, TSMC fabs)
  - models: Foundation models, training breakthroughs, benchmarks, open-source releases (e.g., Llama 4, GPT-5)
- Impacted stock tickers with exchange (e.g., NVDA on NASDAQ)

Respond ONLY with valid JSON matching this schema:
{{
  "relevanceScore": number,
  "rationale": "one sentence explaining the score",
  "categories": ["primary-slug"],
  "tickers": [{{"symbol": "NVDA", "exchange": "NASDAQ"}}]
}}

Article:
Title: {title}
Source: {source}
Content: {content}"#
    )
}

fn summary_prompt(title: &str, content: &str, source: &str, score: u8) -> String {
    format!(
        r#"You are a financial news summariser for MarketWire, a platform covering AI-relevant market news for traders and investors.

Write a detailed summary of the following article in 4-6 sentences. Include specific numbers, names, dates, and key facts from the article. Be factual and objective. Provide enough detail that a trader can understand the full story without reading the original.

Then write a "Why It Matters" section (2-3 sentences) explaining the relevance to financial markets and the AI industry. Connect the news to broader market trends, competitive dynamics, or sector implications.

CRITICAL RULES:
- NEVER include trading advice, price targets, or buy/sell recommendations
- NEVER use speculative language like "investors should" or "this stock will"
- Always attribute information to the original source
- Focus on facts, market context, and industry implications only

Respond ONLY with valid JSON:
{{
  "summary": "4-6 sentence detailed factual summary with specific data points",
  "whyItMatters": "2-3 sentence market relevance and industry implications"
}}

Article:
Title: {title}
Source: {source}
Relevance Score: {score}/100
Content: {content}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "ab".repeat(MAX_CONTENT_BYTES);
        let cut = truncate(&text);
        assert!(cut.len() <= MAX_CONTENT_BYTES);
        assert!(text.starts_with(cut));

        let short = "Hello 世界";
        assert_eq!(truncate(short), short);
    }

    #[test]
    fn prompts_embed_article_fields() {
        let prompt = scoring_prompt("NVIDIA beats", "earnings up", "https://example.com/a");
        assert!(prompt.contains("Title: NVIDIA beats"));
        assert!(prompt.contains("Source: https://example.com/a"));
        assert!(prompt.contains("relevanceScore"));

        let prompt = summary_prompt("t", "c", "s", 72);
        assert!(prompt.contains("Relevance Score: 72/100"));
        assert!(prompt.contains("whyItMatters"));
    }
}
