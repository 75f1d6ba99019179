// Scoring stage. One item at a time, strictly sequential, so external API
// concurrency stays bounded. A single item's failure never aborts the batch.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use uuid::Uuid;

use llm_client::{LlmProvider, ScoreRequest, SummaryRequest};
use marketwire_common::Category;

use crate::publisher;
use crate::store::{NewsStore, RawItem};

/// Outcome of processing one raw item. Errors stop at the item boundary.
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    Published { raw_item_id: Uuid, score: u8 },
    Rejected { raw_item_id: Uuid, score: u8 },
    Errored { raw_item_id: Uuid, reason: String },
}

pub struct Scorer {
    store: Arc<dyn NewsStore>,
    llm: Arc<dyn LlmProvider>,
    threshold: u8,
}

impl Scorer {
    pub fn new(store: Arc<dyn NewsStore>, llm: Arc<dyn LlmProvider>, threshold: u8) -> Self {
        Self {
            store,
            llm,
            threshold,
        }
    }

    /// Score a batch of unprocessed raw items, oldest fetched first, and
    /// publish the ones that pass the relevance threshold.
    pub async fn score_unprocessed(&self, batch_size: u32) -> Result<Vec<ItemOutcome>> {
        let batch = self.store.unprocessed_batch(batch_size).await?;
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        info!(items = batch.len(), "Scoring unprocessed items");

        let mut outcomes = Vec::with_capacity(batch.len());
        for raw in &batch {
            outcomes.push(self.process_item(raw).await);
        }
        Ok(outcomes)
    }

    async fn process_item(&self, raw: &RawItem) -> ItemOutcome {
        let scoring = self
            .llm
            .score_article(ScoreRequest {
                title: &raw.title,
                content: raw.best_text(),
                source: &raw.url,
            })
            .await;

        // The scoring outcome is now known (pass, reject, or error), so the
        // item is marked processed before publication is attempted.
        if let Err(e) = self.store.mark_processed(raw.id).await {
            return ItemOutcome::Errored {
                raw_item_id: raw.id,
                reason: format!("failed to mark processed: {e}"),
            };
        }

        let mut scoring = match scoring {
            Ok(s) => s,
            Err(e) => {
                warn!(url = %raw.url, error = %e, "Scoring failed");
                return ItemOutcome::Errored {
                    raw_item_id: raw.id,
                    reason: e.to_string(),
                };
            }
        };

        // Enum-check category slugs against the fixed taxonomy.
        scoring
            .categories
            .retain(|slug| Category::from_slug(slug).is_some());

        let score = scoring.relevance_score;
        if score < self.threshold {
            info!(url = %raw.url, score, "Rejected below threshold");
            return ItemOutcome::Rejected {
                raw_item_id: raw.id,
                score,
            };
        }

        let summary = match self
            .llm
            .summarise_article(SummaryRequest {
                title: &raw.title,
                content: raw.best_text(),
                source: &raw.url,
                score,
            })
            .await
        {
            Ok(s) => s,
            Err(e) => {
                warn!(url = %raw.url, error = %e, "Summarisation failed");
                return ItemOutcome::Errored {
                    raw_item_id: raw.id,
                    reason: e.to_string(),
                };
            }
        };

        match publisher::publish(self.store.as_ref(), raw, &scoring, &summary).await {
            Ok(article_id) => {
                info!(url = %raw.url, score, article_id = %article_id, "Article published");
                ItemOutcome::Published {
                    raw_item_id: raw.id,
                    score,
                }
            }
            Err(e) => {
                // Item is already marked processed; it stays unpublished
                // until an external repair re-queues it.
                warn!(url = %raw.url, error = %e, "Publication failed");
                ItemOutcome::Errored {
                    raw_item_id: raw.id,
                    reason: e.to_string(),
                }
            }
        }
    }
}
