// Pipeline orchestrator: fetch -> dedup-store -> score -> summarise ->
// publish, with per-item outcomes aggregated into run statistics.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::{info, warn};
use uuid::Uuid;

use llm_client::LlmProvider;
use marketwire_common::{RunStats, SourceConfig};

use crate::fetcher::{fetch_all, FeedFetcher};
use crate::scorer::{ItemOutcome, Scorer};
use crate::store::{store_items, NewsStore};

pub struct Pipeline {
    store: Arc<dyn NewsStore>,
    fetcher: Arc<dyn FeedFetcher>,
    llm: Arc<dyn LlmProvider>,
    sources: Vec<SourceConfig>,
    threshold: u8,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn NewsStore>,
        fetcher: Arc<dyn FeedFetcher>,
        llm: Arc<dyn LlmProvider>,
        sources: Vec<SourceConfig>,
        threshold: u8,
    ) -> Self {
        Self {
            store,
            fetcher,
            llm,
            sources,
            threshold,
        }
    }

    /// Run the full pipeline over a bounded batch of unprocessed items.
    pub async fn run(&self, batch_size: u32) -> Result<RunStats> {
        self.run_inner(batch_size, false).await
    }

    /// Fetch and store only; scoring is skipped entirely.
    pub async fn run_fetch_only(&self) -> Result<RunStats> {
        self.run_inner(0, true).await
    }

    async fn run_inner(&self, batch_size: u32, fetch_only: bool) -> Result<RunStats> {
        let started = Instant::now();

        // 1. Register sources. Idempotent by canonical URL.
        let mut source_ids: HashMap<String, Uuid> = HashMap::new();
        for source in &self.sources {
            let id = self.store.register_source(source).await?;
            source_ids.insert(source.url.clone(), id);
        }
        info!(sources = source_ids.len(), "Sources registered");

        // 2. Fetch all feeds concurrently.
        let (items, feed_errors) = fetch_all(self.fetcher.as_ref(), &self.sources).await;
        info!(
            fetched = items.len(),
            feed_errors = feed_errors.len(),
            "Feed fetch settled"
        );

        // 3. Store raw items, deduplicating by URL.
        let stored = store_items(self.store.as_ref(), &items, &source_ids).await?;
        info!(
            stored,
            duplicates = items.len() as u32 - stored,
            "Raw items stored"
        );

        // Touch last-fetched on every source that answered. Bookkeeping
        // only; a failed touch must not abort the run before scoring.
        let failed: HashSet<&str> = feed_errors.iter().map(|e| e.source.as_str()).collect();
        for source in &self.sources {
            if !failed.contains(source.name.as_str()) {
                if let Some(&id) = source_ids.get(&source.url) {
                    if let Err(e) = self.store.touch_source(id).await {
                        warn!(source = %source.name, error = %e, "Failed to touch source");
                    }
                }
            }
        }

        let mut stats = RunStats {
            fetched: items.len() as u32,
            feed_errors: feed_errors.len() as u32,
            stored,
            duplicates_skipped: items.len() as u32 - stored,
            ..Default::default()
        };

        // 4. Score and publish.
        if !fetch_only {
            let scorer = Scorer::new(self.store.clone(), self.llm.clone(), self.threshold);
            let outcomes = scorer.score_unprocessed(batch_size).await?;

            stats.scored = outcomes.len() as u32;
            for outcome in &outcomes {
                match outcome {
                    ItemOutcome::Published { .. } => stats.published += 1,
                    ItemOutcome::Rejected { .. } => stats.rejected += 1,
                    ItemOutcome::Errored { raw_item_id, reason } => {
                        info!(raw_item_id = %raw_item_id, reason = %reason, "Item errored");
                        stats.errored += 1;
                    }
                }
            }
        }

        stats.elapsed_seconds = started.elapsed().as_secs_f64();
        Ok(stats)
    }
}
