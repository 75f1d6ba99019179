// End-to-end pipeline runs against the in-memory test doubles: no network,
// no Postgres, no live LLM.

use std::sync::Arc;

use llm_client::{ScoringResult, Ticker};
use marketwire_common::{SourceCategory, SourceConfig, SourceKind};
use marketwire_pipeline::pipeline::Pipeline;
use marketwire_pipeline::sources;
use marketwire_pipeline::testing::{item, scoring, MockFetcher, MockLlm, MockStore};

fn source(name: &str, url: &str) -> SourceConfig {
    SourceConfig {
        name: name.to_string(),
        url: url.to_string(),
        kind: SourceKind::Rss,
        category: SourceCategory::AiSpecific,
    }
}

fn pipeline(
    store: Arc<MockStore>,
    fetcher: MockFetcher,
    llm: Arc<MockLlm>,
    sources: Vec<SourceConfig>,
) -> Pipeline {
    Pipeline::new(store, Arc::new(fetcher), llm, sources, 40)
}

#[tokio::test]
async fn full_run_over_default_sources_with_one_failing_feed() {
    let configs = sources::default_sources();
    assert_eq!(configs.len(), 7);

    // Every source answers with two items except the last, which errors.
    let mut fetcher = MockFetcher::new();
    let mut llm = MockLlm::new();
    let mut expected_fetched = 0u32;
    for (i, config) in configs.iter().enumerate() {
        if i == configs.len() - 1 {
            fetcher = fetcher.failing(&config.url, "connection refused");
            continue;
        }
        let a = format!("Headline {i}A");
        let b = format!("Headline {i}B");
        fetcher = fetcher.on_feed(
            &config.url,
            vec![
                item(config, &format!("https://news.example/{i}/a"), &a),
                item(config, &format!("https://news.example/{i}/b"), &b),
            ],
        );
        llm = llm.with_score(&a, 85).with_score(&b, 10);
        expected_fetched += 2;
    }

    let store = Arc::new(MockStore::new());
    let pipe = pipeline(store.clone(), fetcher, Arc::new(llm), configs.clone());

    let stats = pipe.run(100).await.unwrap();

    assert_eq!(stats.fetched, expected_fetched);
    assert_eq!(stats.feed_errors, 1);
    assert_eq!(stats.stored, expected_fetched);
    assert_eq!(stats.duplicates_skipped, 0);
    assert_eq!(stats.scored, expected_fetched);
    assert_eq!(stats.published, 6);
    assert_eq!(stats.rejected, 6);
    assert_eq!(stats.errored, 0);

    // All seven sources registered; the failing one was never touched.
    assert_eq!(store.source_count(), 7);
    assert!(store.last_fetched(&configs[0].url).is_some());
    assert!(store.last_fetched(&configs[6].url).is_none());
}

#[tokio::test]
async fn second_run_stores_nothing_new() {
    let src = source("Feed", "https://feed.example/rss");
    let items = vec![
        item(&src, "https://news.example/1", "First"),
        item(&src, "https://news.example/2", "Second"),
    ];

    let store = Arc::new(MockStore::new());
    let llm = Arc::new(MockLlm::new().with_score("First", 90).with_score("Second", 90));

    let first = pipeline(
        store.clone(),
        MockFetcher::new().on_feed(&src.url, items.clone()),
        llm.clone(),
        vec![src.clone()],
    );
    let stats = first.run(100).await.unwrap();
    assert_eq!(stats.stored, 2);
    assert_eq!(stats.published, 2);

    // Same feed content on the next run: everything is a duplicate and
    // nothing is left to score.
    let second = pipeline(
        store.clone(),
        MockFetcher::new().on_feed(&src.url, items),
        llm,
        vec![src.clone()],
    );
    let stats = second.run(100).await.unwrap();
    assert_eq!(stats.fetched, 2);
    assert_eq!(stats.stored, 0);
    assert_eq!(stats.duplicates_skipped, 2);
    assert_eq!(stats.scored, 0);
    assert_eq!(stats.published, 0);

    assert_eq!(store.raw_count_for_url("https://news.example/1"), 1);
    assert_eq!(store.raw_count_for_url("https://news.example/2"), 1);
}

#[tokio::test]
async fn threshold_is_inclusive_and_rejects_skip_summarisation() {
    let src = source("Feed", "https://feed.example/rss");
    let store = Arc::new(MockStore::new());
    let llm = Arc::new(
        MockLlm::new()
            .with_score("At threshold", 40)
            .with_score("Just below", 39),
    );

    let pipe = pipeline(
        store.clone(),
        MockFetcher::new().on_feed(
            &src.url,
            vec![
                item(&src, "https://news.example/at", "At threshold"),
                item(&src, "https://news.example/below", "Just below"),
            ],
        ),
        llm.clone(),
        vec![src],
    );

    let stats = pipe.run(100).await.unwrap();
    assert_eq!(stats.published, 1);
    assert_eq!(stats.rejected, 1);

    // The rejected item never reached the summarisation call.
    assert_eq!(llm.summarised_titles(), vec!["At threshold".to_string()]);

    let article = store.article_for_url("https://news.example/at").unwrap();
    assert_eq!(article.relevance_score, 40);
    assert!(store.article_for_url("https://news.example/below").is_none());

    // Both items are done either way.
    assert!(store.raw_items().iter().all(|r| r.processed));
}

#[tokio::test]
async fn malformed_scoring_response_errors_item_but_marks_it_processed() {
    let src = source("Feed", "https://feed.example/rss");
    let store = Arc::new(MockStore::new());
    let llm = Arc::new(
        MockLlm::new()
            .with_malformed("Garbled")
            .with_score("Fine", 80),
    );

    let pipe = pipeline(
        store.clone(),
        MockFetcher::new().on_feed(
            &src.url,
            vec![
                item(&src, "https://news.example/garbled", "Garbled"),
                item(&src, "https://news.example/fine", "Fine"),
            ],
        ),
        llm,
        vec![src],
    );

    let stats = pipe.run(100).await.unwrap();
    assert_eq!(stats.scored, 2);
    assert_eq!(stats.errored, 1);
    assert_eq!(stats.published, 1);

    // The failed item does not stay queued for the next run.
    assert!(store.raw_items().iter().all(|r| r.processed));
    assert!(store.article_for_url("https://news.example/garbled").is_none());
}

#[tokio::test]
async fn summary_failure_errors_item_without_publishing() {
    let src = source("Feed", "https://feed.example/rss");
    let store = Arc::new(MockStore::new());
    let llm = Arc::new(MockLlm::new().with_score("Hot", 95).failing_summary("Hot"));

    let pipe = pipeline(
        store.clone(),
        MockFetcher::new()
            .on_feed(&src.url, vec![item(&src, "https://news.example/hot", "Hot")]),
        llm,
        vec![src],
    );

    let stats = pipe.run(100).await.unwrap();
    assert_eq!(stats.errored, 1);
    assert_eq!(stats.published, 0);
    assert!(store.articles().is_empty());
    assert!(store.raw_items()[0].processed);
}

#[tokio::test]
async fn publication_failure_still_counts_item_as_processed() {
    let src = source("Feed", "https://feed.example/rss");
    let store = Arc::new(MockStore::new().failing_article_inserts());
    let llm = Arc::new(MockLlm::new().with_score("Doomed", 90));

    let pipe = pipeline(
        store.clone(),
        MockFetcher::new()
            .on_feed(&src.url, vec![item(&src, "https://news.example/d", "Doomed")]),
        llm,
        vec![src],
    );

    let stats = pipe.run(100).await.unwrap();
    assert_eq!(stats.errored, 1);
    assert_eq!(stats.published, 0);
    assert!(store.raw_items()[0].processed);
}

#[tokio::test]
async fn touch_source_failure_does_not_abort_the_run() {
    let src = source("Feed", "https://feed.example/rss");
    let store = Arc::new(MockStore::new().failing_touch_source());
    let llm = Arc::new(MockLlm::new().with_score("Still scored", 90));

    let pipe = pipeline(
        store.clone(),
        MockFetcher::new().on_feed(
            &src.url,
            vec![item(&src, "https://news.example/s", "Still scored")],
        ),
        llm,
        vec![src.clone()],
    );

    // Last-fetched bookkeeping fails, but the run carries on to scoring.
    let stats = pipe.run(100).await.unwrap();
    assert_eq!(stats.stored, 1);
    assert_eq!(stats.published, 1);
    assert!(store.last_fetched(&src.url).is_none());
}

#[tokio::test]
async fn published_article_carries_tickers_and_known_categories() {
    let src = source("Feed", "https://feed.example/rss");
    let store = Arc::new(MockStore::new());
    let llm = Arc::new(MockLlm::new().with_scoring(
        "Nvidia ships Blackwell",
        ScoringResult {
            relevance_score: 92,
            rationale: "Major chip launch".to_string(),
            // "datacenters" is not in the taxonomy and must be dropped.
            categories: vec!["chips".to_string(), "datacenters".to_string()],
            tickers: vec![
                Ticker {
                    symbol: "NVDA".to_string(),
                    exchange: Some("NASDAQ".to_string()),
                },
                Ticker {
                    symbol: "TSM".to_string(),
                    exchange: None,
                },
            ],
        },
    ));

    let pipe = pipeline(
        store.clone(),
        MockFetcher::new().on_feed(
            &src.url,
            vec![item(&src, "https://news.example/nvda", "Nvidia ships Blackwell")],
        ),
        llm,
        vec![src],
    );

    let stats = pipe.run(100).await.unwrap();
    assert_eq!(stats.published, 1);

    let article = store.article_for_url("https://news.example/nvda").unwrap();
    assert!(article.slug.starts_with("nvidia-ships-blackwell-"));
    assert_eq!(article.source_name, "Feed");
    assert_eq!(article.relevance_score, 92);
    assert_eq!(article.score_rationale.as_deref(), Some("Major chip launch"));
    assert_eq!(article.ai_summary, "Summary of Nvidia ships Blackwell.");

    assert_eq!(
        store.ticker_symbols_for_article(article.id),
        vec!["NVDA".to_string(), "TSM".to_string()]
    );
    assert_eq!(
        store.category_slugs_for_article(article.id),
        vec!["chips".to_string()]
    );
}

#[tokio::test]
async fn fetch_only_run_skips_scoring_entirely() {
    let src = source("Feed", "https://feed.example/rss");
    let store = Arc::new(MockStore::new());
    // No scripted responses: any LLM call would error the item.
    let llm = Arc::new(MockLlm::new());

    let pipe = pipeline(
        store.clone(),
        MockFetcher::new()
            .on_feed(&src.url, vec![item(&src, "https://news.example/x", "X")]),
        llm.clone(),
        vec![src],
    );

    let stats = pipe.run_fetch_only().await.unwrap();
    assert_eq!(stats.stored, 1);
    assert_eq!(stats.scored, 0);
    assert_eq!(stats.errored, 0);
    assert!(llm.summarised_titles().is_empty());
    assert!(!store.raw_items()[0].processed);
}

#[tokio::test]
async fn batch_size_bounds_scoring_oldest_first() {
    let src = source("Feed", "https://feed.example/rss");
    let store = Arc::new(MockStore::new());
    let llm = Arc::new(
        MockLlm::new()
            .with_score("One", 50)
            .with_score("Two", 50)
            .with_score("Three", 50),
    );

    let pipe = pipeline(
        store.clone(),
        MockFetcher::new().on_feed(
            &src.url,
            vec![
                item(&src, "https://news.example/1", "One"),
                item(&src, "https://news.example/2", "Two"),
                item(&src, "https://news.example/3", "Three"),
            ],
        ),
        llm,
        vec![src],
    );

    let stats = pipe.run(2).await.unwrap();
    assert_eq!(stats.stored, 3);
    assert_eq!(stats.scored, 2);
    assert_eq!(stats.published, 2);

    let unprocessed: Vec<String> = store
        .raw_items()
        .iter()
        .filter(|r| !r.processed)
        .map(|r| r.title.clone())
        .collect();
    assert_eq!(unprocessed, vec!["Three".to_string()]);
}

#[tokio::test]
async fn items_without_urls_are_not_stored() {
    let src = source("Feed", "https://feed.example/rss");
    let mut no_url = item(&src, "", "No link");
    no_url.external_id = None;

    let store = Arc::new(MockStore::new());
    let pipe = pipeline(
        store.clone(),
        MockFetcher::new().on_feed(&src.url, vec![no_url]),
        Arc::new(MockLlm::new()),
        vec![src],
    );

    let stats = pipe.run_fetch_only().await.unwrap();
    assert_eq!(stats.fetched, 1);
    assert_eq!(stats.stored, 0);
    assert!(store.raw_items().is_empty());
}
