use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use llm_client::create_provider;
use marketwire_common::Config;
use marketwire_pipeline::fetcher::RssFetcher;
use marketwire_pipeline::pipeline::Pipeline;
use marketwire_pipeline::sources;
use marketwire_pipeline::store::PgStore;

mod rest;

pub struct AppState {
    pub store: PgStore,
    pub pipeline: Pipeline,
    pub ingest_secret: Option<String>,
    pub ingest_lock: Mutex<()>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("marketwire=info".parse()?),
        )
        .init();

    let config = Config::from_env();
    config.log_redacted();

    let store = PgStore::connect(&config.database_url).await?;
    store.migrate().await?;

    let llm = create_provider(
        &config.llm_provider,
        &config.anthropic_api_key,
        &config.llm_model,
    )?;

    let pipeline = Pipeline::new(
        Arc::new(store.clone()),
        Arc::new(RssFetcher::new()),
        llm,
        sources::default_sources(),
        config.relevance_threshold,
    );

    let state = Arc::new(AppState {
        store,
        pipeline,
        ingest_secret: config.ingest_secret.clone(),
        ingest_lock: Mutex::new(()),
    });

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/articles", get(rest::api_articles))
        .route("/api/articles/{slug}", get(rest::api_article_by_slug))
        .route("/api/ingest", post(rest::api_ingest))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        );

    let addr = format!("{}:{}", config.api_host, config.api_port);
    info!("MarketWire API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
