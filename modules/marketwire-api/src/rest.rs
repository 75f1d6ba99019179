use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::{info, warn};

use marketwire_pipeline::store::ArticleFilter;

use crate::AppState;

// --- Query structs ---

#[derive(Deserialize)]
pub struct ArticlesQuery {
    page: Option<u32>,
    limit: Option<u32>,
    ticker: Option<String>,
    category: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    batch_size: Option<u32>,
    fetch_only: Option<bool>,
}

// --- Handlers ---

pub async fn api_articles(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ArticlesQuery>,
) -> impl IntoResponse {
    let filter = ArticleFilter {
        page: params.page.unwrap_or(1),
        limit: params.limit.unwrap_or(20),
        ticker: params.ticker,
        category: params.category,
    };

    match state.store.list_articles(&filter).await {
        Ok((articles, total)) => Json(serde_json::json!({
            "articles": articles,
            "total": total,
            "page": filter.page.max(1),
            "limit": filter.limit.clamp(1, 100),
        }))
        .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to list articles");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_article_by_slug(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> impl IntoResponse {
    match state.store.article_by_slug(&slug).await {
        Ok(Some(article)) => Json(article).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Article not found"})),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, slug = %slug, "Failed to load article");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Trigger a pipeline run. Requires the shared ingest secret as a bearer
/// token; only one run is allowed at a time.
pub async fn api_ingest(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Option<Json<IngestRequest>>,
) -> impl IntoResponse {
    let Some(expected) = state.ingest_secret.as_deref() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"ok": false, "error": "Ingest endpoint is disabled"})),
        )
            .into_response();
    };

    let supplied = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if supplied != Some(expected) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"ok": false, "error": "Invalid or missing bearer token"})),
        )
            .into_response();
    }

    // Feed fetching and LLM scoring are not reentrant-friendly; a second
    // trigger while a run is in flight gets a conflict instead of a queue.
    let Ok(_guard) = state.ingest_lock.try_lock() else {
        return (
            StatusCode::CONFLICT,
            Json(serde_json::json!({"ok": false, "error": "An ingest run is already in progress"})),
        )
            .into_response();
    };

    let Json(request) = body.unwrap_or_default();
    let batch_size = request.batch_size.unwrap_or(20).min(100);

    let result = if request.fetch_only.unwrap_or(false) {
        state.pipeline.run_fetch_only().await
    } else {
        state.pipeline.run(batch_size).await
    };

    match result {
        Ok(stats) => {
            info!("Ingest run complete. {stats}");
            Json(serde_json::json!({"ok": true, "stats": stats})).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Ingest run failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"ok": false, "error": e.to_string()})),
            )
                .into_response()
        }
    }
}
