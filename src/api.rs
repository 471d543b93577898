use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::model::{Article, Variant};
use crate::pipeline::NewsPipeline;

#[derive(Clone)]
pub struct AppState {
    pipeline: NewsPipeline,
}

pub fn create_router(pipeline: NewsPipeline) -> Router {
    let state = AppState { pipeline };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/news/{category}", get(fetch_news))
        .route("/api/cached/{category}", get(cached_news))
        .route("/admin/reload-bias", post(reload_bias))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Deserialize)]
struct VariantQuery {
    #[serde(default)]
    variant: Option<Variant>,
}

impl VariantQuery {
    fn variant(&self) -> Variant {
        self.variant.unwrap_or(Variant::Fast)
    }
}

#[derive(Serialize)]
struct NewsResponse {
    articles: Vec<Article>,
    stale: bool,
    failed_sources: Vec<String>,
}

#[derive(Serialize)]
struct CachedResponse {
    articles: Vec<Article>,
    stale: bool,
}

#[derive(Serialize)]
struct ReloadResponse {
    reloaded: bool,
}

/// Blocking fetch; always assembles a fresh batch and re-primes the cache.
async fn fetch_news(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(q): Query<VariantQuery>,
) -> Json<NewsResponse> {
    let batch = state.pipeline.fetch_category(&category, q.variant()).await;
    Json(NewsResponse {
        articles: batch.articles,
        stale: false,
        failed_sources: batch.failed_sources,
    })
}

/// Cache-first read. A miss (cold key or hard-expired entry) falls back
/// to the blocking fetch, so this route always answers with articles.
async fn cached_news(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(q): Query<VariantQuery>,
) -> Json<CachedResponse> {
    let variant = q.variant();
    if let Some(view) = state.pipeline.get_cached(&category, variant) {
        return Json(CachedResponse {
            articles: view.articles.as_ref().clone(),
            stale: view.stale,
        });
    }
    let batch = state.pipeline.fetch_category(&category, variant).await;
    Json(CachedResponse {
        articles: batch.articles,
        stale: false,
    })
}

async fn reload_bias(State(state): State<AppState>) -> Json<ReloadResponse> {
    Json(ReloadResponse {
        reloaded: state.pipeline.bias_handle().reload_from_env(),
    })
}
