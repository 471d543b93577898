//! Binary entrypoint: boots the Axum HTTP server, wiring the ingest
//! pipeline, lean scorer, cache, and metrics.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use spectrum_news_aggregator::api;
use spectrum_news_aggregator::cache::SwrCache;
use spectrum_news_aggregator::config::PipelineConfig;
use spectrum_news_aggregator::ingest::HttpTransport;
use spectrum_news_aggregator::lean::{
    build_classifier_from_env, BiasHandle, LeanScorer, DEFAULT_CLASSIFIER_TIMEOUT_MS,
};
use spectrum_news_aggregator::metrics::Metrics;
use spectrum_news_aggregator::pipeline::NewsPipeline;
use spectrum_news_aggregator::registry::FeedRegistry;

const ENV_PORT: &str = "PORT";
const DEFAULT_PORT: u16 = 8080;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = PipelineConfig::from_env();
    let registry = FeedRegistry::load();
    info!(categories = ?registry.categories(), "feed registry loaded");

    let metrics = Metrics::init(&config)?;

    let transport =
        Arc::new(HttpTransport::new(config.fetch_timeout).context("building feed transport")?);
    let scorer = LeanScorer::new(
        BiasHandle::from_env(),
        build_classifier_from_env(),
        Duration::from_millis(DEFAULT_CLASSIFIER_TIMEOUT_MS),
    );
    let cache = SwrCache::with_system_clock(config.soft_ttl_ms, config.hard_ttl_ms);
    let pipeline = NewsPipeline::new(registry, config, transport, scorer, cache, None);

    let app = api::create_router(pipeline).merge(metrics.router());

    let port: u16 = std::env::var(ENV_PORT)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("binding port {port}"))?;
    info!(port, "listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
