//! Single-source fetch: transport, per-attempt timeout, linear backoff.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::ingest::feed::{parse_feed, ParsedFeed, RawItem};
use crate::model::FetchErrorKind;

/// Byte transport for feed documents. The production impl is HTTP;
/// tests swap in canned bodies.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Responses larger than this are refused rather than buffered; feeds
/// are untrusted input.
const MAX_FEED_BYTES: usize = 2 * 1024 * 1024;

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// The client timeout doubles as a safety net under the per-attempt
    /// timeout the fetch loop applies.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(
                "spectrum-news-aggregator/",
                env!("CARGO_PKG_VERSION")
            ))
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedTransport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<String> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("requesting {url}"))?
            .error_for_status()
            .with_context(|| format!("bad status from {url}"))?;
        if let Some(len) = response.content_length() {
            if len > MAX_FEED_BYTES as u64 {
                anyhow::bail!("{url}: {len} byte body exceeds the feed size cap");
            }
        }
        // Chunked responses carry no length up front; cap while reading.
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .with_context(|| format!("reading body from {url}"))?
        {
            if body.len() + chunk.len() > MAX_FEED_BYTES {
                anyhow::bail!("{url}: body exceeds the feed size cap");
            }
            body.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

/// Terminal result for one source, successful or not. `attempts` counts
/// every try made, including the successful one.
#[derive(Debug)]
pub struct SourceOutcome {
    pub source_url: String,
    pub feed_title: Option<String>,
    pub items: Vec<RawItem>,
    pub error: Option<FetchErrorKind>,
    pub attempts: u32,
}

async fn attempt(
    transport: &dyn FeedTransport,
    url: &str,
) -> Result<ParsedFeed, (FetchErrorKind, anyhow::Error)> {
    let body = transport
        .fetch(url)
        .await
        .map_err(|e| (FetchErrorKind::Network, e))?;
    let feed = parse_feed(&body).map_err(|e| (FetchErrorKind::Parse, e))?;
    Ok(feed)
}

/// Fetches and parses one feed with up to `retries` re-tries. Each
/// attempt races a fresh `timeout`; failed attempts back off linearly
/// (`backoff * attempt_number`) before the next try.
pub async fn fetch_source(
    transport: &dyn FeedTransport,
    url: &str,
    retries: u32,
    timeout: Duration,
    backoff: Duration,
) -> SourceOutcome {
    let max_attempts = retries.saturating_add(1);
    let mut attempts = 0;
    let mut last_kind = FetchErrorKind::Network;
    while attempts < max_attempts {
        attempts += 1;
        let started = Instant::now();
        let raced = tokio::time::timeout(timeout, attempt(transport, url)).await;
        histogram!("ingest_fetch_ms").record(started.elapsed().as_millis() as f64);
        match raced {
            Ok(Ok(feed)) => {
                debug!(url, attempts, items = feed.items.len(), "source fetched");
                return SourceOutcome {
                    source_url: url.to_string(),
                    feed_title: feed.title,
                    items: feed.items,
                    error: None,
                    attempts,
                };
            }
            Ok(Err((kind, err))) => {
                warn!(url, attempt = attempts, kind = %kind, error = %err, "fetch attempt failed");
                last_kind = kind;
            }
            Err(_) => {
                warn!(
                    url,
                    attempt = attempts,
                    timeout_ms = timeout.as_millis() as u64,
                    "fetch attempt timed out"
                );
                last_kind = FetchErrorKind::Timeout;
            }
        }
        if attempts < max_attempts {
            tokio::time::sleep(backoff * attempts).await;
        }
    }
    SourceOutcome {
        source_url: url.to_string(),
        feed_title: None,
        items: Vec::new(),
        error: Some(last_kind),
        attempts,
    }
}
