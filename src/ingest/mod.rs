//! Concurrent feed ingestion.
//!
//! One task per source URL, all racing a shared batch deadline. Sources
//! that finish in time land in the output at their declared position;
//! stragglers are aborted and recorded as timeouts. Failures never
//! propagate as errors, they ride along as data next to the successes.

pub mod feed;
pub mod fetcher;

use std::sync::Arc;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::model::FetchErrorKind;

pub use fetcher::{fetch_source, FeedTransport, HttpTransport, SourceOutcome};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_sources_total", "Sources attempted across batch fetches.");
        describe_counter!(
            "ingest_source_failures_total",
            "Sources that failed terminally, by kind."
        );
        describe_counter!("ingest_articles_total", "Articles assembled into batches.");
        describe_counter!("ingest_deduped_total", "Articles merged away as duplicates.");
        describe_histogram!("ingest_fetch_ms", "Single fetch attempt time in milliseconds.");
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_histogram!(
            "ingest_batch_ms",
            "Whole category fan-out time in milliseconds."
        );
    });
}

pub struct ParallelIngestor {
    transport: Arc<dyn FeedTransport>,
    config: PipelineConfig,
}

impl ParallelIngestor {
    pub fn new(transport: Arc<dyn FeedTransport>, config: PipelineConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fetches every source concurrently and returns one outcome per
    /// URL, in declaration order. Sources still running at the batch
    /// deadline are aborted and come back as timeouts with zero
    /// attempts on record.
    pub async fn ingest(&self, urls: &[String]) -> Vec<SourceOutcome> {
        ensure_metrics_described();
        let started = Instant::now();
        let deadline = started + self.config.batch_deadline;

        let mut handles = Vec::with_capacity(urls.len());
        for url in urls {
            let transport = Arc::clone(&self.transport);
            let url = url.clone();
            let retries = self.config.fetch_retries;
            let timeout = self.config.fetch_timeout;
            let backoff = self.config.fetch_backoff;
            let handle = tokio::spawn(async move {
                fetch_source(transport.as_ref(), &url, retries, timeout, backoff).await
            });
            handles.push(handle);
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (url, mut handle) in urls.iter().zip(handles) {
            let outcome = match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(mut outcome)) => {
                    if outcome.items.len() > self.config.per_source_cap {
                        outcome.items.truncate(self.config.per_source_cap);
                    }
                    outcome
                }
                Ok(Err(join_err)) => {
                    warn!(url = %url, error = %join_err, "fetch task failed");
                    failed_outcome(url, FetchErrorKind::Network, 0)
                }
                Err(_) => {
                    handle.abort();
                    warn!(url = %url, "source abandoned at batch deadline");
                    failed_outcome(url, FetchErrorKind::Timeout, 0)
                }
            };
            counter!("ingest_sources_total").increment(1);
            if let Some(kind) = outcome.error {
                counter!("ingest_source_failures_total", "kind" => kind.as_str()).increment(1);
            }
            outcomes.push(outcome);
        }

        histogram!("ingest_batch_ms").record(started.elapsed().as_millis() as f64);
        debug!(
            sources = outcomes.len(),
            failed = outcomes.iter().filter(|o| o.error.is_some()).count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch fan-out finished"
        );
        outcomes
    }
}

fn failed_outcome(url: &str, kind: FetchErrorKind, attempts: u32) -> SourceOutcome {
    SourceOutcome {
        source_url: url.to_string(),
        feed_title: None,
        items: Vec::new(),
        error: Some(kind),
        attempts,
    }
}
