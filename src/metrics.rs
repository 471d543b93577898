use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::PipelineConfig;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Installs the global Prometheus recorder. Call once at startup,
    /// before the pipeline records anything.
    pub fn init(config: &PipelineConfig) -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("installing prometheus recorder")?;

        describe_counter!(
            "cache_reads_total",
            "Cache reads by outcome (fresh/stale/miss)."
        );
        describe_counter!(
            "cache_refresh_armed_total",
            "Background refreshes armed by stale reads."
        );
        describe_counter!(
            "lean_classifier_fallback_total",
            "Lean scores that fell back to the heuristic."
        );
        describe_gauge!("pipeline_soft_ttl_ms", "Configured cache soft TTL.");

        // Static gauge; the TTL does not change at runtime.
        gauge!("pipeline_soft_ttl_ms").set(config.soft_ttl_ms as f64);

        Ok(Self { handle })
    }

    /// Router exposing `/metrics` in the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
