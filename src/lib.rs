//! News ingestion, enrichment, and caching pipeline with a thin HTTP
//! adapter on top.
//!
//! Flow for one category: fan out over its feed URLs, parse RSS/Atom,
//! enrich every item (plain text, media, political lean), merge
//! duplicates, cache the batch behind soft/hard TTLs. The HTTP layer
//! serves either a blocking fetch or a stale-while-revalidate cache read.

pub mod api;
pub mod cache;
pub mod config;
pub mod dedup;
pub mod ingest;
pub mod lean;
pub mod media;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod registry;
pub mod text;

pub use crate::api::create_router;
pub use crate::model::{Article, CategoryBatch, Variant};
pub use crate::pipeline::NewsPipeline;
