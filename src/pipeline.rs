//! Category pipeline: fan-out ingest, enrichment, dedup, SWR cache.
//!
//! `fetch_category` is the blocking path (miss or forced refresh);
//! `get_cached` is the non-blocking path that serves whatever the cache
//! holds and arms at most one background refresh per staleness window.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{CacheRead, SwrCache};
use crate::config::PipelineConfig;
use crate::dedup;
use crate::ingest::feed::RawItem;
use crate::ingest::{FeedTransport, ParallelIngestor, SourceOutcome};
use crate::lean::{BiasHandle, LeanScorer};
use crate::media;
use crate::model::{article_id, Article, CategoryBatch, LeanResult, MediaBundle, Variant};
use crate::registry::FeedRegistry;
use crate::text::{normalize_plain, summarize};

pub const DESCRIPTION_MAX_CHARS: usize = 280;

pub const PLACEHOLDER_TITLE: &str = "No articles available right now";

/// External sanitizer contract. Sanitization itself ships outside this
/// repo; without an installed sanitizer `content_sanitized_html` stays
/// empty.
pub trait HtmlSanitizer: Send + Sync {
    fn sanitize(&self, html: &str, policy: &SanitizePolicy) -> String;
}

#[derive(Debug, Clone)]
pub struct SanitizePolicy {
    pub allowed_tags: Vec<String>,
    pub allowed_attributes: Vec<String>,
    pub allowed_iframe_hosts: Vec<String>,
}

impl Default for SanitizePolicy {
    fn default() -> Self {
        let own = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        Self {
            allowed_tags: own(&[
                "p", "a", "em", "strong", "ul", "ol", "li", "blockquote", "img", "figure",
                "figcaption", "h2", "h3", "br",
            ]),
            allowed_attributes: own(&["href", "src", "alt", "title"]),
            allowed_iframe_hosts: own(&["www.youtube.com", "player.vimeo.com"]),
        }
    }
}

/// Non-blocking cache read handed to the HTTP layer.
#[derive(Debug, Clone)]
pub struct CachedView {
    pub articles: Arc<Vec<Article>>,
    pub stale: bool,
}

struct Inner {
    registry: FeedRegistry,
    ingestor: ParallelIngestor,
    scorer: LeanScorer,
    cache: SwrCache,
    sanitizer: Option<Arc<dyn HtmlSanitizer>>,
    policy: SanitizePolicy,
    config: PipelineConfig,
}

struct Assembled {
    batch: CategoryBatch,
    /// Real article count before placeholder injection; a refresh that
    /// produced nothing keeps the previous cache entry.
    produced: usize,
}

#[derive(Clone)]
pub struct NewsPipeline {
    inner: Arc<Inner>,
}

impl NewsPipeline {
    pub fn new(
        registry: FeedRegistry,
        config: PipelineConfig,
        transport: Arc<dyn FeedTransport>,
        scorer: LeanScorer,
        cache: SwrCache,
        sanitizer: Option<Arc<dyn HtmlSanitizer>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                ingestor: ParallelIngestor::new(transport, config.clone()),
                scorer,
                cache,
                sanitizer,
                policy: SanitizePolicy::default(),
                config,
            }),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &FeedRegistry {
        &self.inner.registry
    }

    pub fn bias_handle(&self) -> &BiasHandle {
        self.inner.scorer.bias_handle()
    }

    /// Blocking path: ingest, enrich, dedup, cache, return. Never fails;
    /// a batch with nothing real in it carries the outage placeholder.
    pub async fn fetch_category(&self, category: &str, variant: Variant) -> CategoryBatch {
        let assembled = self.assemble(category, variant).await;
        self.inner
            .cache
            .set(category, variant, assembled.batch.articles.clone());
        assembled.batch
    }

    /// Non-blocking path. `None` means the caller must fall back to
    /// [`fetch_category`]; a stale hit arms one background refresh.
    pub fn get_cached(&self, category: &str, variant: Variant) -> Option<CachedView> {
        match self.inner.cache.get(category, variant) {
            CacheRead::Miss => None,
            CacheRead::Hit { articles, stale } => {
                if stale && self.inner.cache.begin_refresh(category, variant) {
                    let pipeline = self.clone();
                    let category = category.to_string();
                    tokio::spawn(async move {
                        pipeline.refresh(&category, variant).await;
                    });
                }
                Some(CachedView { articles, stale })
            }
        }
    }

    async fn refresh(&self, category: &str, variant: Variant) {
        debug!(category, variant = %variant, "background refresh started");
        let assembled = self.assemble(category, variant).await;
        if assembled.produced > 0 {
            self.inner
                .cache
                .set(category, variant, assembled.batch.articles);
            info!(category, variant = %variant, "background refresh published");
        } else {
            self.inner.cache.abort_refresh(category, variant);
            warn!(category, variant = %variant, "refresh produced nothing, keeping stale entry");
        }
    }

    async fn assemble(&self, category: &str, variant: Variant) -> Assembled {
        let sources = self.inner.registry.sources(category);
        let outcomes = self.inner.ingestor.ingest(sources).await;

        let cap = match variant {
            Variant::Fast => self.inner.config.fast_cap,
            Variant::Full => self.inner.config.batch_cap,
        };

        let mut failed_sources = Vec::new();
        let mut articles = Vec::new();
        for outcome in &outcomes {
            if let Some(kind) = outcome.error {
                warn!(category, source = %outcome.source_url, kind = %kind, attempts = outcome.attempts, "source failed");
                failed_sources.push(outcome.source_url.clone());
                continue;
            }
            let source_name = source_display_name(outcome);
            // The cap truncates the ingested concatenation; items past it
            // are never enriched.
            for item in outcome.items.iter().take(cap - articles.len()) {
                articles.push(
                    self.build_article(item, &source_name, &outcome.source_url, variant)
                        .await,
                );
            }
        }

        let before = articles.len();
        let mut articles = dedup::merge_duplicates(articles);
        let merged_away = before - articles.len();
        if merged_away > 0 {
            counter!("ingest_deduped_total").increment(merged_away as u64);
        }
        counter!("ingest_articles_total").increment(articles.len() as u64);

        let produced = articles.len();
        if articles.is_empty() {
            warn!(category, "no source produced articles, serving placeholder");
            articles.push(placeholder_article(category));
        }

        Assembled {
            batch: CategoryBatch {
                articles,
                failed_sources,
            },
            produced,
        }
    }

    async fn build_article(
        &self,
        item: &RawItem,
        source_name: &str,
        source_url: &str,
        variant: Variant,
    ) -> Article {
        let content_source = item
            .content_html
            .as_deref()
            .or(item.description_html.as_deref())
            .unwrap_or("");
        let content_plain = normalize_plain(content_source);

        let media = match variant {
            Variant::Full => media::extract(content_source, &item.media),
            Variant::Fast => media::extract_structured(&item.media),
        };

        let scoring_text = format!("{} {}", item.title, content_plain);
        let (lean, classifier_summary) = match variant {
            Variant::Full => {
                let out = self
                    .inner
                    .scorer
                    .score(source_name, Some(source_url), &scoring_text)
                    .await;
                (out.lean, out.summary)
            }
            Variant::Fast => (
                self.inner
                    .scorer
                    .heuristic(source_name, Some(source_url), &scoring_text),
                None,
            ),
        };

        let description = classifier_summary.unwrap_or_else(|| {
            let base = item
                .description_html
                .as_deref()
                .map(normalize_plain)
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| content_plain.clone());
            summarize(&base, DESCRIPTION_MAX_CHARS)
        });

        let content_sanitized_html = match &self.inner.sanitizer {
            Some(sanitizer) => sanitizer.sanitize(content_source, &self.inner.policy),
            None => String::new(),
        };

        let identity = item
            .link
            .clone()
            .unwrap_or_else(|| dedup::fingerprint(&item.title));

        Article {
            id: article_id(&identity),
            title: item.title.clone(),
            url: item.link.clone(),
            published_at: item.published_at.unwrap_or_else(Utc::now),
            source_name: source_name.to_string(),
            description,
            content_plain,
            content_sanitized_html,
            media,
            lean,
        }
    }
}

fn source_display_name(outcome: &SourceOutcome) -> String {
    if let Some(title) = outcome.feed_title.as_deref() {
        let title = title.trim();
        if !title.is_empty() {
            return title.to_string();
        }
    }
    host_of(&outcome.source_url).unwrap_or_else(|| outcome.source_url.clone())
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
}

/// The advisory article served when a whole category comes up empty, so
/// clients never branch on empty-vs-error.
fn placeholder_article(category: &str) -> Article {
    Article {
        id: article_id(&dedup::fingerprint(PLACEHOLDER_TITLE)),
        title: PLACEHOLDER_TITLE.to_string(),
        url: None,
        published_at: Utc::now(),
        source_name: "spectrum".to_string(),
        description: format!(
            "Every configured source for \"{category}\" failed or returned nothing. \
             The next refresh will try again."
        ),
        content_plain: String::new(),
        content_sanitized_html: String::new(),
        media: MediaBundle::default(),
        lean: LeanResult {
            reasons: vec!["outage placeholder, not scored".to_string()],
            ..LeanResult::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};
    use std::time::Duration;

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::*;
    use crate::lean::{DisabledClassifier, MockClassifier, SourceBiasConfig};
    use crate::model::LeanLabel;

    const WIRE_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Example Wire</title>
<item>
  <title>Budget talks stall in committee</title>
  <link>https://wire.example/budget</link>
  <description>Talks stalled again. More soon.</description>
  <enclosure url="https://wire.example/budget.jpg" type="image/jpeg"/>
  <pubDate>Tue, 05 Aug 2025 14:30:00 GMT</pubDate>
</item>
</channel></rss>"#;

    struct CannedTransport(HashMap<String, String>);

    #[async_trait]
    impl FeedTransport for CannedTransport {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no route for {url}"))
        }
    }

    fn registry_one(category: &str, url: &str) -> FeedRegistry {
        let mut map = BTreeMap::new();
        map.insert(category.to_string(), vec![url.to_string()]);
        FeedRegistry::from_categories(map)
    }

    fn neutral_scorer(classifier: Arc<dyn crate::lean::LeanClassifier>) -> LeanScorer {
        LeanScorer::new(
            BiasHandle::new(SourceBiasConfig {
                default_bias: 0,
                weights: HashMap::new(),
                aliases: HashMap::new(),
            }),
            classifier,
            Duration::from_millis(200),
        )
    }

    fn pipeline_for(
        registry: FeedRegistry,
        routes: HashMap<String, String>,
        classifier: Arc<dyn crate::lean::LeanClassifier>,
    ) -> NewsPipeline {
        NewsPipeline::new(
            registry,
            PipelineConfig::default(),
            Arc::new(CannedTransport(routes)),
            neutral_scorer(classifier),
            SwrCache::with_system_clock(60_000, 600_000),
            None,
        )
    }

    #[tokio::test]
    async fn full_fetch_assembles_enriched_articles() {
        let url = "https://wire.example/rss";
        let mut routes = HashMap::new();
        routes.insert(url.to_string(), WIRE_RSS.to_string());
        let pipeline = pipeline_for(registry_one("politics", url), routes, Arc::new(DisabledClassifier));

        let batch = pipeline.fetch_category("politics", Variant::Full).await;
        assert!(batch.failed_sources.is_empty());
        assert_eq!(batch.articles.len(), 1);

        let a = &batch.articles[0];
        assert_eq!(a.title, "Budget talks stall in committee");
        assert_eq!(a.source_name, "Example Wire");
        assert_eq!(a.url.as_deref(), Some("https://wire.example/budget"));
        assert_eq!(a.id, article_id("https://wire.example/budget"));
        assert_eq!(
            a.published_at,
            chrono::Utc.timestamp_opt(1_754_404_200, 0).unwrap()
        );
        assert_eq!(a.description, "Talks stalled again. More soon.");
        assert_eq!(a.media.images.len(), 1);
        assert_eq!(a.media.images[0].src, "https://wire.example/budget.jpg");
        assert_eq!(a.lean.label, LeanLabel::Center);
        assert!(a.content_sanitized_html.is_empty());
    }

    #[tokio::test]
    async fn total_failure_serves_placeholder_and_names_the_source() {
        let url = "https://down.example/rss";
        let pipeline = pipeline_for(
            registry_one("politics", url),
            HashMap::new(),
            Arc::new(DisabledClassifier),
        );

        let batch = pipeline.fetch_category("politics", Variant::Full).await;
        assert_eq!(batch.failed_sources, vec![url.to_string()]);
        assert_eq!(batch.articles.len(), 1);
        assert_eq!(batch.articles[0].title, PLACEHOLDER_TITLE);
        assert_eq!(batch.articles[0].lean.label, LeanLabel::Center);
    }

    #[tokio::test]
    async fn unknown_category_serves_placeholder_without_failures() {
        let pipeline = pipeline_for(
            registry_one("politics", "https://wire.example/rss"),
            HashMap::new(),
            Arc::new(DisabledClassifier),
        );
        let batch = pipeline.fetch_category("sports", Variant::Full).await;
        assert!(batch.failed_sources.is_empty());
        assert_eq!(batch.articles.len(), 1);
        assert_eq!(batch.articles[0].title, PLACEHOLDER_TITLE);
    }

    #[tokio::test]
    async fn classifier_summary_becomes_the_description() {
        let url = "https://wire.example/rss";
        let body = WIRE_RSS.replace(
            "Budget talks stall in committee",
            "Budget talks stall mock-right",
        );
        let mut routes = HashMap::new();
        routes.insert(url.to_string(), body);
        let pipeline = pipeline_for(
            registry_one("politics", url),
            routes,
            Arc::new(MockClassifier),
        );

        let full = pipeline.fetch_category("politics", Variant::Full).await;
        assert_eq!(full.articles[0].lean.label, LeanLabel::Right);
        assert_eq!(full.articles[0].description, "Mock verdict: leans right.");

        // The fast tier never consults the classifier.
        let fast = pipeline.fetch_category("politics", Variant::Fast).await;
        assert_eq!(fast.articles[0].lean.label, LeanLabel::Center);
        assert_eq!(fast.articles[0].description, "Talks stalled again. More soon.");
    }

    struct MarkerSanitizer;

    impl HtmlSanitizer for MarkerSanitizer {
        fn sanitize(&self, html: &str, policy: &SanitizePolicy) -> String {
            assert!(policy.allowed_tags.iter().any(|t| t == "p"));
            format!("<p>{}</p>", html.len())
        }
    }

    #[tokio::test]
    async fn installed_sanitizer_fills_sanitized_html() {
        let url = "https://wire.example/rss";
        let mut routes = HashMap::new();
        routes.insert(url.to_string(), WIRE_RSS.to_string());
        let pipeline = NewsPipeline::new(
            registry_one("politics", url),
            PipelineConfig::default(),
            Arc::new(CannedTransport(routes)),
            neutral_scorer(Arc::new(DisabledClassifier)),
            SwrCache::with_system_clock(60_000, 600_000),
            Some(Arc::new(MarkerSanitizer)),
        );
        let batch = pipeline.fetch_category("politics", Variant::Full).await;
        assert!(batch.articles[0]
            .content_sanitized_html
            .starts_with("<p>"));
    }

    #[tokio::test]
    async fn fetch_primes_the_cache_for_cached_reads() {
        let url = "https://wire.example/rss";
        let mut routes = HashMap::new();
        routes.insert(url.to_string(), WIRE_RSS.to_string());
        let pipeline = pipeline_for(registry_one("politics", url), routes, Arc::new(DisabledClassifier));

        assert!(pipeline.get_cached("politics", Variant::Full).is_none());
        pipeline.fetch_category("politics", Variant::Full).await;
        let view = pipeline
            .get_cached("politics", Variant::Full)
            .expect("primed");
        assert!(!view.stale);
        assert_eq!(view.articles.len(), 1);
        // Variants cache separately.
        assert!(pipeline.get_cached("politics", Variant::Fast).is_none());
    }
}
