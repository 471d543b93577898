//! # Source bias table
//!
//! Maps outlet names (and, as a fallback, feed URL domains) to a signed
//! political bias in `-2..=2` (-2 strong-left, +2 strong-right).
//!
//! - Loads from JSON config (weights + aliases), seed otherwise.
//! - Case-insensitive lookup with separator normalization.
//! - Fallback order: aliases -> exact -> substring -> URL domain -> default.
//! - Hot-reloadable behind [`BiasHandle`] for the admin endpoint.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::Deserialize;
use tracing::warn;
use url::Url;

pub const ENV_BIAS_PATH: &str = "NEWS_BIAS_PATH";

const BIAS_MIN: i8 = -2;
const BIAS_MAX: i8 = 2;

/// Bias table, loaded from JSON or the built-in seed.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceBiasConfig {
    /// Bias when nothing matches; 0 keeps unknown outlets neutral.
    #[serde(default)]
    pub default_bias: i8,
    /// Canonical outlet name (or bare domain) -> bias.
    #[serde(default)]
    pub weights: HashMap<String, i8>,
    /// Alternative spellings -> canonical names.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

impl Default for SourceBiasConfig {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl SourceBiasConfig {
    /// Env-pointed JSON file when present and parseable, seed otherwise.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(ENV_BIAS_PATH) {
            if let Some(cfg) = Self::try_load_file(Path::new(&path)) {
                return cfg;
            }
            warn!(path = %path, "bias table file unusable, using seed");
        }
        Self::default_seed()
    }

    fn try_load_file(path: &Path) -> Option<Self> {
        let raw = std::fs::read_to_string(path).ok()?;
        let cfg: Self = serde_json::from_str(&raw).ok()?;
        Some(cfg.normalized())
    }

    /// Re-keys maps through `normalize` and clamps file values into range,
    /// so lookups never depend on how the file author spelled keys.
    fn normalized(self) -> Self {
        let weights = self
            .weights
            .into_iter()
            .map(|(k, v)| (normalize(&k), v.clamp(BIAS_MIN, BIAS_MAX)))
            .collect();
        let aliases = self
            .aliases
            .into_iter()
            .map(|(k, v)| (normalize(&k), normalize(&v)))
            .collect();
        Self {
            default_bias: self.default_bias.clamp(BIAS_MIN, BIAS_MAX),
            weights,
            aliases,
        }
    }

    /// Bias for a source. The display name is tried first; the URL's host
    /// is the fallback for feeds with unhelpful channel titles.
    pub fn bias_for(&self, source_name: &str, url: Option<&str>) -> i8 {
        if let Some(b) = self.lookup(&normalize(source_name)) {
            return b;
        }
        if let Some(host) = url.and_then(registrable_domain) {
            if let Some(b) = self.lookup(&normalize(&host)) {
                return b;
            }
        }
        self.default_bias.clamp(BIAS_MIN, BIAS_MAX)
    }

    /// aliases -> exact -> longest substring match.
    fn lookup(&self, key: &str) -> Option<i8> {
        if key.is_empty() {
            return None;
        }
        if let Some(canon) = self.aliases.get(key) {
            if let Some(&b) = self.weights.get(canon) {
                return Some(b.clamp(BIAS_MIN, BIAS_MAX));
            }
        }
        if let Some(&b) = self.weights.get(key) {
            return Some(b.clamp(BIAS_MIN, BIAS_MAX));
        }
        // Longest key wins so "fox business" beats "fox" deterministically.
        self.weights
            .iter()
            .filter(|(k, _)| key.contains(k.as_str()))
            .max_by_key(|(k, _)| k.len())
            .map(|(_, &b)| b.clamp(BIAS_MIN, BIAS_MAX))
    }

    /// Built-in seed with widely-known outlets on both poles. Deployments
    /// tune this via `NEWS_BIAS_PATH`.
    pub(crate) fn default_seed() -> Self {
        let mut weights = HashMap::new();
        let mut aliases = HashMap::new();

        for (k, v) in [
            ("breitbart", 2),
            ("daily wire", 2),
            ("daily caller", 2),
            ("newsmax", 2),
            ("fox news", 1),
            ("fox business", 1),
            ("new york post", 1),
            ("washington examiner", 1),
            ("national review", 1),
            ("wall street journal", 1),
            ("reuters", 0),
            ("associated press", 0),
            ("bbc news", 0),
            ("the hill", 0),
            ("axios", 0),
            ("politico", 0),
            ("npr", -1),
            ("cnn", -1),
            ("new york times", -1),
            ("washington post", -1),
            ("the guardian", -1),
            ("vox", -1),
            ("msnbc", -2),
            ("huffpost", -2),
            ("mother jones", -2),
            ("the nation", -2),
            // Bare domains for the URL fallback.
            ("foxnews com", 1),
            ("breitbart com", 2),
            ("nytimes com", -1),
            ("npr org", -1),
            ("bbc co uk", 0),
            ("apnews com", 0),
            ("theguardian com", -1),
            ("msnbc com", -2),
        ] {
            weights.insert(k.to_string(), v);
        }

        for (a, c) in [
            ("ap", "associated press"),
            ("ap news", "associated press"),
            ("wsj", "wall street journal"),
            ("the wall street journal", "wall street journal"),
            ("nyt", "new york times"),
            ("nytimes", "new york times"),
            ("wapo", "washington post"),
            ("fox", "fox news"),
            ("bbc", "bbc news"),
            ("huffington post", "huffpost"),
            ("guardian", "the guardian"),
        ] {
            aliases.insert(a.to_string(), c.to_string());
        }

        Self {
            default_bias: 0,
            weights,
            aliases,
        }
    }
}

/// Shared, reloadable view of the table.
#[derive(Clone)]
pub struct BiasHandle(Arc<RwLock<SourceBiasConfig>>);

impl BiasHandle {
    pub fn new(cfg: SourceBiasConfig) -> Self {
        Self(Arc::new(RwLock::new(cfg)))
    }

    pub fn from_env() -> Self {
        Self::new(SourceBiasConfig::load())
    }

    pub fn bias_for(&self, source_name: &str, url: Option<&str>) -> i8 {
        match self.0.read() {
            Ok(cfg) => cfg.bias_for(source_name, url),
            Err(_) => 0,
        }
    }

    /// Re-reads the env-pointed file. Returns false when no file was
    /// applied (missing path, unreadable, unparseable); the table is left
    /// untouched in that case.
    pub fn reload_from_env(&self) -> bool {
        let Ok(path) = std::env::var(ENV_BIAS_PATH) else {
            return false;
        };
        let Some(cfg) = SourceBiasConfig::try_load_file(Path::new(&path)) else {
            warn!(path = %path, "bias table reload failed, keeping current table");
            return false;
        };
        if let Ok(mut guard) = self.0.write() {
            *guard = cfg;
            return true;
        }
        false
    }
}

/// Lowercase, separators to spaces, collapse runs.
fn normalize(s: &str) -> String {
    let mut out = s.trim().to_ascii_lowercase();
    for ch in ['-', '_', '/', '\\', '.', ',', '\''] {
        out = out.replace(ch, " ");
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Host without the leading "www."; substring matching absorbs deeper
/// subdomains like feeds.foxnews.com.
fn registrable_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}
