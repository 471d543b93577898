//! Category -> ordered feed URL registry.
//!
//! Ships with a built-in seed; an operator can point `NEWS_FEEDS_PATH` at
//! a TOML or JSON file to replace it. URL order within a category is the
//! batch output order, so the file's ordering is meaningful.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

pub const ENV_FEEDS_PATH: &str = "NEWS_FEEDS_PATH";

#[derive(Debug, Clone, Deserialize)]
pub struct FeedRegistry {
    #[serde(default)]
    categories: BTreeMap<String, Vec<String>>,
}

impl Default for FeedRegistry {
    fn default() -> Self {
        default_seed()
    }
}

impl FeedRegistry {
    /// Env-pointed file first, built-in seed otherwise. A file that fails
    /// to read or parse logs and falls back rather than aborting startup.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(ENV_FEEDS_PATH) {
            let path = Path::new(&path);
            match Self::try_load_file(path) {
                Some(registry) => return registry,
                None => warn!(path = %path.display(), "feed registry file unusable, using seed"),
            }
        }
        default_seed()
    }

    fn try_load_file(path: &Path) -> Option<Self> {
        let raw = std::fs::read_to_string(path).ok()?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let parsed: Option<Self> = match ext.as_str() {
            "toml" => toml::from_str(&raw).ok(),
            "json" => serde_json::from_str(&raw).ok(),
            // Unknown extension: try TOML, then JSON.
            _ => toml::from_str(&raw)
                .ok()
                .or_else(|| serde_json::from_str(&raw).ok()),
        };
        parsed.map(Self::clean)
    }

    pub fn from_categories(categories: BTreeMap<String, Vec<String>>) -> Self {
        Self { categories }.clean()
    }

    /// Ordered source URLs for a category; empty for unknown categories
    /// (the pipeline then serves the outage placeholder).
    pub fn sources(&self, category: &str) -> &[String] {
        self.categories
            .get(&category.trim().to_ascii_lowercase())
            .map(|urls| urls.as_slice())
            .unwrap_or(&[])
    }

    pub fn categories(&self) -> Vec<&str> {
        self.categories.keys().map(|k| k.as_str()).collect()
    }

    fn clean(self) -> Self {
        let mut categories = BTreeMap::new();
        for (name, urls) in self.categories {
            let key = name.trim().to_ascii_lowercase();
            if key.is_empty() {
                continue;
            }
            let mut seen: HashSet<String> = HashSet::new();
            let cleaned: Vec<String> = urls
                .into_iter()
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty())
                .filter(|u| seen.insert(u.clone()))
                .collect();
            if !cleaned.is_empty() {
                categories.insert(key, cleaned);
            }
        }
        Self { categories }
    }
}

/// Built-in feed set. Kept small on purpose; production deployments are
/// expected to supply their own file.
pub fn default_seed() -> FeedRegistry {
    let mut categories = BTreeMap::new();
    categories.insert(
        "politics".to_string(),
        vec![
            "http://rss.cnn.com/rss/cnn_allpolitics.rss".to_string(),
            "https://feeds.foxnews.com/foxnews/politics".to_string(),
            "https://feeds.npr.org/1014/rss.xml".to_string(),
            "https://thehill.com/rss/syndicator/19110".to_string(),
        ],
    );
    categories.insert(
        "business".to_string(),
        vec![
            "https://feeds.bbci.co.uk/news/business/rss.xml".to_string(),
            "http://rss.cnn.com/rss/money_latest.rss".to_string(),
            "https://feeds.foxbusiness.com/foxbusiness/latest".to_string(),
        ],
    );
    categories.insert(
        "technology".to_string(),
        vec![
            "https://feeds.arstechnica.com/arstechnica/index".to_string(),
            "https://www.theverge.com/rss/index.xml".to_string(),
            "https://feeds.bbci.co.uk/news/technology/rss.xml".to_string(),
        ],
    );
    categories.insert(
        "world".to_string(),
        vec![
            "https://feeds.bbci.co.uk/news/world/rss.xml".to_string(),
            "https://www.aljazeera.com/xml/rss/all.xml".to_string(),
            "http://rss.cnn.com/rss/cnn_world.rss".to_string(),
        ],
    );
    FeedRegistry { categories }
}
