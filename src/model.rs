//! Core domain types shared across the pipeline.
//!
//! Everything downstream of feed parsing works on these closed shapes;
//! raw feed payloads never leak past `ingest::feed`.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serving tier. `fast` trades enrichment depth for latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Fast,
    Full,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Fast => "fast",
            Variant::Full => "full",
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One news item, fully normalized.
///
/// `url` is the preferred identity; when a feed omits it, identity falls
/// back to the title fingerprint (see `dedup::fingerprint`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub source_name: String,
    pub description: String,
    pub content_plain: String,
    /// Produced by the external sanitizer; empty when none is installed.
    pub content_sanitized_html: String,
    #[serde(default)]
    pub media: MediaBundle,
    #[serde(default)]
    pub lean: LeanResult,
}

/// Ordered image/video sets, each deduplicated by `src`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaBundle {
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub videos: Vec<Video>,
}

impl MediaBundle {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.videos.is_empty()
    }

    /// Appends `other`'s media after the existing entries, then re-dedups.
    /// First-seen order wins, so the canonical article keeps its primary
    /// image slot.
    pub fn merge(&mut self, other: MediaBundle) {
        self.images.extend(other.images);
        self.videos.extend(other.videos);
        self.dedup_by_src();
    }

    pub fn dedup_by_src(&mut self) {
        let mut seen: HashSet<String> = HashSet::new();
        self.images.retain(|img| seen.insert(img.src.clone()));
        seen.clear();
        self.videos.retain(|vid| seen.insert(vid.src.clone()));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub src: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// Playable video reference. `Iframe` src is always an already-resolved
/// embed URL, never a watch-page URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoKind {
    Iframe,
    /// Direct media file, played through a native `<video>` element.
    #[serde(rename = "video")]
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub kind: VideoKind,
    pub src: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

/// Political-lean bucket, ordered left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeanLabel {
    Left,
    LeanLeft,
    Center,
    LeanRight,
    Right,
}

impl LeanLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeanLabel::Left => "left",
            LeanLabel::LeanLeft => "lean-left",
            LeanLabel::Center => "center",
            LeanLabel::LeanRight => "lean-right",
            LeanLabel::Right => "right",
        }
    }
}

impl std::fmt::Display for LeanLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scoring output. `score` is clamped to [-1, 1] and `label` is always
/// the deterministic bucket of `score`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeanResult {
    pub score: f32,
    pub label: LeanLabel,
    pub reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl Default for LeanResult {
    fn default() -> Self {
        Self {
            score: 0.0,
            label: LeanLabel::Center,
            reasons: Vec::new(),
            confidence: None,
        }
    }
}

/// Terminal failure classification for one source fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchErrorKind {
    Timeout,
    Parse,
    Network,
}

impl FetchErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchErrorKind::Timeout => "timeout",
            FetchErrorKind::Parse => "parse",
            FetchErrorKind::Network => "network",
        }
    }
}

impl std::fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One category's assembled output plus the sources that never delivered.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryBatch {
    pub articles: Vec<Article>,
    pub failed_sources: Vec<String>,
}

/// Stable short id derived from the article's identity string (url when
/// present, title fingerprint otherwise). Hex of the first 8 digest bytes.
pub fn article_id(identity: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(identity.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
