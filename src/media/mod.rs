//! Media extraction: item HTML + structured feed metadata -> `MediaBundle`.
//!
//! Pure CPU transform, no I/O. The HTML pass walks a parsed DOM; the
//! parsed document never crosses an await point (it is not `Send`).
//!
//! Image priority (first entry = primary/cover): image enclosure, then
//! media-extension image, then first HTML `<img>`, then thumbnail.

pub mod embed;

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;

use crate::ingest::feed::RawMedia;
use crate::model::{Image, MediaBundle, Video};

static IMG_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());
static IFRAME_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("iframe[src]").unwrap());
static VIDEO_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("video").unwrap());
static SOURCE_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("source[src]").unwrap());
static LDJSON_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());

/// Full extraction: structured metadata plus the DOM/JSON-LD pass over the
/// item HTML.
pub fn extract(html: &str, meta: &RawMedia) -> MediaBundle {
    let mut images: Vec<Image> = Vec::new();
    let mut videos: Vec<Video> = Vec::new();
    let thumb_hint = meta.thumbnails.first().map(|s| s.as_str());

    push_meta_images(meta, &mut images);

    let doc = Html::parse_fragment(html);
    collect_dom_images(&doc, &mut images);
    collect_dom_videos(&doc, &mut videos);

    push_meta_videos(meta, thumb_hint, &mut videos);
    videos.extend(embed::scan_text_for_videos(html));
    collect_jsonld_videos(&doc, &mut videos);

    push_thumbnails(meta, &mut images);

    let mut bundle = MediaBundle { images, videos };
    bundle.dedup_by_src();
    bundle
}

/// Cheap extraction for the fast tier: structured metadata only, no DOM
/// or JSON-LD work.
pub fn extract_structured(meta: &RawMedia) -> MediaBundle {
    let mut images: Vec<Image> = Vec::new();
    let mut videos: Vec<Video> = Vec::new();
    push_meta_images(meta, &mut images);
    push_meta_videos(meta, meta.thumbnails.first().map(|s| s.as_str()), &mut videos);
    push_thumbnails(meta, &mut images);
    let mut bundle = MediaBundle { images, videos };
    bundle.dedup_by_src();
    bundle
}

fn push_meta_images(meta: &RawMedia, images: &mut Vec<Image>) {
    for src in meta.enclosure_images.iter().chain(&meta.extension_images) {
        push_image(images, src, None);
    }
}

fn push_thumbnails(meta: &RawMedia, images: &mut Vec<Image>) {
    for src in &meta.thumbnails {
        push_image(images, src, None);
    }
}

fn push_meta_videos(meta: &RawMedia, thumb_hint: Option<&str>, videos: &mut Vec<Video>) {
    for (url, mime) in meta.enclosure_videos.iter().chain(&meta.extension_videos) {
        if let Some(video) = embed::resolve_video_url(url, mime.as_deref(), thumb_hint) {
            videos.push(video);
        }
    }
}

fn collect_dom_images(doc: &Html, images: &mut Vec<Image>) {
    for el in doc.select(&IMG_SEL) {
        let Some(src) = el.value().attr("src") else {
            continue;
        };
        let alt = el
            .value()
            .attr("alt")
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(|a| a.to_string());
        push_image(images, src, alt);
    }
}

fn collect_dom_videos(doc: &Html, videos: &mut Vec<Video>) {
    for el in doc.select(&IFRAME_SEL) {
        if let Some(src) = el.value().attr("src") {
            if let Some(video) = embed::resolve_video_url(src, None, None) {
                videos.push(video);
            }
        }
    }
    for el in doc.select(&VIDEO_SEL) {
        let poster = el
            .value()
            .attr("poster")
            .map(str::trim)
            .filter(|p| !p.is_empty());
        if let Some(src) = el.value().attr("src") {
            if let Some(video) = embed::resolve_video_url(src, None, poster) {
                videos.push(video);
            }
        }
        for source in el.select(&SOURCE_SEL) {
            let declared = source.value().attr("type");
            if let Some(src) = source.value().attr("src") {
                if let Some(video) = embed::resolve_video_url(src, declared, poster) {
                    videos.push(video);
                }
            }
        }
    }
}

fn collect_jsonld_videos(doc: &Html, videos: &mut Vec<Video>) {
    for el in doc.select(&LDJSON_SEL) {
        let raw: String = el.text().collect();
        let Ok(value) = serde_json::from_str::<Value>(&raw) else {
            continue;
        };
        walk_jsonld(&value, videos);
    }
}

/// Recursive walk over a JSON-LD document: top-level arrays, `@graph`
/// wrappers and nested `video` members all occur in the wild.
fn walk_jsonld(value: &Value, out: &mut Vec<Video>) {
    match value {
        Value::Array(items) => {
            for item in items {
                walk_jsonld(item, out);
            }
        }
        Value::Object(map) => {
            if map.get("@type").and_then(Value::as_str) == Some("VideoObject") {
                let thumb = jsonld_thumbnail(map);
                let candidate = map
                    .get("contentUrl")
                    .and_then(Value::as_str)
                    .and_then(|u| embed::resolve_video_url(u, None, thumb))
                    .or_else(|| {
                        map.get("embedUrl")
                            .and_then(Value::as_str)
                            .and_then(|u| embed::resolve_video_url(u, None, thumb))
                    });
                if let Some(video) = candidate {
                    out.push(video);
                }
            }
            if let Some(graph) = map.get("@graph") {
                walk_jsonld(graph, out);
            }
            if let Some(nested) = map.get("video") {
                walk_jsonld(nested, out);
            }
        }
        _ => {}
    }
}

fn jsonld_thumbnail(map: &serde_json::Map<String, Value>) -> Option<&str> {
    match map.get("thumbnailUrl") {
        Some(Value::String(s)) => Some(s.as_str()),
        Some(Value::Array(items)) => items.first().and_then(Value::as_str),
        _ => None,
    }
}

fn push_image(images: &mut Vec<Image>, src: &str, alt: Option<String>) {
    let src = src.trim();
    // Untrusted input: only absolute http(s) srcs are kept.
    if src.is_empty() || !src.starts_with("http") {
        return;
    }
    images.push(Image {
        src: src.to_string(),
        alt,
    });
}
