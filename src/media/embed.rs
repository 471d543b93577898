//! Video URL -> embeddable form resolution.
//!
//! Known hosts are rewritten to their canonical embed URL; direct media
//! files become native `<video>` sources; anything else survives only if
//! it already looks like a player embed.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::model::{Video, VideoKind};

static YOUTUBE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)(?:youtube\.com/(?:watch\?[^"'\s]*?v=|shorts/|embed/)|youtu\.be/)([A-Za-z0-9_-]{6,})"#,
    )
    .expect("valid youtube regex")
});

static VIMEO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)vimeo\.com/(?:video/)?(\d+)").expect("valid vimeo regex")
});

/// Resolves one raw video URL. `declared_mime` is the mime the feed itself
/// claimed (enclosure/extension metadata); it lets extension-less direct
/// files through. Returns `None` for anything not playable.
pub fn resolve_video_url(
    raw: &str,
    declared_mime: Option<&str>,
    thumbnail: Option<&str>,
) -> Option<Video> {
    let url = raw.trim();
    if url.is_empty() {
        return None;
    }

    if let Some(id) = youtube_id(url) {
        let thumb = thumbnail
            .map(|t| t.to_string())
            .unwrap_or_else(|| format!("https://img.youtube.com/vi/{id}/hqdefault.jpg"));
        return Some(Video {
            kind: VideoKind::Iframe,
            src: format!("https://www.youtube.com/embed/{id}"),
            mime_type: None,
            thumbnail: Some(thumb),
        });
    }

    if let Some(id) = vimeo_id(url) {
        return Some(Video {
            kind: VideoKind::Iframe,
            src: format!("https://player.vimeo.com/video/{id}"),
            mime_type: None,
            thumbnail: thumbnail.map(|t| t.to_string()),
        });
    }

    if let Some(mime) = file_video_mime(url) {
        return Some(Video {
            kind: VideoKind::File,
            src: url.to_string(),
            mime_type: Some(mime.to_string()),
            thumbnail: thumbnail.map(|t| t.to_string()),
        });
    }

    if let Some(mime) = declared_mime.filter(|m| m.starts_with("video/")) {
        return Some(Video {
            kind: VideoKind::File,
            src: url.to_string(),
            mime_type: Some(mime.to_string()),
            thumbnail: thumbnail.map(|t| t.to_string()),
        });
    }

    if looks_like_player(url) {
        return Some(Video {
            kind: VideoKind::Iframe,
            src: url.to_string(),
            mime_type: None,
            thumbnail: thumbnail.map(|t| t.to_string()),
        });
    }

    None
}

/// Finds bare YouTube/Vimeo links inside free text and resolves them.
/// Matches inside tag attributes too; the caller's dedup-by-src absorbs
/// the overlap with the DOM pass.
pub(crate) fn scan_text_for_videos(text: &str) -> Vec<Video> {
    let mut out = Vec::new();
    for m in YOUTUBE_RE.find_iter(text) {
        if let Some(video) = resolve_video_url(m.as_str(), None, None) {
            out.push(video);
        }
    }
    for m in VIMEO_RE.find_iter(text) {
        if let Some(video) = resolve_video_url(m.as_str(), None, None) {
            out.push(video);
        }
    }
    out
}

fn youtube_id(url: &str) -> Option<String> {
    YOUTUBE_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn vimeo_id(url: &str) -> Option<String> {
    VIMEO_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Mime type for direct media files, by path extension.
pub(crate) fn file_video_mime(url: &str) -> Option<&'static str> {
    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .to_ascii_lowercase();
    if path.ends_with(".mp4") {
        Some("video/mp4")
    } else if path.ends_with(".webm") {
        Some("video/webm")
    } else if path.ends_with(".ogg") {
        Some("video/ogg")
    } else {
        None
    }
}

/// Unknown host, but the URL shape says "already an embed player".
fn looks_like_player(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    host.starts_with("player.") || parsed.path().to_ascii_lowercase().contains("/embed/")
}
