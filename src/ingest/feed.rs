//! RSS/Atom wire formats -> normalized raw items.
//!
//! Every media shape a feed can carry (enclosures, `media:` extension
//! elements, thumbnails, nested groups) is flattened here into
//! [`RawMedia`]'s closed fields. Nothing downstream ever touches feed XML.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use crate::media::embed::file_video_mime;
use crate::text::normalize_plain;

/// One feed item after shape normalization, before enrichment.
#[derive(Debug, Clone)]
pub struct RawItem {
    /// Plain-text title; items with an empty title are dropped at parse.
    pub title: String,
    pub link: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    /// Raw HTML fragments, handed to the media extractor as-is.
    pub description_html: Option<String>,
    pub content_html: Option<String>,
    pub media: RawMedia,
}

/// Structured media metadata carried by the feed entry itself (everything
/// that is not embedded in item HTML).
#[derive(Debug, Clone, Default)]
pub struct RawMedia {
    pub enclosure_images: Vec<String>,
    /// (url, declared mime type)
    pub enclosure_videos: Vec<(String, Option<String>)>,
    pub extension_images: Vec<String>,
    pub extension_videos: Vec<(String, Option<String>)>,
    pub thumbnails: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ParsedFeed {
    /// Channel/feed title, used as the article source name.
    pub title: Option<String>,
    pub items: Vec<RawItem>,
}

// ---------- RSS 2.0 wire structs ----------

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    title: Option<String>,
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    // quick-xml's serde identifiers are element *local* names (prefixes
    // stripped), so `content:encoded` arrives as `encoded`, `media:content`
    // as `content`, and so on.
    #[serde(rename = "encoded")]
    content_encoded: Option<String>,
    #[serde(rename = "enclosure", default)]
    enclosures: Vec<Enclosure>,
    #[serde(rename = "content", default)]
    media_contents: Vec<MediaContent>,
    #[serde(rename = "thumbnail", default)]
    media_thumbnails: Vec<MediaThumbnail>,
    #[serde(rename = "group", default)]
    media_groups: Vec<MediaGroup>,
}

#[derive(Debug, Deserialize)]
struct Enclosure {
    #[serde(rename = "@url")]
    url: Option<String>,
    #[serde(rename = "@type")]
    mime: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaContent {
    #[serde(rename = "@url")]
    url: Option<String>,
    #[serde(rename = "@type")]
    mime: Option<String>,
    #[serde(rename = "@medium")]
    medium: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaThumbnail {
    #[serde(rename = "@url")]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaGroup {
    #[serde(rename = "content", default)]
    contents: Vec<MediaContent>,
    #[serde(rename = "thumbnail", default)]
    thumbnails: Vec<MediaThumbnail>,
}

// ---------- Atom wire structs ----------

#[derive(Debug, Deserialize)]
struct AtomFeed {
    title: Option<AtomText>,
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<AtomText>,
    content: Option<AtomText>,
    // Local name `content` is already claimed by the Atom text construct
    // above, so entry-level `media:content` cannot be bound separately; this
    // field stays unmatched (entries usually carry media inside `media:group`).
    #[serde(rename = "media:content", default)]
    media_contents: Vec<MediaContent>,
    #[serde(rename = "thumbnail", default)]
    media_thumbnails: Vec<MediaThumbnail>,
    #[serde(rename = "group", default)]
    media_groups: Vec<MediaGroup>,
}

/// Atom text constructs can be typed html/xhtml; collecting `$text` keeps
/// parsing alive even for wrapped xhtml bodies (which then come out empty).
#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text")]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// Parses one feed document, RSS 2.0 first, Atom as fallback.
pub fn parse_feed(xml: &str) -> Result<ParsedFeed> {
    let t0 = std::time::Instant::now();
    let clean = scrub_html_entities_for_xml(xml);

    let parsed = match from_str::<Rss>(&clean) {
        Ok(rss) => Ok(feed_from_rss(rss)),
        Err(rss_err) => match from_str::<AtomFeed>(&clean) {
            Ok(atom) => Ok(feed_from_atom(atom)),
            Err(_) => Err(rss_err).context("parsing feed xml (rss and atom both failed)"),
        },
    };

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("ingest_parse_ms").record(ms);
    parsed
}

fn feed_from_rss(rss: Rss) -> ParsedFeed {
    let mut items = Vec::with_capacity(rss.channel.items.len());
    for it in rss.channel.items {
        let title = normalize_plain(it.title.as_deref().unwrap_or_default());
        if title.is_empty() {
            continue;
        }
        let link = it
            .link
            .clone()
            .filter(|l| !l.trim().is_empty())
            // Permalink guids double as links in plenty of real feeds.
            .or_else(|| it.guid.clone().filter(|g| g.trim().starts_with("http")));
        let media = rss_media(&it);
        items.push(RawItem {
            title,
            link,
            published_at: it.pub_date.as_deref().and_then(parse_timestamp),
            description_html: it.description,
            content_html: it.content_encoded,
            media,
        });
    }
    ParsedFeed {
        title: rss.channel.title.map(|t| normalize_plain(&t)),
        items,
    }
}

fn feed_from_atom(atom: AtomFeed) -> ParsedFeed {
    let mut items = Vec::with_capacity(atom.entries.len());
    for entry in atom.entries {
        let title = normalize_plain(
            entry
                .title
                .as_ref()
                .and_then(|t| t.value.as_deref())
                .unwrap_or_default(),
        );
        if title.is_empty() {
            continue;
        }
        let link = pick_atom_link(&entry.links);
        let published = entry
            .published
            .as_deref()
            .or(entry.updated.as_deref())
            .and_then(parse_timestamp);
        let media = atom_media(&entry);
        items.push(RawItem {
            title,
            link,
            published_at: published,
            description_html: entry.summary.and_then(|t| t.value),
            content_html: entry.content.and_then(|t| t.value),
            media,
        });
    }
    ParsedFeed {
        title: atom
            .title
            .and_then(|t| t.value)
            .map(|t| normalize_plain(&t)),
        items,
    }
}

/// rel="alternate" (or an unqualified link) wins; the first one found.
fn pick_atom_link(links: &[AtomLink]) -> Option<String> {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
        .and_then(|l| l.href.clone())
        .filter(|h| !h.trim().is_empty())
}

fn rss_media(it: &Item) -> RawMedia {
    let mut media = RawMedia::default();
    for enc in &it.enclosures {
        push_classified(
            &mut media.enclosure_images,
            &mut media.enclosure_videos,
            enc.url.as_deref(),
            enc.mime.as_deref(),
            None,
        );
    }
    collect_extension_media(
        &mut media,
        it.media_contents.iter(),
        it.media_thumbnails.iter(),
        it.media_groups.iter(),
    );
    media
}

fn atom_media(entry: &AtomEntry) -> RawMedia {
    let mut media = RawMedia::default();
    collect_extension_media(
        &mut media,
        entry.media_contents.iter(),
        entry.media_thumbnails.iter(),
        entry.media_groups.iter(),
    );
    media
}

fn collect_extension_media<'a>(
    media: &mut RawMedia,
    contents: impl Iterator<Item = &'a MediaContent>,
    thumbnails: impl Iterator<Item = &'a MediaThumbnail>,
    groups: impl Iterator<Item = &'a MediaGroup>,
) {
    for mc in contents {
        push_classified(
            &mut media.extension_images,
            &mut media.extension_videos,
            mc.url.as_deref(),
            mc.mime.as_deref(),
            mc.medium.as_deref(),
        );
    }
    for th in thumbnails {
        if let Some(url) = th.url.as_deref().filter(|u| !u.trim().is_empty()) {
            media.thumbnails.push(url.to_string());
        }
    }
    for group in groups {
        for mc in &group.contents {
            push_classified(
                &mut media.extension_images,
                &mut media.extension_videos,
                mc.url.as_deref(),
                mc.mime.as_deref(),
                mc.medium.as_deref(),
            );
        }
        for th in &group.thumbnails {
            if let Some(url) = th.url.as_deref().filter(|u| !u.trim().is_empty()) {
                media.thumbnails.push(url.to_string());
            }
        }
    }
}

/// Classifies one (url, mime, medium) triple into the image or video list.
/// Untyped URLs are classified by file extension; unclassifiable ones are
/// dropped here and can still surface later via the HTML pass.
fn push_classified(
    images: &mut Vec<String>,
    videos: &mut Vec<(String, Option<String>)>,
    url: Option<&str>,
    mime: Option<&str>,
    medium: Option<&str>,
) {
    let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
        return;
    };
    let mime_lc = mime.map(|m| m.trim().to_ascii_lowercase());
    let is_image = medium == Some("image")
        || mime_lc.as_deref().is_some_and(|m| m.starts_with("image/"))
        || (mime_lc.is_none() && medium.is_none() && has_image_ext(url));
    if is_image {
        images.push(url.to_string());
        return;
    }
    let is_video = medium == Some("video")
        || mime_lc.as_deref().is_some_and(|m| m.starts_with("video/"));
    if is_video {
        videos.push((url.to_string(), mime_lc));
        return;
    }
    if mime_lc.is_none() && medium.is_none() {
        if let Some(guessed) = file_video_mime(url) {
            videos.push((url.to_string(), Some(guessed.to_string())));
        }
    }
}

fn has_image_ext(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    [".jpg", ".jpeg", ".png", ".gif", ".webp"]
        .iter()
        .any(|ext| path.ends_with(ext))
}

/// RFC2822 (RSS) first, then RFC3339 (Atom).
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = OffsetDateTime::parse(raw.trim(), &Rfc2822) {
        let unix = dt.to_offset(UtcOffset::UTC).unix_timestamp();
        return DateTime::<Utc>::from_timestamp(unix, 0);
    }
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Feeds love HTML entities that XML does not define.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Example Wire</title>
    <item>
      <title>Senate Passes Budget&nbsp;Bill</title>
      <link>https://example.com/budget</link>
      <pubDate>Tue, 05 Aug 2025 14:30:00 GMT</pubDate>
      <description>&lt;p&gt;The vote came late. &lt;img src="https://example.com/inline.jpg"/&gt;&lt;/p&gt;</description>
      <enclosure url="https://example.com/cover.jpg" type="image/jpeg"/>
      <media:content url="https://example.com/clip.mp4" type="video/mp4" medium="video"/>
      <media:thumbnail url="https://example.com/thumb.jpg"/>
    </item>
    <item>
      <title></title>
      <link>https://example.com/ignored</link>
    </item>
  </channel>
</rss>"#;

    const ATOM_FIXTURE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:media="http://search.yahoo.com/mrss/">
  <title>Example Atom</title>
  <entry>
    <title>Markets Rally On Rate News</title>
    <link rel="alternate" href="https://example.org/rally"/>
    <link rel="enclosure" href="https://example.org/unrelated.zip"/>
    <published>2025-08-05T10:00:00Z</published>
    <summary>Stocks climbed sharply.</summary>
    <media:group>
      <media:content url="https://example.org/rally.jpg" medium="image"/>
      <media:thumbnail url="https://example.org/rally_thumb.jpg"/>
    </media:group>
  </entry>
</feed>"#;

    #[test]
    fn rss_items_parse_with_media_shapes() {
        let feed = parse_feed(RSS_FIXTURE).unwrap();
        assert_eq!(feed.title.as_deref(), Some("Example Wire"));
        assert_eq!(feed.items.len(), 1, "empty-title item is dropped");

        let item = &feed.items[0];
        assert_eq!(item.title, "Senate Passes Budget Bill");
        assert_eq!(item.link.as_deref(), Some("https://example.com/budget"));
        let ts = item.published_at.unwrap();
        assert_eq!(ts.timestamp(), 1_754_404_200);
        assert_eq!(item.media.enclosure_images, ["https://example.com/cover.jpg"]);
        assert_eq!(item.media.extension_videos.len(), 1);
        assert_eq!(item.media.extension_videos[0].0, "https://example.com/clip.mp4");
        assert_eq!(item.media.thumbnails, ["https://example.com/thumb.jpg"]);
        assert!(item.description_html.as_deref().unwrap().contains("inline.jpg"));
    }

    #[test]
    fn atom_feed_parses_via_fallback() {
        let feed = parse_feed(ATOM_FIXTURE).unwrap();
        assert_eq!(feed.title.as_deref(), Some("Example Atom"));
        assert_eq!(feed.items.len(), 1);

        let item = &feed.items[0];
        assert_eq!(item.title, "Markets Rally On Rate News");
        assert_eq!(item.link.as_deref(), Some("https://example.org/rally"));
        assert_eq!(
            item.published_at.unwrap().timestamp(),
            1_754_388_000,
            "2025-08-05T10:00:00Z"
        );
        assert_eq!(item.media.extension_images, ["https://example.org/rally.jpg"]);
        assert_eq!(item.media.thumbnails, ["https://example.org/rally_thumb.jpg"]);
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse_feed("<rss><channel><item>").is_err());
        assert!(parse_feed("not xml at all").is_err());
    }

    #[test]
    fn guid_permalink_backfills_missing_link() {
        let xml = r#"<rss version="2.0"><channel><title>G</title>
            <item><title>Guid Only</title><guid>https://example.com/guid-link</guid></item>
        </channel></rss>"#;
        let feed = parse_feed(xml).unwrap();
        assert_eq!(
            feed.items[0].link.as_deref(),
            Some("https://example.com/guid-link")
        );
    }

    #[test]
    fn untyped_enclosure_classifies_by_extension() {
        let xml = r#"<rss version="2.0"><channel><title>E</title>
            <item>
              <title>Extension Guess</title>
              <enclosure url="https://example.com/pic.png"/>
              <enclosure url="https://example.com/clip.webm"/>
              <enclosure url="https://example.com/doc.pdf"/>
            </item>
        </channel></rss>"#;
        let feed = parse_feed(xml).unwrap();
        let media = &feed.items[0].media;
        assert_eq!(media.enclosure_images, ["https://example.com/pic.png"]);
        assert_eq!(media.enclosure_videos.len(), 1);
        assert_eq!(
            media.enclosure_videos[0],
            (
                "https://example.com/clip.webm".to_string(),
                Some("video/webm".to_string())
            )
        );
    }

    #[test]
    fn timestamps_fall_back_between_formats() {
        assert!(parse_timestamp("Tue, 05 Aug 2025 14:30:00 GMT").is_some());
        assert!(parse_timestamp("2025-08-05T14:30:00+02:00").is_some());
        assert!(parse_timestamp("next tuesday").is_none());
    }
}
