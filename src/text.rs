//! Plain-text normalization and the sentence-boundary summarizer.
//!
//! Feed bodies arrive as entity-encoded HTML fragments of wildly varying
//! quality; everything scored or displayed as text goes through
//! `normalize_plain` first.

use once_cell::sync::OnceCell;
use regex::Regex;

const MAX_PLAIN_CHARS: usize = 1500;

static TAG_RE: OnceCell<Regex> = OnceCell::new();
static WS_RE: OnceCell<Regex> = OnceCell::new();

fn tag_re() -> &'static Regex {
    TAG_RE.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("valid tag regex"))
}

fn ws_re() -> &'static Regex {
    WS_RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace regex"))
}

/// Decode entities, strip tags, unify quotes, collapse whitespace, cap
/// length. Output is safe to tokenize and to show as a text-only body.
pub fn normalize_plain(input: &str) -> String {
    let decoded = html_escape::decode_html_entities(input).to_string();
    let no_tags = tag_re().replace_all(&decoded, " ");
    let unified = no_tags
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"");
    let mut out = ws_re().replace_all(&unified, " ").trim().to_string();
    if out.chars().count() > MAX_PLAIN_CHARS {
        out = out.chars().take(MAX_PLAIN_CHARS).collect();
        out = out.trim_end().to_string();
    }
    out
}

/// Truncate at the last sentence terminator inside the budget; failing
/// that, the last word boundary; failing that, a hard character cut.
pub fn summarize(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        return trimmed.to_string();
    }
    let prefix: String = trimmed.chars().take(max_chars).collect();
    if let Some(pos) = prefix.rfind(|c: char| matches!(c, '.' | '!' | '?')) {
        return prefix[..=pos].trim().to_string();
    }
    match prefix.rfind(' ') {
        Some(pos) => format!("{}...", prefix[..pos].trim_end()),
        None => prefix,
    }
}
