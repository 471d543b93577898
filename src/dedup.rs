//! Cross-source duplicate merging by title fingerprint.
//!
//! Deliberately cheap and order-dependent: first-seen wins, later copies
//! only donate their media. Over- and under-merging on short or reworded
//! titles is accepted behavior.

use std::collections::HashMap;

use crate::model::Article;

const FINGERPRINT_CHARS: usize = 50;

/// Lowercase, strip everything but alphanumerics and spaces, collapse
/// whitespace, trim, first 50 chars.
pub fn fingerprint(title: &str) -> String {
    let mut cleaned = String::with_capacity(title.len());
    for c in title.to_lowercase().chars() {
        if c.is_alphanumeric() {
            cleaned.push(c);
        } else if c.is_whitespace() {
            cleaned.push(' ');
        }
    }
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(FINGERPRINT_CHARS).collect()
}

/// Merges articles sharing a fingerprint into the first-seen record.
/// The canonical article keeps all its fields; duplicates contribute
/// media only, re-deduplicated by src.
pub fn merge_duplicates(articles: Vec<Article>) -> Vec<Article> {
    let mut merged: Vec<Article> = Vec::with_capacity(articles.len());
    let mut index_by_fp: HashMap<String, usize> = HashMap::new();

    for article in articles {
        let fp = fingerprint(&article.title);
        match index_by_fp.get(&fp) {
            Some(&i) => merged[i].media.merge(article.media),
            None => {
                index_by_fp.insert(fp, merged.len());
                merged.push(article);
            }
        }
    }
    merged
}
