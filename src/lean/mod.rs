//! Political lean scoring.
//!
//! Heuristic first: source bias plus lexicon keyword and entity hits,
//! clamped and normalized to [-1, 1], then bucketed into five labels.
//! An optional external classifier can override the heuristic wholesale;
//! when it is absent, slow or silent the heuristic answer stands.

pub mod bias;
pub mod classifier;
pub mod lexicon;

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use tracing::{debug, warn};

use crate::model::{LeanLabel, LeanResult};

pub use bias::{BiasHandle, SourceBiasConfig};
pub use classifier::{
    build_classifier_from_env, ClassifierVerdict, DisabledClassifier, LeanClassifier,
    MockClassifier,
};

/// Source bias enters the raw score at face value.
pub const SOURCE_UNIT_WEIGHT: f32 = 1.0;
/// Per unnegated keyword hit.
pub const KEYWORD_WEIGHT: f32 = 0.8;
/// Per entity mention, negation does not apply.
pub const ENTITY_WEIGHT: f32 = 0.3;
/// A negator within this many tokens before a keyword cancels the hit.
pub const NEGATION_WINDOW: usize = 3;
/// Raw scores are clamped here before normalizing to [-1, 1].
pub const RAW_CLAMP: f32 = 3.0;

pub const DEFAULT_CLASSIFIER_TIMEOUT_MS: u64 = 1500;

static TOKEN_RE: OnceCell<Regex> = OnceCell::new();

fn token_re() -> &'static Regex {
    TOKEN_RE.get_or_init(|| Regex::new(r"(?u)\b\w+\b").expect("valid token regex"))
}

fn tokenize(text: &str) -> Vec<String> {
    token_re()
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

fn matches_at(tokens: &[String], at: usize, needle: &[&str]) -> bool {
    needle.iter().enumerate().all(|(j, w)| tokens[at + j] == *w)
}

/// Counts phrase occurrences whose preceding [`NEGATION_WINDOW`] tokens
/// contain no negator. Matches consume their tokens, so overlapping
/// occurrences are not double counted.
fn count_unnegated(tokens: &[String], phrase: &str) -> u32 {
    let needle: Vec<&str> = phrase.split_whitespace().collect();
    if needle.is_empty() || tokens.len() < needle.len() {
        return 0;
    }
    let mut count = 0;
    let mut i = 0;
    while i + needle.len() <= tokens.len() {
        if matches_at(tokens, i, &needle) {
            let negated =
                (1..=NEGATION_WINDOW).any(|k| i >= k && lexicon::is_negator(&tokens[i - k]));
            if !negated {
                count += 1;
            }
            i += needle.len();
        } else {
            i += 1;
        }
    }
    count
}

fn count_mentions(tokens: &[String], phrase: &str) -> u32 {
    let needle: Vec<&str> = phrase.split_whitespace().collect();
    if needle.is_empty() || tokens.len() < needle.len() {
        return 0;
    }
    let mut count = 0;
    let mut i = 0;
    while i + needle.len() <= tokens.len() {
        if matches_at(tokens, i, &needle) {
            count += 1;
            i += needle.len();
        } else {
            i += 1;
        }
    }
    count
}

/// Five-way bucket over the normalized score.
pub fn bucket(score: f32) -> LeanLabel {
    if score <= -0.66 {
        LeanLabel::Left
    } else if score <= -0.2 {
        LeanLabel::LeanLeft
    } else if score < 0.2 {
        LeanLabel::Center
    } else if score < 0.66 {
        LeanLabel::LeanRight
    } else {
        LeanLabel::Right
    }
}

/// Scoring result plus the classifier's optional prose summary. The
/// summary only exists when a classifier verdict was accepted.
#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    pub lean: LeanResult,
    pub summary: Option<String>,
}

pub struct LeanScorer {
    bias: BiasHandle,
    classifier: Arc<dyn LeanClassifier>,
    classifier_timeout: Duration,
}

impl LeanScorer {
    pub fn new(
        bias: BiasHandle,
        classifier: Arc<dyn LeanClassifier>,
        classifier_timeout: Duration,
    ) -> Self {
        Self {
            bias,
            classifier,
            classifier_timeout,
        }
    }

    pub fn bias_handle(&self) -> &BiasHandle {
        &self.bias
    }

    /// Lexicon pass over the article text. Reasons come out in a fixed
    /// order: source bias, right keywords, left keywords, entities.
    pub fn heuristic(&self, source_name: &str, source_url: Option<&str>, text: &str) -> LeanResult {
        let tokens = tokenize(text);
        let source_bias = self.bias.bias_for(source_name, source_url);
        let mut raw = f32::from(source_bias) * SOURCE_UNIT_WEIGHT;
        let mut reasons = Vec::new();
        if source_bias != 0 {
            reasons.push(format!("source bias {source_bias:+} ({source_name})"));
        }
        for phrase in lexicon::RIGHT_KEYWORDS {
            let n = count_unnegated(&tokens, phrase);
            if n > 0 {
                let delta = n as f32 * KEYWORD_WEIGHT;
                raw += delta;
                reasons.push(format!("right keyword \"{phrase}\" x{n} ({delta:+.1})"));
            }
        }
        for phrase in lexicon::LEFT_KEYWORDS {
            let n = count_unnegated(&tokens, phrase);
            if n > 0 {
                let delta = n as f32 * KEYWORD_WEIGHT;
                raw -= delta;
                reasons.push(format!("left keyword \"{phrase}\" x{n} ({:+.1})", -delta));
            }
        }
        for entity in lexicon::RIGHT_ENTITIES {
            let n = count_mentions(&tokens, entity);
            if n > 0 {
                let delta = n as f32 * ENTITY_WEIGHT;
                raw += delta;
                reasons.push(format!("entity \"{entity}\" x{n} ({delta:+.1})"));
            }
        }
        for entity in lexicon::LEFT_ENTITIES {
            let n = count_mentions(&tokens, entity);
            if n > 0 {
                let delta = n as f32 * ENTITY_WEIGHT;
                raw -= delta;
                reasons.push(format!("entity \"{entity}\" x{n} ({:+.1})", -delta));
            }
        }
        let score = raw.clamp(-RAW_CLAMP, RAW_CLAMP) / RAW_CLAMP;
        LeanResult {
            score,
            label: bucket(score),
            reasons,
            confidence: None,
        }
    }

    /// Full scoring path. A classifier verdict, if one arrives in time,
    /// replaces the heuristic wholesale; its label is still re-bucketed
    /// from the clamped score so score and label never disagree.
    pub async fn score(
        &self,
        source_name: &str,
        source_url: Option<&str>,
        text: &str,
    ) -> ScoreOutcome {
        if self.classifier.is_enabled() {
            match tokio::time::timeout(self.classifier_timeout, self.classifier.classify(text))
                .await
            {
                Ok(Some(verdict)) => {
                    let score = verdict.score.clamp(-1.0, 1.0);
                    return ScoreOutcome {
                        lean: LeanResult {
                            score,
                            label: bucket(score),
                            reasons: vec![format!(
                                "classifier verdict ({})",
                                self.classifier.provider_name()
                            )],
                            confidence: verdict.confidence.map(|c| c.clamp(0.0, 1.0)),
                        },
                        summary: verdict.summary,
                    };
                }
                Ok(None) => {
                    debug!(
                        provider = self.classifier.provider_name(),
                        "classifier returned no verdict, using heuristic"
                    );
                    counter!("lean_classifier_fallback_total").increment(1);
                }
                Err(_) => {
                    warn!(
                        provider = self.classifier.provider_name(),
                        timeout_ms = self.classifier_timeout.as_millis() as u64,
                        "classifier timed out, using heuristic"
                    );
                    counter!("lean_classifier_fallback_total").increment(1);
                }
            }
        }
        ScoreOutcome {
            lean: self.heuristic(source_name, source_url, text),
            summary: None,
        }
    }
}
