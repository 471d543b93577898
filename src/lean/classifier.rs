//! Optional external lean classifier seam.
//!
//! The real classifier is an external collaborator; this repo ships the
//! trait, the always-absent default and a deterministic mock. Absence or
//! failure of the classifier must never surface to callers.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

pub const ENV_CLASSIFIER: &str = "NEWS_CLASSIFIER";

/// Raw verdict from a classifier. Score is on the article scale [-1, 1];
/// the label is always re-bucketed from the clamped score downstream, so
/// a verdict cannot break the label/score invariant.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierVerdict {
    pub score: f32,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub summary: Option<String>,
}

pub trait LeanClassifier: Send + Sync {
    /// `None` means "no verdict" for any reason; the caller falls back to
    /// the heuristic. Implementations own their network timeouts.
    fn classify<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<ClassifierVerdict>> + Send + 'a>>;

    fn provider_name(&self) -> &'static str;

    /// Disabled providers are skipped without spending a timeout on them.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Production default: never produces a verdict.
pub struct DisabledClassifier;

impl LeanClassifier for DisabledClassifier {
    fn classify<'a>(
        &'a self,
        _text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<ClassifierVerdict>> + Send + 'a>> {
        Box::pin(async { None })
    }

    fn provider_name(&self) -> &'static str {
        "disabled"
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Deterministic mock for tests and local development. Produces a verdict
/// only for marker strings, so ordinary fixtures exercise the heuristic.
pub struct MockClassifier;

impl LeanClassifier for MockClassifier {
    fn classify<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<ClassifierVerdict>> + Send + 'a>> {
        Box::pin(async move {
            if text.contains("mock-right") {
                Some(ClassifierVerdict {
                    score: 0.8,
                    confidence: Some(0.9),
                    summary: Some("Mock verdict: leans right.".to_string()),
                })
            } else if text.contains("mock-left") {
                Some(ClassifierVerdict {
                    score: -0.8,
                    confidence: Some(0.9),
                    summary: Some("Mock verdict: leans left.".to_string()),
                })
            } else {
                None
            }
        })
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// `NEWS_CLASSIFIER=mock` wires the mock in; anything else (including
/// unset) stays disabled.
pub fn build_classifier_from_env() -> Arc<dyn LeanClassifier> {
    let value = std::env::var(ENV_CLASSIFIER)
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match value.as_str() {
        "mock" => {
            info!("lean classifier: mock provider enabled");
            Arc::new(MockClassifier)
        }
        "" | "disabled" => Arc::new(DisabledClassifier),
        other => {
            warn!(value = %other, "unknown classifier setting, staying disabled");
            Arc::new(DisabledClassifier)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_never_answers() {
        let c = DisabledClassifier;
        assert!(c.classify("anything at all").await.is_none());
        assert_eq!(c.provider_name(), "disabled");
    }

    #[tokio::test]
    async fn mock_answers_only_marker_text() {
        let c = MockClassifier;
        let v = c.classify("story with mock-right marker").await.unwrap();
        assert!(v.score > 0.0);
        assert_eq!(v.confidence, Some(0.9));
        assert!(c.classify("plain story").await.is_none());
    }

    #[test]
    #[serial_test::serial]
    fn factory_defaults_to_disabled() {
        std::env::remove_var(ENV_CLASSIFIER);
        assert_eq!(build_classifier_from_env().provider_name(), "disabled");
        std::env::set_var(ENV_CLASSIFIER, "mock");
        assert_eq!(build_classifier_from_env().provider_name(), "mock");
        std::env::set_var(ENV_CLASSIFIER, "llm-of-the-week");
        assert_eq!(build_classifier_from_env().provider_name(), "disabled");
        std::env::remove_var(ENV_CLASSIFIER);
    }
}
