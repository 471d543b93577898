//! Randomized scoring sweep plus direction checks. Whatever the word
//! mix, scores must stay inside [-1, 1] and labels must agree with the
//! score's bucket.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use spectrum_news_aggregator::lean::{BiasHandle, DisabledClassifier, LeanScorer, SourceBiasConfig};
use spectrum_news_aggregator::model::LeanLabel;

const RIGHT_POOL: &[&str] = &[
    "border security",
    "tax cuts",
    "second amendment",
    "school choice",
];
const LEFT_POOL: &[&str] = &[
    "gun control",
    "climate crisis",
    "living wage",
    "voting rights",
];
const ENTITY_POOL: &[&str] = &["trump", "biden", "maga", "aclu"];
const NEGATOR_POOL: &[&str] = &["not", "never", "opposes", "against", "rejects"];
const NEUTRAL_POOL: &[&str] = &[
    "committee",
    "hearing",
    "schedule",
    "report",
    "press",
    "statement",
    "update",
    "tuesday",
    "meeting",
    "draft",
];

fn scorer_with_default_bias(default_bias: i8) -> LeanScorer {
    LeanScorer::new(
        BiasHandle::new(SourceBiasConfig {
            default_bias,
            weights: HashMap::new(),
            aliases: HashMap::new(),
        }),
        Arc::new(DisabledClassifier),
        Duration::from_millis(100),
    )
}

fn label_for(score: f32) -> LeanLabel {
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

fn pick<'a>(rng: &mut StdRng, pool: &[&'a str]) -> &'a str {
    pool[rng.random_range(0..pool.len())]
}

#[test]
fn randomized_sentences_stay_clamped_and_consistently_labeled() {
    let scorer = scorer_with_default_bias(0);
    let mut rng = StdRng::seed_from_u64(7);

    for round in 0..200 {
        let mut words = Vec::new();
        for _ in 0..rng.random_range(3..20) {
            let word = match rng.random_range(0..10) {
                0 | 1 => pick(&mut rng, RIGHT_POOL),
                2 | 3 => pick(&mut rng, LEFT_POOL),
                4 => pick(&mut rng, ENTITY_POOL),
                5 => pick(&mut rng, NEGATOR_POOL),
                _ => pick(&mut rng, NEUTRAL_POOL),
            };
            words.push(word);
        }
        let text = words.join(" ");
        let result = scorer.heuristic("Synthetic Wire", None, &text);

        assert!(
            (-1.0..=1.0).contains(&result.score),
            "round {round}: score {} out of range for {text:?}",
            result.score
        );
        assert_eq!(
            result.label,
            label_for(result.score),
            "round {round}: label disagrees with score {} for {text:?}",
            result.score
        );
    }
}

#[test]
fn keyword_direction_always_matches_sign() {
    let scorer = scorer_with_default_bias(0);
    for phrase in RIGHT_POOL {
        let r = scorer.heuristic("Any Wire", None, &format!("Debate over {phrase} continues"));
        assert!(r.score > 0.0, "{phrase} should pull right, got {}", r.score);
    }
    for phrase in LEFT_POOL {
        let r = scorer.heuristic("Any Wire", None, &format!("Debate over {phrase} continues"));
        assert!(r.score < 0.0, "{phrase} should pull left, got {}", r.score);
    }
}

#[test]
fn negation_removes_a_keyword_from_the_tally() {
    let scorer = scorer_with_default_bias(0);
    let plain = scorer.heuristic("Any Wire", None, "Senators push tax cuts in the chamber");
    let negated = scorer.heuristic("Any Wire", None, "Senators oppose tax cuts in the chamber");
    assert!(plain.score > 0.0);
    assert_eq!(negated.score, 0.0, "negated keyword must not count");
    assert_eq!(negated.label, LeanLabel::Center);
}

#[test]
fn source_bias_plus_keywords_saturates_the_scale() {
    // Max bias (2.0) plus two right keywords (1.6) overshoots the raw
    // clamp of 3, so the final score pins at 1.0.
    let scorer = scorer_with_default_bias(2);
    let r = scorer.heuristic(
        "Any Wire",
        None,
        "tax cuts and border security on the docket",
    );
    assert_eq!(r.score, 1.0);
    assert_eq!(r.label, LeanLabel::Right);
}
