use approx::relative_eq;
use proptest::prelude::*;

use crate::classify::{ConfidenceClassifier, TierSummary};
use crate::config::MiningConfig;
use crate::core::{CandidateTranslation, ConfidenceTier, EmbeddingSpace};

fn classifier() -> ConfidenceClassifier {
    ConfidenceClassifier::from_config(&MiningConfig::default()).unwrap()
}

#[test]
fn test_default_matches_config_default() {
    assert_eq!(ConfidenceClassifier::default(), classifier());

    // Changing the configured thresholds moves the classifier with them
    let config = MiningConfig {
        high_threshold: 0.9,
        ..MiningConfig::default()
    };
    let c = ConfidenceClassifier::from_config(&config).unwrap();
    assert_ne!(c, ConfidenceClassifier::default());
    assert_eq!(c.tier(0.85, true, None), ConfidenceTier::Medium);
}

#[test]
fn test_tier_rule() {
    let c = classifier();
    assert_eq!(c.tier(0.85, true, None), ConfidenceTier::High);
    assert_eq!(c.tier(0.85, false, Some(0.6)), ConfidenceTier::High);
    assert_eq!(c.tier(0.85, false, Some(0.4)), ConfidenceTier::Medium);
    assert_eq!(c.tier(0.85, false, None), ConfidenceTier::Medium);
    assert_eq!(c.tier(0.70, true, Some(1.0)), ConfidenceTier::Medium);
    assert_eq!(c.tier(0.60, true, Some(1.0)), ConfidenceTier::Low);
    assert_eq!(c.tier(0.80, true, None), ConfidenceTier::High);
    assert_eq!(c.tier(0.65, false, None), ConfidenceTier::Medium);
}

#[test]
fn test_classify_fills_signals() {
    let vocab = |t: &str| vec![t.to_string()];
    let src = EmbeddingSpace::from_rows("io", vocab("kato"), vec![vec![1.0]])
        .unwrap()
        .with_frequencies(vec![10])
        .unwrap();
    let tgt = EmbeddingSpace::from_rows("eo", vocab("gato"), vec![vec![1.0]])
        .unwrap()
        .with_frequencies(vec![100])
        .unwrap();

    let mut cand = CandidateTranslation::new("kato", "gato", 0.9).unwrap();
    cand.mutual_nn = true;
    classifier().classify(&mut cand, &src, &tgt).unwrap();

    assert!(relative_eq!(cand.frequency_ratio.unwrap(), 0.1));
    assert_eq!(cand.edit_distance, Some(1));
    assert!(relative_eq!(cand.confidence, 1.0));
    assert_eq!(cand.tier, ConfidenceTier::High);
}

#[test]
fn test_missing_frequencies_leave_ratio_empty() {
    let src = EmbeddingSpace::from_rows("io", vec!["a".into()], vec![vec![1.0]]).unwrap();
    let tgt = EmbeddingSpace::from_rows("eo", vec!["b".into()], vec![vec![1.0]])
        .unwrap()
        .with_frequencies(vec![0])
        .unwrap();
    let mut cand = CandidateTranslation::new("a", "b", 0.9).unwrap();
    classifier().classify(&mut cand, &src, &tgt).unwrap();
    assert_eq!(cand.frequency_ratio, None);
    assert_eq!(cand.tier, ConfidenceTier::Medium);
    assert!(relative_eq!(cand.confidence, 0.9));
}

#[test]
fn test_summary_counts() {
    let mut s = TierSummary::default();
    for (tier, mutual) in [
        (ConfidenceTier::High, true),
        (ConfidenceTier::Low, false),
        (ConfidenceTier::Medium, true),
        (ConfidenceTier::Low, false),
    ] {
        let mut c = CandidateTranslation::new("a", "b", 0.5).unwrap();
        c.tier = tier;
        c.mutual_nn = mutual;
        s.add(&c);
    }
    assert_eq!((s.total, s.high, s.medium, s.low, s.mutual), (4, 1, 1, 2, 2));
}

#[test]
fn test_rejects_inverted_thresholds() {
    assert!(ConfidenceClassifier::new(0.6, 0.7, 0.5).is_err());
    assert!(ConfidenceClassifier::new(f64::NAN, 0.7, 0.5).is_err());
}

proptest! {
    #[test]
    fn prop_tier_is_monotonic_in_similarity(
        a in -1.0f64..2.0,
        b in -1.0f64..2.0,
        mutual in any::<bool>(),
        ratio in proptest::option::of(0.001f64..=1.0),
    ) {
        let c = classifier();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(c.tier(lo, mutual, ratio) <= c.tier(hi, mutual, ratio));
    }
}
