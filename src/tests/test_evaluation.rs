use std::collections::BTreeMap;

use approx::relative_eq;
use proptest::prelude::*;

use crate::core::{CandidateTranslation, SeedPair};
use crate::evaluation::{EvaluationModule, EvaluationReport};

fn lists(entries: &[(&str, &[&str])]) -> BTreeMap<String, Vec<CandidateTranslation>> {
    entries
        .iter()
        .map(|(q, targets)| {
            let cands = targets
                .iter()
                .enumerate()
                .map(|(i, t)| CandidateTranslation::new(*q, *t, 1.0 - i as f64 * 0.01).unwrap())
                .collect();
            (q.to_string(), cands)
        })
        .collect()
}

fn terms(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_precision_and_mrr() {
    crate::tests::init();
    let seeds = vec![
        SeedPair::new("a", "A"),
        SeedPair::new("b", "B"),
        SeedPair::new("c", "C"),
        SeedPair::new("d", "D"),
        SeedPair::new("unqueried", "U"),
    ];
    let ranked = lists(&[
        ("a", &["A", "x"]),
        ("b", &["x", "y", "B"]),
        ("c", &["x", "y", "z", "w", "v", "u", "C"]),
        // "d" was queried but got no candidates above threshold
    ]);
    let report = EvaluationModule::evaluate(&seeds, &terms(&["a", "b", "c", "d"]), &ranked);

    assert_eq!(report.evaluated_pair_count, 4);
    assert!(relative_eq!(report.precision_at_1, 0.25));
    assert!(relative_eq!(report.precision_at_5, 0.5));
    assert!(relative_eq!(report.precision_at_10, 0.75));
    let mrr = (1.0 + 1.0 / 3.0 + 1.0 / 7.0 + 0.0) / 4.0;
    assert!(relative_eq!(report.mean_reciprocal_rank, mrr));
}

#[test]
fn test_no_queried_seed_is_all_zero() {
    let seeds = vec![SeedPair::new("a", "A")];
    let report = EvaluationModule::evaluate(&seeds, &terms(&["b"]), &lists(&[("b", &["A"])]));
    assert_eq!(report, EvaluationReport::default());
}

#[test]
fn test_report_serializes() {
    let report = EvaluationReport {
        precision_at_1: 0.5,
        precision_at_5: 0.75,
        precision_at_10: 1.0,
        mean_reciprocal_rank: 0.6,
        evaluated_pair_count: 4,
    };
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["evaluated_pair_count"], 4);
    assert_eq!(json["precision_at_5"], 0.75);
}

proptest! {
    #[test]
    fn prop_precision_is_ordered(ranks in proptest::collection::vec(proptest::option::of(1usize..15), 1..40)) {
        // Query i expects "t{i}" at the given rank, or not at all
        let mut ranked = BTreeMap::new();
        let mut seeds = Vec::new();
        let mut queried = Vec::new();
        for (i, rank) in ranks.iter().enumerate() {
            let q = format!("q{i}");
            let expected = format!("t{i}");
            let mut cands: Vec<CandidateTranslation> = (1..15)
                .map(|r| CandidateTranslation::new(q.as_str(), format!("n{r}"), 1.0).unwrap())
                .collect();
            if let Some(r) = rank {
                cands[r - 1].target_term = expected.clone();
            }
            ranked.insert(q.clone(), cands);
            seeds.push(SeedPair::new(q.clone(), expected));
            queried.push(q);
        }
        let report = EvaluationModule::evaluate(&seeds, &queried, &ranked);
        prop_assert!(report.precision_at_1 <= report.precision_at_5);
        prop_assert!(report.precision_at_5 <= report.precision_at_10);
        prop_assert!(report.mean_reciprocal_rank <= 1.0);
        prop_assert!(report.mean_reciprocal_rank >= report.precision_at_1 - 1e-12);
        prop_assert_eq!(report.evaluated_pair_count, ranks.len());
    }
}
