use approx::relative_eq;

use crate::config::{CslsMode, MiningConfig, SimilarityMetric};
use crate::operators::cosine;
use crate::scoring::{candidate_neighbourhood_means, csls_score, unit_rows, SimilarityScorer};

#[test]
fn test_csls_concrete_scenario() {
    // r = 0.4, cos = 0.6
    assert!(relative_eq!(csls_score(0.6, 0.4), 0.8));

    let scorer = SimilarityScorer::Csls { k: 2, mode: CslsMode::QuerySide };
    let mut cosines = vec![0.6, 0.2, 0.1];
    // top-2 mean = 0.4
    scorer.rescale(&mut cosines, None);
    assert!(relative_eq!(cosines[0], 0.8));
    assert!(relative_eq!(cosines[1], 0.0));
    assert!(relative_eq!(cosines[2], -0.2));
}

#[test]
fn test_cosine_scorer_matches_operator() {
    let pool = vec![1.0, 0.0, 0.0, 2.0, 3.0, 4.0];
    let q = [1.0, 1.0];
    let scores = SimilarityScorer::Cosine.score(&q, &pool, 2, None);
    for (s, c) in scores.iter().zip(pool.chunks_exact(2)) {
        assert!(relative_eq!(*s, cosine(&q, c)));
    }
}

#[test]
fn test_query_side_csls_keeps_per_query_order() {
    let pool = vec![1.0, 0.0, 0.8, 0.6, 0.0, 1.0, -0.6, 0.8];
    let q = [0.9, 0.1];
    let cos = SimilarityScorer::Cosine.score(&q, &pool, 2, None);
    let csls = SimilarityScorer::Csls { k: 2, mode: CslsMode::QuerySide }.score(&q, &pool, 2, None);

    let order = |v: &[f64]| {
        let mut idx: Vec<usize> = (0..v.len()).collect();
        idx.sort_by(|&a, &b| v[b].total_cmp(&v[a]));
        idx
    };
    assert_eq!(order(&cos), order(&csls));
}

#[test]
fn test_symmetric_csls_demotes_hubs() {
    // Candidate 0 is a hub: close to every query. Candidate 1 only to query 0.
    let candidates = unit_rows(&[1.0, 1.0, 1.0, 0.0], 2);
    let queries = unit_rows(&[1.0, 0.2, 0.2, 1.0, 1.0, 0.9], 2);
    let means = candidate_neighbourhood_means(&candidates, 2, &queries, 2, 2, 1);
    assert_eq!(means.len(), 2);
    assert!(means[0] > means[1]);

    let q = &queries[0..2];
    let cos = SimilarityScorer::Cosine.score(q, &candidates, 2, None);
    let sym = SimilarityScorer::Csls { k: 2, mode: CslsMode::Symmetric }.score(q, &candidates, 2, Some(&means));
    let r_q = (cos[0] + cos[1]) / 2.0;
    assert!(relative_eq!(sym[0], 2.0 * cos[0] - r_q - means[0], epsilon = 1e-12));
    assert!(relative_eq!(sym[1], 2.0 * cos[1] - r_q - means[1], epsilon = 1e-12));
}

#[test]
fn test_from_config() {
    assert_eq!(SimilarityScorer::from_config(&MiningConfig::default()), SimilarityScorer::Cosine);
    let c = MiningConfig {
        similarity_metric: SimilarityMetric::Csls,
        csls_k: 7,
        csls_mode: CslsMode::Symmetric,
        ..Default::default()
    };
    let s = SimilarityScorer::from_config(&c);
    assert_eq!(s, SimilarityScorer::Csls { k: 7, mode: CslsMode::Symmetric });
    assert!(s.needs_candidate_means());
    assert!(!SimilarityScorer::Cosine.needs_candidate_means());
}
