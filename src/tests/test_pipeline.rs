use approx::relative_eq;
use log::info;

use crate::config::{AlignmentMethod, CslsMode, MiningConfig};
use crate::core::{ConfidenceTier, EmbeddingSpace, SeedPair};
use crate::errors::{MiningError, Result};
use crate::pipeline::MiningPipeline;
use crate::retrieval::FlushEvent;
use crate::tests::test_config;
use crate::tests::test_data::{
    gaussian_space, identity_seeds, random_orthogonal, rotated, toy_seeds, toy_spaces,
};

/// Source space, its rotation as target, and identity seeds for the first `n_seeds` terms.
fn rotated_pair(n: usize, dim: usize, n_seeds: usize) -> (EmbeddingSpace, EmbeddingSpace, Vec<SeedPair>) {
    let src = gaussian_space("xx", n, dim, 2024);
    let tgt = rotated(&src, &random_orthogonal(dim, 99), "yy");
    let seeds = identity_seeds(&src, n_seeds);
    (src, tgt, seeds)
}

#[test]
fn test_toy_run_end_to_end() {
    crate::tests::init();
    let (src, tgt) = toy_spaces();
    let output = MiningPipeline::builder()
        .with_config(test_config())
        .with_threshold(0.5)
        .with_seeds(toy_seeds())
        .build(src, tgt)
        .unwrap()
        .run()
        .unwrap();

    let hundo = &output.candidates["hundo"];
    assert_eq!(hundo[0].target_term, "hundo");
    assert!(relative_eq!(hundo[0].similarity, 1.0, epsilon = 1e-9));
    assert!(hundo[0].mutual_nn);
    assert_eq!(hundo[0].tier, ConfidenceTier::High);
    assert_eq!(hundo[0].edit_distance, Some(0));

    assert_eq!(output.seed_stats.usable_pairs, 2);
    assert_eq!(output.evaluation.evaluated_pair_count, 2);
    assert!(relative_eq!(output.evaluation.precision_at_1, 1.0));
    assert!(relative_eq!(output.alignment.mean_similarity_after, 1.0, epsilon = 1e-9));
    info!("✓ toy run: {} candidates", output.candidate_count());
}

#[test]
fn test_rotated_space_is_recovered() {
    crate::tests::init();
    let (src, tgt, seeds) = rotated_pair(120, 12, 40);
    let output = MiningPipeline::builder()
        .with_config(test_config())
        .with_seeds(seeds)
        .with_csls(5, CslsMode::QuerySide)
        .with_threshold(0.5)
        .build(src, tgt)
        .unwrap()
        .run()
        .unwrap();

    assert!(relative_eq!(output.evaluation.precision_at_1, 1.0));
    assert!(relative_eq!(output.evaluation.mean_reciprocal_rank, 1.0));
    assert_eq!(output.evaluation.evaluated_pair_count, 40);
    assert_eq!(output.candidates.len(), 120);
    for (term, cands) in &output.candidates {
        assert_eq!(&cands[0].target_term, term);
        assert!(cands[0].mutual_nn);
    }
    assert!(output.alignment.improvement() >= 0.0);
    assert_eq!(output.tiers.total, output.candidate_count());
}

#[test]
fn test_exclude_seed_terms_mines_only_unknowns() {
    let (src, tgt, seeds) = rotated_pair(60, 8, 20);
    let pipeline = MiningPipeline::builder()
        .with_config(test_config())
        .with_seeds(seeds)
        .with_exclude_seed_terms(true)
        .build(src, tgt)
        .unwrap();
    assert_eq!(pipeline.query_terms().len(), 40);

    let output = pipeline.run().unwrap();
    assert!(output.candidates.keys().all(|k| !pipeline.seeds().iter().any(|s| &s.source == k)));
    // Nothing left to evaluate against
    assert_eq!(output.evaluation.evaluated_pair_count, 0);
}

#[test]
fn test_retrofit_run_with_different_dimensions() {
    let src = gaussian_space("xx", 30, 6, 5);
    let tgt = gaussian_space("yy", 30, 9, 6);
    let seeds = identity_seeds(&src, 15);
    let output = MiningPipeline::builder()
        .with_config(test_config())
        .with_seeds(seeds)
        .with_retrofit(20, 0.5)
        .build(src, tgt)
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(output.alignment.method, "retrofit");
    assert_eq!(output.alignment.iteration_similarity.len(), 20);
    assert!(output.alignment.mean_similarity_after > output.alignment.mean_similarity_before);
    assert!(output.evaluation.precision_at_1 > 0.5);
}

#[test]
fn test_empty_seed_set_is_fatal_for_fitting_solvers() {
    let (src, tgt) = toy_spaces();
    let seeds = vec![SeedPair::new("nekonata", "hundo"), SeedPair::new("kato", "x")];
    let result = MiningPipeline::builder()
        .with_config(test_config())
        .with_seeds(seeds.clone())
        .build(src.clone(), tgt.clone())
        .unwrap()
        .run();
    match result {
        Err(MiningError::EmptySeedSet { total, skipped }) => assert_eq!((total, skipped), (2, 2)),
        other => panic!("expected EmptySeedSet, got {:?}", other.map(|o| o.seed_stats)),
    }

    // Pre-aligned spaces need no seeds
    let output = MiningPipeline::builder()
        .with_config(test_config())
        .with_seeds(seeds)
        .with_alignment(AlignmentMethod::Identity)
        .build(src, tgt)
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(output.candidates["kato"][0].target_term, "kato");
    assert_eq!(output.seed_stats.skipped, 2);
}

#[test]
fn test_procrustes_dimension_mismatch_is_fatal() {
    let src = gaussian_space("xx", 10, 4, 1);
    let tgt = gaussian_space("yy", 10, 5, 2);
    let seeds = identity_seeds(&src, 5);
    let result = MiningPipeline::builder()
        .with_seeds(seeds)
        .build(src, tgt)
        .unwrap()
        .run();
    assert!(matches!(result, Err(MiningError::DimensionMismatch { .. })));
}

#[test]
fn test_invalid_config_fails_at_build() {
    let (src, tgt) = toy_spaces();
    let result = MiningPipeline::builder().with_top_k(0).build(src, tgt);
    assert!(matches!(result, Err(MiningError::InvalidConfig(_))));
}

#[test]
fn test_cognate_seeding_when_no_dictionary() {
    let (src, tgt) = toy_spaces();
    let pipeline = MiningPipeline::builder()
        .with_config(test_config())
        .with_cognate_seeding(0.8, 10)
        .build(src, tgt)
        .unwrap();
    assert_eq!(pipeline.seeds().len(), 3);
    let output = pipeline.run().unwrap();
    assert!(relative_eq!(output.evaluation.precision_at_1, 1.0));
}

#[test]
fn test_runs_are_deterministic_and_serializable() {
    let (src, tgt, seeds) = rotated_pair(50, 8, 10);
    let config = MiningConfig {
        workers: Some(3),
        ..test_config()
    };
    let pipeline = MiningPipeline::builder()
        .with_config(config)
        .with_csls(4, CslsMode::Symmetric)
        .with_seeds(seeds)
        .build(src, tgt)
        .unwrap();

    let a = pipeline.run().unwrap();
    let b = pipeline.run().unwrap();
    assert_eq!(a.candidates, b.candidates);

    let ranked = a.by_confidence();
    assert_eq!(ranked.len(), a.candidate_count());
    assert!(ranked.windows(2).all(|w| w[0].confidence >= w[1].confidence));

    let json = serde_json::to_value(&a).unwrap();
    assert!(json["candidates"].is_object());
    assert!(json["evaluation"]["precision_at_1"].is_number());
    assert!(json["tiers"]["total"].is_number());
}

#[test]
fn test_resumed_run_covers_remaining_batches() {
    let (src, tgt, seeds) = rotated_pair(20, 6, 6);
    let pipeline = MiningPipeline::builder()
        .with_config(test_config())
        .with_batch_size(5)
        .with_flush_every(1)
        .with_seeds(seeds)
        .build(src, tgt)
        .unwrap();

    let mut flushed = Vec::new();
    let mut sink = |e: FlushEvent<'_>| -> Result<()> {
        flushed.extend(e.results.iter().map(|r| r.query.clone()));
        Ok(())
    };
    let full = pipeline.run_with_sink(&mut sink, 0).unwrap();
    assert_eq!(flushed.len(), 20);

    let resumed = pipeline.run_with_sink(&mut crate::retrieval::NullSink, 2).unwrap();
    assert_eq!(resumed.retrieval_stats.resumed_batches, 2);
    assert_eq!(resumed.candidates.len(), 10);
    for (term, cands) in &resumed.candidates {
        assert_eq!(cands, &full.candidates[term]);
    }
}

#[test]
fn test_resumed_run_evaluates_only_retrieved_batches() {
    crate::tests::init();
    let (src, tgt, seeds) = rotated_pair(20, 6, 20);
    let pipeline = MiningPipeline::builder()
        .with_config(test_config())
        .with_batch_size(5)
        .with_exclude_seed_terms(false)
        .with_seeds(seeds)
        .build(src, tgt)
        .unwrap();

    let full = pipeline.run().unwrap();
    assert_eq!(full.evaluation.evaluated_pair_count, 20);
    assert!(relative_eq!(full.evaluation.precision_at_1, 1.0));

    let resumed = pipeline.run_with_sink(&mut crate::retrieval::NullSink, 2).unwrap();
    assert_eq!(resumed.retrieval_stats.answered, 10);
    assert_eq!(resumed.evaluation.evaluated_pair_count, 10);
    assert!(relative_eq!(resumed.evaluation.precision_at_1, 1.0));
    assert!(relative_eq!(resumed.evaluation.mean_reciprocal_rank, 1.0));
}
