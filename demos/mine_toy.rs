//! Mines a synthetic rotated space and prints the best candidates.
//!
//! Run with `RUST_LOG=info cargo run --example mine_toy`.

use lexalign::config::CslsMode;
use lexalign::pipeline::MiningPipeline;
use lexalign::seeds::parse_seed_dictionary;

#[path = "common/lib.rs"]
mod common;

fn main() -> lexalign::Result<()> {
    env_logger::init();

    let (src, tgt, _) = common::synthetic_pair(500, 32, 0.1, 0, 42);

    // Seeds usually come from a text dictionary
    let text: String = (0..100).map(|i| format!("w{:05}\tw{:05}\n", i, i)).collect();
    let seeds = parse_seed_dictionary(&format!("# src tgt\n{}", text), true)?;

    let output = MiningPipeline::builder()
        .with_seeds(seeds.pairs)
        .with_csls(10, CslsMode::QuerySide)
        .with_threshold(0.5)
        .with_top_k(5)
        .with_batch_size(64)
        .build(src, tgt)?
        .run()?;

    println!(
        "alignment: {} pairs, mean seed similarity {:.4} -> {:.4}",
        output.alignment.pairs,
        output.alignment.mean_similarity_before,
        output.alignment.mean_similarity_after
    );
    println!(
        "evaluation: P@1 {:.3}  P@5 {:.3}  P@10 {:.3}  MRR {:.3} over {} pairs",
        output.evaluation.precision_at_1,
        output.evaluation.precision_at_5,
        output.evaluation.precision_at_10,
        output.evaluation.mean_reciprocal_rank,
        output.evaluation.evaluated_pair_count
    );
    println!(
        "tiers: {} high, {} medium, {} low ({} mutual)",
        output.tiers.high, output.tiers.medium, output.tiers.low, output.tiers.mutual
    );
    for c in output.by_confidence().into_iter().take(10) {
        println!(
            "{:>8} -> {:<8} sim {:.3}  conf {:.3}  {}",
            c.source_term, c.target_term, c.similarity, c.confidence, c.tier
        );
    }
    Ok(())
}
