//! # lexalign
//!
//! Bilingual lexicon mining between two word-embedding spaces.
//!
//! Given a source and a target `EmbeddingSpace` and a small seed dictionary of
//! known translations, a run:
//!
//! 1. stacks the usable seed pairs into row-aligned matrices (`seeds`),
//! 2. fits an alignment, orthogonal Procrustes or retrofitting (`alignment`),
//! 3. retrieves the top-k target terms for every query in bounded batches,
//!    scored by cosine or CSLS (`retrieval`, `scoring`),
//! 4. checks each candidate in the reverse direction (`validation`),
//! 5. grades candidates into high / medium / low tiers (`classify`),
//! 6. reports Precision@1/5/10 and MRR against the seeds (`evaluation`).
//!
//! `pipeline::MiningPipeline` owns the inputs of one run and drives the
//! stages; each stage is also usable on its own.
//!
//! ```
//! use lexalign::core::{EmbeddingSpace, SeedPair};
//! use lexalign::pipeline::MiningPipeline;
//!
//! let vocab = vec!["hundo".to_string(), "kato".to_string(), "birdo".to_string()];
//! let rows = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.0, 0.0, 1.0]];
//! let source = EmbeddingSpace::from_rows("io", vocab.clone(), rows.clone()).unwrap();
//! let target = EmbeddingSpace::from_rows("eo", vocab, rows).unwrap();
//!
//! let output = MiningPipeline::builder()
//!     .with_seeds(vec![SeedPair::new("hundo", "hundo"), SeedPair::new("kato", "kato")])
//!     .build(source, target)
//!     .unwrap()
//!     .run()
//!     .unwrap();
//!
//! assert_eq!(output.candidates["hundo"][0].target_term, "hundo");
//! assert_eq!(output.evaluation.evaluated_pair_count, 2);
//! ```

pub mod alignment;
pub mod classify;
pub mod config;
pub mod core;
pub mod errors;
pub mod evaluation;
pub mod operators;
pub mod pipeline;
pub mod retrieval;
pub mod scoring;
pub mod seeds;
pub mod validation;

#[cfg(test)]
mod tests;

pub use crate::errors::{MiningError, Result};
