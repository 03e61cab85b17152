//! Run configuration for the mining pipeline.
//!
//! `MiningConfig` carries every tunable of a run. It is plain data with serde
//! derives so the collaborator that owns config files can load it from any
//! format; `validate` is called once by the pipeline before any stage runs.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::{MiningError, Result};

/// Scoring function used for retrieval and mutual-NN checks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    #[default]
    Cosine,
    Csls,
}

/// Which neighbourhood means CSLS subtracts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CslsMode {
    /// `2·cos − r_query`: only the query's own top-k neighbourhood.
    #[default]
    QuerySide,
    /// `2·cos − r_query − r_candidate`.
    Symmetric,
}

/// How the two spaces are brought together before retrieval.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignmentMethod {
    #[default]
    Procrustes,
    Retrofit,
    /// Spaces are already aligned; use them as they are.
    Identity,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    pub similarity_metric: SimilarityMetric,
    pub csls_k: usize,
    pub csls_mode: CslsMode,
    pub alignment_method: AlignmentMethod,
    pub top_k: usize,
    pub similarity_threshold: f64,
    pub retrofit_iterations: usize,
    pub retrofit_alpha: f64,
    pub batch_size: usize,
    pub high_threshold: f64,
    pub medium_threshold: f64,
    pub min_freq_ratio: f64,
    /// Neighbourhood size of the reverse check; `None` reuses `top_k`.
    pub mutual_nn_k: Option<usize>,
    /// Added to the confidence score of mutual nearest neighbours.
    pub mutual_bonus: f64,
    /// Seed pairs whose terms fall below this corpus frequency are skipped.
    pub min_seed_frequency: Option<u64>,
    /// Drop seed-dictionary source terms from the query set.
    pub exclude_seed_terms: bool,
    /// Size of a dedicated retrieval thread pool; `None` uses rayon's global pool.
    pub workers: Option<usize>,
    /// Upper bound on one similarity block, `batch_size × |target| × 8` bytes.
    pub max_block_bytes: Option<usize>,
    /// Batches delivered per partial flush.
    pub flush_every: usize,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            similarity_metric: SimilarityMetric::Cosine,
            csls_k: 10,
            csls_mode: CslsMode::QuerySide,
            alignment_method: AlignmentMethod::Procrustes,
            top_k: 10,
            similarity_threshold: 0.5,
            retrofit_iterations: 10,
            retrofit_alpha: 0.5,
            batch_size: 100,
            high_threshold: 0.8,
            medium_threshold: 0.65,
            min_freq_ratio: 0.5,
            mutual_nn_k: None,
            mutual_bonus: 0.1,
            min_seed_frequency: None,
            exclude_seed_terms: false,
            workers: None,
            max_block_bytes: None,
            flush_every: 16,
        }
    }
}

// Floats compare with relative tolerance, everything else exactly
impl PartialEq for MiningConfig {
    fn eq(&self, other: &Self) -> bool {
        self.similarity_metric == other.similarity_metric
            && self.csls_k == other.csls_k
            && self.csls_mode == other.csls_mode
            && self.alignment_method == other.alignment_method
            && self.top_k == other.top_k
            && approx::relative_eq!(self.similarity_threshold, other.similarity_threshold)
            && self.retrofit_iterations == other.retrofit_iterations
            && approx::relative_eq!(self.retrofit_alpha, other.retrofit_alpha)
            && self.batch_size == other.batch_size
            && approx::relative_eq!(self.high_threshold, other.high_threshold)
            && approx::relative_eq!(self.medium_threshold, other.medium_threshold)
            && approx::relative_eq!(self.min_freq_ratio, other.min_freq_ratio)
            && self.mutual_nn_k == other.mutual_nn_k
            && approx::relative_eq!(self.mutual_bonus, other.mutual_bonus)
            && self.min_seed_frequency == other.min_seed_frequency
            && self.exclude_seed_terms == other.exclude_seed_terms
            && self.workers == other.workers
            && self.max_block_bytes == other.max_block_bytes
            && self.flush_every == other.flush_every
    }
}

impl MiningConfig {
    /// Effective neighbourhood size for the reverse (mutual-NN) retrieval.
    pub fn mutual_k(&self) -> usize {
        self.mutual_nn_k.unwrap_or(self.top_k)
    }

    /// Rejects settings no stage can run with.
    pub fn validate(&self) -> Result<()> {
        debug!("Validating configuration: {:?}", self);
        let fail = |msg: String| Err(MiningError::InvalidConfig(msg));

        if self.top_k == 0 {
            return fail("top_k must be at least 1".to_string());
        }
        if self.batch_size == 0 {
            return fail("batch_size must be at least 1".to_string());
        }
        if self.flush_every == 0 {
            return fail("flush_every must be at least 1".to_string());
        }
        if self.similarity_metric == SimilarityMetric::Csls && self.csls_k == 0 {
            return fail("csls_k must be at least 1".to_string());
        }
        if self.mutual_k() == 0 {
            return fail("mutual_nn_k must be at least 1".to_string());
        }
        if !(self.retrofit_alpha > 0.0 && self.retrofit_alpha <= 1.0) {
            return fail(format!(
                "retrofit_alpha {} outside (0, 1]",
                self.retrofit_alpha
            ));
        }
        if self.workers == Some(0) {
            return fail("workers must be at least 1".to_string());
        }
        for (name, v) in [
            ("similarity_threshold", self.similarity_threshold),
            ("high_threshold", self.high_threshold),
            ("medium_threshold", self.medium_threshold),
            ("min_freq_ratio", self.min_freq_ratio),
            ("mutual_bonus", self.mutual_bonus),
        ] {
            if !v.is_finite() {
                return fail(format!("{} is not finite", name));
            }
        }
        if self.medium_threshold > self.high_threshold {
            return fail(format!(
                "medium_threshold {} above high_threshold {}",
                self.medium_threshold, self.high_threshold
            ));
        }
        Ok(())
    }
}
