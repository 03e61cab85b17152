//! Similarity scoring: cosine and CSLS.
//!
//! CSLS (Cross-domain Similarity Local Scaling) corrects for hub vectors that
//! sit close to many queries. For a query `q` with raw cosines `cos(q, c)`
//! against the whole candidate pool:
//!
//! - query-side (default): `score(c) = 2·cos(q, c) − r_q`, where `r_q` is the
//!   mean of `q`'s `k` highest cosines, computed once per query;
//! - symmetric: `score(c) = 2·cos(q, c) − r_q − r_c`, where `r_c` is the mean
//!   of candidate `c`'s `k` highest cosines against the query-side pool.
//!
//! Query-side CSLS is `2·cos − const` for each query, so it never reorders one
//! query's candidates relative to cosine; it changes which candidates clear an
//! absolute threshold. The symmetric form reorders whenever hubness varies.

use log::{debug, trace};
use rayon::prelude::*;

use crate::config::{CslsMode, MiningConfig, SimilarityMetric};
use crate::operators::{cosine, dot, normalise_rows, top_k_mean};

/// `2·cos − r`.
#[inline]
pub fn csls_score(cos: f64, neighbourhood_mean: f64) -> f64 {
    2.0 * cos - neighbourhood_mean
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimilarityScorer {
    Cosine,
    Csls { k: usize, mode: CslsMode },
}

impl SimilarityScorer {
    pub fn from_config(config: &MiningConfig) -> Self {
        match config.similarity_metric {
            SimilarityMetric::Cosine => SimilarityScorer::Cosine,
            SimilarityMetric::Csls => SimilarityScorer::Csls {
                k: config.csls_k,
                mode: config.csls_mode,
            },
        }
    }

    /// True when scores need candidate-side neighbourhood means.
    #[inline]
    pub fn needs_candidate_means(&self) -> bool {
        matches!(
            self,
            SimilarityScorer::Csls {
                mode: CslsMode::Symmetric,
                ..
            }
        )
    }

    /// Scores one query against every row of a row-major candidate pool.
    ///
    /// `candidate_means` is only read by symmetric CSLS; pass `None` to treat
    /// every `r_c` as zero.
    pub fn score(
        &self,
        query: &[f64],
        pool: &[f64],
        dim: usize,
        candidate_means: Option<&[f64]>,
    ) -> Vec<f64> {
        let mut scores: Vec<f64> = pool.chunks_exact(dim).map(|c| cosine(query, c)).collect();
        self.rescale(&mut scores, candidate_means);
        scores
    }

    /// Turns one query's raw cosines into final scores, in place.
    pub fn rescale(&self, cosines: &mut [f64], candidate_means: Option<&[f64]>) {
        let (k, mode) = match *self {
            SimilarityScorer::Cosine => return,
            SimilarityScorer::Csls { k, mode } => (k, mode),
        };
        let r_query = top_k_mean(cosines, k);
        trace!("CSLS query neighbourhood mean (k={}): {:.6}", k, r_query);
        match (mode, candidate_means) {
            (CslsMode::Symmetric, Some(means)) => cosines
                .iter_mut()
                .zip(means)
                .for_each(|(c, &r_c)| *c = csls_score(*c, r_query) - r_c),
            _ => cosines
                .iter_mut()
                .for_each(|c| *c = csls_score(*c, r_query)),
        }
    }
}

/// Mean of each candidate's `k` highest cosines against `queries`.
///
/// Both matrices are row-major and already unit-normalised. Candidates are
/// processed `batch_size` rows at a time so the transient block stays at
/// `batch_size × |queries|`.
pub fn candidate_neighbourhood_means(
    candidates: &[f64],
    candidate_dim: usize,
    queries: &[f64],
    query_dim: usize,
    k: usize,
    batch_size: usize,
) -> Vec<f64> {
    let n = if candidate_dim == 0 {
        0
    } else {
        candidates.len() / candidate_dim
    };
    debug!(
        "Computing candidate-side CSLS means for {} candidates (k={}, batch {})",
        n, k, batch_size
    );
    candidates
        .par_chunks(candidate_dim.max(1) * batch_size.max(1))
        .flat_map_iter(|block| {
            block
                .chunks_exact(candidate_dim)
                .map(|c| {
                    let sims: Vec<f64> = queries.chunks_exact(query_dim).map(|q| dot(c, q)).collect();
                    top_k_mean(&sims, k)
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Row-major copy of `data` with unit-length rows.
pub fn unit_rows(data: &[f64], dim: usize) -> Vec<f64> {
    let mut out = data.to_vec();
    out.par_chunks_mut(dim.max(1) * 256)
        .for_each(|block| normalise_rows(block, dim));
    out
}
