//! Alignment solvers: Orthogonal Procrustes and retrofitting.
//!
//! Both strategies consume the row-aligned seed matrices from
//! `SeedPairMatrixBuilder` and produce an `AlignmentTransform` that is fitted
//! once per run and then only read:
//!
//! - **Procrustes** (closed form): `W = U Vᵗ` from the SVD `Xᵗ Y = U Σ Vᵗ`,
//!   the orthogonal map minimising `‖XW − Y‖_F`. Requires equal dimensionality.
//!   Queries are mapped as `x · W`; the reverse direction uses `y · Wᵗ`.
//! - **Retrofitting** (iterative): pulls each seed pair's vectors towards each
//!   other for a caller-supplied number of iterations, renormalising both full
//!   spaces after every iteration. The evolved spaces replace the originals
//!   for retrieval; no linear map is fitted, so dimensions may differ (the
//!   shorter vector behaves as zero-padded when mixed).
//! - **Identity**: the spaces are already aligned.
//!
//! Every fit reports mean seed-pair cosine before and after. A Procrustes fit
//! that lowers it is logged as a warning and flagged, not rejected.
//!
//! # Degenerate singular directions
//!
//! When `Xᵗ Y` is rank deficient the optimal `W` is not unique: any pairing of
//! the null-space singular vectors is optimal. Those directions are paired
//! sign-consistently (`uᵢ·vᵢ ≥ 0`), so seed sets that span only a subspace
//! leave the orthogonal complement as close to untouched as the decomposition
//! allows.

use log::{debug, info, trace, warn};
use rayon::prelude::*;
use serde::Serialize;
use smartcore::linalg::basic::arrays::{Array, Array2};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linalg::traits::svd::SVDDecomposable;

use crate::config::{AlignmentMethod, MiningConfig};
use crate::core::EmbeddingSpace;
use crate::errors::{MiningError, Result};
use crate::operators::{cosine, normalise_rows, row_times_matrix, row_times_transpose};
use crate::seeds::PairedMatrix;

/// Relative cutoff below which a singular value counts as zero.
pub const SINGULAR_TOL: f64 = 1e-10;
/// Maximum entry of `|WᵗW − I|` accepted from the decomposition.
pub const ORTHOGONALITY_TOL: f64 = 1e-6;

/// The fitted mapping between the two spaces.
#[derive(Clone, Debug)]
pub enum AlignmentTransform {
    Identity,
    /// Row-major `dim × dim` orthogonal matrix.
    Orthogonal { w: Vec<f64>, dim: usize },
    /// Evolved spaces that replace the originals for retrieval.
    Retrofitted {
        source: EmbeddingSpace,
        target: EmbeddingSpace,
    },
}

impl AlignmentTransform {
    /// Maps a source-space vector into the target space.
    pub fn forward(&self, v: &[f64]) -> Vec<f64> {
        match self {
            AlignmentTransform::Orthogonal { w, dim } => row_times_matrix(v, w, *dim),
            _ => v.to_vec(),
        }
    }

    /// Maps a target-space vector back into the source space (`y · Wᵗ`).
    pub fn inverse(&self, v: &[f64]) -> Vec<f64> {
        match self {
            AlignmentTransform::Orthogonal { w, dim } => row_times_transpose(v, w, *dim),
            _ => v.to_vec(),
        }
    }

    /// The spaces retrieval should read: the evolved pair after retrofitting,
    /// otherwise the originals.
    pub fn spaces<'a>(
        &'a self,
        source: &'a EmbeddingSpace,
        target: &'a EmbeddingSpace,
    ) -> (&'a EmbeddingSpace, &'a EmbeddingSpace) {
        match self {
            AlignmentTransform::Retrofitted { source, target } => (source, target),
            _ => (source, target),
        }
    }

    /// `max |WᵗW − I|` for an orthogonal transform.
    pub fn orthogonality_error(&self) -> Option<f64> {
        match self {
            AlignmentTransform::Orthogonal { w, dim } => Some(orthogonality_error(w, *dim)),
            _ => None,
        }
    }
}

/// Diagnostics of one fit.
#[derive(Clone, Debug, Default, Serialize)]
pub struct AlignmentDiagnostics {
    pub method: String,
    pub pairs: usize,
    pub source_dim: usize,
    pub target_dim: usize,
    pub mean_similarity_before: f64,
    pub mean_similarity_after: f64,
    /// Mean seed cosine after each retrofitting iteration.
    pub iteration_similarity: Vec<f64>,
    pub orthogonality_error: Option<f64>,
    /// Set when a fit lowered mean seed similarity.
    pub degraded: bool,
}

impl AlignmentDiagnostics {
    pub fn improvement(&self) -> f64 {
        self.mean_similarity_after - self.mean_similarity_before
    }
}

#[derive(Clone, Debug)]
pub struct FittedAlignment {
    pub transform: AlignmentTransform,
    pub diagnostics: AlignmentDiagnostics,
}

/// Alignment strategy, selected from configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AlignmentSolver {
    Procrustes,
    Retrofit { iterations: usize, alpha: f64 },
    Identity,
}

impl AlignmentSolver {
    pub fn from_config(config: &MiningConfig) -> Self {
        match config.alignment_method {
            AlignmentMethod::Procrustes => AlignmentSolver::Procrustes,
            AlignmentMethod::Retrofit => AlignmentSolver::Retrofit {
                iterations: config.retrofit_iterations,
                alpha: config.retrofit_alpha,
            },
            AlignmentMethod::Identity => AlignmentSolver::Identity,
        }
    }

    pub fn fit(
        &self,
        paired: &PairedMatrix,
        source: &EmbeddingSpace,
        target: &EmbeddingSpace,
    ) -> Result<FittedAlignment> {
        match *self {
            AlignmentSolver::Procrustes => fit_procrustes(paired),
            AlignmentSolver::Retrofit { iterations, alpha } => {
                fit_retrofit(paired, source, target, iterations, alpha)
            }
            AlignmentSolver::Identity => {
                let mean = paired.mean_cosine();
                Ok(FittedAlignment {
                    transform: AlignmentTransform::Identity,
                    diagnostics: AlignmentDiagnostics {
                        method: "identity".to_string(),
                        pairs: paired.len(),
                        source_dim: paired.x_dim,
                        target_dim: paired.y_dim,
                        mean_similarity_before: mean,
                        mean_similarity_after: mean,
                        ..Default::default()
                    },
                })
            }
        }
    }
}

/// Fits the orthogonal Procrustes map `W = argmin ‖XW − Y‖_F, WᵗW = I`.
pub fn fit_procrustes(paired: &PairedMatrix) -> Result<FittedAlignment> {
    let n = paired.len();
    let d = paired.x_dim;
    info!("Fitting orthogonal Procrustes on {} pairs, dimension {}", n, d);

    if paired.x_dim != paired.y_dim {
        return Err(MiningError::DimensionMismatch {
            source_dim: paired.x_dim,
            target_dim: paired.y_dim,
        });
    }
    let degenerate = |reason: String| MiningError::NumericalDegeneracy {
        pairs: n,
        dim: d,
        reason,
    };
    if n < 1 {
        return Err(degenerate("no seed pairs to fit on".to_string()));
    }

    // Cross-covariance M = XᵗY (d×d), one output row per rayon task
    let m: Vec<f64> = (0..d)
        .into_par_iter()
        .flat_map_iter(|i| {
            let mut row = vec![0.0; d];
            for r in 0..n {
                let xi = paired.x_row(r)[i];
                if xi != 0.0 {
                    row.iter_mut()
                        .zip(paired.y_row(r))
                        .for_each(|(acc, &y)| *acc += xi * y);
                }
            }
            row
        })
        .collect();

    let scale = m.iter().fold(0.0f64, |a, &b| a.max(b.abs()));
    if !scale.is_finite() {
        return Err(degenerate("cross-covariance has non-finite entries".to_string()));
    }
    if scale <= f64::EPSILON {
        return Err(degenerate("cross-covariance XᵗY is numerically zero".to_string()));
    }
    trace!("Cross-covariance scale: {:.6e}", scale);

    let mat = DenseMatrix::from_iterator(m.into_iter(), d, d, 0);
    let svd = mat
        .svd()
        .map_err(|e| degenerate(format!("singular value decomposition failed: {}", e)))?;

    let s_max = svd.s.iter().fold(0.0f64, |a, &b| a.max(b));
    if !s_max.is_finite() || s_max <= 0.0 {
        return Err(degenerate(format!("largest singular value is {}", s_max)));
    }
    let rank = svd.s.iter().filter(|&&s| s > SINGULAR_TOL * s_max).count();
    debug!(
        "SVD of XᵗY: rank {} of {}, largest singular value {:.6}",
        rank, d, s_max
    );

    let (u_rows, u_cols) = svd.U.shape();
    let (v_rows, v_cols) = svd.V.shape();
    if u_rows != d || v_rows != d || u_cols < d || v_cols < d {
        return Err(degenerate(format!(
            "unexpected factor shapes U {}x{}, V {}x{}",
            u_rows, u_cols, v_rows, v_cols
        )));
    }

    let mut u = vec![0.0; d * d];
    let mut v = vec![0.0; d * d];
    for a in 0..d {
        for i in 0..d {
            u[a * d + i] = *svd.U.get((a, i));
            v[a * d + i] = *svd.V.get((a, i));
        }
    }

    for (i, &s) in svd.s.iter().enumerate().take(d) {
        if s > SINGULAR_TOL * s_max {
            continue;
        }
        let agreement: f64 = (0..d).map(|a| u[a * d + i] * v[a * d + i]).sum();
        if agreement < 0.0 {
            (0..d).for_each(|a| v[a * d + i] = -v[a * d + i]);
        }
    }

    // W = U Vᵗ
    let w: Vec<f64> = (0..d)
        .into_par_iter()
        .flat_map_iter(|a| {
            let u_row = &u[a * d..(a + 1) * d];
            (0..d)
                .map(|b| {
                    u_row
                        .iter()
                        .zip(&v[b * d..(b + 1) * d])
                        .map(|(x, y)| x * y)
                        .sum::<f64>()
                })
                .collect::<Vec<_>>()
        })
        .collect();

    if w.iter().any(|x| !x.is_finite()) {
        return Err(degenerate("alignment matrix has non-finite entries".to_string()));
    }
    let ortho = orthogonality_error(&w, d);
    if ortho > ORTHOGONALITY_TOL {
        return Err(degenerate(format!(
            "decomposition is not orthogonal: max |WᵗW − I| = {:.3e}",
            ortho
        )));
    }

    let before = paired.mean_cosine();
    let after = (0..n)
        .into_par_iter()
        .map(|r| cosine(&row_times_matrix(paired.x_row(r), &w, d), paired.y_row(r)))
        .sum::<f64>()
        / n as f64;

    let degraded = after + 1e-12 < before;
    if degraded {
        warn!(
            "Procrustes lowered mean seed similarity: {:.4} -> {:.4} (rank {} of {})",
            before, after, rank, d
        );
    }
    info!(
        "Procrustes complete: mean seed similarity {:.4} -> {:.4} ({:+.4}), orthogonality error {:.3e}",
        before,
        after,
        after - before,
        ortho
    );

    Ok(FittedAlignment {
        transform: AlignmentTransform::Orthogonal { w, dim: d },
        diagnostics: AlignmentDiagnostics {
            method: "procrustes".to_string(),
            pairs: n,
            source_dim: d,
            target_dim: d,
            mean_similarity_before: before,
            mean_similarity_after: after,
            iteration_similarity: Vec::new(),
            orthogonality_error: Some(ortho),
            degraded,
        },
    })
}

/// Retrofits both full spaces towards each other along the seed pairs.
///
/// Iterations are sequential. Within one iteration each pair first moves its
/// source row, `s ← (1−α)·s + α·t`, then its target row using the updated
/// source, `t ← (1−α)·t + α·s`; afterwards every row of both spaces is
/// renormalised to unit length.
pub fn fit_retrofit(
    paired: &PairedMatrix,
    source: &EmbeddingSpace,
    target: &EmbeddingSpace,
    iterations: usize,
    alpha: f64,
) -> Result<FittedAlignment> {
    let n = paired.len();
    info!(
        "Retrofitting {} ({}d) and {} ({}d): {} pairs, {} iterations, alpha {}",
        source.language(),
        source.dim(),
        target.language(),
        target.dim(),
        n,
        iterations,
        alpha
    );
    if n == 0 {
        return Err(MiningError::EmptySeedSet {
            total: 0,
            skipped: 0,
        });
    }
    if !(alpha > 0.0 && alpha <= 1.0) {
        return Err(MiningError::InvalidConfig(format!(
            "retrofit_alpha {} outside (0, 1]",
            alpha
        )));
    }

    let (ds, dt) = (source.dim(), target.dim());
    let mut src = source.as_slice().to_vec();
    let mut tgt = target.as_slice().to_vec();

    let seed_similarity = |src: &[f64], tgt: &[f64]| -> f64 {
        paired
            .source_rows
            .iter()
            .zip(&paired.target_rows)
            .map(|(&s, &t)| cosine(&src[s * ds..(s + 1) * ds], &tgt[t * dt..(t + 1) * dt]))
            .sum::<f64>()
            / n as f64
    };

    let before = seed_similarity(&src, &tgt);
    debug!("Initial mean seed similarity: {:.4}", before);

    let mut curve = Vec::with_capacity(iterations);
    for iteration in 0..iterations {
        let start = std::time::Instant::now();
        for (&s, &t) in paired.source_rows.iter().zip(&paired.target_rows) {
            mix_into(&mut src[s * ds..(s + 1) * ds], &tgt[t * dt..(t + 1) * dt], alpha);
            mix_into(&mut tgt[t * dt..(t + 1) * dt], &src[s * ds..(s + 1) * ds], alpha);
        }
        rayon::join(
            || normalise_par(&mut src, ds),
            || normalise_par(&mut tgt, dt),
        );

        let current = seed_similarity(&src, &tgt);
        trace!(
            "Iteration {}/{}: mean seed similarity {:.4} ({:.2?})",
            iteration + 1,
            iterations,
            current,
            start.elapsed()
        );
        curve.push(current);
    }

    let after = curve.last().copied().unwrap_or(before);
    info!(
        "Retrofitting complete: mean seed similarity {:.4} -> {:.4} ({:+.4})",
        before,
        after,
        after - before
    );

    Ok(FittedAlignment {
        transform: AlignmentTransform::Retrofitted {
            source: source.derive(src),
            target: target.derive(tgt),
        },
        diagnostics: AlignmentDiagnostics {
            method: "retrofit".to_string(),
            pairs: n,
            source_dim: ds,
            target_dim: dt,
            mean_similarity_before: before,
            mean_similarity_after: after,
            iteration_similarity: curve,
            orthogonality_error: None,
            degraded: after + 1e-12 < before,
        },
    })
}

/// `dst ← (1−α)·dst + α·other`, reading `other` as zero-padded to `dst.len()`.
#[inline]
fn mix_into(dst: &mut [f64], other: &[f64], alpha: f64) {
    for (i, d) in dst.iter_mut().enumerate() {
        let o = other.get(i).copied().unwrap_or(0.0);
        *d = (1.0 - alpha) * *d + alpha * o;
    }
}

fn normalise_par(data: &mut [f64], dim: usize) {
    data.par_chunks_mut(dim.max(1) * 256)
        .for_each(|block| normalise_rows(block, dim));
}

/// `max |WᵗW − I|` for a row-major `dim × dim` matrix.
pub fn orthogonality_error(w: &[f64], dim: usize) -> f64 {
    let mut worst = 0.0f64;
    for a in 0..dim {
        for b in a..dim {
            let g: f64 = (0..dim).map(|r| w[r * dim + a] * w[r * dim + b]).sum();
            let expected = if a == b { 1.0 } else { 0.0 };
            worst = worst.max((g - expected).abs());
        }
    }
    worst
}
