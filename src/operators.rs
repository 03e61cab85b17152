//! Dense vector kernels shared by the solvers and scorers.
//!
//! - Matrices are row-major flattened `&[f64]` with an explicit row width
//! - Zero vectors have cosine 0.0 against everything
//! - Vectors of different length compare as if the shorter one were zero-padded

use std::cmp::Ordering;

/// Computes the Euclidean norm (L2) without allocating.
#[inline]
pub fn norm(a: &[f64]) -> f64 {
    a.iter().map(|&x| x * x).sum::<f64>().sqrt()
}

/// Dot product. A shorter slice behaves as if zero-padded.
#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine similarity, guarding against zero vectors.
#[inline]
pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let denom = norm(a) * norm(b);
    if denom > 0.0 {
        dot(a, b) / denom
    } else {
        0.0
    }
}

/// Scales `v` to unit length in place. Zero vectors are left untouched.
#[inline]
pub fn normalise_in_place(v: &mut [f64]) {
    let n = norm(v);
    if n > 0.0 {
        v.iter_mut().for_each(|x| *x /= n);
    }
}

/// Normalises every row of a row-major matrix of width `dim` in place.
pub fn normalise_rows(data: &mut [f64], dim: usize) {
    if dim == 0 {
        return;
    }
    data.chunks_exact_mut(dim).for_each(normalise_in_place);
}

/// Row vector times matrix: `v (1×n) · m (n×k)` where `m` is row-major n×k.
///
/// # Panics
///
/// Panics if `m.len() != v.len() * k`.
pub fn row_times_matrix(v: &[f64], m: &[f64], k: usize) -> Vec<f64> {
    assert_eq!(m.len(), v.len() * k, "Matrix shape does not match vector");
    let mut out = vec![0.0; k];
    for (i, &vi) in v.iter().enumerate() {
        if vi == 0.0 {
            continue;
        }
        let row = &m[i * k..(i + 1) * k];
        out.iter_mut().zip(row).for_each(|(o, &w)| *o += vi * w);
    }
    out
}

/// Row vector times the transpose of a square matrix: `v · mᵗ`.
pub fn row_times_transpose(v: &[f64], m: &[f64], k: usize) -> Vec<f64> {
    assert_eq!(m.len(), v.len() * k, "Matrix shape does not match vector");
    (0..v.len())
        .map(|i| dot(&m[i * k..(i + 1) * k], v))
        .collect()
}

/// Mean cosine over paired rows of two row-major matrices with `n` rows each.
pub fn mean_paired_cosine(x: &[f64], x_dim: usize, y: &[f64], y_dim: usize) -> f64 {
    let n = if x_dim == 0 { 0 } else { x.len() / x_dim };
    if n == 0 {
        return 0.0;
    }
    let total: f64 = x
        .chunks_exact(x_dim)
        .zip(y.chunks_exact(y_dim))
        .map(|(a, b)| cosine(a, b))
        .sum();
    total / n as f64
}

/// `min(a, b) / max(a, b)`, or `None` when either count is zero.
pub fn frequency_ratio(freq_s: u64, freq_t: u64) -> Option<f64> {
    if freq_s == 0 || freq_t == 0 {
        return None;
    }
    let (lo, hi) = if freq_s <= freq_t {
        (freq_s, freq_t)
    } else {
        (freq_t, freq_s)
    };
    Some(lo as f64 / hi as f64)
}

/// Levenshtein distance over Unicode scalar values.
#[inline]
pub fn edit_distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// Mean of the `k` largest finite values in `scores`; 0.0 for an empty slice.
pub fn top_k_mean(scores: &[f64], k: usize) -> f64 {
    let k = k.min(scores.len());
    if k == 0 {
        return 0.0;
    }
    let mut v: Vec<f64> = scores.iter().copied().filter(|s| s.is_finite()).collect();
    if v.is_empty() {
        return 0.0;
    }
    let k = k.min(v.len());
    v.select_nth_unstable_by(k - 1, |a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));
    v[..k].iter().sum::<f64>() / k as f64
}
