use approx::relative_eq;

use crate::operators::{
    cosine, dot, edit_distance, frequency_ratio, mean_paired_cosine, norm, normalise_rows,
    row_times_matrix, row_times_transpose, top_k_mean,
};

#[test]
fn test_cosine_basic_and_zero_vector() {
    assert!(relative_eq!(cosine(&[1.0, 0.0], &[2.0, 0.0]), 1.0));
    assert!(relative_eq!(cosine(&[1.0, 0.0], &[0.0, 3.0]), 0.0));
    assert!(relative_eq!(cosine(&[1.0, 1.0], &[-1.0, -1.0]), -1.0));
    assert_eq!(cosine(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
}

#[test]
fn test_dot_zero_pads_shorter_vector() {
    assert_eq!(dot(&[1.0, 2.0, 3.0], &[1.0, 1.0]), 3.0);
    assert!(relative_eq!(cosine(&[1.0, 0.0, 0.0], &[1.0, 0.0]), 1.0));
}

#[test]
fn test_normalise_rows_skips_zero_rows() {
    let mut m = vec![3.0, 4.0, 0.0, 0.0];
    normalise_rows(&mut m, 2);
    assert!(relative_eq!(norm(&m[0..2]), 1.0));
    assert_eq!(&m[2..4], &[0.0, 0.0]);
}

#[test]
fn test_row_times_matrix_and_transpose() {
    // 90° rotation in the plane
    let w = vec![0.0, 1.0, -1.0, 0.0];
    let v = row_times_matrix(&[1.0, 0.0], &w, 2);
    assert_eq!(v, vec![0.0, 1.0]);
    let back = row_times_transpose(&v, &w, 2);
    assert!(relative_eq!(back[0], 1.0));
    assert!(relative_eq!(back[1], 0.0));
}

#[test]
fn test_frequency_ratio_scenarios() {
    assert!(relative_eq!(frequency_ratio(10, 100).unwrap(), 0.1));
    assert!(relative_eq!(frequency_ratio(100, 10).unwrap(), 0.1));
    assert!(relative_eq!(frequency_ratio(50, 50).unwrap(), 1.0));
    assert_eq!(frequency_ratio(0, 50), None);
}

#[test]
fn test_edit_distance_unicode() {
    assert_eq!(edit_distance("kato", "kato"), 0);
    assert_eq!(edit_distance("kato", "gato"), 1);
    assert_eq!(edit_distance("ĉevalo", "cevalo"), 1);
}

#[test]
fn test_top_k_mean() {
    let s = vec![0.1, 0.9, 0.5, 0.7];
    assert!(relative_eq!(top_k_mean(&s, 2), 0.8));
    assert!(relative_eq!(top_k_mean(&s, 10), 0.55));
    assert_eq!(top_k_mean(&[], 3), 0.0);
    assert!(relative_eq!(top_k_mean(&[f64::NAN, 0.4], 2), 0.4));
}

#[test]
fn test_mean_paired_cosine() {
    let x = vec![1.0, 0.0, 0.0, 1.0];
    let y = vec![1.0, 0.0, 1.0, 0.0];
    assert!(relative_eq!(mean_paired_cosine(&x, 2, &y, 2), 0.5));
}
