use lexalign::core::{EmbeddingSpace, SeedPair};

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

/// Gaussian source space, a noisy random rotation of it as target, and
/// identity seeds for the first `n_seeds` terms.
#[allow(dead_code)]
pub fn synthetic_pair(
    n: usize,
    dim: usize,
    noise: f64,
    n_seeds: usize,
    seed: u64,
) -> (EmbeddingSpace, EmbeddingSpace, Vec<SeedPair>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let gauss = |rng: &mut ChaCha8Rng| -> f64 { StandardNormal.sample(rng) };

    let vocab: Vec<String> = (0..n).map(|i| format!("w{:05}", i)).collect();
    let src: Vec<f64> = (0..n * dim).map(|_| gauss(&mut rng)).collect();

    // Gram-Schmidt on Gaussian rows
    let mut w: Vec<Vec<f64>> = Vec::with_capacity(dim);
    while w.len() < dim {
        let mut v: Vec<f64> = (0..dim).map(|_| gauss(&mut rng)).collect();
        for r in &w {
            let p: f64 = v.iter().zip(r).map(|(a, b)| a * b).sum();
            v.iter_mut().zip(r).for_each(|(a, b)| *a -= p * b);
        }
        let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 1e-8 {
            v.iter_mut().for_each(|x| *x /= norm);
            w.push(v);
        }
    }

    let mut tgt = vec![0.0; n * dim];
    for (row, out) in src.chunks_exact(dim).zip(tgt.chunks_exact_mut(dim)) {
        for (i, &x) in row.iter().enumerate() {
            out.iter_mut().zip(&w[i]).for_each(|(o, &wij)| *o += x * wij);
        }
        out.iter_mut().for_each(|o| *o += noise * gauss(&mut rng));
    }

    let seeds = vocab
        .iter()
        .take(n_seeds)
        .map(|t| SeedPair::new(t.as_str(), t.as_str()))
        .collect();
    (
        EmbeddingSpace::from_flat("src", vocab.clone(), src, dim).unwrap(),
        EmbeddingSpace::from_flat("tgt", vocab, tgt, dim).unwrap(),
        seeds,
    )
}
