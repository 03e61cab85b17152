//! Seed dictionary handling: parsing, cognate seeding and paired-matrix building.
//!
//! `SeedPairMatrixBuilder` turns raw `(source, target)` pairs into the two
//! row-aligned matrices the alignment solvers fit on. Pairs whose terms are
//! missing from a vocabulary (or too rare, when a frequency floor is set) are
//! dropped and counted, never raised; encounter order is preserved so row `i`
//! of X and row `i` of Y always come from the same pair.

use std::collections::HashSet;

use log::{debug, info, trace, warn};
use serde::Serialize;

use crate::core::{EmbeddingSpace, SeedPair};
use crate::errors::{MiningError, Result};
use crate::operators::mean_paired_cosine;

/// Counters emitted by `SeedPairMatrixBuilder::build`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SeedStats {
    pub total_pairs: usize,
    pub usable_pairs: usize,
    pub skipped: usize,
    pub missing_source: usize,
    pub missing_target: usize,
    pub below_frequency: usize,
}

/// Row-aligned seed matrices `X (n×D_src)` and `Y (n×D_tgt)`.
#[derive(Clone, Debug, Default)]
pub struct PairedMatrix {
    /// Usable pairs in encounter order; `pairs[i]` produced row `i`.
    pub pairs: Vec<SeedPair>,
    pub source_rows: Vec<usize>,
    pub target_rows: Vec<usize>,
    pub x: Vec<f64>,
    pub x_dim: usize,
    pub y: Vec<f64>,
    pub y_dim: usize,
}

impl PairedMatrix {
    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    #[inline]
    pub fn x_row(&self, i: usize) -> &[f64] {
        &self.x[i * self.x_dim..(i + 1) * self.x_dim]
    }

    #[inline]
    pub fn y_row(&self, i: usize) -> &[f64] {
        &self.y[i * self.y_dim..(i + 1) * self.y_dim]
    }

    /// Mean cosine between paired rows. Only meaningful when `x_dim == y_dim`.
    pub fn mean_cosine(&self) -> f64 {
        mean_paired_cosine(&self.x, self.x_dim, &self.y, self.y_dim)
    }
}

#[derive(Clone, Debug, Default)]
pub struct SeedPairMatrixBuilder {
    min_frequency: Option<u64>,
}

impl SeedPairMatrixBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop pairs where either term's corpus frequency is below `min`.
    /// Spaces without frequencies are not filtered on that side.
    pub fn with_min_frequency(mut self, min: Option<u64>) -> Self {
        self.min_frequency = min;
        self
    }

    /// Filters `pairs` against both vocabularies and stacks the survivors.
    pub fn build(
        &self,
        pairs: &[SeedPair],
        source: &EmbeddingSpace,
        target: &EmbeddingSpace,
    ) -> (PairedMatrix, SeedStats) {
        info!(
            "Building seed matrices from {} pairs ({} -> {})",
            pairs.len(),
            source.language(),
            target.language()
        );

        let mut stats = SeedStats {
            total_pairs: pairs.len(),
            ..Default::default()
        };
        let mut out = PairedMatrix {
            x_dim: source.dim(),
            y_dim: target.dim(),
            ..Default::default()
        };

        for pair in pairs {
            let (s, t) = match (source.index_of(&pair.source), target.index_of(&pair.target)) {
                (Some(s), Some(t)) => (s, t),
                (s, t) => {
                    if s.is_none() {
                        stats.missing_source += 1;
                    }
                    if t.is_none() {
                        stats.missing_target += 1;
                    }
                    stats.skipped += 1;
                    trace!("Skipping seed pair {:?}: term not in vocabulary", pair);
                    continue;
                }
            };

            if let Some(min) = self.min_frequency {
                let rare = |space: &EmbeddingSpace, row: usize| {
                    space.frequency(row).is_some_and(|f| f < min)
                };
                if rare(source, s) || rare(target, t) {
                    stats.below_frequency += 1;
                    stats.skipped += 1;
                    trace!("Skipping seed pair {:?}: below frequency {}", pair, min);
                    continue;
                }
            }

            out.x.extend_from_slice(source.vector(s));
            out.y.extend_from_slice(target.vector(t));
            out.source_rows.push(s);
            out.target_rows.push(t);
            out.pairs.push(pair.clone());
        }

        stats.usable_pairs = out.pairs.len();
        if stats.skipped > 0 {
            warn!(
                "Skipped {} of {} seed pairs (missing source: {}, missing target: {}, rare: {})",
                stats.skipped,
                stats.total_pairs,
                stats.missing_source,
                stats.missing_target,
                stats.below_frequency
            );
        }
        debug!(
            "Seed matrices: X {}x{}, Y {}x{}",
            out.len(),
            out.x_dim,
            out.len(),
            out.y_dim
        );
        (out, stats)
    }
}

/// Result of parsing seed dictionary text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedSeeds {
    pub pairs: Vec<SeedPair>,
    /// Non-empty, non-comment lines with fewer than two fields (lenient mode only).
    pub malformed_lines: usize,
}

/// Parses one pair per line, whitespace- or tab-delimited.
///
/// Blank lines and lines starting with `#` are ignored, extra fields after
/// the second are ignored, and both terms are lowercased. A line with a single
/// field fails with `MalformedSeedEntry` when `strict`, otherwise it is
/// counted in `malformed_lines`.
pub fn parse_seed_dictionary(text: &str, strict: bool) -> Result<ParsedSeeds> {
    let mut parsed = ParsedSeeds::default();
    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some(s), Some(t)) => parsed
                .pairs
                .push(SeedPair::new(s.to_lowercase(), t.to_lowercase())),
            _ if strict => {
                return Err(MiningError::MalformedSeedEntry {
                    line: i + 1,
                    content: raw.to_string(),
                })
            }
            _ => parsed.malformed_lines += 1,
        }
    }
    debug!(
        "Parsed {} seed pairs ({} malformed lines)",
        parsed.pairs.len(),
        parsed.malformed_lines
    );
    Ok(parsed)
}

/// Builds a seed dictionary from shared and near-identical terms.
///
/// Identical terms present in both vocabularies come first (source vocabulary
/// order). Remaining source terms are then matched greedily to the first
/// unused target term whose length differs by at most 2 characters and whose
/// normalised Levenshtein similarity is at least `min_similarity`. The result
/// is capped at `max_pairs`.
pub fn cognate_seed_pairs(
    source: &EmbeddingSpace,
    target: &EmbeddingSpace,
    min_similarity: f64,
    max_pairs: usize,
) -> Vec<SeedPair> {
    info!(
        "Seeding cognates: {} source terms, {} target terms, min similarity {}",
        source.len(),
        target.len(),
        min_similarity
    );

    let mut pairs: Vec<SeedPair> = source
        .vocabulary()
        .iter()
        .filter(|t| target.contains(t))
        .map(|t| SeedPair::new(t.as_str(), t.as_str()))
        .take(max_pairs)
        .collect();
    let exact = pairs.len();

    let shared: HashSet<String> = pairs.iter().map(|p| p.source.clone()).collect();
    let mut remaining_target: Vec<Option<&str>> = target
        .vocabulary()
        .iter()
        .map(|t| (!shared.contains(t.as_str())).then_some(t.as_str()))
        .collect();

    for src in source.vocabulary() {
        if pairs.len() >= max_pairs {
            break;
        }
        if shared.contains(src.as_str()) {
            continue;
        }
        let src_len = src.chars().count();
        let hit = remaining_target.iter_mut().find(|slot| {
            slot.is_some_and(|t| {
                src_len.abs_diff(t.chars().count()) <= 2
                    && strsim::normalized_levenshtein(src, t) >= min_similarity
            })
        });
        if let Some(slot) = hit {
            if let Some(t) = slot.take() {
                pairs.push(SeedPair::new(src.as_str(), t));
            }
        }
    }

    info!(
        "Cognate seeding found {} exact and {} near matches",
        exact,
        pairs.len() - exact
    );
    pairs
}
