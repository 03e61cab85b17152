//! Error taxonomy for the mining pipeline.
//!
//! Vocabulary lookup misses are not errors: they are counted in the stats
//! object of the stage that met them (`SeedStats`, `RetrievalStats`) and only
//! escalate to `EmptySeedSet`/`EmptyQuerySet` once nothing usable is left.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MiningError {
    #[error("malformed seed entry at line {line}: {content:?}")]
    MalformedSeedEntry { line: usize, content: String },

    #[error("dimension mismatch: source space has {source_dim} dims, target space has {target_dim}")]
    DimensionMismatch { source_dim: usize, target_dim: usize },

    #[error("no usable seed pairs: {total} supplied, {skipped} skipped")]
    EmptySeedSet { total: usize, skipped: usize },

    #[error("no usable query terms: {total} supplied, {skipped} missing from the source vocabulary")]
    EmptyQuerySet { total: usize, skipped: usize },

    #[error("numerical degeneracy fitting alignment on {pairs} pairs of dimension {dim}: {reason}")]
    NumericalDegeneracy {
        pairs: usize,
        dim: usize,
        reason: String,
    },

    #[error(
        "similarity block {batch_size}x{target_rows} needs {bytes} bytes, limit is {limit}; reduce batch_size"
    )]
    ResourceExhaustion {
        batch_size: usize,
        target_rows: usize,
        bytes: usize,
        limit: usize,
    },

    #[error("invalid embedding space '{tag}': {reason}")]
    InvalidSpace { tag: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid candidate {source_term:?} -> {target_term:?}: {reason}")]
    InvalidCandidate {
        source_term: String,
        target_term: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, MiningError>;
