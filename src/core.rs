//! EmbeddingSpace, seed pairs and candidate records.
//!
//! This module holds the value objects every stage of the pipeline reads:
//!
//! - `EmbeddingSpace`: an ordered vocabulary plus a dense, row-major N×D
//!   matrix of f64, one row per term, with a derived term→row index and
//!   optional corpus frequencies. Immutable once built; the pipeline only ever
//!   reads rows or derives new spaces from it.
//! - `SeedPair`: a `(source_term, target_term)` correspondence.
//! - `CandidateTranslation`: one graded translation candidate, validated on
//!   construction.
//!
//! # Examples
//!
//! ```
//! use lexalign::core::EmbeddingSpace;
//!
//! let space = EmbeddingSpace::from_rows(
//!     "io",
//!     vec!["hundo".to_string(), "kato".to_string()],
//!     vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]],
//! )
//! .unwrap();
//!
//! assert_eq!(space.dim(), 3);
//! assert_eq!(space.index_of("kato"), Some(1));
//! assert_eq!(space.vector_of("hundo"), Some(&[1.0, 0.0, 0.0][..]));
//! ```
//!
//! # Performance
//!
//! - Row accessors return borrowed slices into the flattened matrix; no row is
//!   copied on lookup.
//! - `normalised` allocates one new matrix; retrieval calls it once per run,
//!   never per query.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{MiningError, Result};
use crate::operators::normalise_rows;

/// Vocabulary plus dense N×D matrix for one language.
#[derive(Clone, Debug)]
pub struct EmbeddingSpace {
    language: String,
    vocabulary: Vec<String>,
    data: Vec<f64>, // row-major: data[row * dim + col]
    dim: usize,
    term_to_index: HashMap<String, usize>,
    frequencies: Option<Vec<u64>>,
}

impl EmbeddingSpace {
    /// Builds a space from one row per vocabulary term.
    ///
    /// Fails with `InvalidSpace` if the vocabulary is empty or has duplicates,
    /// if row count and vocabulary length differ, if rows differ in width, or
    /// if any value is not finite.
    pub fn from_rows(
        language: impl Into<String>,
        vocabulary: Vec<String>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self> {
        let language = language.into();
        let dim = rows.first().map(|r| r.len()).unwrap_or(0);
        if let Some(bad) = rows.iter().position(|r| r.len() != dim) {
            return Err(MiningError::InvalidSpace {
                tag: language,
                reason: format!(
                    "row {} has {} values, expected {}",
                    bad,
                    rows[bad].len(),
                    dim
                ),
            });
        }
        let data: Vec<f64> = rows.into_iter().flatten().collect();
        Self::from_flat(language, vocabulary, data, dim)
    }

    /// Builds a space from an already flattened row-major matrix of width `dim`.
    pub fn from_flat(
        language: impl Into<String>,
        vocabulary: Vec<String>,
        data: Vec<f64>,
        dim: usize,
    ) -> Result<Self> {
        let language = language.into();
        let invalid = |reason: String| MiningError::InvalidSpace {
            tag: language.clone(),
            reason,
        };

        if vocabulary.is_empty() {
            return Err(invalid("vocabulary is empty".to_string()));
        }
        if dim == 0 {
            return Err(invalid("embedding dimension is zero".to_string()));
        }
        if data.len() != vocabulary.len() * dim {
            return Err(invalid(format!(
                "matrix holds {} values, expected {} rows x {} dims",
                data.len(),
                vocabulary.len(),
                dim
            )));
        }
        if let Some(pos) = data.iter().position(|x| !x.is_finite()) {
            return Err(invalid(format!(
                "non-finite value in row {} ('{}')",
                pos / dim,
                vocabulary[pos / dim]
            )));
        }

        let mut term_to_index = HashMap::with_capacity(vocabulary.len());
        for (i, term) in vocabulary.iter().enumerate() {
            if term_to_index.insert(term.clone(), i).is_some() {
                return Err(invalid(format!("duplicate term '{}'", term)));
            }
        }

        Ok(Self {
            language,
            vocabulary,
            data,
            dim,
            term_to_index,
            frequencies: None,
        })
    }

    /// Attaches per-term corpus frequencies, parallel to the vocabulary.
    pub fn with_frequencies(mut self, frequencies: Vec<u64>) -> Result<Self> {
        if frequencies.len() != self.vocabulary.len() {
            return Err(MiningError::InvalidSpace {
                tag: self.language,
                reason: format!(
                    "{} frequencies for {} terms",
                    frequencies.len(),
                    self.vocabulary.len()
                ),
            });
        }
        self.frequencies = Some(frequencies);
        Ok(self)
    }

    /// Same vocabulary and frequencies, new matrix. Used for derived spaces
    /// (retrofitted or normalised) that replace the original for retrieval.
    pub(crate) fn derive(&self, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), self.data.len());
        Self {
            language: self.language.clone(),
            vocabulary: self.vocabulary.clone(),
            data,
            dim: self.dim,
            term_to_index: self.term_to_index.clone(),
            frequencies: self.frequencies.clone(),
        }
    }

    /// Copy of this space with every row scaled to unit length.
    pub fn normalised(&self) -> Self {
        let mut data = self.data.clone();
        normalise_rows(&mut data, self.dim);
        self.derive(data)
    }

    #[inline]
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Number of terms (rows).
    #[inline]
    pub fn len(&self) -> usize {
        self.vocabulary.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vocabulary.is_empty()
    }

    /// Embedding dimensionality D.
    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    /// Term stored at `row`.
    ///
    /// # Panics
    ///
    /// Panics if `row >= len()`.
    #[inline]
    pub fn term(&self, row: usize) -> &str {
        &self.vocabulary[row]
    }

    #[inline]
    pub fn index_of(&self, term: &str) -> Option<usize> {
        self.term_to_index.get(term).copied()
    }

    #[inline]
    pub fn contains(&self, term: &str) -> bool {
        self.term_to_index.contains_key(term)
    }

    /// Zero-copy view of row `row`.
    ///
    /// # Panics
    ///
    /// Panics if `row >= len()`.
    #[inline]
    pub fn vector(&self, row: usize) -> &[f64] {
        assert!(row < self.len(), "Row index out of bounds");
        &self.data[row * self.dim..(row + 1) * self.dim]
    }

    #[inline]
    pub fn vector_of(&self, term: &str) -> Option<&[f64]> {
        self.index_of(term).map(|i| self.vector(i))
    }

    /// Corpus frequency of row `row`, if the space carries frequencies.
    #[inline]
    pub fn frequency(&self, row: usize) -> Option<u64> {
        self.frequencies.as_ref().map(|f| f[row])
    }

    #[inline]
    pub fn frequency_of(&self, term: &str) -> Option<u64> {
        self.index_of(term).and_then(|i| self.frequency(i))
    }

    #[inline]
    pub fn has_frequencies(&self) -> bool {
        self.frequencies.is_some()
    }

    /// The flattened row-major matrix.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Iterates rows as borrowed slices, in vocabulary order.
    #[inline]
    pub fn rows(&self) -> std::slice::ChunksExact<'_, f64> {
        self.data.chunks_exact(self.dim)
    }
}

/// A `(source_term, target_term)` correspondence from a seed dictionary.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeedPair {
    pub source: String,
    pub target: String,
}

impl SeedPair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl<S: Into<String>, T: Into<String>> From<(S, T)> for SeedPair {
    fn from((s, t): (S, T)) -> Self {
        SeedPair::new(s, t)
    }
}

/// Discretised quality bucket. Ordered `Low < Medium < High`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConfidenceTier::Low => "low",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::High => "high",
        };
        f.write_str(s)
    }
}

/// One graded translation candidate.
///
/// Built by `CandidateTranslation::new` from a retrieval hit; the validator
/// and classifier fill in the remaining signals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateTranslation {
    pub source_term: String,
    pub target_term: String,
    pub similarity: f64,
    pub mutual_nn: bool,
    pub frequency_ratio: Option<f64>,
    pub edit_distance: Option<usize>,
    pub confidence: f64,
    pub tier: ConfidenceTier,
}

impl CandidateTranslation {
    /// Creates a candidate not yet checked for mutual agreement nor classified.
    ///
    /// Fails with `InvalidCandidate` on empty terms or a non-finite similarity.
    pub fn new(
        source_term: impl Into<String>,
        target_term: impl Into<String>,
        similarity: f64,
    ) -> Result<Self> {
        let source_term = source_term.into();
        let target_term = target_term.into();
        let reason = if source_term.is_empty() || target_term.is_empty() {
            Some("empty term")
        } else if !similarity.is_finite() {
            Some("similarity is not finite")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(MiningError::InvalidCandidate {
                source_term,
                target_term,
                reason: reason.to_string(),
            });
        }
        Ok(Self {
            source_term,
            target_term,
            similarity,
            mutual_nn: false,
            frequency_ratio: None,
            edit_distance: None,
            confidence: similarity,
            tier: ConfidenceTier::Low,
        })
    }

    /// Sets the frequency ratio, rejecting values outside (0, 1].
    pub fn set_frequency_ratio(&mut self, ratio: Option<f64>) -> Result<()> {
        if let Some(r) = ratio {
            if !(r > 0.0 && r <= 1.0) {
                return Err(MiningError::InvalidCandidate {
                    source_term: self.source_term.clone(),
                    target_term: self.target_term.clone(),
                    reason: format!("frequency ratio {} outside (0, 1]", r),
                });
            }
        }
        self.frequency_ratio = ratio;
        Ok(())
    }
}
