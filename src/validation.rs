//! Mutual nearest-neighbour validation.
//!
//! A forward candidate `(s, t)` is mutual when `s` is among the top-`k`
//! source terms retrieved for `t` in the reverse direction: `t`'s vector is
//! mapped back through the inverse alignment (`y · Wᵗ`, or read from the
//! evolved target space after retrofitting) and scored against the whole
//! source pool with the same scorer. The reverse pass applies no similarity
//! threshold, only the `k` cutoff.
//!
//! Every distinct target term is retrieved once, in batches, through the same
//! engine the forward pass uses; the validator then only annotates the
//! `mutual_nn` flag and leaves every other field alone.

use std::collections::{HashMap, HashSet};

use log::{debug, info};
use serde::Serialize;

use crate::alignment::AlignmentTransform;
use crate::core::{CandidateTranslation, EmbeddingSpace};
use crate::errors::Result;
use crate::retrieval::{CandidateRetrievalEngine, Direction, RetrievalParams};
use crate::scoring::SimilarityScorer;

/// Reverse top-k lists, keyed by target term.
#[derive(Clone, Debug, Default)]
pub struct ReverseNeighbours {
    lists: HashMap<String, Vec<String>>,
}

impl ReverseNeighbours {
    /// True when `source_term` is in `target_term`'s reverse list.
    pub fn contains(&self, target_term: &str, source_term: &str) -> bool {
        self.lists
            .get(target_term)
            .is_some_and(|l| l.iter().any(|s| s == source_term))
    }

    pub fn get(&self, target_term: &str) -> Option<&[String]> {
        self.lists.get(target_term).map(|l| l.as_slice())
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationStats {
    pub checked: usize,
    pub mutual: usize,
    pub distinct_targets: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MutualNNValidator {
    k: usize,
}

impl MutualNNValidator {
    /// `k` is the size of the reverse neighbour list checked for each target.
    pub fn new(k: usize) -> Self {
        Self { k: k.max(1) }
    }

    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Retrieves the reverse top-`k` lists of `target_terms`.
    ///
    /// `params` supplies batching, workers and memory limits; its threshold
    /// and `top_k` are replaced by "no threshold" and this validator's `k`.
    pub fn reverse_neighbours(
        &self,
        source: &EmbeddingSpace,
        target: &EmbeddingSpace,
        transform: &AlignmentTransform,
        scorer: SimilarityScorer,
        params: &RetrievalParams,
        target_terms: &[String],
    ) -> Result<ReverseNeighbours> {
        let mut seen = HashSet::new();
        let distinct: Vec<String> = target_terms
            .iter()
            .filter(|t| seen.insert(t.as_str()))
            .cloned()
            .collect();
        if distinct.is_empty() {
            debug!("No target terms to validate");
            return Ok(ReverseNeighbours::default());
        }

        info!(
            "Reverse retrieval for {} target terms (k={})",
            distinct.len(),
            self.k
        );
        let engine = CandidateRetrievalEngine::new(
            source,
            target,
            transform,
            Direction::Reverse,
            scorer,
            params.unthresholded(self.k),
        )?;
        let output = engine.retrieve(&distinct)?;

        let lists = output
            .results
            .into_iter()
            .map(|r| (r.query, r.hits.into_iter().map(|h| h.term).collect()))
            .collect();
        Ok(ReverseNeighbours { lists })
    }

    /// Whether `candidate` agrees in both directions.
    #[inline]
    pub fn is_mutual(&self, neighbours: &ReverseNeighbours, candidate: &CandidateTranslation) -> bool {
        neighbours.contains(&candidate.target_term, &candidate.source_term)
    }

    /// Sets `mutual_nn` on each candidate from precomputed reverse lists.
    pub fn annotate(
        &self,
        neighbours: &ReverseNeighbours,
        candidates: &mut [CandidateTranslation],
    ) -> ValidationStats {
        let mut stats = ValidationStats {
            distinct_targets: neighbours.len(),
            ..Default::default()
        };
        for c in candidates.iter_mut() {
            c.mutual_nn = self.is_mutual(neighbours, c);
            stats.checked += 1;
            stats.mutual += c.mutual_nn as usize;
        }
        stats
    }

    /// Reverse retrieval plus annotation in one call.
    pub fn validate(
        &self,
        source: &EmbeddingSpace,
        target: &EmbeddingSpace,
        transform: &AlignmentTransform,
        scorer: SimilarityScorer,
        params: &RetrievalParams,
        candidates: &mut [CandidateTranslation],
    ) -> Result<ValidationStats> {
        let targets: Vec<String> = candidates.iter().map(|c| c.target_term.clone()).collect();
        let neighbours =
            self.reverse_neighbours(source, target, transform, scorer, params, &targets)?;
        let stats = self.annotate(&neighbours, candidates);
        info!(
            "Mutual-NN validation: {} of {} candidates are mutual",
            stats.mutual, stats.checked
        );
        Ok(stats)
    }
}
