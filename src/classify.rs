//! Confidence tiers.
//!
//! - high: `similarity ≥ high_threshold` and (mutual nearest neighbour or
//!   `frequency_ratio ≥ min_freq_ratio`)
//! - medium: `similarity ≥ medium_threshold`
//! - low: anything else that cleared retrieval
//!
//! The tier only ever rises with similarity when the other signals are held
//! fixed. Edit distance is recorded for downstream filtering but does not
//! move the tier.

use log::{debug, info};
use serde::Serialize;

use crate::config::MiningConfig;
use crate::core::{CandidateTranslation, ConfidenceTier, EmbeddingSpace};
use crate::errors::{MiningError, Result};
use crate::operators::{edit_distance, frequency_ratio};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfidenceClassifier {
    high_threshold: f64,
    medium_threshold: f64,
    min_freq_ratio: f64,
    mutual_bonus: f64,
}

/// Thresholds and bonus of `MiningConfig::default()`.
impl Default for ConfidenceClassifier {
    fn default() -> Self {
        let config = MiningConfig::default();
        Self {
            high_threshold: config.high_threshold,
            medium_threshold: config.medium_threshold,
            min_freq_ratio: config.min_freq_ratio,
            mutual_bonus: config.mutual_bonus,
        }
    }
}

impl ConfidenceClassifier {
    /// Fails with `InvalidConfig` if a threshold is not finite or
    /// `medium_threshold > high_threshold`.
    pub fn new(high_threshold: f64, medium_threshold: f64, min_freq_ratio: f64) -> Result<Self> {
        if !(high_threshold.is_finite() && medium_threshold.is_finite() && min_freq_ratio.is_finite())
        {
            return Err(MiningError::InvalidConfig(
                "classifier thresholds must be finite".to_string(),
            ));
        }
        if medium_threshold > high_threshold {
            return Err(MiningError::InvalidConfig(format!(
                "medium_threshold {} above high_threshold {}",
                medium_threshold, high_threshold
            )));
        }
        Ok(Self {
            high_threshold,
            medium_threshold,
            min_freq_ratio,
            ..Default::default()
        })
    }

    pub fn from_config(config: &MiningConfig) -> Result<Self> {
        Ok(Self::new(
            config.high_threshold,
            config.medium_threshold,
            config.min_freq_ratio,
        )?
        .with_mutual_bonus(config.mutual_bonus))
    }

    /// Added to the confidence score of mutual nearest neighbours.
    pub fn with_mutual_bonus(mut self, bonus: f64) -> Self {
        self.mutual_bonus = bonus;
        self
    }

    pub fn tier(&self, similarity: f64, mutual_nn: bool, frequency_ratio: Option<f64>) -> ConfidenceTier {
        let corroborated = mutual_nn || frequency_ratio.is_some_and(|r| r >= self.min_freq_ratio);
        if similarity >= self.high_threshold && corroborated {
            ConfidenceTier::High
        } else if similarity >= self.medium_threshold {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }

    #[inline]
    pub fn confidence(&self, similarity: f64, mutual_nn: bool) -> f64 {
        if mutual_nn {
            similarity + self.mutual_bonus
        } else {
            similarity
        }
    }

    /// Fills frequency ratio, edit distance, confidence and tier.
    ///
    /// The frequency ratio is only set when both spaces carry a non-zero
    /// frequency for the two terms.
    pub fn classify(
        &self,
        candidate: &mut CandidateTranslation,
        source: &EmbeddingSpace,
        target: &EmbeddingSpace,
    ) -> Result<()> {
        let ratio = match (
            source.frequency_of(&candidate.source_term),
            target.frequency_of(&candidate.target_term),
        ) {
            (Some(fs), Some(ft)) => frequency_ratio(fs, ft),
            _ => None,
        };
        candidate.set_frequency_ratio(ratio)?;
        candidate.edit_distance = Some(edit_distance(&candidate.source_term, &candidate.target_term));
        candidate.confidence = self.confidence(candidate.similarity, candidate.mutual_nn);
        candidate.tier = self.tier(candidate.similarity, candidate.mutual_nn, candidate.frequency_ratio);
        Ok(())
    }

    pub fn classify_all(
        &self,
        candidates: &mut [CandidateTranslation],
        source: &EmbeddingSpace,
        target: &EmbeddingSpace,
    ) -> Result<TierSummary> {
        debug!(
            "Classifying {} candidates (high {}, medium {}, min freq ratio {})",
            candidates.len(),
            self.high_threshold,
            self.medium_threshold,
            self.min_freq_ratio
        );
        let mut summary = TierSummary::default();
        for c in candidates.iter_mut() {
            self.classify(c, source, target)?;
            summary.add(c);
        }
        info!(
            "Tiers: {} high, {} medium, {} low ({} mutual)",
            summary.high, summary.medium, summary.low, summary.mutual
        );
        Ok(summary)
    }
}

/// Candidate counts per tier.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TierSummary {
    pub total: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub mutual: usize,
}

impl TierSummary {
    pub fn add(&mut self, candidate: &CandidateTranslation) {
        self.total += 1;
        match candidate.tier {
            ConfidenceTier::High => self.high += 1,
            ConfidenceTier::Medium => self.medium += 1,
            ConfidenceTier::Low => self.low += 1,
        }
        self.mutual += candidate.mutual_nn as usize;
    }
}
