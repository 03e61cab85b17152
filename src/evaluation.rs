//! Precision@k and mean reciprocal rank against the seed dictionary.
//!
//! Only seed pairs whose source term was actually queried are evaluated. The
//! rank of the expected target is 1-based; a target missing from the list
//! contributes reciprocal rank 0 and counts towards no Precision@k.

use std::collections::{BTreeMap, HashSet};

use log::{info, warn};
use serde::Serialize;

use crate::core::{CandidateTranslation, SeedPair};
use crate::retrieval::RetrievalOutput;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub precision_at_1: f64,
    pub precision_at_5: f64,
    pub precision_at_10: f64,
    pub mean_reciprocal_rank: f64,
    pub evaluated_pair_count: usize,
}

/// Ranked candidate lists that can be evaluated.
pub trait RankedLists {
    /// 1-based rank of `expected` in the list for `query`.
    fn rank_of(&self, query: &str, expected: &str) -> Option<usize>;
}

impl RankedLists for RetrievalOutput {
    fn rank_of(&self, query: &str, expected: &str) -> Option<usize> {
        self.get(query).and_then(|r| r.rank_of(expected))
    }
}

impl RankedLists for BTreeMap<String, Vec<CandidateTranslation>> {
    fn rank_of(&self, query: &str, expected: &str) -> Option<usize> {
        self.get(query)?
            .iter()
            .position(|c| c.target_term == expected)
            .map(|p| p + 1)
    }
}

pub struct EvaluationModule;

impl EvaluationModule {
    pub fn evaluate<L: RankedLists + ?Sized>(
        seeds: &[SeedPair],
        queried: &[String],
        lists: &L,
    ) -> EvaluationReport {
        let queried: HashSet<&str> = queried.iter().map(|q| q.as_str()).collect();
        let ranks: Vec<Option<usize>> = seeds
            .iter()
            .filter(|p| queried.contains(p.source.as_str()))
            .map(|p| lists.rank_of(&p.source, &p.target))
            .collect();

        let n = ranks.len();
        if n == 0 {
            warn!("Evaluation found no queried seed pairs; all metrics are zero");
            return EvaluationReport::default();
        }

        let at = |k: usize| ranks.iter().filter(|r| r.is_some_and(|r| r <= k)).count() as f64 / n as f64;
        let mrr = ranks
            .iter()
            .map(|r| r.map_or(0.0, |r| 1.0 / r as f64))
            .sum::<f64>()
            / n as f64;

        let report = EvaluationReport {
            precision_at_1: at(1),
            precision_at_5: at(5),
            precision_at_10: at(10),
            mean_reciprocal_rank: mrr,
            evaluated_pair_count: n,
        };
        info!(
            "Evaluation over {} pairs: P@1 {:.4}, P@5 {:.4}, P@10 {:.4}, MRR {:.4}",
            n,
            report.precision_at_1,
            report.precision_at_5,
            report.precision_at_10,
            report.mean_reciprocal_rank
        );
        report
    }
}
