//! Batched top-k candidate retrieval.
//!
//! `CandidateRetrievalEngine` answers many queries against a whole candidate
//! pool. Queries are processed `batch_size` rows at a time: each batch fills a
//! dense `batch_size × |pool|` score block, then every query row keeps the
//! candidates scoring at or above the threshold, sorted by score descending
//! with ties broken by ascending term, truncated to `top_k`. Queries with no
//! surviving candidate are left out of the output.
//!
//! Batches only read the shared pool and transform, so they run in parallel
//! on rayon (optionally a dedicated pool of `workers` threads) without
//! locking. Peak transient memory is one score block per running batch.
//!
//! Long runs can be flushed: every `flush_every` batches the finished results
//! are handed, in batch order, to a `CandidateSink`, and a run can resume from
//! any batch index reported by a previous flush.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use log::{debug, info, trace};
use rayon::prelude::*;
use serde::Serialize;

use crate::alignment::AlignmentTransform;
use crate::config::MiningConfig;
use crate::core::EmbeddingSpace;
use crate::errors::{MiningError, Result};
use crate::operators::{dot, normalise_in_place};
use crate::scoring::{candidate_neighbourhood_means, unit_rows, SimilarityScorer};

/// One retrieved candidate.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScoredTerm {
    pub term: String,
    /// Row of the term in the candidate pool.
    pub index: usize,
    pub score: f64,
}

/// Ranked candidates of one query.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryHits {
    pub query: String,
    pub hits: Vec<ScoredTerm>,
}

impl QueryHits {
    /// 1-based rank of `term`, if retrieved.
    pub fn rank_of(&self, term: &str) -> Option<usize> {
        self.hits.iter().position(|h| h.term == term).map(|p| p + 1)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RetrievalStats {
    pub queries: usize,
    pub duplicate_queries: usize,
    /// Lookup misses: queries absent from the query-side vocabulary.
    pub missing_queries: usize,
    pub answered: usize,
    pub without_candidates: usize,
    pub candidates: usize,
    pub batches: usize,
    /// Batches skipped because the run resumed past them.
    pub resumed_batches: usize,
}

#[derive(Clone, Debug, Default)]
pub struct RetrievalOutput {
    /// Answered queries, in query order.
    pub results: Vec<QueryHits>,
    /// Distinct in-vocabulary queries of the batches run in this call,
    /// answered or not, in query order.
    pub processed: Vec<String>,
    pub stats: RetrievalStats,
}

impl RetrievalOutput {
    pub fn get(&self, query: &str) -> Option<&QueryHits> {
        self.results.iter().find(|r| r.query == query)
    }

    /// Query → ranked candidates.
    pub fn to_map(&self) -> BTreeMap<String, Vec<ScoredTerm>> {
        self.results
            .iter()
            .map(|r| (r.query.clone(), r.hits.clone()))
            .collect()
    }
}

/// Finished batches handed out during a run.
#[derive(Debug)]
pub struct FlushEvent<'a> {
    pub first_batch: usize,
    /// Index to pass as `resume_from` to continue after this flush.
    pub next_batch: usize,
    pub total_batches: usize,
    pub results: &'a [QueryHits],
}

/// Receives partial results so long runs survive interruption.
pub trait CandidateSink {
    fn flush(&mut self, event: FlushEvent<'_>) -> Result<()>;
}

/// Discards every flush.
pub struct NullSink;

impl CandidateSink for NullSink {
    fn flush(&mut self, _event: FlushEvent<'_>) -> Result<()> {
        Ok(())
    }
}

impl<F> CandidateSink for F
where
    F: FnMut(FlushEvent<'_>) -> Result<()>,
{
    fn flush(&mut self, event: FlushEvent<'_>) -> Result<()> {
        self(event)
    }
}

/// Which way queries travel through the alignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Source queries, target pool, `x · W`.
    Forward,
    /// Target queries, source pool, `y · Wᵗ`.
    Reverse,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RetrievalParams {
    pub threshold: f64,
    pub top_k: usize,
    pub batch_size: usize,
    pub max_block_bytes: Option<usize>,
    pub workers: Option<usize>,
    pub flush_every: usize,
}

impl RetrievalParams {
    pub fn from_config(config: &MiningConfig) -> Self {
        Self {
            threshold: config.similarity_threshold,
            top_k: config.top_k,
            batch_size: config.batch_size,
            max_block_bytes: config.max_block_bytes,
            workers: config.workers,
            flush_every: config.flush_every,
        }
    }

    /// Same sizing, no threshold and a different `k`, for reverse checks.
    pub fn unthresholded(&self, top_k: usize) -> Self {
        Self {
            threshold: f64::NEG_INFINITY,
            top_k,
            ..self.clone()
        }
    }
}

pub struct CandidateRetrievalEngine<'a> {
    query_space: &'a EmbeddingSpace,
    pool_space: &'a EmbeddingSpace,
    transform: &'a AlignmentTransform,
    direction: Direction,
    scorer: SimilarityScorer,
    params: RetrievalParams,
    pool_unit: Vec<f64>,
    candidate_means: Option<Vec<f64>>,
    thread_pool: Option<rayon::ThreadPool>,
}

impl<'a> CandidateRetrievalEngine<'a> {
    /// Engine over the original (or retrofitted) `source`/`target` pair.
    ///
    /// Fails with `ResourceExhaustion` when one score block would exceed
    /// `max_block_bytes`, and with `InvalidConfig` for zero sizes.
    pub fn new(
        source: &'a EmbeddingSpace,
        target: &'a EmbeddingSpace,
        transform: &'a AlignmentTransform,
        direction: Direction,
        scorer: SimilarityScorer,
        params: RetrievalParams,
    ) -> Result<Self> {
        let (src, tgt) = transform.spaces(source, target);
        let (query_space, pool_space) = match direction {
            Direction::Forward => (src, tgt),
            Direction::Reverse => (tgt, src),
        };

        if params.top_k == 0 || params.batch_size == 0 || params.flush_every == 0 {
            return Err(MiningError::InvalidConfig(format!(
                "top_k ({}), batch_size ({}) and flush_every ({}) must be positive",
                params.top_k, params.batch_size, params.flush_every
            )));
        }

        let block_bytes = params
            .batch_size
            .saturating_mul(pool_space.len())
            .saturating_mul(std::mem::size_of::<f64>());
        if let Some(limit) = params.max_block_bytes {
            if block_bytes > limit {
                return Err(MiningError::ResourceExhaustion {
                    batch_size: params.batch_size,
                    target_rows: pool_space.len(),
                    bytes: block_bytes,
                    limit,
                });
            }
        }

        let thread_pool = match params.workers {
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| MiningError::InvalidConfig(format!("worker pool: {}", e)))?,
            ),
            None => None,
        };

        info!(
            "Retrieval engine {:?}: {} queries-side terms ({}d) against {} candidates ({}d), scorer {:?}",
            direction,
            query_space.len(),
            query_space.dim(),
            pool_space.len(),
            pool_space.dim(),
            scorer
        );
        debug!(
            "Retrieval params: threshold={}, top_k={}, batch_size={}, block={} bytes, workers={:?}",
            params.threshold, params.top_k, params.batch_size, block_bytes, params.workers
        );

        let mut engine = Self {
            query_space,
            pool_space,
            transform,
            direction,
            scorer,
            params,
            pool_unit: unit_rows(pool_space.as_slice(), pool_space.dim()),
            candidate_means: None,
            thread_pool,
        };

        if let SimilarityScorer::Csls { k, .. } = scorer {
            if scorer.needs_candidate_means() {
                let means = engine.install(|| {
                    let mapped: Vec<f64> = (0..query_space.len())
                        .into_par_iter()
                        .flat_map_iter(|row| engine.mapped_query(row))
                        .collect();
                    candidate_neighbourhood_means(
                        &engine.pool_unit,
                        pool_space.dim(),
                        &mapped,
                        engine.mapped_dim(),
                        k,
                        engine.params.batch_size,
                    )
                });
                engine.candidate_means = Some(means);
            }
        }

        Ok(engine)
    }

    #[inline]
    pub fn query_space(&self) -> &EmbeddingSpace {
        self.query_space
    }

    #[inline]
    pub fn pool_space(&self) -> &EmbeddingSpace {
        self.pool_space
    }

    #[inline]
    pub fn params(&self) -> &RetrievalParams {
        &self.params
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.thread_pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    fn mapped_dim(&self) -> usize {
        match self.transform {
            AlignmentTransform::Orthogonal { dim, .. } => *dim,
            _ => self.query_space.dim(),
        }
    }

    /// Query row mapped through the alignment and scaled to unit length.
    fn mapped_query(&self, row: usize) -> Vec<f64> {
        let v = self.query_space.vector(row);
        let mut mapped = match self.direction {
            Direction::Forward => self.transform.forward(v),
            Direction::Reverse => self.transform.inverse(v),
        };
        normalise_in_place(&mut mapped);
        mapped
    }

    /// Runs every query to completion without partial flushing.
    pub fn retrieve(&self, queries: &[String]) -> Result<RetrievalOutput> {
        self.retrieve_with_sink(queries, &mut NullSink, 0)
    }

    /// Runs the queries, flushing finished batches to `sink` every
    /// `flush_every` batches and skipping batches before `resume_from`.
    ///
    /// Fails with `EmptyQuerySet` when no query is in the query-side vocabulary.
    pub fn retrieve_with_sink(
        &self,
        queries: &[String],
        sink: &mut dyn CandidateSink,
        resume_from: usize,
    ) -> Result<RetrievalOutput> {
        let mut stats = RetrievalStats {
            queries: queries.len(),
            ..Default::default()
        };

        let mut seen = HashSet::with_capacity(queries.len());
        let mut rows: Vec<(usize, &str)> = Vec::with_capacity(queries.len());
        for q in queries {
            if !seen.insert(q.as_str()) {
                stats.duplicate_queries += 1;
                continue;
            }
            match self.query_space.index_of(q) {
                Some(row) => rows.push((row, q.as_str())),
                None => stats.missing_queries += 1,
            }
        }
        if rows.is_empty() {
            return Err(MiningError::EmptyQuerySet {
                total: queries.len(),
                skipped: stats.missing_queries,
            });
        }
        if stats.missing_queries > 0 {
            debug!(
                "{} of {} queries missing from the '{}' vocabulary",
                stats.missing_queries,
                queries.len(),
                self.query_space.language()
            );
        }

        let batches: Vec<&[(usize, &str)]> = rows.chunks(self.params.batch_size).collect();
        let total_batches = batches.len();
        stats.batches = total_batches;
        stats.resumed_batches = resume_from.min(total_batches);
        info!(
            "Retrieving {} queries in {} batches of {} (resuming at batch {})",
            rows.len(),
            total_batches,
            self.params.batch_size,
            stats.resumed_batches
        );

        let mut results = Vec::new();
        let mut first = stats.resumed_batches;
        while first < total_batches {
            let end = (first + self.params.flush_every).min(total_batches);
            let group: Vec<Vec<QueryHits>> = self.install(|| {
                batches[first..end]
                    .par_iter()
                    .enumerate()
                    .map(|(offset, batch)| self.run_batch(first + offset, batch))
                    .collect()
            });
            let start = results.len();
            results.extend(group.into_iter().flatten());
            sink.flush(FlushEvent {
                first_batch: first,
                next_batch: end,
                total_batches,
                results: &results[start..],
            })?;
            first = end;
        }

        stats.answered = results.len();
        stats.candidates = results.iter().map(|r| r.hits.len()).sum();
        let processed: Vec<String> = batches[stats.resumed_batches..]
            .iter()
            .flat_map(|b| b.iter().map(|&(_, q)| q.to_string()))
            .collect();
        stats.without_candidates = processed.len() - stats.answered;

        info!(
            "Retrieval complete: {} queries answered, {} candidates, {} without candidates",
            stats.answered, stats.candidates, stats.without_candidates
        );
        Ok(RetrievalOutput {
            results,
            processed,
            stats,
        })
    }

    fn run_batch(&self, batch_index: usize, batch: &[(usize, &str)]) -> Vec<QueryHits> {
        let n_pool = self.pool_space.len();
        let pool_dim = self.pool_space.dim();
        let means = self.candidate_means.as_deref();

        // Dense score block for the whole batch
        let mut block = vec![0.0; batch.len() * n_pool];
        for (scores, &(row, _)) in block.chunks_exact_mut(n_pool).zip(batch) {
            let q = self.mapped_query(row);
            scores
                .iter_mut()
                .zip(self.pool_unit.chunks_exact(pool_dim))
                .for_each(|(s, c)| *s = dot(&q, c));
            self.scorer.rescale(scores, means);
        }

        let out: Vec<QueryHits> = block
            .chunks_exact(n_pool)
            .zip(batch)
            .filter_map(|(scores, &(_, query))| {
                let hits = self.select(scores);
                (!hits.is_empty()).then(|| QueryHits {
                    query: query.to_string(),
                    hits,
                })
            })
            .collect();

        trace!(
            "Batch {}: {} queries, {} answered",
            batch_index,
            batch.len(),
            out.len()
        );
        out
    }

    /// Threshold, order by (score desc, term asc), truncate to `top_k`.
    fn select(&self, scores: &[f64]) -> Vec<ScoredTerm> {
        let mut keep: Vec<(usize, f64)> = scores
            .iter()
            .enumerate()
            .filter(|(_, &s)| s >= self.params.threshold)
            .map(|(i, &s)| (i, s))
            .collect();

        let cmp = |a: &(usize, f64), b: &(usize, f64)| -> Ordering {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| self.pool_space.term(a.0).cmp(self.pool_space.term(b.0)))
        };
        let k = self.params.top_k;
        if keep.len() > k {
            keep.select_nth_unstable_by(k - 1, cmp);
            keep.truncate(k);
        }
        keep.sort_unstable_by(cmp);

        keep.into_iter()
            .map(|(i, score)| ScoredTerm {
                term: self.pool_space.term(i).to_string(),
                index: i,
                score,
            })
            .collect()
    }
}
