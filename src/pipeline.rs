//! The pipeline context: owns both spaces, the seed dictionary and the
//! configuration for one run, and drives the stages in order:
//!
//! Load → BuildSeedMatrices → FitAlignment → Retrieve → Validate → Classify → Evaluate
//!
//! There is no shared global state; two pipelines never see each other's
//! spaces or transforms. Every stage's stats are returned in `MiningOutput`
//! so skipped seeds and missing queries are always visible to the caller.

use std::collections::{BTreeMap, HashSet};

use log::{debug, info, trace};
use serde::Serialize;

use crate::alignment::{AlignmentDiagnostics, AlignmentSolver, FittedAlignment};
use crate::classify::{ConfidenceClassifier, TierSummary};
use crate::config::{AlignmentMethod, CslsMode, MiningConfig, SimilarityMetric};
use crate::core::{CandidateTranslation, EmbeddingSpace, SeedPair};
use crate::errors::{MiningError, Result};
use crate::evaluation::{EvaluationModule, EvaluationReport};
use crate::retrieval::{
    CandidateRetrievalEngine, CandidateSink, Direction, NullSink, RetrievalOutput, RetrievalParams,
    RetrievalStats,
};
use crate::scoring::SimilarityScorer;
use crate::seeds::{cognate_seed_pairs, PairedMatrix, SeedPairMatrixBuilder, SeedStats};
use crate::validation::{MutualNNValidator, ValidationStats};

/// Everything one run produces.
#[derive(Clone, Debug, Default, Serialize)]
pub struct MiningOutput {
    /// Source term → candidates, descending similarity, ties by target term.
    pub candidates: BTreeMap<String, Vec<CandidateTranslation>>,
    pub evaluation: EvaluationReport,
    pub seed_stats: SeedStats,
    pub retrieval_stats: RetrievalStats,
    pub validation_stats: ValidationStats,
    pub alignment: AlignmentDiagnostics,
    pub tiers: TierSummary,
}

impl MiningOutput {
    pub fn candidate_count(&self) -> usize {
        self.candidates.values().map(|v| v.len()).sum()
    }

    /// All candidates by descending confidence, then source and target term.
    pub fn by_confidence(&self) -> Vec<&CandidateTranslation> {
        let mut all: Vec<&CandidateTranslation> = self.candidates.values().flatten().collect();
        all.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.source_term.cmp(&b.source_term))
                .then_with(|| a.target_term.cmp(&b.target_term))
        });
        all
    }
}

pub struct MiningPipelineBuilder {
    seeds: Vec<SeedPair>,
    queries: Option<Vec<String>>,
    cognates: Option<(f64, usize)>,
    config: MiningConfig,
}

impl Default for MiningPipelineBuilder {
    fn default() -> Self {
        debug!("Creating MiningPipelineBuilder with default parameters");
        Self {
            seeds: Vec::new(),
            queries: None,
            cognates: None,
            config: MiningConfig::default(),
        }
    }
}

impl MiningPipelineBuilder {
    pub fn new() -> Self {
        info!("Initializing new MiningPipelineBuilder");
        Self::default()
    }

    /// Replaces the whole configuration; later `with_*` calls refine it.
    pub fn with_config(mut self, config: MiningConfig) -> Self {
        info!("Using supplied configuration");
        debug!("{:?}", config);
        self.config = config;
        self
    }

    pub fn with_seeds(mut self, seeds: Vec<SeedPair>) -> Self {
        info!("Setting seed dictionary: {} pairs", seeds.len());
        self.seeds = seeds;
        self
    }

    /// Terms to mine. Defaults to the whole source vocabulary.
    pub fn with_queries(mut self, queries: Vec<String>) -> Self {
        info!("Setting explicit query set: {} terms", queries.len());
        self.queries = Some(queries);
        self
    }

    /// Without a seed dictionary, seed from identical and near-identical terms.
    pub fn with_cognate_seeding(mut self, min_similarity: f64, max_pairs: usize) -> Self {
        info!(
            "Configuring cognate seeding: min similarity {}, max {} pairs",
            min_similarity, max_pairs
        );
        self.cognates = Some((min_similarity, max_pairs));
        self
    }

    pub fn with_alignment(mut self, method: AlignmentMethod) -> Self {
        info!("Setting alignment method: {:?}", method);
        self.config.alignment_method = method;
        self
    }

    pub fn with_retrofit(mut self, iterations: usize, alpha: f64) -> Self {
        info!("Configuring retrofitting: {} iterations, alpha {}", iterations, alpha);
        self.config.alignment_method = AlignmentMethod::Retrofit;
        self.config.retrofit_iterations = iterations;
        self.config.retrofit_alpha = alpha;
        self
    }

    pub fn with_similarity(mut self, metric: SimilarityMetric) -> Self {
        info!("Setting similarity metric: {:?}", metric);
        self.config.similarity_metric = metric;
        self
    }

    pub fn with_csls(mut self, k: usize, mode: CslsMode) -> Self {
        info!("Configuring CSLS: k={}, mode {:?}", k, mode);
        self.config.similarity_metric = SimilarityMetric::Csls;
        self.config.csls_k = k;
        self.config.csls_mode = mode;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        info!("Setting top_k: {}", top_k);
        self.config.top_k = top_k;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        info!("Setting similarity threshold: {}", threshold);
        self.config.similarity_threshold = threshold;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        info!("Setting batch size: {}", batch_size);
        self.config.batch_size = batch_size;
        self
    }

    pub fn with_tiers(mut self, high: f64, medium: f64, min_freq_ratio: f64) -> Self {
        info!(
            "Setting tier thresholds: high {}, medium {}, min freq ratio {}",
            high, medium, min_freq_ratio
        );
        self.config.high_threshold = high;
        self.config.medium_threshold = medium;
        self.config.min_freq_ratio = min_freq_ratio;
        self
    }

    pub fn with_mutual_nn(mut self, k: Option<usize>, bonus: f64) -> Self {
        info!("Configuring mutual-NN check: k={:?}, bonus {}", k, bonus);
        self.config.mutual_nn_k = k;
        self.config.mutual_bonus = bonus;
        self
    }

    pub fn with_min_seed_frequency(mut self, min: Option<u64>) -> Self {
        info!("Setting minimum seed frequency: {:?}", min);
        self.config.min_seed_frequency = min;
        self
    }

    pub fn with_exclude_seed_terms(mut self, exclude: bool) -> Self {
        info!("Exclude seed terms from queries: {}", exclude);
        self.config.exclude_seed_terms = exclude;
        self
    }

    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        info!("Setting retrieval workers: {:?}", workers);
        self.config.workers = workers;
        self
    }

    pub fn with_max_block_bytes(mut self, limit: Option<usize>) -> Self {
        info!("Setting similarity block limit: {:?} bytes", limit);
        self.config.max_block_bytes = limit;
        self
    }

    pub fn with_flush_every(mut self, batches: usize) -> Self {
        info!("Flushing partial results every {} batches", batches);
        self.config.flush_every = batches;
        self
    }

    /// Validates the configuration and takes ownership of both spaces.
    pub fn build(self, source: EmbeddingSpace, target: EmbeddingSpace) -> Result<MiningPipeline> {
        info!(
            "Building mining pipeline {} ({} terms, {}d) -> {} ({} terms, {}d)",
            source.language(),
            source.len(),
            source.dim(),
            target.language(),
            target.len(),
            target.dim()
        );
        self.config.validate()?;

        let seeds = match (self.seeds.is_empty(), self.cognates) {
            (true, Some((min_similarity, max_pairs))) => {
                cognate_seed_pairs(&source, &target, min_similarity, max_pairs)
            }
            _ => self.seeds,
        };
        debug!("Pipeline seeded with {} pairs", seeds.len());

        Ok(MiningPipeline {
            source,
            target,
            seeds,
            queries: self.queries,
            config: self.config,
        })
    }
}

/// One run's context.
pub struct MiningPipeline {
    source: EmbeddingSpace,
    target: EmbeddingSpace,
    seeds: Vec<SeedPair>,
    queries: Option<Vec<String>>,
    config: MiningConfig,
}

impl MiningPipeline {
    pub fn builder() -> MiningPipelineBuilder {
        MiningPipelineBuilder::new()
    }

    #[inline]
    pub fn source(&self) -> &EmbeddingSpace {
        &self.source
    }

    #[inline]
    pub fn target(&self) -> &EmbeddingSpace {
        &self.target
    }

    #[inline]
    pub fn seeds(&self) -> &[SeedPair] {
        &self.seeds
    }

    #[inline]
    pub fn config(&self) -> &MiningConfig {
        &self.config
    }

    /// Runs every stage to completion.
    pub fn run(&self) -> Result<MiningOutput> {
        self.run_with_sink(&mut NullSink, 0)
    }

    /// Runs every stage, flushing forward retrieval batches to `sink` and
    /// skipping retrieval batches before `resume_from`. Later stages see only
    /// the batches retrieved in this call.
    pub fn run_with_sink(
        &self,
        sink: &mut dyn CandidateSink,
        resume_from: usize,
    ) -> Result<MiningOutput> {
        info!("Starting mining run");

        let (paired, seed_stats) = self.build_seed_matrices();
        let fitted = self.fit_alignment(&paired, &seed_stats)?;

        let queries = self.query_terms();
        let retrieved = self.retrieve(&fitted, &queries, sink, resume_from)?;
        let retrieval_stats = retrieved.stats.clone();

        let mut flat = candidates_from(&retrieved)?;
        let scorer = SimilarityScorer::from_config(&self.config);
        let validation_stats = MutualNNValidator::new(self.config.mutual_k()).validate(
            &self.source,
            &self.target,
            &fitted.transform,
            scorer,
            &RetrievalParams::from_config(&self.config),
            &mut flat,
        )?;

        let tiers = ConfidenceClassifier::from_config(&self.config)?.classify_all(
            &mut flat,
            &self.source,
            &self.target,
        )?;

        let mut candidates: BTreeMap<String, Vec<CandidateTranslation>> = BTreeMap::new();
        for c in flat {
            candidates.entry(c.source_term.clone()).or_default().push(c);
        }

        let evaluation =
            EvaluationModule::evaluate(&self.seeds, &retrieved.processed, &candidates);

        let output = MiningOutput {
            candidates,
            evaluation,
            seed_stats,
            retrieval_stats,
            validation_stats,
            alignment: fitted.diagnostics,
            tiers,
        };
        info!(
            "Mining run complete: {} candidates for {} source terms",
            output.candidate_count(),
            output.candidates.len()
        );
        Ok(output)
    }

    pub fn build_seed_matrices(&self) -> (PairedMatrix, SeedStats) {
        SeedPairMatrixBuilder::new()
            .with_min_frequency(self.config.min_seed_frequency)
            .build(&self.seeds, &self.source, &self.target)
    }

    /// Fits the configured alignment. Procrustes and retrofitting need at
    /// least one usable seed pair; identity alignment does not.
    pub fn fit_alignment(&self, paired: &PairedMatrix, stats: &SeedStats) -> Result<FittedAlignment> {
        let solver = AlignmentSolver::from_config(&self.config);
        if paired.is_empty() && solver != AlignmentSolver::Identity {
            return Err(MiningError::EmptySeedSet {
                total: stats.total_pairs,
                skipped: stats.skipped,
            });
        }
        solver.fit(paired, &self.source, &self.target)
    }

    /// The explicit query set, or the whole source vocabulary, minus seed
    /// source terms when `exclude_seed_terms` is set.
    pub fn query_terms(&self) -> Vec<String> {
        let base = match &self.queries {
            Some(q) => q.clone(),
            None => self.source.vocabulary().to_vec(),
        };
        if !self.config.exclude_seed_terms {
            return base;
        }
        let seeded: HashSet<&str> = self.seeds.iter().map(|p| p.source.as_str()).collect();
        let kept: Vec<String> = base
            .into_iter()
            .filter(|q| !seeded.contains(q.as_str()))
            .collect();
        debug!("Query set after excluding seed terms: {} terms", kept.len());
        kept
    }

    pub fn retrieve(
        &self,
        fitted: &FittedAlignment,
        queries: &[String],
        sink: &mut dyn CandidateSink,
        resume_from: usize,
    ) -> Result<RetrievalOutput> {
        let engine = CandidateRetrievalEngine::new(
            &self.source,
            &self.target,
            &fitted.transform,
            Direction::Forward,
            SimilarityScorer::from_config(&self.config),
            RetrievalParams::from_config(&self.config),
        )?;
        engine.retrieve_with_sink(queries, sink, resume_from)
    }
}

/// Flattens retrieval hits into unclassified candidates, query order kept.
pub fn candidates_from(output: &RetrievalOutput) -> Result<Vec<CandidateTranslation>> {
    let mut out = Vec::with_capacity(output.stats.candidates);
    for r in &output.results {
        for h in &r.hits {
            out.push(CandidateTranslation::new(r.query.as_str(), h.term.as_str(), h.score)?);
        }
    }
    trace!("{} raw candidates", out.len());
    Ok(out)
}
