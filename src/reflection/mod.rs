//! The reflective loop.
//!
//! A run has two phases. Ingestion generalizes every signal once and feeds
//! the results to a fresh [`PrincipleStore`] once, in input order.
//! Refinement then recomputes the axiom set from the now-static store for up
//! to `max_iterations` rounds, tightening the recorded similarity threshold
//! each round and stopping once the axiom set's aggregate embedding stops
//! moving.
//!
//! Refinement only borrows the store immutably, so no iteration can
//! re-ingest a signal or change an N-count.

pub mod cascade;
pub mod convergence;

use std::sync::Arc;

use serde::Serialize;

use crate::compressor::{AxiomCompressor, Compression, PromotionRejection, PrunedAxiom};
use crate::config::SynthesisConfig;
use crate::error::SynthesisError;
use crate::generalizer::{GeneralizationCache, SignalGeneralizer};
use crate::principle_store::{IngestStats, PrincipleStore};
use crate::providers::{EmbeddingProvider, LlmProvider};
use crate::types::{Axiom, GeneralizationOutcome, Signal, SignalId, UsageMetrics, UsageTracker};

pub use cascade::{CascadeAttempt, CascadeReport};
pub use convergence::ConvergenceTracker;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Pipeline stage at which a signal was excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionStage {
    /// The embedding provider failed for this signal.
    Embedding,
    /// The store rejected the embedding (zero magnitude, wrong length).
    Ingestion,
}

/// A signal that did not reach the principle store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExcludedSignal {
    pub signal_id: SignalId,
    pub source_path: String,
    pub stage: ExclusionStage,
    pub reason: String,
}

impl ExcludedSignal {
    fn new(signal: &Signal, stage: ExclusionStage, reason: String) -> Self {
        Self {
            signal_id: signal.id().clone(),
            source_path: signal.source().path.clone(),
            stage,
            reason,
        }
    }
}

/// Outcome of the one-time ingestion phase.
#[derive(Debug, Default)]
pub struct Ingestion {
    pub store: PrincipleStore,
    pub excluded: Vec<ExcludedSignal>,
    /// Signals ingested with their original text after generalization failed.
    pub fallbacks: usize,
}

/// Diagnostics for one refinement iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationRecord {
    pub iteration: usize,
    /// Similarity threshold in effect for any ingestion after this iteration.
    pub threshold: f32,
    pub axiom_count: usize,
    /// Evidence floor the cascade settled on.
    pub cascade_floor: usize,
    pub similarity_to_previous: Option<f32>,
}

/// Everything a synthesis run produces.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisResult {
    pub axioms: Vec<Axiom>,
    pub converged: bool,
    pub iterations: usize,
    pub trajectory: Vec<IterationRecord>,
    pub cascade: CascadeReport,
    pub rejections: Vec<PromotionRejection>,
    pub pruned: Vec<PrunedAxiom>,
    pub excluded: Vec<ExcludedSignal>,
    pub ingestion: IngestStats,
    pub fallbacks: usize,
    pub principle_count: usize,
    /// Session-wide provider usage at the end of this run.
    pub usage: UsageMetrics,
}

/// Output of the refinement phase.
#[derive(Debug, Clone)]
pub struct Refinement {
    pub compression: Compression,
    pub cascade: CascadeReport,
    pub trajectory: Vec<IterationRecord>,
    pub converged: bool,
}

// ---------------------------------------------------------------------------
// ReflectiveLoop
// ---------------------------------------------------------------------------

/// Drives one synthesis run over borrowed session resources.
pub struct ReflectiveLoop<'a> {
    llm: &'a dyn LlmProvider,
    embedder: &'a dyn EmbeddingProvider,
    cache: &'a GeneralizationCache,
    config: &'a SynthesisConfig,
    usage: &'a UsageTracker,
}

impl<'a> ReflectiveLoop<'a> {
    pub fn new(
        llm: &'a dyn LlmProvider,
        embedder: &'a dyn EmbeddingProvider,
        cache: &'a GeneralizationCache,
        config: &'a SynthesisConfig,
        usage: &'a UsageTracker,
    ) -> Self {
        Self {
            llm,
            embedder,
            cache,
            config,
            usage,
        }
    }

    /// Ingest, then refine.
    ///
    /// # Errors
    ///
    /// Returns [`SynthesisError::ProviderUnavailable`] when signals were
    /// given but the embedding provider failed for every one of them.
    pub async fn run(&self, signals: &[Arc<Signal>]) -> Result<SynthesisResult, SynthesisError> {
        log::info!("Starting synthesis over {} signals", signals.len());
        let ingestion = self.ingest(signals).await?;
        let refinement = self.refine(&ingestion.store).await;

        let result = SynthesisResult {
            iterations: refinement.trajectory.len(),
            axioms: refinement.compression.axioms,
            converged: refinement.converged,
            trajectory: refinement.trajectory,
            cascade: refinement.cascade,
            rejections: refinement.compression.rejections,
            pruned: refinement.compression.pruned,
            excluded: ingestion.excluded,
            ingestion: ingestion.store.stats(),
            fallbacks: ingestion.fallbacks,
            principle_count: ingestion.store.len(),
            usage: self.usage.snapshot(),
        };
        log::info!(
            "Synthesis finished: {} axioms from {} principles, converged={} after {} iterations",
            result.axioms.len(),
            result.principle_count,
            result.converged,
            result.iterations
        );
        Ok(result)
    }

    /// One-time phase: generalize every signal, then ingest the results
    /// serially in input order at the starting threshold.
    pub async fn ingest(&self, signals: &[Arc<Signal>]) -> Result<Ingestion, SynthesisError> {
        let outcomes =
            SignalGeneralizer::new(self.llm, self.embedder, self.cache, self.config, self.usage)
                .generalize_batch(signals)
                .await;

        let threshold = self.config.similarity_threshold;
        let mut ingestion = Ingestion::default();
        for outcome in outcomes {
            let record = match outcome {
                GeneralizationOutcome::Failed { signal, reason, .. } => {
                    ingestion
                        .excluded
                        .push(ExcludedSignal::new(&signal, ExclusionStage::Embedding, reason));
                    continue;
                }
                GeneralizationOutcome::Fallback { record, .. } => {
                    ingestion.fallbacks += 1;
                    record
                }
                GeneralizationOutcome::Generalized(record) => record,
            };
            if let Err(e) = ingestion.store.ingest(&record, threshold) {
                ingestion.excluded.push(ExcludedSignal::new(
                    &record.signal,
                    ExclusionStage::Ingestion,
                    e.to_string(),
                ));
            }
        }

        let all_embeddings_failed = !signals.is_empty()
            && ingestion.store.signal_count() == 0
            && ingestion
                .excluded
                .iter()
                .all(|e| e.stage == ExclusionStage::Embedding);
        if all_embeddings_failed {
            return Err(SynthesisError::ProviderUnavailable(format!(
                "embedding provider '{}' failed for all {} signals",
                self.embedder.model(),
                signals.len()
            )));
        }

        if !ingestion.excluded.is_empty() {
            log::warn!("{} signals excluded from this run", ingestion.excluded.len());
        }
        log::info!(
            "Ingested {} signals into {} principles",
            ingestion.store.signal_count(),
            ingestion.store.len()
        );
        Ok(ingestion)
    }

    /// Refinement phase over a static store.
    pub async fn refine(&self, store: &PrincipleStore) -> Refinement {
        let compressor = AxiomCompressor::new(self.llm, self.embedder, self.config, self.usage);
        let mut tracker = ConvergenceTracker::new(self.config.convergence_threshold);
        let mut trajectory = Vec::new();
        let mut latest: Option<(Compression, CascadeReport)> = None;
        let mut converged = false;

        for iteration in 1..=self.config.max_iterations {
            let threshold = self.config.threshold_for_iteration(iteration);
            let (mut compression, report) =
                cascade::select_with_cascade(store.principles(), self.config);
            compression.axioms = compressor
                .render(compression.axioms, store.principles())
                .await;

            let observation = tracker.observe(&compression.axioms);
            log::debug!(
                "Iteration {}: threshold {:.3}, {} axioms at N>={}, similarity {:?}",
                iteration,
                threshold,
                compression.axioms.len(),
                report.selected_floor,
                observation.similarity
            );
            trajectory.push(IterationRecord {
                iteration,
                threshold,
                axiom_count: compression.axioms.len(),
                cascade_floor: report.selected_floor,
                similarity_to_previous: observation.similarity,
            });
            latest = Some((compression, report));

            if observation.converged {
                converged = true;
                log::info!("Axiom set converged after {} iterations", iteration);
                break;
            }
        }

        if !converged {
            log::info!(
                "Axiom set did not converge within {} iterations; returning final iteration",
                self.config.max_iterations
            );
        }

        let (compression, cascade) = latest.unwrap_or_default();
        Refinement {
            compression,
            cascade,
            trajectory,
            converged,
        }
    }
}
