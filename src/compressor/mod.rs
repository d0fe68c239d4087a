//! Axiom compression.
//!
//! Turns the principle set into axioms: gate each principle, build axioms
//! from the survivors, prune to the cognitive-load cap by N-count, then
//! render notation for the kept axioms with bounded concurrency.

pub mod gate;
pub mod notation;

use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::config::SynthesisConfig;
use crate::generalizer::prompt::clean_response;
use crate::generalizer::validation::validate_generalization;
use crate::providers::{call_with_retry, EmbeddingProvider, LlmProvider};
use crate::types::{Axiom, AxiomTier, NotationSource, Principle, PrincipleId, UsageTracker};
use crate::vector;

pub use gate::{PromotionRejection, RejectionReason};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// An eligible axiom removed by the cognitive-load cap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrunedAxiom {
    pub axiom_id: String,
    pub principle_id: PrincipleId,
    pub n_count: usize,
    pub tier: AxiomTier,
}

impl From<&Axiom> for PrunedAxiom {
    fn from(axiom: &Axiom) -> Self {
        Self {
            axiom_id: axiom.id.clone(),
            principle_id: axiom.principle_id(),
            n_count: axiom.n_count,
            tier: axiom.tier,
        }
    }
}

/// Output of one compression pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Compression {
    /// Kept axioms, strongest evidence first.
    pub axioms: Vec<Axiom>,
    pub rejections: Vec<PromotionRejection>,
    pub pruned: Vec<PrunedAxiom>,
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Gate, build and prune without any provider calls.
///
/// Each axiom is tiered by the strictest cascade level its N-count meets.
pub fn select(
    principles: &[Principle],
    min_n_count: usize,
    config: &SynthesisConfig,
) -> Compression {
    let (passed, rejections) = gate::partition(principles, min_n_count);
    let candidates: Vec<Axiom> = passed
        .into_iter()
        .filter_map(|p| Axiom::from_principle(p, config.tier_for(p.n_count())))
        .collect();
    let (axioms, pruned) = prune_to_cap(candidates, config.max_axioms);
    Compression {
        axioms,
        rejections,
        pruned,
    }
}

/// Keep at most `cap` axioms, dropping the lowest N-counts first.
///
/// Ordering uses the stored `n_count` on each axiom. The sort is stable, so
/// among equals the earlier-created principle is kept.
pub fn prune_to_cap(mut axioms: Vec<Axiom>, cap: usize) -> (Vec<Axiom>, Vec<PrunedAxiom>) {
    axioms.sort_by(|a, b| b.n_count.cmp(&a.n_count));
    if axioms.len() <= cap {
        return (axioms, Vec::new());
    }
    let removed = axioms.split_off(cap);
    log::info!(
        "Cognitive-load cap {} pruned {} axioms (N-counts {:?})",
        cap,
        removed.len(),
        removed.iter().map(|a| a.n_count).collect::<Vec<_>>()
    );
    let pruned = removed.iter().map(PrunedAxiom::from).collect();
    (axioms, pruned)
}

// ---------------------------------------------------------------------------
// AxiomCompressor
// ---------------------------------------------------------------------------

/// Compresses principles into rendered axioms.
pub struct AxiomCompressor<'a> {
    llm: &'a dyn LlmProvider,
    embedder: &'a dyn EmbeddingProvider,
    config: &'a SynthesisConfig,
    usage: &'a UsageTracker,
}

impl<'a> AxiomCompressor<'a> {
    pub fn new(
        llm: &'a dyn LlmProvider,
        embedder: &'a dyn EmbeddingProvider,
        config: &'a SynthesisConfig,
        usage: &'a UsageTracker,
    ) -> Self {
        Self {
            llm,
            embedder,
            config,
            usage,
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.llm_timeout_secs)
    }

    /// Select and render axioms at evidence floor `min_n_count`.
    pub async fn compress(&self, principles: &[Principle], min_n_count: usize) -> Compression {
        let mut compression = select(principles, min_n_count, self.config);
        compression.axioms = self.render(compression.axioms, principles).await;
        compression
    }

    /// Generate notation for each axiom concurrently, preserving order.
    pub async fn render(&self, axioms: Vec<Axiom>, principles: &[Principle]) -> Vec<Axiom> {
        stream::iter(axioms)
            .map(|axiom| self.render_one(axiom, principles))
            .buffered(self.config.notation_concurrency)
            .collect()
            .await
    }

    async fn render_one(&self, mut axiom: Axiom, principles: &[Principle]) -> Axiom {
        let prompt = {
            let mut evidence: Vec<&str> = principles
                .iter()
                .find(|p| p.id() == axiom.principle_id())
                .map(|p| p.contributors().iter().map(|c| c.text.as_str()).collect())
                .unwrap_or_default();
            if evidence.is_empty() {
                evidence.push(axiom.text.as_str());
            }
            notation::build_notation_prompt(&axiom, &evidence)
        };

        self.usage.record_llm_request();
        let raw = match call_with_retry(self.timeout(), self.config.provider_retries, || {
            self.llm.generate(&prompt)
        })
        .await
        {
            Ok(raw) => raw,
            Err(e) => {
                self.usage.record_failure();
                log::warn!(
                    "Notation generation failed for {}: {}; keeping evidence summary",
                    axiom.id,
                    e
                );
                return axiom;
            }
        };

        let text = clean_response(&raw);
        if let Err(violation) = validate_generalization(&text, self.config.max_generalized_length) {
            log::warn!(
                "Notation for {} rejected: {}; keeping evidence summary",
                axiom.id,
                violation
            );
            return axiom;
        }

        self.usage.record_embedding_request();
        match call_with_retry(self.timeout(), self.config.provider_retries, || {
            self.embedder.embed(&text)
        })
        .await
        {
            Ok(embedding) => match vector::normalize(&embedding) {
                Some(unit) => axiom.embedding = unit,
                None => log::warn!(
                    "Zero-magnitude notation embedding for {}; keeping centroid",
                    axiom.id
                ),
            },
            Err(e) => {
                self.usage.record_failure();
                log::warn!("Notation embedding failed for {}: {}; keeping centroid", axiom.id, e);
            }
        }

        axiom.text = text;
        axiom.notation = NotationSource::Generated;
        axiom
    }
}
