//! The principle store: greedy online clustering of generalized signals.
//!
//! Each ingested signal either reinforces its most similar principle (when
//! the similarity meets the caller's threshold) or seeds a new one. Matching
//! is a linear scan over centroids, which is fine for tens to low hundreds of
//! principles; a store with thousands of principles would want an ANN index.
//!
//! Clustering is order-dependent: the same signals ingested in a different
//! order can produce different principles. Callers ingest in input order.
//!
//! Each signal id is ingested at most once per store. A repeat is a no-op
//! reported as [`IngestOutcome::Duplicate`], which keeps a signal from
//! matching the principle it seeded and inflating its N-count.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::StoreError;
use crate::types::{GeneralizedSignal, Principle, PrincipleId, SignalId};
use crate::vector;

/// What happened to one ingested signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// The signal seeded a new principle.
    Created { principle_id: PrincipleId },
    /// The signal reinforced an existing principle.
    Reinforced {
        principle_id: PrincipleId,
        similarity: f32,
    },
    /// The signal id was already ingested; nothing changed.
    Duplicate { principle_id: PrincipleId },
}

/// Running counters over a store's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub created: usize,
    pub reinforced: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

/// Holds the evolving principle set for one synthesis run.
///
/// Mutation requires `&mut self`, so there is exactly one writer at a time.
#[derive(Debug, Default)]
pub struct PrincipleStore {
    principles: Vec<Principle>,
    ingested: HashMap<SignalId, PrincipleId>,
    dimension: Option<usize>,
    next_id: u64,
    stats: IngestStats,
}

impl PrincipleStore {
    /// An empty store. The embedding length is fixed by the first ingest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one generalized signal at `threshold`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] for an embedding that is empty, non-finite,
    /// zero-magnitude, or of a different length than earlier embeddings. The
    /// store is unchanged in that case.
    pub fn ingest(
        &mut self,
        signal: &GeneralizedSignal,
        threshold: f32,
    ) -> Result<IngestOutcome, StoreError> {
        let signal_id = signal.id();
        if let Some(&principle_id) = self.ingested.get(signal_id) {
            log::warn!(
                "Duplicate ingestion of signal {} ignored (already in {})",
                signal_id,
                principle_id
            );
            self.stats.duplicates += 1;
            return Ok(IngestOutcome::Duplicate { principle_id });
        }

        let embedding = match self.checked_embedding(signal) {
            Ok(e) => e,
            Err(e) => {
                log::warn!("Rejected signal {} at ingestion: {}", signal_id, e);
                self.stats.rejected += 1;
                return Err(e);
            }
        };

        let outcome = match self.best_match(&embedding) {
            Some((index, similarity)) if similarity >= threshold => {
                let principle = &mut self.principles[index];
                let old_weight = principle.n_count() as f32;
                let centroid =
                    vector::weighted_blend(principle.centroid(), old_weight, &embedding, 1.0)
                        .unwrap_or_else(|| principle.centroid().to_vec());
                principle.reinforce(signal, similarity, centroid);
                self.stats.reinforced += 1;
                log::debug!(
                    "Signal {} reinforced {} (similarity {:.3}, N={})",
                    signal_id,
                    principle.id(),
                    similarity,
                    principle.n_count()
                );
                IngestOutcome::Reinforced {
                    principle_id: principle.id(),
                    similarity,
                }
            }
            _ => {
                let principle_id = PrincipleId(self.next_id);
                self.next_id += 1;
                self.principles
                    .push(Principle::seed(principle_id, signal, embedding));
                self.stats.created += 1;
                log::debug!("Signal {} seeded {}", signal_id, principle_id);
                IngestOutcome::Created { principle_id }
            }
        };

        let principle_id = match outcome {
            IngestOutcome::Created { principle_id }
            | IngestOutcome::Reinforced { principle_id, .. }
            | IngestOutcome::Duplicate { principle_id } => principle_id,
        };
        self.ingested.insert(signal_id.clone(), principle_id);
        Ok(outcome)
    }

    /// Validate and normalize a signal's embedding.
    fn checked_embedding(&mut self, signal: &GeneralizedSignal) -> Result<Vec<f32>, StoreError> {
        let signal_id = signal.id().to_string();
        let raw = &signal.embedding;
        if raw.is_empty() {
            return Err(StoreError::EmptyEmbedding { signal_id });
        }
        if raw.iter().any(|x| !x.is_finite()) {
            return Err(StoreError::NonFinite { signal_id });
        }
        if let Some(expected) = self.dimension {
            if raw.len() != expected {
                return Err(StoreError::DimensionMismatch {
                    signal_id,
                    expected,
                    actual: raw.len(),
                });
            }
        }
        let normalized =
            vector::normalize(raw).ok_or(StoreError::ZeroMagnitude { signal_id })?;
        self.dimension.get_or_insert(raw.len());
        Ok(normalized)
    }

    /// Index and similarity of the closest principle, if any exist.
    pub fn best_match(&self, embedding: &[f32]) -> Option<(usize, f32)> {
        self.principles
            .iter()
            .enumerate()
            .map(|(i, p)| (i, vector::cosine_similarity(p.centroid(), embedding)))
            .fold(None, |best: Option<(usize, f32)>, (i, sim)| match best {
                Some((_, best_sim)) if best_sim >= sim => best,
                _ => Some((i, sim)),
            })
    }

    /// Current principles in creation order.
    pub fn principles(&self) -> &[Principle] {
        &self.principles
    }

    /// Look up a principle by id.
    pub fn get(&self, id: PrincipleId) -> Option<&Principle> {
        self.principles.iter().find(|p| p.id() == id)
    }

    /// Principle a signal was assigned to, if it has been ingested.
    pub fn assignment(&self, signal_id: &SignalId) -> Option<PrincipleId> {
        self.ingested.get(signal_id).copied()
    }

    /// Whether a signal id has already been ingested.
    pub fn contains_signal(&self, signal_id: &SignalId) -> bool {
        self.ingested.contains_key(signal_id)
    }

    /// Number of principles.
    pub fn len(&self) -> usize {
        self.principles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.principles.is_empty()
    }

    /// Number of distinct signals ingested.
    pub fn signal_count(&self) -> usize {
        self.ingested.len()
    }

    /// Counters since the store was created.
    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// N-counts keyed by principle, for checking that refinement leaves the
    /// store untouched.
    pub fn n_count_snapshot(&self) -> Vec<(PrincipleId, usize)> {
        self.principles.iter().map(|p| (p.id(), p.n_count())).collect()
    }
}
