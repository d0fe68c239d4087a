//! Convergence detection over successive axiom sets.

use crate::types::Axiom;
use crate::vector;

/// Aggregate embedding of an axiom set: the unit-normalized mean of the
/// axiom embeddings, weighted by N-count.
pub fn aggregate_embedding(axioms: &[Axiom]) -> Option<Vec<f32>> {
    vector::weighted_mean(
        axioms
            .iter()
            .map(|a| (a.embedding.as_slice(), a.n_count as f32)),
    )
}

/// Result of observing one iteration's axiom set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Similarity to the previous iteration's aggregate; `None` on the first.
    pub similarity: Option<f32>,
    pub converged: bool,
}

/// Compares each iteration's aggregate embedding to the one before it.
#[derive(Debug)]
pub struct ConvergenceTracker {
    threshold: f32,
    previous: Option<Option<Vec<f32>>>,
}

impl ConvergenceTracker {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            previous: None,
        }
    }

    pub fn observe(&mut self, axioms: &[Axiom]) -> Observation {
        let current = aggregate_embedding(axioms);
        let similarity = self.previous.as_ref().map(|prev| match (prev, &current) {
            (Some(a), Some(b)) => vector::cosine_similarity(a, b),
            // Two empty sets in a row have not moved.
            (None, None) => 1.0,
            _ => 0.0,
        });
        self.previous = Some(current);
        Observation {
            similarity,
            converged: similarity.map(|s| s >= self.threshold).unwrap_or(false),
        }
    }
}
