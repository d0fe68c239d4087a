//! Principles: running cluster representatives over generalized signals.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::generalized::GeneralizedSignal;
use super::signal::{Dimension, Provenance, SignalId, Stance};

/// Identifier of a principle within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipleId(pub u64);

impl fmt::Display for PrincipleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pr-{:04}", self.0)
    }
}

/// Reference to a signal that reinforced a principle.
///
/// Carries just enough of the signal to evaluate the promotion gate and to
/// trace an axiom back to its source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributorRef {
    pub signal_id: SignalId,
    pub source_path: String,
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stance: Option<Stance>,
    /// Generalized text of the signal.
    pub text: String,
    /// Similarity to the centroid at the moment of ingestion (1.0 for the seed).
    pub similarity: f32,
}

impl ContributorRef {
    pub fn from_generalized(signal: &GeneralizedSignal, similarity: f32) -> Self {
        Self {
            signal_id: signal.id().clone(),
            source_path: signal.signal.source().path.clone(),
            provenance: signal.signal.provenance(),
            stance: signal.signal.stance(),
            text: signal.text.clone(),
            similarity,
        }
    }

    pub fn is_external_or_questioning(&self) -> bool {
        self.provenance == Provenance::External
            || self.stance.map(|s| s.is_questioning()).unwrap_or(false)
    }
}

/// A cluster of semantically similar signals.
///
/// Only the principle store mutates a principle; everything else sees it
/// through the read accessors.
#[derive(Debug, Clone, Serialize)]
pub struct Principle {
    id: PrincipleId,
    centroid: Vec<f32>,
    n_count: usize,
    contributors: Vec<ContributorRef>,
    dimension: Option<Dimension>,
}

impl Principle {
    /// Seed a principle from one signal whose embedding is already unit length.
    pub(crate) fn seed(id: PrincipleId, signal: &GeneralizedSignal, centroid: Vec<f32>) -> Self {
        Self {
            id,
            centroid,
            n_count: 1,
            contributors: vec![ContributorRef::from_generalized(signal, 1.0)],
            dimension: signal.signal.dimension(),
        }
    }

    /// Record a reinforcing signal with its already-blended centroid.
    pub(crate) fn reinforce(
        &mut self,
        signal: &GeneralizedSignal,
        similarity: f32,
        centroid: Vec<f32>,
    ) {
        self.centroid = centroid;
        self.n_count += 1;
        self.contributors
            .push(ContributorRef::from_generalized(signal, similarity));
        if self.dimension.is_none() {
            self.dimension = signal.signal.dimension();
        }
    }

    pub fn id(&self) -> PrincipleId {
        self.id
    }

    pub fn centroid(&self) -> &[f32] {
        &self.centroid
    }

    /// Number of distinct signals supporting this principle.
    pub fn n_count(&self) -> usize {
        self.n_count
    }

    pub fn contributors(&self) -> &[ContributorRef] {
        &self.contributors
    }

    pub fn dimension(&self) -> Option<Dimension> {
        self.dimension
    }

    /// Text of the seeding signal, used as the principle's label.
    pub fn seed_text(&self) -> &str {
        self.contributors
            .first()
            .map(|c| c.text.as_str())
            .unwrap_or_default()
    }

    /// Whether at least one contributor is external or questioning.
    pub fn has_diverse_provenance(&self) -> bool {
        self.contributors.iter().any(|c| c.is_external_or_questioning())
    }
}

#[cfg(test)]
impl Principle {
    /// Build a principle directly from parts, bypassing the store.
    pub(crate) fn from_parts(
        id: u64,
        centroid: Vec<f32>,
        contributors: Vec<ContributorRef>,
        dimension: Option<Dimension>,
    ) -> Self {
        Self {
            id: PrincipleId(id),
            centroid,
            n_count: contributors.len(),
            contributors,
            dimension,
        }
    }
}
