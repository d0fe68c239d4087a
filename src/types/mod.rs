//! Core data model: signals, generalized signals, principles and axioms.

pub mod axiom;
pub mod generalized;
pub mod principle;
pub mod signal;
pub mod usage_metrics;

pub use axiom::{Axiom, AxiomProvenance, AxiomTier, NotationSource, SignalTrace};
pub use generalized::{GeneralizationOutcome, GeneralizationProvenance, GeneralizedSignal};
pub use principle::{ContributorRef, Principle, PrincipleId};
pub use signal::{
    Dimension, ElicitationOrigin, Importance, Provenance, Signal, SignalId, SignalSource,
    SourceDocument, SourceType, Stance,
};
pub use usage_metrics::{UsageMetrics, UsageTracker};
