//! Generalized signals and the tagged outcome of generalization.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::signal::{Signal, SignalId};

/// How a generalized text was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralizationProvenance {
    /// Model that produced the text (or was asked to).
    pub model: String,
    /// Prompt template version.
    pub prompt_version: String,
    /// When the record was created.
    pub generated_at: DateTime<Utc>,
    /// 1.0 for a first-attempt pass, reduced per retry, 0.0 for fallback.
    pub confidence: f32,
    /// Number of LLM attempts made.
    pub attempts: u32,
    /// Whether the original signal text was used verbatim.
    pub used_fallback: bool,
}

/// A signal plus its canonical text and embedding.
///
/// The underlying [`Signal`] is shared, never copied.
#[derive(Debug, Clone, Serialize)]
pub struct GeneralizedSignal {
    pub signal: Arc<Signal>,
    /// Canonical imperative text, or the original text on fallback.
    pub text: String,
    /// Embedding of `text` as returned by the provider.
    pub embedding: Vec<f32>,
    pub provenance: GeneralizationProvenance,
}

impl GeneralizedSignal {
    pub fn id(&self) -> &SignalId {
        self.signal.id()
    }

    pub fn used_fallback(&self) -> bool {
        self.provenance.used_fallback
    }
}

/// Result of generalizing one signal.
///
/// Every input signal produces exactly one outcome.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GeneralizationOutcome {
    /// The LLM rewrite passed validation.
    Generalized(GeneralizedSignal),
    /// The LLM rewrite failed; the original text stands in.
    Fallback {
        record: GeneralizedSignal,
        reason: String,
    },
    /// The signal could not be embedded and is excluded from the run.
    Failed {
        #[serde(skip)]
        signal: Arc<Signal>,
        signal_id: SignalId,
        reason: String,
    },
}

impl GeneralizationOutcome {
    pub fn signal_id(&self) -> &SignalId {
        match self {
            Self::Generalized(g) => g.id(),
            Self::Fallback { record, .. } => record.id(),
            Self::Failed { signal_id, .. } => signal_id,
        }
    }

    /// The usable record, if any.
    pub fn record(&self) -> Option<&GeneralizedSignal> {
        match self {
            Self::Generalized(g) => Some(g),
            Self::Fallback { record, .. } => Some(record),
            Self::Failed { .. } => None,
        }
    }

    pub fn into_record(self) -> Option<GeneralizedSignal> {
        match self {
            Self::Generalized(g) => Some(g),
            Self::Fallback { record, .. } => Some(record),
            Self::Failed { .. } => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
