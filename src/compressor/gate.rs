//! The promotion gate.
//!
//! A principle is promoted only when its N-count meets the active floor and
//! at least one contributing signal is external or questioning. A principle
//! backed solely by the agent's own affirmations never becomes an axiom.

use std::fmt;

use serde::Serialize;

use crate::types::{Principle, PrincipleId};

/// Why a principle was not promoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    /// N-count below the active floor.
    InsufficientEvidence { n_count: usize, required: usize },
    /// Enough evidence, but all of it self-authored affirmation.
    SelfOnlyProvenance { n_count: usize },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientEvidence { n_count, required } => write!(
                f,
                "insufficient evidence (N={}, requires {})",
                n_count, required
            ),
            Self::SelfOnlyProvenance { n_count } => write!(
                f,
                "self-only provenance (N={}, no external or questioning signal)",
                n_count
            ),
        }
    }
}

/// A reported gate rejection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromotionRejection {
    pub principle_id: PrincipleId,
    pub label: String,
    pub reason: RejectionReason,
    /// Human-readable form of `reason`.
    pub message: String,
}

impl PromotionRejection {
    fn new(principle: &Principle, reason: RejectionReason) -> Self {
        Self {
            principle_id: principle.id(),
            label: principle.seed_text().to_string(),
            message: reason.to_string(),
            reason,
        }
    }

    pub fn is_self_only(&self) -> bool {
        matches!(self.reason, RejectionReason::SelfOnlyProvenance { .. })
    }
}

/// Check one principle against the gate at `min_n_count`.
pub fn evaluate(principle: &Principle, min_n_count: usize) -> Result<(), RejectionReason> {
    let n_count = principle.n_count();
    if n_count < min_n_count {
        return Err(RejectionReason::InsufficientEvidence {
            n_count,
            required: min_n_count,
        });
    }
    if !principle.has_diverse_provenance() {
        return Err(RejectionReason::SelfOnlyProvenance { n_count });
    }
    Ok(())
}

/// Split principles into those passing the gate and reported rejections.
pub fn partition(
    principles: &[Principle],
    min_n_count: usize,
) -> (Vec<&Principle>, Vec<PromotionRejection>) {
    let mut passed = Vec::new();
    let mut rejected = Vec::new();
    for principle in principles {
        match evaluate(principle, min_n_count) {
            Ok(()) => passed.push(principle),
            Err(reason) => {
                if matches!(reason, RejectionReason::SelfOnlyProvenance { .. }) {
                    log::info!(
                        "Principle {} not promoted: {} ('{}')",
                        principle.id(),
                        reason,
                        principle.seed_text()
                    );
                }
                rejected.push(PromotionRejection::new(principle, reason));
            }
        }
    }
    (passed, rejected)
}
