//! Axioms: promoted, evidence-backed principles.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::principle::{Principle, PrincipleId};
use super::signal::{Dimension, Provenance, SignalId};

/// Evidence-strength label of an axiom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxiomTier {
    Core,
    Domain,
    Emerging,
}

impl fmt::Display for AxiomTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Core => "core",
            Self::Domain => "domain",
            Self::Emerging => "emerging",
        };
        f.write_str(s)
    }
}

/// Whether an axiom's text came from the notation model or from the
/// plain-text rendering of its evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotationSource {
    Generated,
    Fallback,
}

/// One signal in an axiom's audit chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalTrace {
    pub signal_id: SignalId,
    pub source_path: String,
    pub provenance: Provenance,
}

/// Audit chain from an axiom back to its principle, signals and files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxiomProvenance {
    pub principle_id: PrincipleId,
    pub signals: Vec<SignalTrace>,
}

/// A principle promoted past the evidence and diversity gates.
#[derive(Debug, Clone, Serialize)]
pub struct Axiom {
    pub id: String,
    pub text: String,
    pub notation: NotationSource,
    pub tier: AxiomTier,
    /// Evidence count carried over from the principle. Authoritative for
    /// pruning and tiering; never recomputed from provenance lengths.
    pub n_count: usize,
    pub dimension: Option<Dimension>,
    /// Unit-length embedding representing this axiom in convergence checks.
    pub embedding: Vec<f32>,
    pub provenance: AxiomProvenance,
}

impl Axiom {
    /// Build an axiom from a principle with a plain-text rendering of its
    /// evidence.
    ///
    /// Returns `None` for a principle with no contributors, so an axiom can
    /// never exist without a traceable signal.
    pub fn from_principle(principle: &Principle, tier: AxiomTier) -> Option<Self> {
        if principle.contributors().is_empty() {
            return None;
        }
        let signals = principle
            .contributors()
            .iter()
            .map(|c| SignalTrace {
                signal_id: c.signal_id.clone(),
                source_path: c.source_path.clone(),
                provenance: c.provenance,
            })
            .collect();
        Some(Self {
            id: format!("ax-{}", principle.id()),
            text: render_evidence_summary(principle),
            notation: NotationSource::Fallback,
            tier,
            n_count: principle.n_count(),
            dimension: principle.dimension(),
            embedding: principle.centroid().to_vec(),
            provenance: AxiomProvenance {
                principle_id: principle.id(),
                signals,
            },
        })
    }

    pub fn principle_id(&self) -> PrincipleId {
        self.provenance.principle_id
    }
}

/// Plain-text rendering of a principle's contributing signals.
///
/// The seed statement leads; up to two further distinct statements follow
/// with the total evidence count.
pub fn render_evidence_summary(principle: &Principle) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for c in principle.contributors() {
        if !seen.iter().any(|s| s.eq_ignore_ascii_case(&c.text)) {
            seen.push(&c.text);
        }
        if seen.len() == 3 {
            break;
        }
    }
    match seen.split_first() {
        None => String::new(),
        Some((lead, [])) => format!("{} (N={})", lead, principle.n_count()),
        Some((lead, rest)) => format!(
            "{} (N={}; also: {})",
            lead,
            principle.n_count(),
            rest.join("; ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::principle::ContributorRef;

    fn contributor(id: &str, text: &str) -> ContributorRef {
        ContributorRef {
            signal_id: SignalId::new(id),
            source_path: format!("memory/{}.md", id),
            provenance: Provenance::SelfAuthored,
            stance: None,
            text: text.to_string(),
            similarity: 1.0,
        }
    }

    #[test]
    fn test_from_principle_keeps_audit_chain() {
        let p = Principle::from_parts(
            3,
            vec![1.0, 0.0],
            vec![contributor("a", "Admit mistakes"), contributor("b", "Own errors openly")],
            Some(Dimension::HonestyFramework),
        );
        let axiom = Axiom::from_principle(&p, AxiomTier::Domain).unwrap();
        assert_eq!(axiom.n_count, 2);
        assert_eq!(axiom.principle_id(), PrincipleId(3));
        assert_eq!(axiom.provenance.signals.len(), 2);
        assert_eq!(axiom.provenance.signals[0].source_path, "memory/a.md");
        assert_eq!(axiom.notation, NotationSource::Fallback);
        assert_eq!(axiom.id, "ax-pr-0003");
    }

    #[test]
    fn test_from_principle_rejects_orphan() {
        let p = Principle::from_parts(1, vec![1.0], vec![], None);
        assert!(Axiom::from_principle(&p, AxiomTier::Core).is_none());
    }

    #[test]
    fn test_evidence_summary_dedupes() {
        let p = Principle::from_parts(
            1,
            vec![1.0],
            vec![
                contributor("a", "Admit mistakes"),
                contributor("b", "admit mistakes"),
                contributor("c", "Own errors openly"),
            ],
            None,
        );
        assert_eq!(
            render_evidence_summary(&p),
            "Admit mistakes (N=3; also: Own errors openly)"
        );
    }
}
