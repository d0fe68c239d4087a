//! Threshold cascade over the promotion floor.
//!
//! Selection starts at the strictest evidence floor. While the result has
//! fewer than `min_viable_axioms`, the next looser floor is tried, in
//! configured order, until the minimum is met or the loosest floor has been
//! tried.

use serde::Serialize;

use crate::compressor::{self, Compression};
use crate::config::SynthesisConfig;
use crate::types::{AxiomTier, Principle};

/// One floor the cascade tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CascadeAttempt {
    pub min_n_count: usize,
    pub tier: AxiomTier,
    pub axiom_count: usize,
}

/// What the cascade did during one selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    /// Floors tried, strictest first.
    pub attempts: Vec<CascadeAttempt>,
    /// Floor whose selection was kept.
    pub selected_floor: usize,
    /// Whether the kept selection reached `min_viable_axioms`.
    pub minimum_met: bool,
    /// Whether any floor looser than the first was tried.
    pub invoked: bool,
}

/// Select axioms, loosening the evidence floor until enough exist.
///
/// When even the loosest floor falls short, its selection is kept and the
/// report says the minimum was not met.
pub fn select_with_cascade(
    principles: &[Principle],
    config: &SynthesisConfig,
) -> (Compression, CascadeReport) {
    let mut report = CascadeReport::default();
    let mut selection = Compression::default();

    for level in &config.cascade_tiers {
        selection = compressor::select(principles, level.min_n_count, config);
        let axiom_count = selection.axioms.len();
        report.attempts.push(CascadeAttempt {
            min_n_count: level.min_n_count,
            tier: level.tier,
            axiom_count,
        });
        report.selected_floor = level.min_n_count;

        if axiom_count >= config.min_viable_axioms {
            report.minimum_met = true;
            break;
        }
        log::debug!(
            "Floor N>={} yielded {} axioms (minimum {})",
            level.min_n_count,
            axiom_count,
            config.min_viable_axioms
        );
    }

    report.invoked = report.attempts.len() > 1;
    if report.invoked && report.minimum_met {
        log::info!(
            "Cascade loosened evidence floor to N>={} to reach {} axioms",
            report.selected_floor,
            selection.axioms.len()
        );
    } else if !report.minimum_met && !principles.is_empty() {
        log::warn!(
            "Loosest floor N>={} yields only {} axioms (minimum {})",
            report.selected_floor,
            selection.axioms.len(),
            config.min_viable_axioms
        );
    }

    (selection, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContributorRef, Provenance, SignalId};

    fn principle(id: u64, n: usize) -> Principle {
        let contributors = (0..n)
            .map(|i| ContributorRef {
                signal_id: SignalId::new(format!("p{}-{}", id, i)),
                source_path: "interview.md".to_string(),
                provenance: Provenance::External,
                stance: None,
                text: format!("Statement {} of {}", i, id),
                similarity: 1.0,
            })
            .collect();
        Principle::from_parts(id, vec![1.0, 0.0], contributors, None)
    }

    fn floors(report: &CascadeReport) -> Vec<usize> {
        report.attempts.iter().map(|a| a.min_n_count).collect()
    }

    #[test]
    fn test_no_cascade_when_strict_floor_suffices() {
        let config = SynthesisConfig::default();
        let principles = vec![principle(0, 4), principle(1, 3), principle(2, 3)];
        let (selection, report) = select_with_cascade(&principles, &config);
        assert_eq!(selection.axioms.len(), 3);
        assert!(!report.invoked);
        assert!(report.minimum_met);
        assert_eq!(floors(&report), vec![3]);
    }

    #[test]
    fn test_cascade_tries_every_floor_in_order() {
        let config = SynthesisConfig::default();
        let principles = vec![principle(0, 3), principle(1, 2), principle(2, 1)];
        let (selection, report) = select_with_cascade(&principles, &config);
        assert_eq!(floors(&report), vec![3, 2, 1]);
        let counts: Vec<usize> = report.attempts.iter().map(|a| a.axiom_count).collect();
        assert_eq!(counts, vec![1, 2, 3]);
        assert!(report.minimum_met);
        assert_eq!(report.selected_floor, 1);

        let tiers: Vec<AxiomTier> = selection.axioms.iter().map(|a| a.tier).collect();
        assert_eq!(tiers, vec![AxiomTier::Core, AxiomTier::Domain, AxiomTier::Emerging]);
    }

    #[test]
    fn test_cascade_never_loosens_past_sufficient_floor() {
        let config = SynthesisConfig::default();
        let principles = vec![principle(0, 3), principle(1, 2), principle(2, 2), principle(3, 1)];
        let (selection, report) = select_with_cascade(&principles, &config);
        assert_eq!(floors(&report), vec![3, 2]);
        assert_eq!(selection.axioms.len(), 3);
        for attempt in &report.attempts[..report.attempts.len() - 1] {
            assert!(attempt.axiom_count < config.min_viable_axioms);
        }
    }

    #[test]
    fn test_reports_unmet_minimum() {
        let config = SynthesisConfig::default();
        let principles = vec![principle(0, 3), principle(1, 3)];
        let (selection, report) = select_with_cascade(&principles, &config);
        assert_eq!(selection.axioms.len(), 2);
        assert!(report.invoked);
        assert!(!report.minimum_met);
        assert_eq!(floors(&report), vec![3, 2, 1]);
    }

    #[test]
    fn test_configured_cascade_order() {
        let config = SynthesisConfig {
            min_viable_axioms: 2,
            cascade_tiers: vec![
                crate::config::CascadeTier { min_n_count: 5, tier: AxiomTier::Core },
                crate::config::CascadeTier { min_n_count: 2, tier: AxiomTier::Emerging },
            ],
            ..Default::default()
        };
        let principles = vec![principle(0, 5), principle(1, 2)];
        let (_, report) = select_with_cascade(&principles, &config);
        assert_eq!(floors(&report), vec![5, 2]);
        assert!(report.minimum_met);
    }
}
